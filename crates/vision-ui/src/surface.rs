//! The render-surface boundary.
//!
//! The reconciler never touches a concrete UI toolkit. It drives an
//! implementation of [`Surface`], which owns the live elements and text
//! nodes and exposes just enough of them to create, move, update and
//! remove nodes. [`crate::MemorySurface`] is the reference implementation.

use crate::node::VNode;
use crate::props::{Handler, PropValue, Props};
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// Handle to a live node owned by a [`Surface`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Live properties an element exposes, as opposed to plain attributes.
    ///
    /// Props whose name maps to a capability the element has are assigned
    /// as properties; everything else becomes an attribute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        const VALUE = 1 << 0;
        const CHECKED = 1 << 1;
        const SELECTED = 1 << 2;
        const DISABLED = 1 << 3;
    }
}

impl Capabilities {
    /// The capability a prop name needs to be assigned as a property.
    pub fn for_property(name: &str) -> Option<Capabilities> {
        match name {
            "value" => Some(Capabilities::VALUE),
            "checked" => Some(Capabilities::CHECKED),
            "selected" => Some(Capabilities::SELECTED),
            "disabled" => Some(Capabilities::DISABLED),
            _ => None,
        }
    }

    /// Static capability set of an HTML tag.
    pub fn for_tag(tag: &str) -> Capabilities {
        match tag {
            "input" => Capabilities::VALUE | Capabilities::CHECKED | Capabilities::DISABLED,
            "textarea" | "select" => Capabilities::VALUE | Capabilities::DISABLED,
            "option" => Capabilities::VALUE | Capabilities::SELECTED | Capabilities::DISABLED,
            "button" => Capabilities::DISABLED,
            _ => Capabilities::empty(),
        }
    }

    /// Props whose current value is read back from the surface before
    /// diffing, because user interaction changes them behind our back.
    pub fn is_live(name: &str) -> bool {
        matches!(name, "value" | "checked")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

/// Read-only description of a live node, used to adopt existing content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceNode {
    Element { tag: String },
    Text(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("unknown node {0}")]
    UnknownNode(ElementId),

    #[error("{0} is a text node, expected an element")]
    NotAnElement(ElementId),

    #[error("{0} is an element, expected a text node")]
    NotText(ElementId),

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: ElementId, child: ElementId },

    #[error("{0} is still attached")]
    Attached(ElementId),

    #[error("inserting {child} into {parent} would create a cycle")]
    Cycle { parent: ElementId, child: ElementId },

    #[error("invalid tag name {0:?}")]
    InvalidTag(String),
}

/// Mutable view of a live element tree.
///
/// `insert_before` follows DOM semantics: a node that is already attached
/// somewhere is moved, and a `reference` of `None` appends.
pub trait Surface {
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> Result<ElementId, SurfaceError>;

    fn create_text(&mut self, content: &str) -> Result<ElementId, SurfaceError>;

    fn set_text(&mut self, node: ElementId, content: &str) -> Result<(), SurfaceError>;

    fn insert_before(
        &mut self,
        parent: ElementId,
        child: ElementId,
        reference: Option<ElementId>,
    ) -> Result<(), SurfaceError>;

    fn remove_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), SurfaceError>;

    fn children(&self, parent: ElementId) -> Result<Vec<ElementId>, SurfaceError>;

    fn describe(&self, node: ElementId) -> Result<SurfaceNode, SurfaceError>;

    fn capabilities(&self, element: ElementId) -> Capabilities;

    /// Current value of a live property, if the element has it.
    fn property(&self, element: ElementId, name: &str) -> Option<PropValue>;

    fn set_property(
        &mut self,
        element: ElementId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), SurfaceError>;

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str)
        -> Result<(), SurfaceError>;

    fn remove_attribute(&mut self, element: ElementId, name: &str) -> Result<(), SurfaceError>;

    /// Sets one inline style entry; `None` clears it.
    fn set_style(
        &mut self,
        element: ElementId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), SurfaceError>;

    /// Installs or (with `None`) removes the listener for `event`.
    fn set_listener(
        &mut self,
        element: ElementId,
        event: &str,
        handler: Option<Handler>,
    ) -> Result<(), SurfaceError>;

    fn listener(&self, element: ElementId, event: &str) -> Option<Handler>;

    /// Called once a removed subtree has been detached for good. Surfaces
    /// that own their nodes may free it; its ids must not be used again.
    fn release(&mut self, node: ElementId) -> Result<(), SurfaceError> {
        let _ = node;
        Ok(())
    }
}

/// Reads the live subtree at `node` back into a [`VNode`].
///
/// Tags are lower-cased and props are left empty, so the first patch
/// against the result reuses every existing node and only adds props.
pub fn adopt<S: Surface + ?Sized>(surface: &S, node: ElementId) -> Result<VNode, SurfaceError> {
    match surface.describe(node)? {
        SurfaceNode::Text(content) => Ok(VNode::text(content)),
        SurfaceNode::Element { tag } => {
            let children = surface
                .children(node)?
                .into_iter()
                .map(|child| adopt(surface, child))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(VNode::element(tag.to_lowercase(), Props::new(), children))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("input", "value", true ; "input value")]
    #[test_case("input", "checked", true ; "input checked")]
    #[test_case("textarea", "checked", false ; "textarea has no checked")]
    #[test_case("option", "selected", true ; "option selected")]
    #[test_case("div", "value", false ; "div value is an attribute")]
    #[test_case("button", "disabled", true ; "button disabled")]
    fn property_dispatch(tag: &str, name: &str, is_property: bool) {
        let caps = Capabilities::for_tag(tag);
        let needed = Capabilities::for_property(name).unwrap();
        assert_eq!(caps.contains(needed), is_property);
    }

    #[test]
    fn unknown_prop_names_are_attributes() {
        assert_eq!(Capabilities::for_property("class"), None);
        assert_eq!(Capabilities::for_property("style"), None);
    }

    #[test]
    fn only_value_and_checked_are_live() {
        assert!(Capabilities::is_live("value"));
        assert!(Capabilities::is_live("checked"));
        assert!(!Capabilities::is_live("selected"));
        assert!(!Capabilities::is_live("disabled"));
    }
}
