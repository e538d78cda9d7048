//! In-memory render surface.
//!
//! An arena of elements and text nodes with a mutation log. Used headlessly
//! by tests and the demo binary.

use crate::props::{Event, Handler, PropValue};
use crate::surface::{Capabilities, ElementId, Namespace, Surface, SurfaceError, SurfaceNode};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::rc::Rc;

/// One recorded surface mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateElement { id: ElementId, tag: String },
    CreateText { id: ElementId, content: String },
    SetText { id: ElementId, content: String },
    Insert { parent: ElementId, child: ElementId, before: Option<ElementId> },
    Remove { parent: ElementId, child: ElementId },
    SetProperty { id: ElementId, name: String, value: PropValue },
    SetAttribute { id: ElementId, name: String, value: String },
    RemoveAttribute { id: ElementId, name: String },
    SetStyle { id: ElementId, name: String, value: Option<String> },
    SetListener { id: ElementId, event: String, installed: bool },
}

#[derive(Default)]
struct ElementData {
    tag: String,
    namespace: Namespace,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, PropValue>,
    style: BTreeMap<String, String>,
    listeners: BTreeMap<String, Handler>,
}

enum NodeKind {
    Element(ElementData),
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// Arena surface. Released slots are reused by later creations.
#[derive(Default)]
pub struct MemorySurface {
    nodes: Vec<Option<NodeData>>,
    free: Vec<u32>,
    mutations: Vec<Mutation>,
}

impl fmt::Debug for MemorySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySurface")
            .field("nodes", &self.node_count())
            .field("free", &self.free.len())
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface holding one `tag` element to mount into. Creating it is not
    /// recorded as a mutation.
    pub fn with_container(tag: &str) -> (Self, ElementId) {
        let mut surface = Self::new();
        let container = surface.push(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        }));
        (surface, container)
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn clear_mutations(&mut self) {
        self.mutations.clear();
    }

    /// Live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Slots allocated so far, free ones included.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, node: ElementId) -> Option<ElementId> {
        self.node(node).ok().and_then(|n| n.parent)
    }

    pub fn tag(&self, node: ElementId) -> Option<&str> {
        self.element(node).ok().map(|el| el.tag.as_str())
    }

    pub fn namespace(&self, node: ElementId) -> Option<Namespace> {
        self.element(node).ok().map(|el| el.namespace)
    }

    pub fn text(&self, node: ElementId) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Text(content) => Some(content),
            NodeKind::Element(_) => None,
        }
    }

    pub fn attribute(&self, node: ElementId, name: &str) -> Option<&str> {
        self.element(node).ok()?.attributes.get(name).map(String::as_str)
    }

    pub fn style(&self, node: ElementId, name: &str) -> Option<&str> {
        self.element(node).ok()?.style.get(name).map(String::as_str)
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, node: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: ElementId, out: &mut String) {
        let Ok(data) = self.node(node) else { return };
        match &data.kind {
            NodeKind::Text(content) => out.push_str(content),
            NodeKind::Element(_) => {
                for child in &data.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Changes a live property without recording a mutation, the way user
    /// input changes a form control.
    pub fn simulate_input(&mut self, node: ElementId, name: &str, value: PropValue) {
        if let Some(Some(NodeData {
            kind: NodeKind::Element(el),
            ..
        })) = self.nodes.get_mut(node.raw() as usize)
        {
            el.properties.insert(name.to_string(), value);
        }
    }

    /// Invokes the listener for `event` on `node`; `false` when none is set.
    pub fn dispatch(&self, node: ElementId, event: &str) -> bool {
        match self.listener(node, event) {
            Some(handler) => {
                handler(&Event {
                    name: event.to_string(),
                    target: node,
                });
                true
            }
            None => false,
        }
    }

    /// Elements under `root` (itself included) whose `class` contains
    /// `class`, in document order.
    pub fn find_by_class(&self, root: ElementId, class: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        self.collect_by_class(root, class, &mut found);
        found
    }

    fn collect_by_class(&self, node: ElementId, class: &str, found: &mut Vec<ElementId>) {
        let Ok(data) = self.node(node) else { return };
        let NodeKind::Element(el) = &data.kind else { return };
        let matches = el
            .attributes
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class));
        if matches {
            found.push(node);
        }
        for child in &data.children {
            self.collect_by_class(*child, class, found);
        }
    }

    /// Indented markup of the subtree at `node`.
    ///
    /// Attributes and properties are printed sorted by name, followed by the
    /// inline style. Listeners are not shown. An element whose only child is
    /// text stays on one line.
    pub fn markup(&self, node: ElementId) -> String {
        let mut out = String::new();
        self.write_markup(node, 0, &mut out);
        let len = out.trim_end_matches('\n').len();
        out.truncate(len);
        out
    }

    fn write_markup(&self, node: ElementId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let Ok(data) = self.node(node) else { return };
        let el = match &data.kind {
            NodeKind::Text(content) => {
                let _ = writeln!(out, "{indent}{}", escape_text(content));
                return;
            }
            NodeKind::Element(el) => el,
        };

        let mut attrs: BTreeMap<&str, String> = el
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        for (name, value) in &el.properties {
            match value {
                PropValue::Null | PropValue::Bool(false) => {}
                PropValue::Bool(true) => {
                    attrs.insert(name.as_str(), String::new());
                }
                other => {
                    attrs.insert(name.as_str(), other.to_attribute());
                }
            }
        }

        let _ = write!(out, "{indent}<{}", el.tag);
        for (name, value) in &attrs {
            if value.is_empty() {
                let _ = write!(out, " {name}");
            } else {
                let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
            }
        }
        if !el.style.is_empty() {
            let style = el
                .style
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", escape_attr(&style));
        }
        out.push('>');

        match data.children.as_slice() {
            [] => {}
            [only] if self.text(*only).is_some() => {
                out.push_str(&escape_text(self.text(*only).unwrap_or_default()));
            }
            children => {
                out.push('\n');
                for child in children {
                    self.write_markup(*child, depth + 1, out);
                }
                out.push_str(&indent);
            }
        }
        let _ = writeln!(out, "</{}>", el.tag);
    }

    fn push(&mut self, kind: NodeKind) -> ElementId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(raw) = self.free.pop() {
            self.nodes[raw as usize] = Some(data);
            return ElementId::from_raw(raw);
        }
        self.nodes.push(Some(data));
        ElementId::from_raw(self.nodes.len() as u32 - 1)
    }

    fn node(&self, id: ElementId) -> Result<&NodeData, SurfaceError> {
        self.nodes
            .get(id.raw() as usize)
            .and_then(Option::as_ref)
            .ok_or(SurfaceError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut NodeData, SurfaceError> {
        self.nodes
            .get_mut(id.raw() as usize)
            .and_then(Option::as_mut)
            .ok_or(SurfaceError::UnknownNode(id))
    }

    fn element(&self, id: ElementId) -> Result<&ElementData, SurfaceError> {
        match &self.node(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            NodeKind::Text(_) => Err(SurfaceError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut ElementData, SurfaceError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            NodeKind::Text(_) => Err(SurfaceError::NotAnElement(id)),
        }
    }

    fn is_ancestor_or_self(&self, candidate: ElementId, node: ElementId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn property_default(caps: Capabilities, name: &str) -> Option<PropValue> {
    let needed = Capabilities::for_property(name)?;
    if !caps.contains(needed) {
        return None;
    }
    Some(if needed == Capabilities::VALUE {
        PropValue::from("")
    } else {
        PropValue::Bool(false)
    })
}

impl Surface for MemorySurface {
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> Result<ElementId, SurfaceError> {
        let valid = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':');
        if !valid {
            return Err(SurfaceError::InvalidTag(tag.to_string()));
        }
        let id = self.push(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            namespace,
            ..ElementData::default()
        }));
        self.mutations.push(Mutation::CreateElement {
            id,
            tag: tag.to_string(),
        });
        Ok(id)
    }

    fn create_text(&mut self, content: &str) -> Result<ElementId, SurfaceError> {
        let id = self.push(NodeKind::Text(content.to_string()));
        self.mutations.push(Mutation::CreateText {
            id,
            content: content.to_string(),
        });
        Ok(id)
    }

    fn set_text(&mut self, node: ElementId, content: &str) -> Result<(), SurfaceError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text(current) => *current = content.to_string(),
            NodeKind::Element(_) => return Err(SurfaceError::NotText(node)),
        }
        self.mutations.push(Mutation::SetText {
            id: node,
            content: content.to_string(),
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: ElementId,
        child: ElementId,
        reference: Option<ElementId>,
    ) -> Result<(), SurfaceError> {
        self.element(parent)?;
        self.node(child)?;
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(SurfaceError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SurfaceError::Cycle { parent, child });
        }

        if let Some(old_parent) = self.node(child)?.parent {
            self.node_mut(old_parent)?.children.retain(|c| *c != child);
        }
        let siblings = &mut self.node_mut(parent)?.children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);

        self.mutations.push(Mutation::Insert {
            parent,
            child,
            before: reference,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), SurfaceError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(SurfaceError::NotAChild { parent, child });
        }
        self.node_mut(parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        self.mutations.push(Mutation::Remove { parent, child });
        Ok(())
    }

    /// Frees `node` and its descendants. Attached nodes are refused.
    fn release(&mut self, node: ElementId) -> Result<(), SurfaceError> {
        if self.node(node)?.parent.is_some() {
            return Err(SurfaceError::Attached(node));
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.get_mut(id.raw() as usize).and_then(Option::take) {
                stack.extend(data.children);
                self.free.push(id.raw());
            }
        }
        Ok(())
    }

    fn children(&self, parent: ElementId) -> Result<Vec<ElementId>, SurfaceError> {
        self.element(parent)?;
        Ok(self.node(parent)?.children.clone())
    }

    fn describe(&self, node: ElementId) -> Result<SurfaceNode, SurfaceError> {
        Ok(match &self.node(node)?.kind {
            NodeKind::Element(el) => SurfaceNode::Element {
                tag: el.tag.clone(),
            },
            NodeKind::Text(content) => SurfaceNode::Text(content.clone()),
        })
    }

    fn capabilities(&self, element: ElementId) -> Capabilities {
        match self.element(element) {
            Ok(el) if el.namespace == Namespace::Html => Capabilities::for_tag(&el.tag),
            _ => Capabilities::empty(),
        }
    }

    fn property(&self, element: ElementId, name: &str) -> Option<PropValue> {
        let el = self.element(element).ok()?;
        el.properties
            .get(name)
            .cloned()
            .or_else(|| property_default(self.capabilities(element), name))
    }

    fn set_property(
        &mut self,
        element: ElementId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), SurfaceError> {
        let el = self.element_mut(element)?;
        if matches!(value, PropValue::Null) {
            el.properties.remove(name);
        } else {
            el.properties.insert(name.to_string(), value.clone());
        }
        self.mutations.push(Mutation::SetProperty {
            id: element,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) -> Result<(), SurfaceError> {
        self.element_mut(element)?
            .attributes
            .insert(name.to_string(), value.to_string());
        self.mutations.push(Mutation::SetAttribute {
            id: element,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, element: ElementId, name: &str) -> Result<(), SurfaceError> {
        self.element_mut(element)?.attributes.remove(name);
        self.mutations.push(Mutation::RemoveAttribute {
            id: element,
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_style(
        &mut self,
        element: ElementId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), SurfaceError> {
        let el = self.element_mut(element)?;
        match value {
            Some(value) if !value.is_empty() => {
                el.style.insert(name.to_string(), value.to_string());
            }
            _ => {
                el.style.remove(name);
            }
        }
        self.mutations.push(Mutation::SetStyle {
            id: element,
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    fn set_listener(
        &mut self,
        element: ElementId,
        event: &str,
        handler: Option<Handler>,
    ) -> Result<(), SurfaceError> {
        let el = self.element_mut(element)?;
        let installed = handler.is_some();
        match handler {
            Some(handler) => {
                el.listeners.insert(event.to_string(), handler);
            }
            None => {
                el.listeners.remove(event);
            }
        }
        self.mutations.push(Mutation::SetListener {
            id: element,
            event: event.to_string(),
            installed,
        });
        Ok(())
    }

    fn listener(&self, element: ElementId, event: &str) -> Option<Handler> {
        self.element(element).ok()?.listeners.get(event).map(Rc::clone)
    }
}
