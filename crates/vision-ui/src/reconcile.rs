//! Tree reconciliation.
//!
//! [`Reconciler::patch`] compares the previously rendered tree with the next
//! one and applies the difference to a [`Surface`]. Matched elements keep
//! their identity: unkeyed children are matched by position and keyed
//! children by key, so reordering a keyed list moves existing elements
//! instead of recreating them.
//!
//! Lifecycle hooks fire in a fixed order:
//!
//! - `oncreate`, `onupdate` and `onremove` are queued while patching and
//!   handed to the caller through [`Reconciler::take_lifecycle`], to run once
//!   the surface has settled. `onupdate` is only queued when the patch wrote
//!   something to the node or its subtree.
//! - Every `onremove` in a removed subtree is queued, and the subtree stays
//!   attached until each of them has called its [`Done`]. The caller then
//!   detaches it with [`Reconciler::flush_removals`].
//! - `ondestroy` runs bottom-up right before detachment, while the surface
//!   is still being patched.

use crate::node::{Element, VNode};
use crate::props::{Key, PropValue, Props, RemoveHook, StyleMap};
use crate::surface::{Capabilities, ElementId, Namespace, Surface, SurfaceError, SurfaceNode};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("duplicate key {key} among the children of {parent}")]
    DuplicateKey { key: Key, parent: ElementId },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Counters for one patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Nodes created, descendants included.
    pub created: usize,
    /// Existing nodes whose props or text changed.
    pub updated: usize,
    /// Keyed elements moved to a new position.
    pub moved: usize,
    /// Subtrees removed (detached now or pending an `onremove`).
    pub removed: usize,
}

impl PatchStats {
    pub fn is_empty(&self) -> bool {
        *self == PatchStats::default()
    }
}

/// A queued `oncreate`/`onupdate` call.
pub type LifecycleCall = Box<dyn FnOnce()>;

struct RemovalTicket {
    parent: ElementId,
    element: ElementId,
    node: VNode,
    outstanding: Cell<usize>,
}

#[derive(Default)]
struct RemovalQueue {
    ready: RefCell<Vec<Rc<RemovalTicket>>>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl RemovalQueue {
    fn complete(&self, ticket: Rc<RemovalTicket>) {
        let left = ticket.outstanding.get().saturating_sub(1);
        ticket.outstanding.set(left);
        if left > 0 {
            return;
        }
        self.ready.borrow_mut().push(ticket);
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// Continuation handed to an `onremove` hook.
///
/// The removed element stays on the surface until every `Done` issued for
/// its subtree has been called. Dropping a `Done` without calling it keeps
/// the element attached.
pub struct Done {
    ticket: Rc<RemovalTicket>,
    queue: Weak<RemovalQueue>,
}

impl Done {
    pub fn call(self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.complete(self.ticket);
        }
    }

    /// The element being removed (the root of the removed subtree).
    pub fn element(&self) -> ElementId {
        self.ticket.element
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("element", &self.ticket.element)
            .field("outstanding", &self.ticket.outstanding.get())
            .finish()
    }
}

/// Applies tree differences to a surface and tracks deferred removals.
#[derive(Default)]
pub struct Reconciler {
    lifecycle: Vec<LifecycleCall>,
    removals: Rc<RemovalQueue>,
    detaching: HashSet<ElementId>,
    stats: PatchStats,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("queued_hooks", &self.lifecycle.len())
            .field("detaching", &self.detaching.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patches `element` (rendered from `previous`) under `parent` so that it
    /// matches `next`, returning the element that now represents `next`.
    ///
    /// With no `previous`, `next` is created and inserted before `element`
    /// (appended when `element` is `None`).
    pub fn patch<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: ElementId,
        element: Option<ElementId>,
        previous: Option<&VNode>,
        next: &VNode,
    ) -> Result<ElementId, ReconcileError> {
        let element = self.patch_node(surface, parent, element, previous, next, false)?;
        self.flush_ready(surface)?;
        Ok(element)
    }

    /// Drains the queued `oncreate`/`onupdate` calls in queue order.
    pub fn take_lifecycle(&mut self) -> Vec<LifecycleCall> {
        std::mem::take(&mut self.lifecycle)
    }

    pub fn take_stats(&mut self) -> PatchStats {
        std::mem::take(&mut self.stats)
    }

    /// Number of removed subtrees still waiting on an `onremove` continuation.
    pub fn pending_removals(&self) -> usize {
        self.detaching.len()
    }

    /// Called whenever a removal's last [`Done`] completes, so the owner can
    /// schedule [`Reconciler::flush_removals`].
    pub fn set_removal_waker(&self, waker: impl Fn() + 'static) {
        *self.removals.waker.borrow_mut() = Some(Rc::new(waker));
    }

    /// Detaches every removed subtree whose continuations have all completed.
    pub fn flush_removals<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<usize, ReconcileError> {
        let flushed = self.flush_ready(surface)?;
        if flushed > 0 {
            debug!(flushed, pending = self.detaching.len(), "flushed deferred removals");
        }
        Ok(flushed)
    }

    fn patch_node<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: ElementId,
        element: Option<ElementId>,
        previous: Option<&VNode>,
        next: &VNode,
        svg: bool,
    ) -> Result<ElementId, ReconcileError> {
        let (Some(previous), Some(element)) = (previous, element) else {
            let created = self.create(surface, next, svg)?;
            surface.insert_before(parent, created, element)?;
            return Ok(created);
        };

        if std::ptr::eq(previous, next) {
            return Ok(element);
        }

        match (previous, next) {
            (VNode::Element(old), VNode::Element(new)) if old.name == new.name => {
                let svg = svg || new.name == "svg";
                let before = self.stats;
                if self.update_props(surface, element, &old.props, &new.props, svg)? {
                    self.stats.updated += 1;
                }
                self.patch_children(surface, element, old, new, svg)?;
                let touched = self.stats != before;
                if let Some(hook) = new.props.hooks().onupdate.clone().filter(|_| touched) {
                    let old_props = old.props.clone();
                    self.lifecycle
                        .push(Box::new(move || hook(element, &old_props)));
                }
                Ok(element)
            }
            (VNode::Text(old), VNode::Text(new)) => {
                if old != new {
                    surface.set_text(element, new)?;
                    self.stats.updated += 1;
                }
                Ok(element)
            }
            _ => {
                let created = self.create(surface, next, svg)?;
                surface.insert_before(parent, created, Some(element))?;
                self.remove_node(surface, parent, element, previous)?;
                Ok(created)
            }
        }
    }

    fn create<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        node: &VNode,
        svg: bool,
    ) -> Result<ElementId, ReconcileError> {
        self.stats.created += 1;
        let el = match node {
            VNode::Text(content) => return Ok(surface.create_text(content)?),
            VNode::Element(el) => el,
        };

        let svg = svg || el.name == "svg";
        let namespace = if svg { Namespace::Svg } else { Namespace::Html };
        let element = surface.create_element(&el.name, namespace)?;
        ensure_unique_keys(element, &el.children)?;

        for child in &el.children {
            let created = self.create(surface, child, svg)?;
            surface.insert_before(element, created, None)?;
        }

        let caps = surface.capabilities(element);
        for (name, value) in el.props.iter() {
            if value.is_present() {
                set_prop(surface, element, name, value, None, caps, svg)?;
            }
        }

        if let Some(hook) = el.props.hooks().oncreate.clone() {
            self.lifecycle.push(Box::new(move || hook(element)));
        }
        Ok(element)
    }

    /// Returns whether anything was written.
    fn update_props<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        element: ElementId,
        old: &Props,
        new: &Props,
        svg: bool,
    ) -> Result<bool, ReconcileError> {
        let null = PropValue::Null;
        let caps = surface.capabilities(element);
        let names: BTreeSet<&str> = old.names().chain(new.names()).collect();
        let mut changed = false;

        for name in names {
            let next = new.get(name).unwrap_or(&null);
            let previous = old.get(name);
            // form controls can change under us; compare with what is live
            let live = if next.is_present() && !svg && Capabilities::is_live(name) {
                Capabilities::for_property(name)
                    .filter(|needed| caps.contains(*needed))
                    .map(|_| surface.property(element, name).unwrap_or(PropValue::Null))
            } else {
                None
            };
            let current = live.as_ref().or(previous).unwrap_or(&null);
            if next != current {
                set_prop(surface, element, name, next, previous, caps, svg)?;
                changed = true;
            }
        }
        Ok(changed)
    }

    fn patch_children<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        element: ElementId,
        old: &Element,
        new: &Element,
        svg: bool,
    ) -> Result<(), ReconcileError> {
        ensure_unique_keys(element, &new.children)?;
        let old_elements = self.live_children(surface, element)?;

        let mut old_keyed: HashMap<&Key, (ElementId, &VNode)> = HashMap::new();
        for (index, child) in old.children.iter().enumerate() {
            if let (Some(key), Some(&el)) = (child.key(), old_elements.get(index)) {
                old_keyed.insert(key, (el, child));
            }
        }

        let mut new_keyed: HashSet<&Key> = HashSet::new();
        let (mut i, mut j) = (0, 0);

        while j < new.children.len() {
            let old_child = old.children.get(i);
            let new_child = &new.children[j];
            let old_key = old_child.and_then(VNode::key);

            if old_key.is_some_and(|key| new_keyed.contains(key)) {
                i += 1;
                continue;
            }

            match new_child.key() {
                None => {
                    if old_key.is_none() {
                        let at = old_elements.get(i).copied();
                        self.patch_node(surface, element, at, old_child, new_child, svg)?;
                        j += 1;
                    }
                    i += 1;
                }
                Some(key) => {
                    let recycled = old_keyed.get(key).copied();
                    match recycled {
                        Some((el, node)) if old_key == Some(key) => {
                            self.patch_node(surface, element, Some(el), Some(node), new_child, svg)?;
                            i += 1;
                        }
                        Some((el, node)) => {
                            surface.insert_before(element, el, old_elements.get(i).copied())?;
                            self.stats.moved += 1;
                            self.patch_node(surface, element, Some(el), Some(node), new_child, svg)?;
                        }
                        None => {
                            let at = old_elements.get(i).copied();
                            self.patch_node(surface, element, at, None, new_child, svg)?;
                        }
                    }
                    j += 1;
                    new_keyed.insert(key);
                }
            }
        }

        while i < old.children.len() {
            let old_child = &old.children[i];
            if old_child.key().is_none() {
                if let Some(&el) = old_elements.get(i) {
                    self.remove_node(surface, element, el, old_child)?;
                }
            }
            i += 1;
        }

        for (index, old_child) in old.children.iter().enumerate() {
            let Some(key) = old_child.key() else { continue };
            if new_keyed.contains(key) {
                continue;
            }
            if let Some(&el) = old_elements.get(index) {
                self.remove_node(surface, element, el, old_child)?;
            }
        }
        Ok(())
    }

    /// Children of `element` that are not waiting to be detached.
    fn live_children<S: Surface + ?Sized>(
        &self,
        surface: &S,
        element: ElementId,
    ) -> Result<Vec<ElementId>, ReconcileError> {
        let mut children = surface.children(element)?;
        if !self.detaching.is_empty() {
            children.retain(|child| !self.detaching.contains(child));
        }
        Ok(children)
    }

    fn remove_node<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: ElementId,
        element: ElementId,
        node: &VNode,
    ) -> Result<(), ReconcileError> {
        self.stats.removed += 1;
        let mut hooks = Vec::new();
        self.collect_remove_hooks(surface, element, node, &mut hooks)?;

        if hooks.is_empty() {
            return self.detach(surface, parent, element, node);
        }

        trace!(%element, hooks = hooks.len(), "removal waiting on onremove");
        let ticket = Rc::new(RemovalTicket {
            parent,
            element,
            node: node.clone(),
            outstanding: Cell::new(hooks.len()),
        });
        self.detaching.insert(element);
        for (target, hook) in hooks {
            let done = Done {
                ticket: Rc::clone(&ticket),
                queue: Rc::downgrade(&self.removals),
            };
            self.lifecycle.push(Box::new(move || hook(target, done)));
        }
        Ok(())
    }

    /// Pre-order: a node's hook comes before its descendants'.
    fn collect_remove_hooks<S: Surface + ?Sized>(
        &self,
        surface: &S,
        element: ElementId,
        node: &VNode,
        out: &mut Vec<(ElementId, RemoveHook)>,
    ) -> Result<(), ReconcileError> {
        let VNode::Element(el) = node else {
            return Ok(());
        };
        if let Some(hook) = el.props.hooks().onremove.clone() {
            out.push((element, hook));
        }
        let children = self.live_children(surface, element)?;
        for (child, child_node) in children.into_iter().zip(&el.children) {
            self.collect_remove_hooks(surface, child, child_node, out)?;
        }
        Ok(())
    }

    fn detach<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        parent: ElementId,
        element: ElementId,
        node: &VNode,
    ) -> Result<(), ReconcileError> {
        self.destroy(surface, element, node)?;
        surface.remove_child(parent, element)?;
        // a nested removal still waiting on its continuation keeps the subtree
        let holds = matches!(node, VNode::Element(_))
            && !self.detaching.is_empty()
            && self.holds_detaching(surface, element)?;
        if !holds {
            surface.release(element)?;
        }
        trace!(%parent, %element, "detached");
        Ok(())
    }

    fn holds_detaching<S: Surface + ?Sized>(
        &self,
        surface: &S,
        element: ElementId,
    ) -> Result<bool, ReconcileError> {
        for child in surface.children(element)? {
            if self.detaching.contains(&child) {
                return Ok(true);
            }
            let is_element = matches!(surface.describe(child)?, SurfaceNode::Element { .. });
            if is_element && self.holds_detaching(surface, child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Bottom-up: children are destroyed before their parent.
    fn destroy<S: Surface + ?Sized>(
        &self,
        surface: &S,
        element: ElementId,
        node: &VNode,
    ) -> Result<(), ReconcileError> {
        let VNode::Element(el) = node else {
            return Ok(());
        };
        let children = self.live_children(surface, element)?;
        for (child, child_node) in children.into_iter().zip(&el.children) {
            self.destroy(surface, child, child_node)?;
        }
        if let Some(hook) = &el.props.hooks().ondestroy {
            hook(element);
        }
        Ok(())
    }

    fn flush_ready<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<usize, ReconcileError> {
        let mut flushed = 0;
        loop {
            let ready = std::mem::take(&mut *self.removals.ready.borrow_mut());
            if ready.is_empty() {
                return Ok(flushed);
            }
            for ticket in ready {
                self.detaching.remove(&ticket.element);
                self.detach(surface, ticket.parent, ticket.element, &ticket.node)?;
                flushed += 1;
            }
        }
    }
}

fn ensure_unique_keys(parent: ElementId, children: &[VNode]) -> Result<(), ReconcileError> {
    let mut seen = HashSet::new();
    for key in children.iter().filter_map(VNode::key) {
        if !seen.insert(key) {
            return Err(ReconcileError::DuplicateKey {
                key: key.clone(),
                parent,
            });
        }
    }
    Ok(())
}

/// `onclick` listens for `click`.
fn event_name(prop: &str) -> &str {
    prop.strip_prefix("on").unwrap_or(prop)
}

fn set_prop<S: Surface + ?Sized>(
    surface: &mut S,
    element: ElementId,
    name: &str,
    value: &PropValue,
    previous: Option<&PropValue>,
    caps: Capabilities,
    svg: bool,
) -> Result<(), SurfaceError> {
    if name == "style" {
        return set_style(surface, element, value, previous);
    }

    if let PropValue::Handler(handler) = value {
        return surface.set_listener(element, event_name(name), Some(Rc::clone(handler)));
    }
    if let Some(PropValue::Handler(_)) = previous {
        surface.set_listener(element, event_name(name), None)?;
        if !value.is_present() {
            return Ok(());
        }
    }

    let is_property = !svg
        && Capabilities::for_property(name).is_some_and(|needed| caps.contains(needed));
    if is_property {
        surface.set_property(element, name, value)
    } else if value.is_present() {
        surface.set_attribute(element, name, &value.to_attribute())
    } else {
        surface.remove_attribute(element, name)
    }
}

fn set_style<S: Surface + ?Sized>(
    surface: &mut S,
    element: ElementId,
    value: &PropValue,
    previous: Option<&PropValue>,
) -> Result<(), SurfaceError> {
    let empty = StyleMap::new();
    let next = match value {
        PropValue::Style(style) => style,
        _ => &empty,
    };
    let old = match previous {
        Some(PropValue::Style(style)) => style,
        _ => &empty,
    };

    for (name, old_value) in old {
        if !next.contains_key(name) && !old_value.is_empty() {
            surface.set_style(element, name, None)?;
        }
    }
    for (name, new_value) in next {
        if old.get(name) != Some(new_value) {
            surface.set_style(element, name, Some(new_value))?;
        }
    }
    Ok(())
}
