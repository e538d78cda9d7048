//! Action trees and wiring.
//!
//! An [`ActionTree`] mirrors the shape of the state: each branch name is a
//! key of the state map, and each leaf is an action bound to the map at that
//! path. [`wire`] turns the tree into [`Actions`], whose leaves read and
//! commit state through a [`StateHost`].

use crate::value::{StateMap, Value};
use futures::future::{FutureExt, LocalBoxFuture};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("state at {path:?} is not a mapping")]
    NotAMapping { path: Vec<String> },

    #[error("no action named {name:?} at {path:?}")]
    UnknownAction { path: Vec<String>, name: String },

    #[error("the app owning this action is gone")]
    Detached,

    #[error("invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type ActionFn = Rc<dyn Fn(Value) -> Result<Update, ActionError>>;

pub type Thunk = Box<dyn FnOnce(&StateMap, &Actions) -> Result<Update, ActionError>>;

/// Asynchronous action result. It is handed back to the caller untouched;
/// committing its eventual effect means calling another action.
pub struct Deferred(LocalBoxFuture<'static, Value>);

impl Deferred {
    pub fn new(future: impl Future<Output = Value> + 'static) -> Self {
        Self(future.boxed_local())
    }

    pub fn into_future(self) -> LocalBoxFuture<'static, Value> {
        self.0
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// What an action body produced.
pub enum Update {
    /// Nothing to commit.
    None,
    /// Partial sub-state, merged shallowly at the action's path.
    Patch(StateMap),
    /// Evaluated against the current sub-state and the sibling actions.
    Thunk(Thunk),
    /// Returned as-is, never committed.
    Deferred(Deferred),
}

impl Update {
    pub fn thunk(
        f: impl FnOnce(&StateMap, &Actions) -> Result<Update, ActionError> + 'static,
    ) -> Self {
        Update::Thunk(Box::new(f))
    }

    pub fn deferred(future: impl Future<Output = Value> + 'static) -> Self {
        Update::Deferred(Deferred::new(future))
    }

    pub fn as_patch(&self) -> Option<&StateMap> {
        match self {
            Update::Patch(patch) => Some(patch),
            _ => None,
        }
    }

    pub fn into_deferred(self) -> Option<Deferred> {
        match self {
            Update::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Update::None)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::None => f.write_str("None"),
            Update::Patch(patch) => f.debug_tuple("Patch").field(patch).finish(),
            Update::Thunk(_) => f.write_str("Thunk(..)"),
            Update::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<StateMap> for Update {
    fn from(patch: StateMap) -> Self {
        Update::Patch(patch)
    }
}

/// Unwired actions, shaped like the state they act on.
pub enum ActionTree {
    Leaf(ActionFn),
    Branch(BTreeMap<String, ActionTree>),
}

impl Default for ActionTree {
    fn default() -> Self {
        ActionTree::Branch(BTreeMap::new())
    }
}

impl fmt::Debug for ActionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTree::Leaf(_) => f.write_str("<action>"),
            ActionTree::Branch(children) => f.debug_map().entries(children.iter()).finish(),
        }
    }
}

impl ActionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(action: impl Fn(Value) -> Result<Update, ActionError> + 'static) -> Self {
        ActionTree::Leaf(Rc::new(action))
    }

    /// Adds a leaf. Adding to a leaf turns it into a branch.
    pub fn action(
        self,
        name: impl Into<String>,
        action: impl Fn(Value) -> Result<Update, ActionError> + 'static,
    ) -> Self {
        self.insert(name.into(), ActionTree::leaf(action))
    }

    /// Adds a nested branch bound to the state map under `name`.
    pub fn branch(self, name: impl Into<String>, tree: ActionTree) -> Self {
        self.insert(name.into(), tree)
    }

    fn insert(self, name: String, node: ActionTree) -> Self {
        let mut children = match self {
            ActionTree::Branch(children) => children,
            ActionTree::Leaf(_) => BTreeMap::new(),
        };
        children.insert(name, node);
        ActionTree::Branch(children)
    }
}

/// Owner of the live state that wired actions read and commit to.
pub trait StateHost {
    /// The map at `path` in the current state.
    fn sub_state(&self, path: &[String]) -> Result<StateMap, ActionError>;

    /// Merges `patch` into the map at `path`; returns whether anything changed.
    fn commit(&self, path: &[String], patch: &StateMap) -> Result<bool, ActionError>;
}

/// Reads the map at `path`, treating a missing or null entry as empty.
pub fn state_at(root: &StateMap, path: &[String]) -> Result<StateMap, ActionError> {
    let mut current = root.clone();
    for (depth, key) in path.iter().enumerate() {
        current = match current.get(key) {
            None | Some(Value::Null) => StateMap::new(),
            Some(Value::Map(map)) => map.clone(),
            Some(_) => {
                return Err(ActionError::NotAMapping {
                    path: path[..=depth].to_vec(),
                })
            }
        };
    }
    Ok(current)
}

/// A leaf action bound to its state path.
#[derive(Clone)]
pub struct WiredAction {
    name: String,
    path: Vec<String>,
    action: ActionFn,
    host: Weak<dyn StateHost>,
    siblings: Weak<BranchInner>,
}

impl fmt::Debug for WiredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiredAction")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl WiredAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Runs the action, resolves thunks against fresh state and commits a
    /// resulting patch. The resolved update is returned.
    pub fn call(&self, payload: impl Into<Value>) -> Result<Update, ActionError> {
        let mut update = (self.action)(payload.into())?;

        while let Update::Thunk(thunk) = update {
            let current = self.host()?.sub_state(&self.path)?;
            let siblings = self
                .siblings
                .upgrade()
                .map(Actions)
                .ok_or(ActionError::Detached)?;
            update = thunk(&current, &siblings)?;
        }

        if let Update::Patch(patch) = &update {
            let committed = self.host()?.commit(&self.path, patch)?;
            trace!(action = %self.name, path = ?self.path, committed, "action resolved");
        }
        Ok(update)
    }

    fn host(&self) -> Result<Rc<dyn StateHost>, ActionError> {
        self.host.upgrade().ok_or(ActionError::Detached)
    }
}

struct BranchInner {
    path: Vec<String>,
    leaves: BTreeMap<String, WiredAction>,
    branches: BTreeMap<String, Actions>,
}

/// A wired branch of actions. Cloning is cheap.
#[derive(Clone)]
pub struct Actions(Rc<BranchInner>);

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actions")
            .field("path", &self.0.path)
            .field("leaves", &self.0.leaves.keys().collect::<Vec<_>>())
            .field("branches", &self.0.branches)
            .finish()
    }
}

impl Actions {
    pub fn call(&self, name: &str, payload: impl Into<Value>) -> Result<Update, ActionError> {
        self.get(name)
            .ok_or_else(|| ActionError::UnknownAction {
                path: self.0.path.clone(),
                name: name.to_string(),
            })?
            .call(payload)
    }

    pub fn get(&self, name: &str) -> Option<&WiredAction> {
        self.0.leaves.get(name)
    }

    pub fn branch(&self, name: &str) -> Option<&Actions> {
        self.0.branches.get(name)
    }

    pub fn path(&self) -> &[String] {
        &self.0.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.leaves.keys().map(String::as_str)
    }
}

/// Wires `tree` against `state`.
///
/// Every branch of the tree gets a map at the matching state path; absent
/// or null entries become empty maps. Returns the normalized state and the
/// wired actions.
pub fn wire(
    state: StateMap,
    tree: ActionTree,
    host: Weak<dyn StateHost>,
) -> Result<(StateMap, Actions), ActionError> {
    let state = prepare_state(state, &tree, &[])?;
    Ok((state, wire_actions(tree, &host)))
}

pub(crate) fn prepare_state(
    state: StateMap,
    tree: &ActionTree,
    path: &[String],
) -> Result<StateMap, ActionError> {
    let ActionTree::Branch(children) = tree else {
        return Ok(state);
    };
    let mut state = state;
    for (name, child) in children {
        if !matches!(child, ActionTree::Branch(_)) {
            continue;
        }
        let mut child_path = path.to_vec();
        child_path.push(name.clone());
        let sub = match state.get(name) {
            None | Some(Value::Null) => StateMap::new(),
            Some(Value::Map(map)) => map.clone(),
            Some(_) => return Err(ActionError::NotAMapping { path: child_path }),
        };
        let prepared = prepare_state(sub, child, &child_path)?;
        let unchanged = matches!(state.get(name), Some(Value::Map(map)) if map.ptr_eq(&prepared));
        if !unchanged {
            state = state.with(name.clone(), prepared);
        }
    }
    Ok(state)
}

pub(crate) fn wire_actions(tree: ActionTree, host: &Weak<dyn StateHost>) -> Actions {
    let children = match tree {
        ActionTree::Branch(children) => children,
        ActionTree::Leaf(_) => BTreeMap::new(),
    };
    wire_branch(Vec::new(), children, host)
}

fn wire_branch(
    path: Vec<String>,
    children: BTreeMap<String, ActionTree>,
    host: &Weak<dyn StateHost>,
) -> Actions {
    let mut leaves = Vec::new();
    let mut branches = BTreeMap::new();
    for (name, child) in children {
        match child {
            ActionTree::Leaf(action) => leaves.push((name, action)),
            ActionTree::Branch(grandchildren) => {
                let mut child_path = path.clone();
                child_path.push(name.clone());
                branches.insert(name, wire_branch(child_path, grandchildren, host));
            }
        }
    }

    Actions(Rc::new_cyclic(|me| BranchInner {
        leaves: leaves
            .into_iter()
            .map(|(name, action)| {
                let wired = WiredAction {
                    name: name.clone(),
                    path: path.clone(),
                    action,
                    host: host.clone(),
                    siblings: me.clone(),
                };
                (name, wired)
            })
            .collect(),
        branches,
        path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;
    use std::cell::{Cell, RefCell};

    /// Minimal host: a state cell and a commit counter.
    struct Cellar {
        state: RefCell<StateMap>,
        commits: Cell<usize>,
    }

    impl StateHost for Cellar {
        fn sub_state(&self, path: &[String]) -> Result<StateMap, ActionError> {
            state_at(&self.state.borrow(), path)
        }

        fn commit(&self, path: &[String], patch: &StateMap) -> Result<bool, ActionError> {
            let root = self.state.borrow().clone();
            let current = state_at(&root, path)?;
            let merged = current.merge(patch);
            if merged.ptr_eq(&current) {
                return Ok(false);
            }
            *self.state.borrow_mut() = root.set_path(path, merged);
            self.commits.set(self.commits.get() + 1);
            Ok(true)
        }
    }

    fn setup(state: StateMap, tree: ActionTree) -> (Rc<Cellar>, Actions) {
        let cellar = Rc::new(Cellar {
            state: RefCell::new(StateMap::new()),
            commits: Cell::new(0),
        });
        let host: Rc<dyn StateHost> = cellar.clone();
        let (state, actions) = wire(state, tree, Rc::downgrade(&host)).unwrap();
        *cellar.state.borrow_mut() = state;
        (cellar, actions)
    }

    fn counter_tree() -> ActionTree {
        ActionTree::new()
            .action("set", |v| Ok(Update::Patch(state! { "count" => v })))
            .action("incr", |_| {
                Ok(Update::thunk(|s, _| {
                    let n = s.get("count").and_then(Value::as_i64).unwrap_or(0);
                    Ok(state! { "count" => n + 1 }.into())
                }))
            })
            .action("noop", |_| Ok(Update::None))
            .branch(
                "nested",
                ActionTree::new().action("flag", |v| Ok(state! { "on" => v }.into())),
            )
    }

    #[test]
    fn absent_branch_state_defaults_to_empty_map() {
        let (cellar, _) = setup(state! { "count" => 0 }, counter_tree());
        let nested = cellar.state.borrow().get("nested").cloned();
        assert!(matches!(nested, Some(Value::Map(map)) if map.is_empty()));
    }

    #[test]
    fn non_map_branch_state_is_rejected() {
        let host: Weak<dyn StateHost> = Weak::<Cellar>::new();
        let err = wire(state! { "nested" => 3 }, counter_tree(), host).unwrap_err();
        assert!(matches!(err, ActionError::NotAMapping { path } if path == ["nested"]));
    }

    #[test]
    fn nested_action_commits_at_its_path() {
        let (cellar, actions) = setup(state! { "count" => 0 }, counter_tree());
        let before = cellar.state.borrow().clone();

        actions.branch("nested").unwrap().call("flag", true).unwrap();

        let after = cellar.state.borrow().clone();
        assert_eq!(
            after.get_path(&["nested".to_string(), "on".to_string()]),
            Some(&Value::Bool(true))
        );
        assert!(before.get("nested").and_then(Value::as_map).unwrap().is_empty());
    }

    #[test]
    fn thunks_see_state_committed_by_earlier_calls() {
        let (cellar, actions) = setup(state! { "count" => 0 }, counter_tree());

        actions.call("incr", ()).unwrap();
        actions.call("incr", ()).unwrap();

        assert_eq!(cellar.state.borrow().get("count").and_then(Value::as_i64), Some(2));
        assert_eq!(cellar.commits.get(), 2);
    }

    #[test]
    fn identical_patch_does_not_commit() {
        let (cellar, actions) = setup(state! { "count" => 5 }, counter_tree());

        let update = actions.call("set", 5).unwrap();

        assert!(update.as_patch().is_some());
        assert_eq!(cellar.commits.get(), 0);
    }

    #[test]
    fn none_and_unknown_actions() {
        let (cellar, actions) = setup(StateMap::new(), counter_tree());

        assert!(actions.call("noop", ()).unwrap().is_none());
        assert!(matches!(
            actions.call("missing", ()),
            Err(ActionError::UnknownAction { name, .. }) if name == "missing"
        ));
        assert_eq!(cellar.commits.get(), 0);
    }

    #[test]
    fn actions_fail_once_host_is_dropped() {
        let (cellar, actions) = setup(StateMap::new(), counter_tree());
        drop(cellar);

        assert!(matches!(actions.call("set", 1), Err(ActionError::Detached)));
    }

    #[test]
    fn errors_propagate_without_commit() {
        let tree = ActionTree::new().action("boom", |_| {
            Err(anyhow::anyhow!("exploded").into())
        });
        let (cellar, actions) = setup(StateMap::new(), tree);

        let err = actions.call("boom", ()).unwrap_err();
        assert_eq!(err.to_string(), "exploded");
        assert_eq!(cellar.commits.get(), 0);
    }
}
