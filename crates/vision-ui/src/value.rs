//! Immutable application state.
//!
//! State is a tree of [`Value`]s whose branches ([`StateMap`] and lists) are
//! reference counted. Every committed change builds a new root that shares
//! all untouched branches with the previous one, so an old snapshot stays
//! valid while the next one is computed, and "did this branch change" is a
//! pointer comparison.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A single state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(Rc<[Value]>),
    Map(StateMap),
}

impl Value {
    /// Identity comparison used to decide whether a commit changed anything.
    ///
    /// Scalars compare by value, shared payloads (lists and maps) by pointer.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral view of a number; fractional numbers are rejected.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<StateMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a[..] == b[..],
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => map.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<StateMap> for Value {
    fn from(map: StateMap) -> Self {
        Value::Map(map)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::from(items),
            serde_json::Value::Object(map) => Value::Map(StateMap::from(map)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// A shared, copy-on-write mapping from keys to [`Value`]s.
///
/// Cloning is a reference-count bump. All "mutating" operations return a new
/// map and leave `self` untouched.
#[derive(Clone, Default, PartialEq)]
pub struct StateMap(Rc<BTreeMap<String, Value>>);

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when both maps are the same allocation.
    pub fn ptr_eq(&self, other: &StateMap) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> StateMap {
        let mut entries = (*self.0).clone();
        entries.insert(key.into(), value.into());
        StateMap(Rc::new(entries))
    }

    /// Shallow merge of `patch` over `self`.
    ///
    /// Returns `self` (same allocation) when every patch entry is already
    /// identical to the current entry, so callers can detect no-op patches
    /// with [`StateMap::ptr_eq`].
    pub fn merge(&self, patch: &StateMap) -> StateMap {
        let changed = patch
            .iter()
            .any(|(key, value)| !self.get(key).is_some_and(|current| current.is_identical(value)));
        if !changed {
            return self.clone();
        }

        let mut entries = (*self.0).clone();
        for (key, value) in patch.iter() {
            entries.insert(key.to_string(), value.clone());
        }
        StateMap(Rc::new(entries))
    }

    /// Walks `path` through nested maps.
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get(first)?;
        for key in rest {
            current = current.as_map()?.get(key)?;
        }
        Some(current)
    }

    /// Returns a new root where the map at `path` is replaced by `value`.
    ///
    /// Only the maps along `path` are copied; every sibling branch is shared
    /// with `self`. Missing or non-map intermediate entries are replaced by
    /// fresh maps.
    pub fn set_path(&self, path: &[String], value: StateMap) -> StateMap {
        match path.split_first() {
            None => value,
            Some((first, rest)) => {
                let child = match self.get(first) {
                    Some(Value::Map(map)) => map.clone(),
                    _ => StateMap::new(),
                };
                self.with(first.clone(), Value::Map(child.set_path(rest, value)))
            }
        }
    }
}

impl fmt::Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        StateMap(Rc::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for StateMap {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

impl Serialize for StateMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builds a [`StateMap`] from `key => value` pairs.
///
/// ```
/// use vision_ui::state;
///
/// let s = state! { "size" => 2, "status" => "init" };
/// assert_eq!(s.get("size").and_then(|v| v.as_i64()), Some(2));
/// ```
#[macro_export]
macro_rules! state {
    () => { $crate::StateMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {
        [$(($key, $crate::Value::from($value))),+]
            .into_iter()
            .collect::<$crate::StateMap>()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn merge_with_identical_entries_returns_same_allocation() {
        let state = state! { "status" => "init", "size" => 4 };
        let merged = state.merge(&state! { "status" => "init" });

        assert!(merged.ptr_eq(&state));
    }

    #[test]
    fn merge_with_empty_patch_is_a_no_op() {
        let state = state! { "status" => "init" };
        assert!(state.merge(&StateMap::new()).ptr_eq(&state));
    }

    #[test]
    fn merge_copies_instead_of_mutating() {
        let state = state! { "status" => "init" };
        let merged = state.merge(&state! { "status" => "start" });

        assert_eq!(state.get("status").and_then(Value::as_str), Some("init"));
        assert_eq!(merged.get("status").and_then(Value::as_str), Some("start"));
        assert!(!merged.ptr_eq(&state));
    }

    #[test]
    fn structurally_equal_list_still_counts_as_a_change() {
        let state = state! { "position" => vec![0, 1] };
        let merged = state.merge(&state! { "position" => vec![0, 1] });

        assert!(!merged.ptr_eq(&state));
        assert_eq!(merged, state);
    }

    #[test]
    fn set_path_shares_untouched_branches() {
        let root = StateMap::from(
            json!({ "game": { "status": "init" }, "scores": { "best": 3 } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let game = root.get("game").and_then(Value::as_map).unwrap().clone();
        let next = root.set_path(&path(&["game"]), game.with("status", "start"));

        let old_scores = root.get("scores").and_then(Value::as_map).unwrap();
        let new_scores = next.get("scores").and_then(Value::as_map).unwrap();
        assert!(old_scores.ptr_eq(new_scores));
        assert_eq!(
            root.get_path(&path(&["game", "status"])).and_then(Value::as_str),
            Some("init")
        );
        assert_eq!(
            next.get_path(&path(&["game", "status"])).and_then(Value::as_str),
            Some("start")
        );
    }

    #[test]
    fn set_path_with_empty_path_replaces_root() {
        let root = state! { "a" => 1 };
        let replacement = state! { "b" => 2 };
        assert!(root.set_path(&[], replacement.clone()).ptr_eq(&replacement));
    }

    #[test]
    fn json_conversion_and_serialization_agree() {
        let value = Value::from(json!({ "size": 2, "position": [0, 1, 2, 3], "moving": false }));
        let back = serde_json::to_value(&value).unwrap();

        assert_eq!(back, json!({ "moving": false, "position": [0.0, 1.0, 2.0, 3.0], "size": 2.0 }));
    }

    #[test]
    fn as_i64_rejects_fractions() {
        assert_eq!(Value::from(3).as_i64(), Some(3));
        assert_eq!(Value::from(2.5).as_i64(), None);
    }
}
