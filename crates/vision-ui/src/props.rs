//! Node properties, keys and lifecycle hooks.

use crate::reconcile::Done;
use crate::surface::ElementId;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name without the `on` prefix, e.g. `click`.
    pub name: String,
    pub target: ElementId,
}

pub type Handler = Rc<dyn Fn(&Event)>;

/// Inline style entries, name to CSS value.
pub type StyleMap = BTreeMap<String, String>;

/// A tagged prop value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Handler(Handler),
    Style(StyleMap),
}

impl PropValue {
    /// `Null` and `false` mean "attribute absent".
    pub fn is_present(&self) -> bool {
        !matches!(self, PropValue::Null | PropValue::Bool(false))
    }

    /// String form used when the value is written as an attribute.
    pub fn to_attribute(&self) -> String {
        match self {
            PropValue::Null => String::new(),
            PropValue::Bool(b) => b.to_string(),
            PropValue::Number(n) => n.to_string(),
            PropValue::Text(s) => s.to_string(),
            PropValue::Handler(_) => "[handler]".to_string(),
            PropValue::Style(style) => style
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(b) => write!(f, "Bool({b})"),
            PropValue::Number(n) => write!(f, "Number({n})"),
            PropValue::Text(s) => write!(f, "Text({s:?})"),
            PropValue::Handler(_) => f.write_str("Handler(..)"),
            PropValue::Style(style) => f.debug_tuple("Style").field(style).finish(),
        }
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(Rc::from(s))
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(Rc::from(s))
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Number(n as f64)
    }
}

impl From<i32> for PropValue {
    fn from(n: i32) -> Self {
        PropValue::Number(f64::from(n))
    }
}

impl From<usize> for PropValue {
    fn from(n: usize) -> Self {
        PropValue::Number(n as f64)
    }
}

impl From<StyleMap> for PropValue {
    fn from(style: StyleMap) -> Self {
        PropValue::Style(style)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

/// List-reconciliation identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(i64::from(n))
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Key::Int(n as i64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s))
    }
}

pub type CreateHook = Rc<dyn Fn(ElementId)>;
pub type UpdateHook = Rc<dyn Fn(ElementId, &Props)>;
pub type DestroyHook = Rc<dyn Fn(ElementId)>;
pub type RemoveHook = Rc<dyn Fn(ElementId, Done)>;

/// Lifecycle callbacks attached to one node.
///
/// Order within a render pass:
/// - `oncreate` is queued once the node's children exist and its props are
///   set, and runs after the whole pass has been applied.
/// - `onupdate` is queued after the node's children were reconciled and
///   receives the previous props. A patch that changes nothing on the node
///   or below it does not queue it.
/// - `onremove` is queued when the node (or an ancestor) leaves the tree;
///   detachment waits for its [`Done`].
/// - `ondestroy` runs bottom-up right before the subtree is detached, in the
///   middle of the patch.
#[derive(Clone, Default)]
pub struct Hooks {
    pub oncreate: Option<CreateHook>,
    pub onupdate: Option<UpdateHook>,
    pub ondestroy: Option<DestroyHook>,
    pub onremove: Option<RemoveHook>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.oncreate.is_none()
            && self.onupdate.is_none()
            && self.ondestroy.is_none()
            && self.onremove.is_none()
    }
}

fn same_hook<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

impl PartialEq for Hooks {
    fn eq(&self, other: &Self) -> bool {
        same_hook(&self.oncreate, &other.oncreate)
            && same_hook(&self.onupdate, &other.onupdate)
            && same_hook(&self.ondestroy, &other.ondestroy)
            && same_hook(&self.onremove, &other.onremove)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.oncreate.is_some() {
            names.push("oncreate");
        }
        if self.onupdate.is_some() {
            names.push("onupdate");
        }
        if self.ondestroy.is_some() {
            names.push("ondestroy");
        }
        if self.onremove.is_some() {
            names.push("onremove");
        }
        f.debug_set().entries(names).finish()
    }
}

/// Properties of an element node: attributes, properties, listeners,
/// inline style, the optional key and the lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    values: BTreeMap<String, PropValue>,
    key: Option<Key>,
    hooks: Hooks,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Sets the whole inline style.
    pub fn style<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let style = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<StyleMap>();
        self.values.insert("style".to_string(), PropValue::Style(style));
        self
    }

    /// Registers a listener; `on("click", ..)` is stored as `onclick`.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.values
            .insert(format!("on{event}"), PropValue::Handler(Rc::new(handler)));
        self
    }

    /// Registers an already shared listener.
    pub fn on_shared(mut self, event: &str, handler: Handler) -> Self {
        self.values
            .insert(format!("on{event}"), PropValue::Handler(handler));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn oncreate(mut self, hook: impl Fn(ElementId) + 'static) -> Self {
        self.hooks.oncreate = Some(Rc::new(hook));
        self
    }

    pub fn onupdate(mut self, hook: impl Fn(ElementId, &Props) + 'static) -> Self {
        self.hooks.onupdate = Some(Rc::new(hook));
        self
    }

    pub fn ondestroy(mut self, hook: impl Fn(ElementId) + 'static) -> Self {
        self.hooks.ondestroy = Some(Rc::new(hook));
        self
    }

    pub fn onremove(mut self, hook: impl Fn(ElementId, Done) + 'static) -> Self {
        self.hooks.onremove = Some(Rc::new(hook));
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }
}

/// Builds [`Props`] from `name => value` attribute pairs.
#[macro_export]
macro_rules! props {
    () => { $crate::Props::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Props::new()$(.attr($name, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_prefixes_event_name() {
        let props = Props::new().on("click", |_| {});
        assert!(matches!(props.get("onclick"), Some(PropValue::Handler(_))));
    }

    #[test]
    fn null_and_false_are_absent() {
        assert!(!PropValue::Null.is_present());
        assert!(!PropValue::Bool(false).is_present());
        assert!(PropValue::Bool(true).is_present());
        assert!(PropValue::from("").is_present());
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler: Handler = Rc::new(|_| {});
        let a = PropValue::Handler(handler.clone());
        let b = PropValue::Handler(handler);
        let c = PropValue::Handler(Rc::new(|_| {}));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn props_macro_builds_attributes() {
        let props = props! { "class" => "tile", "tabindex" => 0 };
        assert_eq!(props.get("class").and_then(PropValue::as_str), Some("tile"));
        assert_eq!(props.get("tabindex"), Some(&PropValue::Number(0.0)));
    }

    #[test]
    fn style_renders_as_attribute_text() {
        let props = Props::new().style([("top", "0px"), ("left", "10px")]);
        assert_eq!(
            props.get("style").map(PropValue::to_attribute).as_deref(),
            Some("left: 10px; top: 0px")
        );
    }

    #[test]
    fn hooks_debug_lists_registered_names() {
        let props = Props::new().oncreate(|_| {}).ondestroy(|_| {});
        assert_eq!(format!("{:?}", props.hooks()), r#"{"oncreate", "ondestroy"}"#);
    }
}
