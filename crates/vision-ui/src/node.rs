//! Virtual node tree and the `h` builder.

use crate::props::{Hooks, Key, Props};

/// Immutable description of one surface node.
#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Text(String),
    Element(Element),
}

/// An element description. The element exclusively owns its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub props: Props,
    pub children: Vec<VNode>,
}

impl VNode {
    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text(content.into())
    }

    pub fn element(name: impl Into<String>, props: Props, children: Vec<VNode>) -> Self {
        VNode::Element(Element {
            name: name.into(),
            props,
            children,
        })
    }

    /// Element tag, `None` for text.
    pub fn name(&self) -> Option<&str> {
        match self {
            VNode::Element(el) => Some(&el.name),
            VNode::Text(_) => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element(el) => el.props.key_ref(),
            VNode::Text(_) => None,
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            VNode::Element(el) => Some(&el.props),
            VNode::Text(_) => None,
        }
    }

    pub fn hooks(&self) -> Option<&Hooks> {
        self.props().map(Props::hooks)
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element(el) => &el.children,
            VNode::Text(_) => &[],
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(content) => Some(content),
            VNode::Element(_) => None,
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(VNode::size).sum::<usize>()
    }
}

/// Builder input for children.
///
/// Anything convertible into a `Child` can be passed to [`h`]: nodes,
/// strings, numbers, nested vectors and arrays, options and booleans.
/// Booleans and `None` become holes and are dropped, which keeps
/// conditional rendering terse (`cond.then(|| h(..))`).
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    Many(Vec<Child>),
    Hole,
}

impl Child {
    /// Depth-first, order-preserving flattening with holes dropped.
    pub fn flatten(self) -> Vec<VNode> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<VNode>) {
        match self {
            Child::Node(node) => out.push(node),
            Child::Many(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
            Child::Hole => {}
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Node(VNode::text(s))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Node(VNode::Text(s))
    }
}

impl From<&String> for Child {
    fn from(s: &String) -> Self {
        Child::Node(VNode::Text(s.clone()))
    }
}

macro_rules! numeric_child {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(n: $ty) -> Self {
                Child::Node(VNode::Text(n.to_string()))
            }
        })*
    };
}

numeric_child!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Hole
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Hole
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Hole, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(children: Vec<T>) -> Self {
        Child::Many(children.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Child>, const N: usize> From<[T; N]> for Child {
    fn from(children: [T; N]) -> Self {
        Child::Many(children.into_iter().map(Into::into).collect())
    }
}

/// Builds an element node.
///
/// ```
/// use vision_ui::{h, Props};
///
/// let node = h("div", Props::new().attr("class", "tile"), ["a", "b"]);
/// assert_eq!(node.children().len(), 2);
/// ```
pub fn h(name: impl Into<String>, props: Props, children: impl Into<Child>) -> VNode {
    VNode::element(name, props, children.into().flatten())
}

/// Builds a text node.
pub fn text(content: impl std::fmt::Display) -> VNode {
    VNode::Text(content.to_string())
}

/// Calls a component function with flattened children.
pub fn component<F>(f: F, props: Props, children: impl Into<Child>) -> VNode
where
    F: FnOnce(Props, Vec<VNode>) -> VNode,
{
    f(props, children.into().flatten())
}

/// Heterogeneous child list: `children![h(..), "text", 3, maybe_node]`.
#[macro_export]
macro_rules! children {
    () => { $crate::Child::Many(Vec::new()) };
    ($($child:expr),+ $(,)?) => {
        $crate::Child::Many(vec![$($crate::Child::from($child)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(node: &VNode) -> Vec<&str> {
        node.children().iter().filter_map(VNode::as_text).collect()
    }

    #[test]
    fn flattens_nested_children_in_order() {
        let node = h(
            "ul",
            Props::new(),
            children!["a", vec![vec!["b", "c"], vec!["d"]], ["e"]],
        );
        assert_eq!(texts(&node), ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn drops_holes() {
        let node = h(
            "div",
            Props::new(),
            children![true, false, None::<VNode>, (), "kept", Some("also")],
        );
        assert_eq!(texts(&node), ["kept", "also"]);
    }

    #[test]
    fn numbers_become_text() {
        let node = h("span", Props::new(), children![1, 2.5, 3usize]);
        assert_eq!(texts(&node), ["1", "2.5", "3"]);
    }

    #[test]
    fn component_receives_flattened_children() {
        let wrap = |props: Props, children: Vec<VNode>| {
            h("section", props, h("div", Props::new(), children))
        };
        let node = component(wrap, Props::new().key(7), children!["x", vec!["y"]]);

        assert_eq!(node.name(), Some("section"));
        assert_eq!(node.key(), Some(&Key::Int(7)));
        assert_eq!(texts(&node.children()[0]), ["x", "y"]);
    }

    #[test]
    fn size_counts_whole_subtree() {
        let node = h("div", Props::new(), children![h("p", Props::new(), "a"), "b"]);
        assert_eq!(node.size(), 4);
    }

    #[test]
    fn text_nodes_have_no_key_or_children() {
        let node = text(42);
        assert_eq!(node.key(), None);
        assert!(node.children().is_empty());
        assert_eq!(node.as_text(), Some("42"));
    }
}
