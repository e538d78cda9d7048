//! Proptest strategies for reconciler property tests.

use crate::node::{h, text, VNode};
use crate::props::{Hooks, Props};
use proptest::prelude::*;

/// Distinct keys in ascending order; empty lists included.
pub fn arb_keys() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..40, 0..10).prop_map(|keys| keys.into_iter().collect())
}

/// An old key list and a new one built from a shuffled subset of it plus
/// some fresh keys spliced in.
pub fn arb_keyed_edit() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    arb_keys().prop_flat_map(|old| {
        let n = old.len();
        (
            Just(old.clone()),
            Just(old).prop_shuffle(),
            prop::collection::vec(any::<bool>(), n),
            prop::collection::btree_set(100i64..120, 0..4),
            any::<prop::sample::Index>(),
        )
            .prop_map(|(old, shuffled, keep, fresh, at)| {
                let mut new: Vec<i64> = shuffled
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(key, keep)| keep.then_some(key))
                    .collect();
                let insert_at = at.index(new.len() + 1);
                for (offset, key) in fresh.into_iter().enumerate() {
                    new.insert((insert_at + offset).min(new.len()), key);
                }
                (old, new)
            })
    })
}

/// Short text lists for unkeyed children.
pub fn arb_labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,4}", 0..8)
}

/// `<ul>` with one keyed `<li>` per key, labelled with the key.
pub fn keyed_list(keys: &[i64]) -> VNode {
    h(
        "ul",
        Props::new(),
        keys.iter()
            .map(|key| h("li", Props::new().key(*key), text(key)))
            .collect::<Vec<_>>(),
    )
}

/// [`keyed_list`] with `hooks` on the list and on every item.
pub fn hooked_keyed_list(keys: &[i64], hooks: &Hooks) -> VNode {
    h(
        "ul",
        Props::new().with_hooks(hooks.clone()),
        keys.iter()
            .map(|key| h("li", Props::new().key(*key).with_hooks(hooks.clone()), text(key)))
            .collect::<Vec<_>>(),
    )
}

/// `<ul>` with one unkeyed `<li>` per label.
pub fn unkeyed_list(labels: &[String]) -> VNode {
    h(
        "ul",
        Props::new(),
        labels
            .iter()
            .map(|label| h("li", Props::new(), label.as_str()))
            .collect::<Vec<_>>(),
    )
}
