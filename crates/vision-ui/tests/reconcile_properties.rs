#![cfg(feature = "test-utils")]

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use vision_ui::proptest_strategies::*;
use vision_ui::*;

fn mounted() -> (MemorySurface, ElementId) {
    MemorySurface::with_container("body")
}

/// Patches `next` over `previous`, returning the root element.
fn patch(
    reconciler: &mut Reconciler,
    surface: &mut MemorySurface,
    body: ElementId,
    current: Option<(ElementId, &VNode)>,
    next: &VNode,
) -> ElementId {
    let (element, previous) = match current {
        Some((el, node)) => (Some(el), Some(node)),
        None => (None, None),
    };
    reconciler
        .patch(surface, body, element, previous, next)
        .expect("patch")
}

fn labels(surface: &MemorySurface, list: ElementId) -> Vec<String> {
    surface
        .children(list)
        .unwrap()
        .into_iter()
        .map(|li| surface.text_content(li))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_keyed_edit_reuses_surviving_elements((old, new) in arb_keyed_edit()) {
        let (mut surface, body) = mounted();
        let mut reconciler = Reconciler::new();

        let old_tree = keyed_list(&old);
        let ul = patch(&mut reconciler, &mut surface, body, None, &old_tree);
        let before: HashMap<i64, ElementId> = old
            .iter()
            .copied()
            .zip(surface.children(ul).unwrap())
            .collect();

        let new_tree = keyed_list(&new);
        let same = patch(&mut reconciler, &mut surface, body, Some((ul, &old_tree)), &new_tree);
        prop_assert_eq!(same, ul);

        let after = surface.children(ul).unwrap();
        prop_assert_eq!(after.len(), new.len());
        for (key, element) in new.iter().zip(&after) {
            if let Some(original) = before.get(key) {
                prop_assert_eq!(original, element, "key {} was recreated", key);
            }
        }

        let expected: Vec<String> = new.iter().map(|k| k.to_string()).collect();
        prop_assert_eq!(labels(&surface, ul), expected);
    }

    #[test]
    fn prop_unkeyed_lists_match_next_tree(old in arb_labels(), new in arb_labels()) {
        let (mut surface, body) = mounted();
        let mut reconciler = Reconciler::new();

        let old_tree = unkeyed_list(&old);
        let ul = patch(&mut reconciler, &mut surface, body, None, &old_tree);
        let before = surface.children(ul).unwrap();

        patch(&mut reconciler, &mut surface, body, Some((ul, &old_tree)), &unkeyed_list(&new));

        let after = surface.children(ul).unwrap();
        prop_assert_eq!(labels(&surface, ul), new.clone());
        // positional matching keeps the shared prefix of elements
        let shared = old.len().min(new.len());
        prop_assert_eq!(&after[..shared], &before[..shared]);
    }

    #[test]
    fn prop_structurally_equal_trees_patch_to_nothing(keys in arb_keys()) {
        let (mut surface, body) = mounted();
        let mut reconciler = Reconciler::new();

        let updates = Rc::new(Cell::new(0));
        let counter = Rc::clone(&updates);
        let hooks = Props::new()
            .onupdate(move |_, _| counter.set(counter.get() + 1))
            .hooks()
            .clone();

        let tree = hooked_keyed_list(&keys, &hooks);
        let ul = patch(&mut reconciler, &mut surface, body, None, &tree);
        surface.clear_mutations();
        reconciler.take_lifecycle();
        reconciler.take_stats();

        patch(&mut reconciler, &mut surface, body, Some((ul, &tree)), &hooked_keyed_list(&keys, &hooks));

        prop_assert_eq!(surface.mutation_count(), 0);
        prop_assert!(reconciler.take_lifecycle().is_empty());
        prop_assert_eq!(updates.get(), 0);
        prop_assert!(reconciler.take_stats().is_empty());
    }
}
