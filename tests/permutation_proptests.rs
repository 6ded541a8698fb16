//! Property-based tests for subset matching.
//!
//! `match_permutations` is checked against a brute-force oracle: a stored
//! record matches iff its pairs are a subset of the supplied tuple and its
//! size lies inside the bounds.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use assoctree::{AssociativeTree, PermutationBounds, Tuple};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

type Pairs = BTreeMap<String, u8>;

// ============================================================================
//  Strategies
// ============================================================================

fn pairs(max: usize) -> impl Strategy<Value = Pairs> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(str::to_owned),
        0u8..2,
        1..=max,
    )
}

fn bounds() -> impl Strategy<Value = PermutationBounds> {
    (0usize..=5, prop::option::of(0usize..=5)).prop_filter_map("min <= max", |(min, max)| {
        let bounds = PermutationBounds::new(min, max);
        bounds.validate().is_ok().then_some(bounds)
    })
}

fn to_tuple(pairs: &Pairs) -> Tuple {
    pairs.iter().map(|(k, v)| (k.as_str(), *v)).collect()
}

fn is_subset(record: &Pairs, supplied: &Pairs) -> bool {
    record.iter().all(|(k, v)| supplied.get(k) == Some(v))
}

fn in_bounds(size: usize, bounds: PermutationBounds) -> bool {
    size >= bounds.min_size && bounds.max_size.is_none_or(|max| size <= max)
}

// ============================================================================
//  Completeness
// ============================================================================

#[test]
fn test_every_non_empty_subset_record_found_once() {
    common::init_tracing();
    let tree: AssociativeTree<&str> = common::sequential_tree();
    tree.create(&Tuple::from([("k1", "v1")]), || Some("{k1}")).unwrap();
    tree.create(&Tuple::from([("k2", "v2")]), || Some("{k2}")).unwrap();
    tree.create(&Tuple::from([("k1", "v1"), ("k2", "v2")]), || Some("{k1,k2}"))
        .unwrap();

    let found = common::collect(|on_match| {
        tree.match_permutations(
            &Tuple::from([("k1", "v1"), ("k2", "v2")]),
            PermutationBounds::new(0, None),
            on_match,
        )
        .unwrap();
    });
    assert_eq!(found, vec!["{k1}", "{k2}", "{k1,k2}"]);
}

#[test]
fn test_results_ordered_by_size_then_key() {
    let tree: AssociativeTree<&str> = common::sequential_tree();
    // Created in an order unrelated to the expected visiting order.
    tree.create(&common::tuple(&[("a", 1), ("b", 1)]), || Some("ab")).unwrap();
    tree.create(&common::tuple(&[("c", 1)]), || Some("c")).unwrap();
    tree.create(&common::tuple(&[("a", 1)]), || Some("a")).unwrap();
    tree.create(&common::tuple(&[("a", 1), ("c", 1)]), || Some("ac")).unwrap();

    let found = common::collect(|on_match| {
        tree.match_permutations(
            &common::tuple(&[("a", 1), ("b", 1), ("c", 1)]),
            PermutationBounds::unbounded(),
            on_match,
        )
        .unwrap();
    });
    assert_eq!(found, vec!["a", "c", "ab", "ac"]);
}

// ============================================================================
//  Differential Testing Against Brute Force
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn matches_brute_force(
        stored in prop::collection::vec(pairs(4), 0..30),
        supplied in pairs(5),
        bounds in bounds(),
    ) {
        let tree: AssociativeTree<usize> = common::sequential_tree();
        let mut kept: Vec<Pairs> = Vec::new();
        for p in stored {
            let index = kept.len();
            if tree.create(&to_tuple(&p), || Some(index)).is_ok() {
                kept.push(p);
            }
        }

        let mut actual = Vec::new();
        tree.match_permutations(&to_tuple(&supplied), bounds, |record| {
            actual.push(*record.payload());
            true
        })
        .unwrap();

        let unique: HashSet<usize> = actual.iter().copied().collect();
        prop_assert_eq!(unique.len(), actual.len(), "record visited twice");

        let mut actual_sorted = actual.clone();
        actual_sorted.sort_unstable();
        let wanted: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter(|(_, p)| is_subset(p, &supplied) && in_bounds(p.len(), bounds))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(actual_sorted, wanted);

        // Visiting order never goes back to a smaller subset.
        let sizes: Vec<usize> = actual.iter().map(|&i| kept[i].len()).collect();
        prop_assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn early_stop_visits_exactly_one(
        stored in prop::collection::vec(pairs(3), 1..20),
        supplied in pairs(5),
    ) {
        let tree: AssociativeTree<usize> = common::sequential_tree();
        for (i, p) in stored.iter().enumerate() {
            let _ = tree.create(&to_tuple(p), || Some(i));
        }

        let mut total = 0;
        tree.match_permutations(&to_tuple(&supplied), PermutationBounds::unbounded(), |_| {
            total += 1;
            true
        })
        .unwrap();

        let mut visited = 0;
        tree.match_permutations(&to_tuple(&supplied), PermutationBounds::unbounded(), |_| {
            visited += 1;
            false
        })
        .unwrap();

        prop_assert_eq!(visited, total.min(1));
    }
}
