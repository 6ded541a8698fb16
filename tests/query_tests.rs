//! Query evaluator tests.
//!
//! Example-based checks of the boolean algebra, plus a differential
//! property test that evaluates random selections by brute force over the
//! stored tuples.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use assoctree::{
    ASSOCIATED_ID_KEY, AssociativeTree, Operator, Query, Selection, TreeError, Tuple, Value,
    ValueQuery, ValueType,
};
use proptest::prelude::*;

fn run<T: Clone>(tree: &AssociativeTree<T>, query: &Query) -> Vec<T> {
    common::collect(|on_match| tree.query(query, on_match).unwrap())
}

fn select(key: &str, condition: ValueQuery) -> Query {
    Query::select(Selection::new().with(key, condition))
}

/// Records `{1:1}`, `{2:2}` and `{1:1, 2:2}`, created in that order.
fn algebra_tree() -> AssociativeTree<&'static str> {
    let tree = common::sequential_tree();
    tree.create(&common::tuple(&[("1", 1)]), || Some("1:1")).unwrap();
    tree.create(&common::tuple(&[("2", 2)]), || Some("2:2")).unwrap();
    tree.create(&common::tuple(&[("1", 1), ("2", 2)]), || Some("1:1,2:2"))
        .unwrap();
    tree
}

// ============================================================================
//  Algebra
// ============================================================================

#[test]
fn test_and_returns_only_the_combined_record() {
    common::init_tracing();
    let tree = algebra_tree();

    let query = Query::new()
        .and(select("1", ValueQuery::equals(1u32)))
        .and(select("2", ValueQuery::equals(2u32)));
    assert_eq!(run(&tree, &query), vec!["1:1,2:2"]);
}

#[test]
fn test_or_returns_all_three() {
    let tree = algebra_tree();

    let query = Query::new()
        .or(select("1", ValueQuery::equals(1u32)))
        .or(select("2", ValueQuery::equals(2u32)));
    assert_eq!(run(&tree, &query), vec!["1:1", "2:2", "1:1,2:2"]);
}

#[test]
fn test_selection_is_conjunctive() {
    let tree = algebra_tree();

    let query = Query::select(
        Selection::new()
            .with("1", ValueQuery::equals(1u32))
            .with("2", ValueQuery::exists()),
    );
    assert_eq!(run(&tree, &query), vec!["1:1,2:2"]);
}

#[test]
fn test_selection_with_and_and_or_children() {
    let tree = algebra_tree();

    // (1 exists AND 2 exists) OR 2 = 2  ->  the combined record plus {2:2}.
    let query = Query::select(Selection::new().with("1", ValueQuery::exists()))
        .and(select("2", ValueQuery::exists()))
        .or(select("2", ValueQuery::equals(2u32)));
    assert_eq!(run(&tree, &query), vec!["2:2", "1:1,2:2"]);
}

#[test]
fn test_and_short_circuits_on_empty() {
    let tree = algebra_tree();

    let query = Query::new()
        .and(select("missing", ValueQuery::exists()))
        .and(select("1", ValueQuery::exists()));
    assert!(run(&tree, &query).is_empty());
}

// ============================================================================
//  Negative conditions and limits
// ============================================================================

#[test]
fn test_negative_only_selection_starts_from_everything() {
    let tree = algebra_tree();

    assert_eq!(
        run(&tree, &select("1", ValueQuery::not_equals(1u32))),
        vec!["2:2"]
    );
    assert_eq!(
        run(&tree, &select("missing", ValueQuery::not_exists())),
        vec!["1:1", "2:2", "1:1,2:2"]
    );
}

#[test]
fn test_negative_subtracts_from_positive() {
    let tree = algebra_tree();

    let query = Query::select(
        Selection::new()
            .with("1", ValueQuery::exists())
            .with("2", ValueQuery::not_exists()),
    );
    assert_eq!(run(&tree, &query), vec!["1:1"]);
}

#[test]
fn test_number_of_keys_limit() {
    let tree = algebra_tree();

    let query = Query::select(
        Selection::new()
            .with("2", ValueQuery::equals(2u32))
            .limit(1),
    );
    assert_eq!(run(&tree, &query), vec!["2:2"]);

    let wide = Query::select(
        Selection::new()
            .with("2", ValueQuery::equals(2u32))
            .limit(5),
    );
    assert_eq!(run(&tree, &wide), vec!["2:2", "1:1,2:2"]);
}

// ============================================================================
//  Types
// ============================================================================

#[test]
fn test_exists_with_type_filter() {
    let tree: AssociativeTree<&str> = common::sequential_tree();
    tree.create(&Tuple::from([("v", Value::U8(1))]), || Some("u8"))
        .unwrap();
    tree.create(&Tuple::from([("v", Value::from("x"))]), || Some("string"))
        .unwrap();

    assert_eq!(
        run(&tree, &select("v", ValueQuery::exists_of_type(true, ValueType::String))),
        vec!["string"]
    );
    assert_eq!(
        run(&tree, &select("v", ValueQuery::exists_of_type(true, ValueType::Any))),
        vec!["u8", "string"]
    );
    assert_eq!(
        run(&tree, &select("v", ValueQuery::exists_of_type(false, ValueType::U8))),
        vec!["string"]
    );
}

#[test]
fn test_match_type_restricts_cross_type_comparisons() {
    let tree: AssociativeTree<&str> = common::sequential_tree();
    tree.create(&Tuple::from([("v", Value::U8(5))]), || Some("u8"))
        .unwrap();
    tree.create(&Tuple::from([("v", Value::I32(5))]), || Some("i32"))
        .unwrap();
    tree.create(&Tuple::from([("v", Value::I32(9))]), || Some("i32 big"))
        .unwrap();

    // Cross-type: the u8 sorts below every i32.
    let loose = select("v", ValueQuery::compare(Operator::LessThan, 9i32));
    assert_eq!(run(&tree, &loose), vec!["u8", "i32"]);

    let strict = select(
        "v",
        ValueQuery::compare(Operator::LessThan, 9i32).with_match_type(),
    );
    assert_eq!(run(&tree, &strict), vec!["i32"]);

    // Equality never crosses types.
    assert_eq!(run(&tree, &select("v", ValueQuery::equals(5i32))), vec!["i32"]);
}

#[test]
fn test_wildcard_value_matches_every_stored_value() {
    let tree = algebra_tree();
    assert_eq!(
        run(&tree, &select("1", ValueQuery::equals(Value::Any))),
        vec!["1:1", "1:1,2:2"]
    );
}

// ============================================================================
//  Associated id
// ============================================================================

#[test]
fn test_associated_id_composes_with_limits() {
    let tree = algebra_tree();
    let combined_id = "id-00000000000000000002";

    assert_eq!(
        run(&tree, &select(ASSOCIATED_ID_KEY, ValueQuery::equals(combined_id))),
        vec!["1:1,2:2"]
    );

    let limited = Query::select(
        Selection::new()
            .with(ASSOCIATED_ID_KEY, ValueQuery::equals(combined_id))
            .limit(1),
    );
    assert!(run(&tree, &limited).is_empty());

    let or_id = Query::new()
        .or(select(ASSOCIATED_ID_KEY, ValueQuery::equals("id-00000000000000000000")))
        .or(select("2", ValueQuery::equals(2u32)));
    assert_eq!(run(&tree, &or_id), vec!["1:1", "2:2", "1:1,2:2"]);
}

#[test]
fn test_associated_id_rejects_non_strings() {
    let tree = algebra_tree();
    let query = select(ASSOCIATED_ID_KEY, ValueQuery::equals(3u8));
    assert!(matches!(
        tree.query(&query, |_| true),
        Err(TreeError::InvalidQuery(_))
    ));
}

// ============================================================================
//  Errors and pagination
// ============================================================================

#[test]
fn test_malformed_queries_are_rejected() {
    let tree = algebra_tree();

    let nested_empty = Query::new().or(Query::new());
    assert!(matches!(
        tree.query(&nested_empty, |_| true),
        Err(TreeError::InvalidQuery(_))
    ));
    assert_eq!(
        tree.query(&select("", ValueQuery::exists()), |_| true),
        Err(TreeError::EmptyKey)
    );
}

#[test]
fn test_callback_false_stops_iteration() {
    let tree = algebra_tree();
    let mut seen = Vec::new();

    tree.query(&select("2", ValueQuery::exists()), |record| {
        seen.push(*record.payload());
        false
    })
    .unwrap();
    assert_eq!(seen, vec!["2:2"]);
}

// ============================================================================
//  Differential Testing Against Brute Force
// ============================================================================

type Pairs = Vec<(String, u8)>;

fn pairs() -> impl Strategy<Value = Pairs> {
    prop::collection::btree_map(prop::sample::select(vec!["a", "b", "c"]), 0u8..4, 1..=3)
        .prop_map(|map| map.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

fn condition() -> impl Strategy<Value = (String, ValueQuery)> {
    let key = prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_owned);
    let operator = prop::sample::select(vec![
        Operator::Equals,
        Operator::NotEquals,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
    ]);
    let query = prop_oneof![
        any::<bool>().prop_map(|exists| ValueQuery::Exists { exists, value_type: None }),
        (operator, 0u8..4).prop_map(|(op, v)| ValueQuery::compare(op, v)),
    ];
    (key, query)
}

/// What the evaluator should decide for one stored tuple.
fn expected(pairs: &Pairs, conditions: &[(String, ValueQuery)], limit: Option<usize>) -> bool {
    if limit.is_some_and(|max| pairs.len() > max) {
        return false;
    }
    conditions.iter().all(|(key, condition)| {
        let stored = pairs.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
        match condition {
            ValueQuery::Exists { exists, .. } => stored.is_some() == *exists,
            ValueQuery::Value { value, operator, .. } => {
                let Value::U8(wanted) = value else { unreachable!() };
                match (operator, stored) {
                    (Operator::NotEquals, None) => true,
                    (_, None) => false,
                    (op, Some(v)) => op.matches(v.cmp(wanted)),
                }
            }
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn selection_matches_brute_force(
        stored in prop::collection::vec(pairs(), 0..25),
        conditions in prop::collection::vec(condition(), 1..=3),
        limit in prop::option::of(1usize..=3),
    ) {
        let tree: AssociativeTree<usize> = common::sequential_tree();
        let mut kept: Vec<Pairs> = Vec::new();
        for p in stored {
            let tuple: Tuple = p.iter().map(|(k, v)| (k.as_str(), *v)).collect();
            let index = kept.len();
            if tree.create(&tuple, || Some(index)).is_ok() {
                kept.push(p);
            }
        }

        // Later duplicates of a key override earlier ones, as in the selection map.
        let mut selection = Selection::new();
        for (key, condition) in &conditions {
            selection = selection.with(key.clone(), condition.clone());
        }
        let effective: Vec<(String, ValueQuery)> = selection
            .key_values
            .iter()
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect();
        selection.limits = limit.map(|number_of_keys| assoctree::Limits { number_of_keys });

        let actual = run(&tree, &Query::select(selection));
        let wanted: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter(|(_, p)| expected(p, &effective, limit))
            .map(|(i, _)| i)
            .collect();

        prop_assert_eq!(actual, wanted);
    }
}
