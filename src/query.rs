//! Boolean queries over the index.
//!
//! A [`Query`] is a tree: an optional [`Selection`] (AND over keys), plus
//! `and` children that are intersected and `or` children that are unioned
//! into the running result.
//!
//! ```rust
//! use assoctree::{AssociativeTree, Query, Selection, Tuple, ValueQuery};
//!
//! let tree: AssociativeTree<u32> = AssociativeTree::new();
//! tree.create(&Tuple::from([("1", 1u8)]), || Some(1)).unwrap();
//! tree.create(&Tuple::from([("2", 2u8)]), || Some(2)).unwrap();
//! tree.create(&Tuple::from([("1", 1u8), ("2", 2u8)]), || Some(3)).unwrap();
//!
//! let both = Query::new()
//!     .and(Query::select(Selection::new().with("1", ValueQuery::equals(1u8))))
//!     .and(Query::select(Selection::new().with("2", ValueQuery::equals(2u8))));
//!
//! let mut hits = Vec::new();
//! tree.query(&both, |record| {
//!     hits.push(*record.payload());
//!     true
//! })
//! .unwrap();
//! assert_eq!(hits, vec![3]);
//! ```
//!
//! # Negative conditions
//!
//! `!=` and `Exists(false)` never narrow the positive set directly. They
//! collect the ids they rule out and those are subtracted once the
//! selection's positive conditions are intersected, so a record that lacks
//! the key entirely still matches `key != v`. A selection with only
//! negative conditions starts from every record.
//!
//! # The `_associated_id` key
//!
//! Selecting on [`ASSOCIATED_ID_KEY`] compares against each record's id as a
//! string and composes with other keys and with [`Limits`] like any other key.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Result, TreeError};
use crate::tuple::ASSOCIATED_ID_KEY;
use crate::value::{Value, ValueType};

mod eval;

// ============================================================================
//  Operator
// ============================================================================

/// Comparison between a stored value and a query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl Operator {
    /// Check if `stored.cmp(query)` satisfies this operator.
    #[must_use]
    pub const fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Equals => ordering.is_eq(),
            Self::NotEquals => ordering.is_ne(),
            Self::LessThan => ordering.is_lt(),
            Self::LessThanOrEqual => ordering.is_le(),
            Self::GreaterThan => ordering.is_gt(),
            Self::GreaterThanOrEqual => ordering.is_ge(),
        }
    }

    /// Check if this operator rules records out instead of selecting them.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::NotEquals)
    }
}

// ============================================================================
//  ValueQuery
// ============================================================================

/// The condition placed on one key of a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueQuery {
    /// The key is present (`exists = true`) or absent (`exists = false`).
    ///
    /// With a type filter only values of that type count as present.
    Exists {
        /// Presence wanted.
        exists: bool,
        /// Restrict to values of this type. `None` accepts all types.
        value_type: Option<ValueType>,
    },

    /// The stored value compares to `value` as `operator` says.
    ///
    /// Without `match_type` the cross-type total order of [`Value`] applies,
    /// so `u8(200) < i8(1)`. With it, stored values of another type never
    /// match.
    Value {
        /// Right-hand side of the comparison.
        value: Value,
        /// Comparison applied as `stored <op> value`.
        operator: Operator,
        /// Only compare against stored values of the same type.
        match_type: bool,
    },
}

impl ValueQuery {
    /// `Exists(true)` for any type.
    #[must_use]
    pub const fn exists() -> Self {
        Self::Exists {
            exists: true,
            value_type: None,
        }
    }

    /// `Exists(false)` for any type.
    #[must_use]
    pub const fn not_exists() -> Self {
        Self::Exists {
            exists: false,
            value_type: None,
        }
    }

    /// `Exists(exists)` restricted to `value_type`.
    #[must_use]
    pub const fn exists_of_type(exists: bool, value_type: ValueType) -> Self {
        Self::Exists {
            exists,
            value_type: Some(value_type),
        }
    }

    /// `stored <operator> value`, cross-type.
    #[must_use]
    pub fn compare(operator: Operator, value: impl Into<Value>) -> Self {
        Self::Value {
            value: value.into(),
            operator,
            match_type: false,
        }
    }

    /// `stored = value`.
    #[must_use]
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Equals, value)
    }

    /// `stored != value`.
    #[must_use]
    pub fn not_equals(value: impl Into<Value>) -> Self {
        Self::compare(Operator::NotEquals, value)
    }

    /// Switch a comparison to its type-matching variant. No-op for `Exists`.
    #[must_use]
    pub fn with_match_type(mut self) -> Self {
        if let Self::Value { match_type, .. } = &mut self {
            *match_type = true;
        }
        self
    }

    /// Check if this condition only rules records out.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        match self {
            Self::Exists { exists, .. } => !*exists,
            Self::Value { operator, .. } => operator.is_negative(),
        }
    }

    fn validate_associated_id(&self) -> Result<()> {
        let string_only = match self {
            Self::Exists { value_type, .. } => {
                matches!(value_type, None | Some(ValueType::Any | ValueType::String))
            }
            Self::Value { value, .. } => matches!(value, Value::String(_)),
        };

        if string_only {
            Ok(())
        } else {
            Err(TreeError::InvalidQuery(format!(
                "'{ASSOCIATED_ID_KEY}' can only be compared against strings"
            )))
        }
    }
}

// ============================================================================
//  Selection
// ============================================================================

/// Restrict matches by total tuple size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Only records with at most this many key/value pairs match.
    pub number_of_keys: usize,
}

/// AND over per-key conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Condition per key.
    pub key_values: BTreeMap<String, ValueQuery>,
    /// Optional tuple size limit.
    pub limits: Option<Limits>,
}

impl Selection {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the condition for `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, condition: ValueQuery) -> Self {
        self.key_values.insert(key.into(), condition);
        self
    }

    /// Only match records with at most `number_of_keys` pairs.
    #[must_use]
    pub const fn limit(mut self, number_of_keys: usize) -> Self {
        self.limits = Some(Limits { number_of_keys });
        self
    }

    /// The arity limit, if any.
    #[must_use]
    pub fn max_arity(&self) -> Option<usize> {
        self.limits.map(|limits| limits.number_of_keys)
    }

    fn validate(&self) -> Result<()> {
        if self.key_values.is_empty() {
            return Err(TreeError::InvalidQuery(
                "selection requires at least one key".into(),
            ));
        }
        if self.max_arity() == Some(0) {
            return Err(TreeError::InvalidQuery(
                "number_of_keys limit must be at least 1".into(),
            ));
        }

        for (key, condition) in &self.key_values {
            if key.is_empty() {
                return Err(TreeError::EmptyKey);
            }
            if key == ASSOCIATED_ID_KEY {
                condition.validate_associated_id()?;
            }
        }
        Ok(())
    }
}

// ============================================================================
//  Query
// ============================================================================

/// A boolean query tree.
///
/// The empty query matches every record. Nested empty queries are rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conditions evaluated first.
    pub selection: Option<Selection>,
    /// Intersected into the result, in order.
    pub and: Vec<Query>,
    /// Unioned into the result, in order.
    pub or: Vec<Query>,
}

impl Query {
    /// The empty query, matching everything at the top level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A query with a single selection.
    #[must_use]
    pub fn select(selection: Selection) -> Self {
        Self {
            selection: Some(selection),
            ..Self::default()
        }
    }

    /// Add an AND child.
    #[must_use]
    pub fn and(mut self, child: Self) -> Self {
        self.and.push(child);
        self
    }

    /// Add an OR child.
    #[must_use]
    pub fn or(mut self, child: Self) -> Self {
        self.or.push(child);
        self
    }

    /// Check if nothing constrains this query.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selection.is_none() && self.and.is_empty() && self.or.is_empty()
    }

    /// Reject malformed query trees.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidQuery`] for an empty nested query, an empty
    /// selection, a zero key limit or a non-string `_associated_id`
    /// condition; [`TreeError::EmptyKey`] for an empty selection key.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.validate_nested()
    }

    fn validate_nested(&self) -> Result<()> {
        if self.is_empty() {
            return Err(TreeError::InvalidQuery("nested query is empty".into()));
        }
        if let Some(selection) = &self.selection {
            selection.validate()?;
        }
        self.and
            .iter()
            .chain(&self.or)
            .try_for_each(Self::validate_nested)
    }
}
