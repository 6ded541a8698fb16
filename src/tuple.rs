//! Tuples: the key/value sets that define a record.
//!
//! A [`Tuple`] keeps its pairs sorted by key. Every lock-taking path in the
//! tree walks tuples in this order, which is what makes lock acquisition
//! globally consistent.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::error::{Result, TreeError};
use crate::value::Value;

/// Reserved key that refers to a record's own identifier in queries.
///
/// It cannot appear in a stored tuple.
pub const ASSOCIATED_ID_KEY: &str = "_associated_id";

/// A set of unique keys, each mapped to a [`Value`].
///
/// # Example
///
/// ```rust
/// use assoctree::Tuple;
///
/// let tuple = Tuple::new().with("name", "queue-a").with("shard", 3u32);
/// assert_eq!(tuple.len(), 2);
///
/// // Keys iterate in sorted order.
/// let keys: Vec<_> = tuple.keys().collect();
/// assert_eq!(keys, ["name", "shard"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    pairs: BTreeMap<String, Value>,
}

impl Tuple {
    /// Create an empty tuple.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a pair, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.pairs.insert(key.into(), value.into())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.pairs.remove(key)
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs.get(key)
    }

    /// Check if a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    /// Number of pairs, i.e. the tuple's arity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if the tuple has no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate pairs in sorted key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.pairs.iter()
    }

    /// Iterate keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Returns true if every pair of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.pairs
            .iter()
            .all(|(key, value)| other.pairs.get(key).is_some_and(|v| v == value))
    }

    /// Validate a tuple for storage or exact lookup.
    ///
    /// # Errors
    ///
    /// - [`TreeError::EmptyTuple`] if there are no pairs
    /// - [`TreeError::EmptyKey`] if any key is empty
    /// - [`TreeError::ReservedKey`] if [`ASSOCIATED_ID_KEY`] is used
    /// - [`TreeError::InvalidValueType`] if any value is [`Value::Any`]
    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(TreeError::EmptyTuple);
        }

        for (key, value) in &self.pairs {
            if key.is_empty() {
                return Err(TreeError::EmptyKey);
            }
            if key == ASSOCIATED_ID_KEY {
                return Err(TreeError::ReservedKey(key.clone()));
            }
            if value.is_any() {
                return Err(TreeError::InvalidValueType {
                    key: key.clone(),
                    value_type: value.value_type(),
                });
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Tuple {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Tuple {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(Tuple::new().validate(), Err(TreeError::EmptyTuple));
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let tuple = Tuple::new().with("", 1u8);
        assert_eq!(tuple.validate(), Err(TreeError::EmptyKey));
    }

    #[test]
    fn test_validate_rejects_reserved_key() {
        let tuple = Tuple::new().with("a", 1u8).with(ASSOCIATED_ID_KEY, "x");
        assert_eq!(
            tuple.validate(),
            Err(TreeError::ReservedKey(ASSOCIATED_ID_KEY.to_owned()))
        );
    }

    #[test]
    fn test_validate_rejects_wildcard_value() {
        let tuple = Tuple::new().with("a", Value::Any);
        assert!(matches!(
            tuple.validate(),
            Err(TreeError::InvalidValueType { .. })
        ));
    }

    #[test]
    fn test_sorted_iteration_and_overwrite() {
        let mut tuple = Tuple::from([("b", 2u8), ("a", 1u8), ("c", 3u8)]);
        assert_eq!(tuple.insert("a", 9u8), Some(Value::from(1u8)));

        let pairs: Vec<_> = tuple.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![
                ("a", Value::from(9u8)),
                ("b", Value::from(2u8)),
                ("c", Value::from(3u8)),
            ]
        );
        assert!(tuple.validate().is_ok());
    }

    #[test]
    fn test_subset() {
        let small = Tuple::from([("a", 1u8)]);
        let big = Tuple::from([("a", 1u8), ("b", 2u8)]);
        let other = Tuple::from([("a", 2u8)]);

        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(!other.is_subset_of(&big));
    }
}
