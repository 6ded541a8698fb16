//! Error types for tree operations.
//!
//! Errors fall into three recoverable groups:
//! - validation (malformed tuple, id, query or bounds), reported before any
//!   mutation;
//! - conflicts (tuple or id already present), reported after any partial
//!   index entries for the failed attempt have been rolled back;
//! - lifecycle (`TreeDestroying`, `DestroyInProgress`), which callers may retry.
//!
//! Internal invariant violations are not errors: they go through
//! [`invariant_violated`] and abort.

use thiserror::Error;

use crate::tracing_helpers::error_log;
use crate::value::ValueType;

/// Result alias used throughout the crate.
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

/// Errors returned by [`AssociativeTree`](crate::AssociativeTree) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The tuple has no key/value pairs.
    #[error("tuple must contain at least one key/value pair")]
    EmptyTuple,

    /// A tuple or selection key is the empty string.
    #[error("keys cannot be empty")]
    EmptyKey,

    /// A caller-supplied tuple uses the reserved `_associated_id` key.
    #[error("key '{0}' is reserved")]
    ReservedKey(String),

    /// A stored value has a type that cannot be indexed (the wildcard).
    #[error("key '{key}' has a value of type {value_type} which cannot be stored")]
    InvalidValueType {
        /// Offending key.
        key: String,
        /// Offending type.
        value_type: ValueType,
    },

    /// An associated id argument is the empty string.
    #[error("associated id cannot be empty")]
    EmptyId,

    /// A record with the exact same tuple already exists.
    #[error("KeyValues already exist")]
    KeyValuesExist,

    /// A record with the supplied associated id already exists.
    #[error("associated id '{0}' already exists")]
    IdExists(String),

    /// The query tree is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Permutation bounds have `min_size > max_size`.
    #[error("invalid permutation bounds: min size {min} is greater than max size {max}")]
    InvalidBounds {
        /// Requested minimum subset size.
        min: usize,
        /// Requested maximum subset size.
        max: usize,
    },

    /// A `destroy_all` is running; the operation was rejected.
    #[error("tree is being destroyed")]
    TreeDestroying,

    /// Another `destroy_all` is already running.
    #[error("tree destroy already in progress")]
    DestroyInProgress,
}

impl TreeError {
    /// Returns true for lifecycle conditions that go away on their own.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::TreeDestroying | Self::DestroyInProgress)
    }

    /// Returns true for errors raised by input validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyTuple
                | Self::EmptyKey
                | Self::ReservedKey(_)
                | Self::InvalidValueType { .. }
                | Self::EmptyId
                | Self::InvalidQuery(_)
                | Self::InvalidBounds { .. }
        )
    }
}

/// An inconsistency found by
/// [`AssociativeTree::check_invariants`](crate::AssociativeTree::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("index invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Abort on a broken internal invariant.
///
/// Continuing would corrupt the index, so this logs and panics instead of
/// returning an error.
#[cold]
#[track_caller]
pub(crate) fn invariant_violated(detail: &str) -> ! {
    error_log!(detail, "index invariant violated");
    panic!("assoctree: index invariant violated: {detail}");
}
