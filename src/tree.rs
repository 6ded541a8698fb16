//! `AssociativeTree` - the concurrent tuple index.
//!
//! This module holds the tree type, its read paths and the structural
//! helpers shared by the write paths in [`create`] and [`delete`].
//!
//! # Layout
//!
//! ```text
//! keys:    KeyIndex      key    -> ValuesNode
//!          ValuesNode    value  -> IdNode
//!          IdNode        arity  -> [id, ...]
//! records: Record store  id     -> Record { id, tuple, payload }
//! ```
//!
//! # Lock Order
//!
//! 1. key index lock, then values container lock (structural: reserve / prune;
//!    pruning only try-locks ID nodes, it never waits on one)
//! 2. ID node locks, in the tuple's sorted key order (create / delete)
//! 3. record store lock (inside 2, never the other way around)
//!
//! Reads never hold more than one lock at a time.

use std::collections::HashSet;
use std::fmt as StdFmt;
use std::sync::Arc;

use parking_lot::RwLockWriteGuard;

use crate::barrier::{DestroyBarrier, OperationGuard};
use crate::container::OrderedContainer;
use crate::counters::{PRUNED_ID_NODE_COUNT, PRUNED_VALUES_NODE_COUNT, bump};
use crate::error::{InvariantViolation, Result, TreeError, invariant_violated};
use crate::id::{IdGenerator, UuidGenerator};
use crate::node::{IdBuckets, IdNode, KeyIndex, ValuesNode, retain_in_bucket};
use crate::record::Record;
use crate::tracing_helpers::trace_log;
use crate::tuple::Tuple;

mod create;
mod delete;


/// A concurrent index of records keyed by their exact tuple.
///
/// `AssociativeTree<T>` is `Send + Sync` when `T: Send + Sync`; share it
/// with `Arc` and call every method through `&self`.
///
/// # Callbacks
///
/// Create and delete callbacks run while the ID node locks of the tuple are
/// held. They must not call back into the same tree.
///
/// # Example
///
/// ```rust
/// use assoctree::{AssociativeTree, Tuple};
///
/// let tree: AssociativeTree<&str> = AssociativeTree::new();
/// let tuple = Tuple::new().with("queue", "jobs").with("priority", 1u8);
///
/// let id = tree.create(&tuple, || Some("payload")).unwrap().unwrap();
///
/// let record = tree.get(&tuple).unwrap().unwrap();
/// assert_eq!(record.id(), id);
/// assert_eq!(*record.payload(), "payload");
///
/// assert!(tree.delete(&tuple, |_| true).unwrap());
/// assert!(tree.is_empty());
/// ```
pub struct AssociativeTree<T> {
    /// Structural index: key -> value -> ids by arity.
    keys: KeyIndex,

    /// Record store: id -> record.
    records: OrderedContainer<String, Record<T>>,

    /// Source of ids for `create` and `create_or_find`.
    id_generator: Box<dyn IdGenerator>,

    /// Destroy flag and in-flight operation count.
    barrier: DestroyBarrier,
}

impl<T> AssociativeTree<T> {
    /// Create an empty tree that mints UUID v4 identifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    /// Create an empty tree with a custom identifier source.
    #[must_use]
    pub fn with_id_generator(id_generator: impl IdGenerator + 'static) -> Self {
        Self {
            keys: KeyIndex::new(),
            records: OrderedContainer::new(),
            id_generator: Box::new(id_generator),
            barrier: DestroyBarrier::new(),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if a [`destroy_all`](Self::destroy_all) is running.
    #[must_use]
    pub fn is_destroying(&self) -> bool {
        self.barrier.is_destroying()
    }

    /// The key index, for evaluators that walk it directly.
    pub(crate) const fn index(&self) -> &KeyIndex {
        &self.keys
    }

    /// The record store.
    pub(crate) const fn store(&self) -> &OrderedContainer<String, Record<T>> {
        &self.records
    }

    /// Register an operation with the destroy barrier.
    pub(crate) fn enter(&self) -> Result<OperationGuard<'_>> {
        self.barrier.enter()
    }

    // ========================================================================
    //  Lookups
    // ========================================================================

    /// Find the record whose tuple is exactly `tuple` and pass it to `on_found`.
    ///
    /// Returns whether the callback ran. A tuple that is a strict subset or
    /// superset of a stored tuple never matches.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`]
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    pub fn find<F>(&self, tuple: &Tuple, on_found: F) -> Result<bool>
    where
        F: FnOnce(&Record<T>),
    {
        Ok(self.get(tuple)?.map(|record| on_found(&record)).is_some())
    }

    /// Get the record whose tuple is exactly `tuple`.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all, fields(arity = tuple.len())))]
    pub fn get(&self, tuple: &Tuple) -> Result<Option<Arc<Record<T>>>> {
        let _op = self.barrier.enter()?;
        tuple.validate()?;
        Ok(self.lookup(tuple))
    }

    /// Find a record by its associated id and pass it to `on_found`.
    ///
    /// # Errors
    ///
    /// - [`TreeError::EmptyId`] for an empty id
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    pub fn find_by_id<F>(&self, id: &str, on_found: F) -> Result<bool>
    where
        F: FnOnce(&Record<T>),
    {
        Ok(self.get_by_id(id)?.map(|record| on_found(&record)).is_some())
    }

    /// Get a record by its associated id.
    ///
    /// # Errors
    ///
    /// See [`find_by_id`](Self::find_by_id).
    pub fn get_by_id(&self, id: &str) -> Result<Option<Arc<Record<T>>>> {
        let _op = self.barrier.enter()?;
        if id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        Ok(self.records.find(id))
    }

    /// Visit every record in id order until `on_each` returns false.
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeDestroying`] while a destroy runs.
    pub fn iterate<F>(&self, mut on_each: F) -> Result<()>
    where
        F: FnMut(&Record<T>) -> bool,
    {
        let _op = self.barrier.enter()?;
        self.records.iterate(|_, record| on_each(record));
        Ok(())
    }

    // ========================================================================
    //  Internal helpers
    // ========================================================================

    /// Exact-match lookup without the barrier or validation.
    pub(crate) fn lookup(&self, tuple: &Tuple) -> Option<Arc<Record<T>>> {
        let id = self.resolve_shared(tuple)?;
        self.records.find(&id)
    }

    /// Intersect the exact-arity buckets of every pair, one read lock at a time.
    ///
    /// A record that is mid-creation is either in every bucket or treated
    /// as absent, because its creator holds all of its node locks.
    fn resolve_shared(&self, tuple: &Tuple) -> Option<String> {
        let arity = tuple.len();
        let mut candidates: Option<HashSet<String>> = None;

        for (key, value) in tuple {
            let node = self.keys.find(key.as_str())?.find(value)?;
            let buckets = node.read();
            let bucket = buckets.bucket(arity)?;

            match candidates.as_mut() {
                None => candidates = Some(bucket.iter().cloned().collect()),
                Some(set) => retain_in_bucket(set, bucket),
            }

            if candidates.as_ref().is_some_and(HashSet::is_empty) {
                return None;
            }
        }

        exactly_one(candidates?)
    }

    /// The ID nodes of every pair of `tuple`, without creating any.
    fn existing_nodes(&self, tuple: &Tuple) -> Option<Vec<Arc<IdNode>>> {
        tuple
            .iter()
            .map(|(key, value)| self.keys.find(key.as_str())?.find(value))
            .collect()
    }

    /// Remove now-empty ID nodes and values containers for every pair of
    /// `tuple`, walking leaf outward.
    ///
    /// Must run after the tuple's node locks and reservations are released.
    /// Nodes still locked by another writer are left for that writer's own
    /// prune. The key index is only write-locked once its values container
    /// has been seen empty under shared locks.
    fn prune(&self, tuple: &Tuple) {
        for (key, value) in tuple {
            let Some(values) = self.keys.find(key.as_str()) else {
                continue;
            };

            if values.delete_if(value, IdNode::is_prunable).is_some() {
                bump(&PRUNED_ID_NODE_COUNT);
            }

            if !values.is_empty() {
                continue;
            }

            if self.keys.delete_if(key.as_str(), ValuesNode::is_empty).is_some() {
                trace_log!(key = key.as_str(), "pruned values node");
                bump(&PRUNED_VALUES_NODE_COUNT);
            }
        }
    }

    /// Walk the whole index and report the first inconsistency.
    ///
    /// Checks that every record is indexed exactly once under each of its
    /// pairs at its own arity, that every indexed id resolves to a record
    /// containing that pair, that trailing empty arity levels are trimmed
    /// and that empty nodes have been pruned.
    ///
    /// Intended for tests and diagnostics on a quiescent tree: concurrent
    /// writers can make a consistent tree look inconsistent mid-walk.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let violation = |detail: String| Err(InvariantViolation(detail));

        for (id, record) in self.records.snapshot() {
            if record.id() != id {
                return violation(format!("record '{}' stored under id '{id}'", record.id()));
            }

            let arity = record.tuple().len();
            for (key, value) in record.tuple() {
                let Some(node) = self.keys.find(key.as_str()).and_then(|v| v.find(value)) else {
                    return violation(format!("record '{id}' pair {key}={value} is not indexed"));
                };

                let buckets = node.read();
                for (level, ids) in buckets.levels() {
                    let hits = ids.iter().filter(|candidate| **candidate == id).count();
                    let expected = usize::from(level == arity);
                    if hits != expected {
                        return violation(format!(
                            "record '{id}' appears {hits} times at arity {level} under {key}={value}"
                        ));
                    }
                }
                if buckets.arity_len() < arity {
                    return violation(format!(
                        "record '{id}' missing arity {arity} under {key}={value}"
                    ));
                }
            }
        }

        for (key, values) in self.keys.snapshot() {
            if values.is_empty() {
                return violation(format!("values node for key '{key}' is empty"));
            }

            for (value, node) in values.snapshot() {
                let buckets = node.read();
                if buckets.is_empty() && node.creating() == 0 {
                    return violation(format!("ID node {key}={value} is empty and unpruned"));
                }
                if buckets.levels().last().is_some_and(|(_, ids)| ids.is_empty()) {
                    return violation(format!("ID node {key}={value} has untrimmed levels"));
                }

                for (level, ids) in buckets.levels() {
                    for id in ids {
                        let Some(record) = self.records.find(id) else {
                            return violation(format!("ID node {key}={value} holds dangling id '{id}'"));
                        };
                        let tuple = record.tuple();
                        let holds_pair = tuple.get(&key).is_some_and(|v| v.same_type(&value) && *v == value);
                        if tuple.len() != level || !holds_pair {
                            return violation(format!(
                                "ID node {key}={value} lists '{id}' at arity {level} but its tuple is {tuple:?}"
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl<T> Default for AssociativeTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StdFmt::Debug for AssociativeTree<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("AssociativeTree")
            .field("records", &self.records.len())
            .field("keys", &self.keys.len())
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}

/// Intersect exact-arity buckets across nodes whose write locks are held.
///
/// With every node of a tuple locked, at most one id can survive; more than
/// one means two records share a tuple.
fn exclusive_match(guards: &[RwLockWriteGuard<'_, IdBuckets>], arity: usize) -> Option<String> {
    let mut candidates: Option<HashSet<String>> = None;

    for buckets in guards {
        let bucket = buckets.bucket(arity)?;
        match candidates.as_mut() {
            None => candidates = Some(bucket.iter().cloned().collect()),
            Some(set) => retain_in_bucket(set, bucket),
        }
    }

    let candidates = candidates?;
    if candidates.len() > 1 {
        invariant_violated("multiple records share one tuple");
    }
    candidates.into_iter().next()
}

fn exactly_one(set: HashSet<String>) -> Option<String> {
    if set.len() == 1 {
        set.into_iter().next()
    } else {
        None
    }
}

// ============================================================================
//  Tests
// ============================================================================
