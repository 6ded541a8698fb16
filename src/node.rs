//! Per-(key, value) index nodes.
//!
//! An [`IdNode`] records, for one key/value pair, every record identifier
//! whose tuple contains that pair, bucketed by the tuple's arity:
//! bucket `n - 1` holds ids of tuples with exactly `n` pairs.
//!
//! # Concurrency Model
//! - Bucket contents are only read or written through the node's own
//!   `RwLock` ([`IdNode::read`] / [`IdNode::write`]).
//! - The in-flight creation counter is raised by [`IdNode::reserve`] while
//!   the owning values container is locked, and lowered when the returned
//!   [`CreateReservation`] drops. Pruning checks it under the same
//!   container's exclusive lock, so a node can never be pruned between a
//!   creator finding it and the creator writing into it.
//! - Pruning only ever try-locks a node. Holding a container lock while
//!   waiting on a node would let one slow callback stall the whole key.
//!
//! ```rust,ignore
//! let reservation = values.create_or_find(value, IdNode::new, IdNode::reserve);
//! let mut buckets = reservation.node().write();
//! buckets.push(arity, id);
//! // lock released, then counter released when `reservation` drops
//! ```

use std::collections::HashSet;
use std::fmt as StdFmt;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::container::OrderedContainer;
use crate::ordering::{RESERVE_ORD, RESERVE_READ_ORD};
use crate::value::Value;

/// All ID nodes for one key, ordered by value.
pub type ValuesNode = OrderedContainer<Value, IdNode>;

/// The root index: every key ever seen, mapped to its values.
pub type KeyIndex = OrderedContainer<String, ValuesNode>;

// ============================================================================
//  IdBuckets
// ============================================================================

/// Record identifiers bucketed by tuple arity.
///
/// Trailing empty buckets are trimmed on every removal, so
/// [`arity_len`](Self::arity_len) is the highest arity that still has ids
/// and an empty node has no buckets at all.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdBuckets {
    buckets: Vec<Vec<String>>,
}

impl IdBuckets {
    /// Number of arity levels currently allocated.
    #[must_use]
    #[inline]
    pub fn arity_len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if no ids are stored.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The ids for tuples of exactly `arity` pairs.
    ///
    /// `None` when the arity level was never allocated, which also means no
    /// tuple of that arity contains this pair.
    #[must_use]
    pub fn bucket(&self, arity: usize) -> Option<&[String]> {
        let index = arity.checked_sub(1)?;
        self.buckets.get(index).map(Vec::as_slice)
    }

    /// Grow to at least `arity` levels. Returns true if growth happened,
    /// meaning no existing tuple of that arity can contain this pair.
    pub(crate) fn ensure_arity(&mut self, arity: usize) -> bool {
        if self.buckets.len() < arity {
            self.buckets.resize_with(arity, Vec::new);
            true
        } else {
            false
        }
    }

    /// Append an id to the bucket for `arity`. The level must exist.
    pub(crate) fn push(&mut self, arity: usize, id: String) {
        debug_assert!(arity >= 1 && arity <= self.buckets.len());
        self.buckets[arity - 1].push(id);
    }

    /// Remove an id from the bucket for `arity` (swap with last and pop),
    /// then trim trailing empty levels. Returns true if the id was present.
    pub(crate) fn remove(&mut self, arity: usize, id: &str) -> bool {
        let Some(bucket) = arity
            .checked_sub(1)
            .and_then(|index| self.buckets.get_mut(index))
        else {
            return false;
        };

        let Some(position) = bucket.iter().position(|candidate| candidate == id) else {
            return false;
        };
        bucket.swap_remove(position);
        self.trim();
        true
    }

    /// Drop trailing empty levels.
    pub(crate) fn trim(&mut self) {
        while self.buckets.last().is_some_and(Vec::is_empty) {
            self.buckets.pop();
        }
    }

    /// Iterate ids in the first `limit` arity levels (all levels if `None`).
    pub fn ids_up_to(&self, limit: Option<usize>) -> impl Iterator<Item = &String> {
        let levels = limit.map_or(self.buckets.len(), |l| l.min(self.buckets.len()));
        self.buckets[..levels].iter().flatten()
    }

    /// Iterate `(arity, ids)` for every allocated level.
    pub fn levels(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.buckets
            .iter()
            .enumerate()
            .map(|(index, ids)| (index + 1, ids.as_slice()))
    }
}

/// Narrow `candidates` to the ids also present in `bucket`.
pub(crate) fn retain_in_bucket(candidates: &mut HashSet<String>, bucket: &[String]) {
    let bucket: HashSet<&str> = bucket.iter().map(String::as_str).collect();
    candidates.retain(|id| bucket.contains(id.as_str()));
}

// ============================================================================
//  IdNode
// ============================================================================

/// Index node for one key/value pair.
pub struct IdNode {
    ids: RwLock<IdBuckets>,

    /// Creators that found or created this node and have not finished.
    creating: AtomicI64,
}

impl IdNode {
    /// Create an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(IdBuckets::default()),
            creating: AtomicI64::new(0),
        }
    }

    /// Register an in-flight creation. Call while the owning values
    /// container is locked.
    #[must_use = "dropping the reservation releases it immediately"]
    pub fn reserve(node: &Arc<Self>) -> CreateReservation {
        node.creating.fetch_add(1, RESERVE_ORD);
        CreateReservation {
            node: Arc::clone(node),
        }
    }

    /// Number of in-flight creations.
    #[must_use]
    pub fn creating(&self) -> i64 {
        self.creating.load(RESERVE_READ_ORD)
    }

    /// Shared access to the buckets.
    pub fn read(&self) -> RwLockReadGuard<'_, IdBuckets> {
        self.ids.read()
    }

    /// Exclusive access to the buckets.
    pub fn write(&self) -> RwLockWriteGuard<'_, IdBuckets> {
        self.ids.write()
    }

    /// True if the node holds no ids, no creator has reserved it and no
    /// writer currently holds its lock.
    ///
    /// Never blocks: a node locked elsewhere reports false and is pruned by
    /// whoever holds the lock once they release it. Only meaningful under
    /// the owning values container's exclusive lock.
    #[must_use]
    pub fn is_prunable(&self) -> bool {
        self.creating() == 0 && self.ids.try_read().is_some_and(|ids| ids.is_empty())
    }
}

impl Default for IdNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StdFmt::Debug for IdNode {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("IdNode")
            .field("creating", &self.creating())
            .field("arity_len", &self.ids.read().arity_len())
            .finish()
    }
}

// ============================================================================
//  CreateReservation
// ============================================================================

/// Proof that an in-flight creation is registered on an [`IdNode`].
///
/// Releases the registration on drop, on every exit path of the create
/// algorithm, including unwinding out of a panicking callback.
#[must_use = "dropping the reservation releases it immediately"]
pub struct CreateReservation {
    node: Arc<IdNode>,
}

impl CreateReservation {
    /// The reserved node.
    #[must_use]
    #[inline]
    pub fn node(&self) -> &IdNode {
        &self.node
    }
}

impl Drop for CreateReservation {
    fn drop(&mut self) {
        let previous = self.node.creating.fetch_sub(1, RESERVE_ORD);
        debug_assert!(previous > 0, "creation counter underflow");
    }
}

impl StdFmt::Debug for CreateReservation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_tuple("CreateReservation").field(&self.node).finish()
    }
}

// ============================================================================
//  Tests
// ============================================================================
