//! Standard memory orderings for the tree's atomics.
//!
//! These constants keep ordering usage consistent across the codebase
//! and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for the in-flight creation counter of an ID node.
///
/// The counter is only read for pruning decisions made under the owning
/// values container's exclusive lock, and only written under a shared or
/// exclusive hold of that same lock, so the lock provides the happens-before
/// edge. `AcqRel` keeps the release of a reservation visible to a pruner
/// that does not share a lock with the releasing thread.
pub const RESERVE_ORD: Ordering = Ordering::AcqRel;

/// Ordering for reading the in-flight creation counter.
pub const RESERVE_READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for the destroy barrier (flag and in-flight operation count).
///
/// Entering operations increment the count and then read the flag; the
/// destroyer sets the flag and then reads the count. Both sides need a
/// single total order over these accesses, hence `SeqCst`.
pub const BARRIER_ORD: Ordering = Ordering::SeqCst;

/// Ordering for statistics counters. They carry no synchronization.
pub const RELAXED: Ordering = Ordering::Relaxed;
