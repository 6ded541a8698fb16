//! Debug counters for profiling contention and churn.
//!
//! Process-wide, relaxed, and shared by every tree in the process. They
//! exist for the profiling binary and stress tests; nothing reads them on
//! the hot path.

use std::sync::atomic::AtomicUsize;

use crate::ordering::RELAXED;

/// Records stored by a create path.
pub static CREATE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Creates that found the tuple already present under the node locks.
pub static CREATE_CONFLICT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Creates whose partial index entries were rolled back.
pub static CREATE_ROLLBACK_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Records removed by delete, destroy-by-id or destroy-all.
pub static DELETE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Records removed by a destroy-all walk (a subset of [`DELETE_COUNT`]).
pub static DESTROY_ALL_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Deletes refused by the caller's `can_delete`.
pub static DELETE_VETO_COUNT: AtomicUsize = AtomicUsize::new(0);

/// ID nodes removed from their values container.
pub static PRUNED_ID_NODE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Values containers removed from the key index.
pub static PRUNED_VALUES_NODE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Snapshot of all debug counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugCounters {
    /// See [`CREATE_COUNT`].
    pub create: usize,
    /// See [`CREATE_CONFLICT_COUNT`].
    pub create_conflict: usize,
    /// See [`CREATE_ROLLBACK_COUNT`].
    pub create_rollback: usize,
    /// See [`DELETE_COUNT`].
    pub delete: usize,
    /// See [`DESTROY_ALL_COUNT`].
    pub destroy_all: usize,
    /// See [`DELETE_VETO_COUNT`].
    pub delete_veto: usize,
    /// See [`PRUNED_ID_NODE_COUNT`].
    pub pruned_id_node: usize,
    /// See [`PRUNED_VALUES_NODE_COUNT`].
    pub pruned_values_node: usize,
}

#[inline]
pub(crate) fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, RELAXED);
}

/// Read all counters.
#[must_use]
pub fn get_all_debug_counters() -> DebugCounters {
    DebugCounters {
        create: CREATE_COUNT.load(RELAXED),
        create_conflict: CREATE_CONFLICT_COUNT.load(RELAXED),
        create_rollback: CREATE_ROLLBACK_COUNT.load(RELAXED),
        delete: DELETE_COUNT.load(RELAXED),
        destroy_all: DESTROY_ALL_COUNT.load(RELAXED),
        delete_veto: DELETE_VETO_COUNT.load(RELAXED),
        pruned_id_node: PRUNED_ID_NODE_COUNT.load(RELAXED),
        pruned_values_node: PRUNED_VALUES_NODE_COUNT.load(RELAXED),
    }
}

/// Zero all counters.
pub fn reset_debug_counters() {
    for counter in [
        &CREATE_COUNT,
        &CREATE_CONFLICT_COUNT,
        &CREATE_ROLLBACK_COUNT,
        &DELETE_COUNT,
        &DESTROY_ALL_COUNT,
        &DELETE_VETO_COUNT,
        &PRUNED_ID_NODE_COUNT,
        &PRUNED_VALUES_NODE_COUNT,
    ] {
        counter.store(0, RELAXED);
    }
}
