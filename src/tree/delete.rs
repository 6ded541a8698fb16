//! Delete paths for [`AssociativeTree`].
//!
//! Both delete-by-tuple and delete-by-id converge on `retract`: with
//! every ID node of the record's tuple write-locked, ask `can_delete`,
//! then remove the record from the store and its id from every node.
//! Pruning of emptied nodes happens afterwards, once the node locks are
//! released, through the same structural path create uses for rollback.
//! It runs whatever the outcome: a concurrent pruner skips nodes that are
//! locked, so the holder has to finish the job.

use std::sync::Arc;

use parking_lot::RwLockWriteGuard;

use crate::counters::{DELETE_COUNT, DELETE_VETO_COUNT, DESTROY_ALL_COUNT, bump};
use crate::error::{Result, TreeError, invariant_violated};
use crate::node::IdBuckets;
use crate::record::Record;
use crate::tracing_helpers::{debug_log, trace_log};
use crate::tuple::Tuple;

use super::{AssociativeTree, exclusive_match};

/// Outcome of a single delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    Vetoed,
    Missing,
}

impl<T> AssociativeTree<T> {
    /// Delete the record whose tuple is exactly `tuple`.
    ///
    /// `can_delete` sees the record while its index nodes are locked and
    /// may veto. It is not called when no record matches.
    ///
    /// Returns true only if a record was removed.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`]
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(arity = tuple.len())))]
    pub fn delete<F>(&self, tuple: &Tuple, can_delete: F) -> Result<bool>
    where
        F: FnOnce(&Record<T>) -> bool,
    {
        let _op = self.barrier.enter()?;
        tuple.validate()?;
        Ok(self.remove_matching(tuple, can_delete) == Removal::Removed)
    }

    /// Delete a record by its associated id.
    ///
    /// Same veto semantics as [`delete`](Self::delete).
    ///
    /// # Errors
    ///
    /// - [`TreeError::EmptyId`] for an empty id
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(id = id)))]
    pub fn destroy_by_id<F>(&self, id: &str, can_delete: F) -> Result<bool>
    where
        F: FnOnce(&Record<T>) -> bool,
    {
        let _op = self.barrier.enter()?;
        if id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        Ok(self.remove_by_id(id, can_delete) == Removal::Removed)
    }

    /// Delete every record, in id order.
    ///
    /// Claims the destroy barrier first: operations that arrive meanwhile
    /// fail with [`TreeError::TreeDestroying`], and operations already in
    /// flight finish before the walk starts. `can_delete` is asked for each
    /// record; the first veto stops the walk and `Ok(false)` is returned
    /// with the vetoed record and every record after it still stored.
    ///
    /// # Errors
    ///
    /// [`TreeError::DestroyInProgress`] if another destroy is running.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn destroy_all<F>(&self, mut can_delete: F) -> Result<bool>
    where
        F: FnMut(&Record<T>) -> bool,
    {
        let _destroy = self.barrier.begin_destroy()?;
        debug_log!(records = self.records.len(), "destroy_all started");

        for id in self.records.keys() {
            match self.remove_by_id(&id, &mut can_delete) {
                Removal::Removed => bump(&DESTROY_ALL_COUNT),
                Removal::Vetoed => {
                    debug_log!(id = id.as_str(), "destroy_all stopped by veto");
                    return Ok(false);
                }
                Removal::Missing => {}
            }
        }

        Ok(true)
    }

    // ========================================================================
    //  Internals
    // ========================================================================

    fn remove_matching<F>(&self, tuple: &Tuple, can_delete: F) -> Removal
    where
        F: FnOnce(&Record<T>) -> bool,
    {
        let Some(nodes) = self.existing_nodes(tuple) else {
            return Removal::Missing;
        };

        let outcome = {
            let mut guards: Vec<_> = nodes.iter().map(|node| node.write()).collect();

            match exclusive_match(&guards, tuple.len()) {
                Some(id) => {
                    let record = self
                        .records
                        .find(&id)
                        .unwrap_or_else(|| invariant_violated("indexed id has no record"));
                    self.retract(&mut guards, &record, can_delete)
                }
                None => Removal::Missing,
            }
        };

        // Pruners skip nodes someone else holds, so every holder prunes after
        // letting go, whatever the outcome.
        self.prune(tuple);
        outcome
    }

    fn remove_by_id<F>(&self, id: &str, can_delete: F) -> Removal
    where
        F: FnOnce(&Record<T>) -> bool,
    {
        let Some(record) = self.records.find(id) else {
            return Removal::Missing;
        };
        let Some(nodes) = self.existing_nodes(record.tuple()) else {
            return Removal::Missing;
        };

        let outcome = {
            let mut guards: Vec<_> = nodes.iter().map(|node| node.write()).collect();

            // A concurrent delete may have won between the store lookup and
            // taking the locks.
            let still_stored = self
                .records
                .find(id)
                .is_some_and(|current| Arc::ptr_eq(&current, &record));
            if still_stored {
                self.retract(&mut guards, &record, can_delete)
            } else {
                trace_log!(id, "record vanished before node locks were taken");
                Removal::Missing
            }
        };

        self.prune(record.tuple());
        outcome
    }

    /// Ask `can_delete`, then unlink `record` from the store and every node.
    ///
    /// `guards` must be the write locks of every ID node of the record's
    /// tuple.
    fn retract<F>(
        &self,
        guards: &mut [RwLockWriteGuard<'_, IdBuckets>],
        record: &Record<T>,
        can_delete: F,
    ) -> Removal
    where
        F: FnOnce(&Record<T>) -> bool,
    {
        if !can_delete(record) {
            bump(&DELETE_VETO_COUNT);
            return Removal::Vetoed;
        }

        if self.records.delete(record.id()).is_none() {
            invariant_violated("record disappeared while its nodes were locked");
        }

        let arity = record.tuple().len();
        for buckets in guards.iter_mut() {
            if !buckets.remove(arity, record.id()) {
                invariant_violated("record id missing from one of its nodes");
            }
        }

        bump(&DELETE_COUNT);
        debug_log!(id = record.id(), arity, "record deleted");
        Removal::Removed
    }
}
