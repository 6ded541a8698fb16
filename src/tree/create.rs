//! Create paths for [`AssociativeTree`].
//!
//! # Write Protocol
//!
//! ```text
//! 1. for each pair in sorted key order:
//!        key index -> values container -> ID node   (create-or-find)
//!        reserve the ID node (in-flight counter += 1, under container lock)
//! 2. write-lock every ID node, same order
//! 3. grow each node to the tuple's arity ("definitely new" if any grew)
//!    or intersect the exact-arity buckets
//! 4. one survivor  -> tuple exists
//!    none          -> on_create(); Some => store record, append id everywhere
//!                                   None => trim grown levels
//! 5. unlock, release reservations
//! 6. on rollback: prune the tuple's nodes
//! ```
//!
//! `on_create` runs with every node lock held, so concurrent creators of
//! the same tuple serialize on the first node and exactly one of them
//! stores a record.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLockWriteGuard;

use crate::counters::{CREATE_CONFLICT_COUNT, CREATE_COUNT, CREATE_ROLLBACK_COUNT, bump};
use crate::error::{Result, TreeError, invariant_violated};
use crate::node::{CreateReservation, IdBuckets, IdNode, ValuesNode, retain_in_bucket};
use crate::record::Record;
use crate::tracing_helpers::{debug_log, trace_log};
use crate::tuple::Tuple;

use super::AssociativeTree;

// ============================================================================
//  Insertion
// ============================================================================

/// Outcome of the locked create algorithm.
enum Insertion<T> {
    /// A new record was stored under this id.
    Created(String),

    /// `on_create` declined; nothing was stored.
    NotCreated,

    /// The tuple already belongs to this record.
    Existing(Arc<Record<T>>),

    /// The caller-supplied id is already in the record store.
    IdTaken(String),
}

// ============================================================================
//  Public API
// ============================================================================

impl<T> AssociativeTree<T> {
    /// Create a record for `tuple` with a generated id.
    ///
    /// `on_create` supplies the payload. Returning `None` aborts: any index
    /// structure added for the attempt is rolled back and `Ok(None)` is
    /// returned.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`]
    /// - [`TreeError::KeyValuesExist`] if a record with this exact tuple exists
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    ///
    /// # Panics
    ///
    /// If the id generator returns an id that is already stored.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(arity = tuple.len())))]
    pub fn create<F>(&self, tuple: &Tuple, on_create: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Option<T>,
    {
        let _op = self.barrier.enter()?;
        tuple.validate()?;

        match self.insert(tuple, None, on_create) {
            Insertion::Created(id) => Ok(Some(id)),
            Insertion::NotCreated => Ok(None),
            Insertion::Existing(_) => Err(TreeError::KeyValuesExist),
            Insertion::IdTaken(_) => invariant_violated("generated id reported as caller-supplied"),
        }
    }

    /// Create a record for `tuple` under a caller-chosen id.
    ///
    /// Returns false when `on_create` declined.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`], [`TreeError::EmptyId`]
    /// - [`TreeError::KeyValuesExist`] if a record with this exact tuple exists
    /// - [`TreeError::IdExists`] if `id` is taken; index entries added for the
    ///   attempt are rolled back
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(id = id, arity = tuple.len())))]
    pub fn create_with_id<F>(&self, id: &str, tuple: &Tuple, on_create: F) -> Result<bool>
    where
        F: FnOnce() -> Option<T>,
    {
        let _op = self.barrier.enter()?;
        if id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        tuple.validate()?;

        // Cheap early rejection; the store insert re-checks atomically.
        if self.records.contains_key(id) {
            return Err(TreeError::IdExists(id.to_owned()));
        }

        match self.insert(tuple, Some(id), on_create) {
            Insertion::Created(_) => Ok(true),
            Insertion::NotCreated => Ok(false),
            Insertion::Existing(_) => Err(TreeError::KeyValuesExist),
            Insertion::IdTaken(id) => Err(TreeError::IdExists(id)),
        }
    }

    /// Return the id of the record for `tuple`, creating it if needed.
    ///
    /// An existing record is found with read locks only and passed to
    /// `on_find`. On a miss the create algorithm runs and re-checks under
    /// the node locks; if a concurrent caller stored the tuple first,
    /// `on_find` receives that record instead. `on_create` therefore runs
    /// at most once per stored record.
    ///
    /// Returns `Ok(None)` only when `on_create` declined.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`]
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(arity = tuple.len())))]
    pub fn create_or_find<F, G>(&self, tuple: &Tuple, on_create: F, on_find: G) -> Result<Option<String>>
    where
        F: FnOnce() -> Option<T>,
        G: FnOnce(&Record<T>),
    {
        let _op = self.barrier.enter()?;
        tuple.validate()?;

        if let Some(record) = self.lookup(tuple) {
            on_find(&record);
            return Ok(Some(record.id().to_owned()));
        }

        match self.insert(tuple, None, on_create) {
            Insertion::Created(id) => Ok(Some(id)),
            Insertion::NotCreated => Ok(None),
            Insertion::Existing(record) => {
                debug_log!(id = record.id(), "create_or_find lost the create race");
                on_find(&record);
                Ok(Some(record.id().to_owned()))
            }
            Insertion::IdTaken(_) => invariant_violated("generated id reported as caller-supplied"),
        }
    }

    // ========================================================================
    //  Locked create algorithm
    // ========================================================================

    /// Run the locked create algorithm for a validated tuple.
    fn insert<F>(&self, tuple: &Tuple, supplied_id: Option<&str>, on_create: F) -> Insertion<T>
    where
        F: FnOnce() -> Option<T>,
    {
        let arity = tuple.len();
        let reservations = self.reserve_nodes(tuple);

        let outcome = {
            let mut guards: Vec<RwLockWriteGuard<'_, IdBuckets>> = reservations
                .iter()
                .map(|reservation| reservation.node().write())
                .collect();
            trace_log!(nodes = guards.len(), "create: ID nodes locked");

            if let Some(existing) = match_for_create(&mut guards, arity) {
                bump(&CREATE_CONFLICT_COUNT);
                let record = self
                    .records
                    .find(&existing)
                    .unwrap_or_else(|| invariant_violated("indexed id has no record"));
                Insertion::Existing(record)
            } else {
                self.store_record(tuple, supplied_id, on_create, &mut guards)
            }
        };

        drop(reservations);

        if matches!(outcome, Insertion::NotCreated | Insertion::IdTaken(_)) {
            bump(&CREATE_ROLLBACK_COUNT);
            self.prune(tuple);
        }

        outcome
    }

    /// Ask for the payload and, if given, store the record and index its id.
    ///
    /// The index entries are only written once the record is in the store;
    /// both happen under the node locks so no reader sees one without the
    /// other through the index.
    fn store_record<F>(
        &self,
        tuple: &Tuple,
        supplied_id: Option<&str>,
        on_create: F,
        guards: &mut [RwLockWriteGuard<'_, IdBuckets>],
    ) -> Insertion<T>
    where
        F: FnOnce() -> Option<T>,
    {
        let arity = tuple.len();

        let Some(payload) = on_create() else {
            trim_all(guards);
            return Insertion::NotCreated;
        };

        let id = supplied_id.map_or_else(|| self.id_generator.generate(), str::to_owned);
        let record = Record::new(id.clone(), tuple.clone(), payload);

        if self.records.create(id.clone(), record).is_err() {
            if supplied_id.is_none() {
                invariant_violated("id generator returned an id that is already stored");
            }
            trim_all(guards);
            return Insertion::IdTaken(id);
        }

        for buckets in guards.iter_mut() {
            buckets.push(arity, id.clone());
        }

        bump(&CREATE_COUNT);
        debug_log!(id = id.as_str(), arity, "record created");
        Insertion::Created(id)
    }

    /// Create-or-find the ID node of every pair and register an in-flight
    /// creation on each, in sorted key order.
    fn reserve_nodes(&self, tuple: &Tuple) -> Vec<CreateReservation> {
        tuple
            .iter()
            .map(|(key, value)| {
                self.keys.create_or_find(key.clone(), ValuesNode::new, |values| {
                    values.create_or_find(value.clone(), IdNode::new, IdNode::reserve)
                })
            })
            .collect()
    }
}

/// Grow every node to `arity` levels and intersect the exact-arity buckets.
///
/// If any node had to grow, no stored tuple of this arity contains that
/// pair, so the tuple is definitely new.
fn match_for_create(guards: &mut [RwLockWriteGuard<'_, IdBuckets>], arity: usize) -> Option<String> {
    let mut definitely_new = false;
    let mut candidates: Option<HashSet<String>> = None;

    for buckets in guards.iter_mut() {
        if buckets.ensure_arity(arity) {
            definitely_new = true;
            candidates = None;
            continue;
        }
        if definitely_new {
            continue;
        }

        let bucket = buckets.bucket(arity).unwrap_or_default();
        match candidates.as_mut() {
            None => candidates = Some(bucket.iter().cloned().collect()),
            Some(set) => retain_in_bucket(set, bucket),
        }
    }

    if definitely_new {
        return None;
    }

    let candidates = candidates?;
    match candidates.len() {
        0 => None,
        1 => candidates.into_iter().next(),
        _ => invariant_violated("multiple records share one tuple"),
    }
}

fn trim_all(guards: &mut [RwLockWriteGuard<'_, IdBuckets>]) {
    for buckets in guards.iter_mut() {
        buckets.trim();
    }
}
