//! The backing ordered container.
//!
//! [`OrderedContainer`] is a sorted map that hands out `Arc`-shared values.
//! The tree builds all three of its levels from it: the key index
//! (`String -> values container`), each values container
//! (`Value -> IdNode`) and the record store (`String -> Record`).
//!
//! # Locking
//!
//! One `parking_lot::RwLock` guards the map. The callbacks of
//! [`create_or_find`](OrderedContainer::create_or_find) and
//! [`delete_if`](OrderedContainer::delete_if) run while that lock is held,
//! which is what lets the tree make "reserve a node" and "prune a node"
//! mutually exclusive without a global lock. Callbacks may take locks on
//! values *inside* the container, never on the container itself.
//!
//! Iteration works on a snapshot taken under the shared lock, so callbacks
//! run lock-free and may mutate the container.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt as StdFmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A concurrent sorted map of `K` to `Arc<V>`.
pub struct OrderedContainer<K, V> {
    entries: RwLock<BTreeMap<K, Arc<V>>>,
}

impl<K: Ord, V> OrderedContainer<K, V> {
    /// Create an empty container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Look up a value.
    #[must_use]
    pub fn find<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.read().get(key).map(Arc::clone)
    }

    /// Check if a key is present.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    /// Find the value for `key`, creating it with `on_create` if absent, and
    /// pass it to `on_found` while the container lock is still held.
    ///
    /// Existing keys only take the shared lock. Creation takes the exclusive
    /// lock and re-checks, so concurrent callers agree on a single value.
    pub fn create_or_find<R>(
        &self,
        key: K,
        on_create: impl FnOnce() -> V,
        on_found: impl FnOnce(&Arc<V>) -> R,
    ) -> R {
        {
            let entries = self.entries.read();
            if let Some(value) = entries.get(&key) {
                return on_found(value);
            }
        }

        let mut entries = self.entries.write();
        let value = entries.entry(key).or_insert_with(|| Arc::new(on_create()));
        on_found(value)
    }

    /// Insert `value` under `key` if the key is absent.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the key is already present.
    pub fn create(&self, key: K, value: V) -> Result<Arc<V>, V> {
        match self.entries.write().entry(key) {
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(Arc::new(value)))),
            Entry::Occupied(_) => Err(value),
        }
    }

    /// Remove `key` unconditionally.
    pub fn delete<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.write().remove(key)
    }

    /// Remove `key` if `can_delete` approves, deciding under the exclusive lock.
    pub fn delete_if<Q>(&self, key: &Q, can_delete: impl FnOnce(&V) -> bool) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut entries = self.entries.write();
        if can_delete(entries.get(key)?) {
            entries.remove(key)
        } else {
            None
        }
    }

    /// Visit every entry in key order until `on_each` returns false.
    ///
    /// Works on a snapshot; entries added or removed during the walk may or
    /// may not be observed.
    pub fn iterate(&self, mut on_each: impl FnMut(&K, &Arc<V>) -> bool)
    where
        K: Clone,
    {
        for (key, value) in self.snapshot() {
            if !on_each(&key, &value) {
                break;
            }
        }
    }

    /// Copy out all entries in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(K, Arc<V>)>
    where
        K: Clone,
    {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect()
    }

    /// Copy out all keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries.read().keys().cloned().collect()
    }
}

impl<K: Ord, V> Default for OrderedContainer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> StdFmt::Debug for OrderedContainer<K, V> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("OrderedContainer")
            .field("len", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
