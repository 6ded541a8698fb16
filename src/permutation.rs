//! Subset matching.
//!
//! [`AssociativeTree::match_permutations`] finds every record whose tuple is
//! exactly *some* subset of the supplied pairs, within a size window. The
//! name is historical: subsets are unordered.
//!
//! # Cost
//!
//! A tuple of `K` pairs has `2^K - 1` non-empty subsets and every one in
//! the window is intersected. Keep `K` small; a warning is logged above
//! [`LARGE_TUPLE_WARNING`] pairs.

use std::collections::HashSet;
use std::ops::{ControlFlow, RangeInclusive};

use crate::error::{Result, TreeError};
use crate::node::retain_in_bucket;
use crate::record::Record;
use crate::tracing_helpers::{trace_log, warn_log};
use crate::tree::AssociativeTree;
use crate::tuple::Tuple;

mod subsets;

/// Tuple size above which `match_permutations` logs a warning.
pub const LARGE_TUPLE_WARNING: usize = 16;

/// Inclusive subset size window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermutationBounds {
    /// Smallest subset size considered. Zero behaves like one.
    pub min_size: usize,
    /// Largest subset size considered. `None` means the whole tuple.
    pub max_size: Option<usize>,
}

impl PermutationBounds {
    /// Every non-empty subset.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            min_size: 0,
            max_size: None,
        }
    }

    /// Subsets with `min_size <= size <= max_size`.
    #[must_use]
    pub const fn new(min_size: usize, max_size: Option<usize>) -> Self {
        Self { min_size, max_size }
    }

    /// Subsets of exactly `size` pairs.
    #[must_use]
    pub const fn exact(size: usize) -> Self {
        Self::new(size, Some(size))
    }

    /// Reject `min_size > max_size`.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidBounds`].
    pub fn validate(&self) -> Result<()> {
        match self.max_size {
            Some(max) if self.min_size > max => Err(TreeError::InvalidBounds {
                min: self.min_size,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// The sizes to visit for a tuple of `len` pairs, if any.
    fn sizes(&self, len: usize) -> Option<RangeInclusive<usize>> {
        let low = self.min_size.max(1);
        let high = self.max_size.map_or(len, |max| max.min(len));
        (low <= high).then_some(low..=high)
    }
}

impl Default for PermutationBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Ids found under one supplied pair, indexed by `arity - 1`.
type LevelIds = Vec<Vec<String>>;

impl<T> AssociativeTree<T> {
    /// Visit every record whose tuple equals a subset of `tuple` with a size
    /// inside `bounds`, until `on_match` returns false.
    ///
    /// Subsets are walked smallest first, then in key order, so results are
    /// deterministic. Each record is visited at most once.
    ///
    /// This enumerates up to `2^K` subsets for a tuple of `K` pairs.
    ///
    /// # Errors
    ///
    /// - validation errors from [`Tuple::validate`]
    /// - [`TreeError::InvalidBounds`] if `min_size > max_size`
    /// - [`TreeError::TreeDestroying`] while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(arity = tuple.len())))]
    pub fn match_permutations<F>(&self, tuple: &Tuple, bounds: PermutationBounds, mut on_match: F) -> Result<()>
    where
        F: FnMut(&Record<T>) -> bool,
    {
        let _op = self.enter()?;
        tuple.validate()?;
        bounds.validate()?;

        if tuple.len() > LARGE_TUPLE_WARNING {
            warn_log!(
                pairs = tuple.len(),
                "match_permutations on a large tuple enumerates 2^K subsets"
            );
        }

        let Some(sizes) = bounds.sizes(tuple.len()) else {
            return Ok(());
        };
        let per_key = self.collect_levels(tuple, &sizes);

        let mut seen: HashSet<String> = HashSet::new();
        let walk = subsets::for_each_subset(tuple.len(), sizes, |subset| {
            let mut ids: Vec<String> = intersect_at(&per_key, subset).into_iter().collect();
            ids.sort_unstable();

            for id in ids {
                if !seen.insert(id.clone()) {
                    continue;
                }
                let Some(record) = self.store().find(&id) else {
                    continue;
                };
                if !on_match(&record) {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });

        match walk {
            ControlFlow::Break(()) => {
                trace_log!(matched = seen.len(), "permutation match stopped by callback");
            }
            ControlFlow::Continue(()) => {
                trace_log!(matched = seen.len(), "permutation match finished");
            }
        }
        Ok(())
    }

    /// For each pair, copy out the buckets whose arity is inside `sizes`.
    ///
    /// `None` for a pair that is not indexed at all.
    fn collect_levels(&self, tuple: &Tuple, sizes: &RangeInclusive<usize>) -> Vec<Option<LevelIds>> {
        tuple
            .iter()
            .map(|(key, value)| {
                let node = self.index().find(key.as_str())?.find(value)?;
                let buckets = node.read();
                let levels = buckets
                    .levels()
                    .take(*sizes.end())
                    .map(|(arity, ids)| if sizes.contains(&arity) { ids.to_vec() } else { Vec::new() })
                    .collect();
                Some(levels)
            })
            .collect()
    }
}

/// Ids present in the `subset.len()` bucket of every member of `subset`.
fn intersect_at(per_key: &[Option<LevelIds>], subset: &[usize]) -> HashSet<String> {
    let arity = subset.len();
    let Some((&first, rest)) = subset.split_first() else {
        return HashSet::new();
    };
    let Some(first) = bucket_of(per_key, first, arity) else {
        return HashSet::new();
    };

    let mut candidates: HashSet<String> = first.iter().cloned().collect();
    for &member in rest {
        if candidates.is_empty() {
            break;
        }
        match bucket_of(per_key, member, arity) {
            Some(ids) => retain_in_bucket(&mut candidates, ids),
            None => return HashSet::new(),
        }
    }
    candidates
}

fn bucket_of(per_key: &[Option<LevelIds>], member: usize, arity: usize) -> Option<&[String]> {
    per_key.get(member)?.as_ref()?.get(arity - 1).map(Vec::as_slice)
}
