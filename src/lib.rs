//! # `AssocTree`
//!
//! A concurrent, in-memory associative index.
//!
//! Records are identified twice: by a generated (or caller-chosen) string id
//! and by their *tuple*, a set of key/value pairs that no other record may
//! share. The index answers:
//! - exact tuple lookups and atomic create-or-find,
//! - boolean queries over keys and values (AND/OR, existence, comparisons),
//! - subset matches: every record whose tuple is a subset of a given one.
//!
//! ## Layout
//!
//! ```text
//! key index ── "queue" ──▶ values ── "jobs" ──▶ IdNode [arity 1: [], arity 2: [id7]]
//!           └─ "shard" ──▶ values ── 3u32   ──▶ IdNode [arity 1: [], arity 2: [id7]]
//! record store ── id7 ──▶ Record { tuple: {queue: jobs, shard: 3}, payload }
//! ```
//!
//! Ids are bucketed by the arity of their tuple, so an exact match is the
//! intersection of one bucket per pair.
//!
//! ## Thread Safety
//!
//! `AssociativeTree<T>` is `Send + Sync` when `T: Send + Sync`. There is no
//! global lock: each container and each ID node has its own
//! `parking_lot::RwLock`, creators and deleters lock a tuple's ID nodes in
//! sorted key order, and an in-flight counter on every ID node keeps
//! concurrent pruning from removing a node a creator is about to use.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use assoctree::{AssociativeTree, Tuple};
//!
//! let tree: Arc<AssociativeTree<u32>> = Arc::new(AssociativeTree::new());
//! let tuple = Tuple::new().with("lock", "orders");
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let tree = Arc::clone(&tree);
//!         let tuple = tuple.clone();
//!         thread::spawn(move || tree.create_or_find(&tuple, || Some(i), |_| {}).unwrap())
//!     })
//!     .collect();
//!
//! let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
//! assert!(ids.windows(2).all(|w| w[0] == w[1]));
//! assert_eq!(tree.len(), 1);
//! ```
//!
//! ## Callbacks
//!
//! Create and delete callbacks run while the tuple's ID node locks are
//! held. They must not call back into the same tree.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod tracing_helpers;

pub mod barrier;
pub mod container;
pub mod counters;
pub mod error;
pub mod id;
pub mod node;
pub mod ordering;
pub mod permutation;
pub mod query;
pub mod record;
pub mod tree;
pub mod tuple;
pub mod value;

// Re-export main types for convenience
pub use container::OrderedContainer;
pub use counters::{DebugCounters, get_all_debug_counters, reset_debug_counters};
pub use error::{InvariantViolation, Result, TreeError};
pub use id::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use permutation::PermutationBounds;
pub use query::{Limits, Operator, Query, Selection, ValueQuery};
pub use record::Record;
pub use tree::AssociativeTree;
pub use tuple::{ASSOCIATED_ID_KEY, Tuple};
pub use value::{Value, ValueType};
