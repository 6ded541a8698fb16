//! Pluggable identifier generation.
//!
//! The tree asks its [`IdGenerator`] for a fresh identifier every time a
//! record is created without a caller-supplied id. Generators must never
//! hand out the same string twice for the lifetime of a tree; a collision is
//! treated as a broken invariant and aborts.

use std::fmt as StdFmt;
use std::sync::atomic::AtomicU64;

use uuid::Uuid;

use crate::ordering::RELAXED;

/// Source of unique record identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new, never-before-returned identifier.
    fn generate(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Random UUID v4 identifiers. The default generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers, zero-padded so that lexical order
/// matches creation order.
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator whose ids start at `prefix-00000000000000000000`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("id")
    }
}

impl StdFmt::Debug for SequentialIdGenerator {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("SequentialIdGenerator")
            .field("prefix", &self.prefix)
            .field("next", &self.next.load(RELAXED))
            .finish()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, RELAXED);
        format!("{}-{n:020}", self.prefix)
    }
}
