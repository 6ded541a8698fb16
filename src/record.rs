//! The unit of storage.

use crate::tuple::Tuple;

/// A stored record: its identifier, its defining tuple and the payload
/// returned by the caller's create callback.
///
/// Records are immutable once stored. The tuple is a private copy, so later
/// changes to the caller's tuple cannot corrupt the index.
#[derive(Debug)]
pub struct Record<T> {
    id: String,
    tuple: Tuple,
    payload: T,
}

impl<T> Record<T> {
    pub(crate) const fn new(id: String, tuple: Tuple, payload: T) -> Self {
        Self { id, tuple, payload }
    }

    /// The record's associated identifier.
    #[must_use]
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The tuple that defines this record.
    #[must_use]
    #[inline]
    pub const fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    /// The caller's payload.
    #[must_use]
    #[inline]
    pub const fn payload(&self) -> &T {
        &self.payload
    }
}
