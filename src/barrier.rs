//! The destroy barrier.
//!
//! Every tree operation holds an [`OperationGuard`] for its whole duration.
//! [`DestroyBarrier::begin_destroy`] flips the destroying flag with a CAS
//! (so at most one destroy runs), then blocks until the in-flight count
//! drains to zero. Operations that arrive while the flag is set fail fast
//! with [`TreeError::TreeDestroying`] instead of queueing.
//!
//! # Protocol
//!
//! ```text
//! operation:  in_flight += 1  ->  read destroying  ->  (set? undo, fail)
//! destroyer:  CAS destroying  ->  wait in_flight == 0  ->  tear down  ->  clear
//! ```
//!
//! Both sides use `SeqCst`, so either the operation sees the flag or the
//! destroyer sees the operation's increment.

use std::fmt as StdFmt;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TreeError};
use crate::ordering::BARRIER_ORD;
use crate::tracing_helpers::debug_log;

/// Destroy flag plus in-flight operation count.
pub struct DestroyBarrier {
    destroying: AtomicBool,
    in_flight: AtomicUsize,

    /// Condition variable signalled when `in_flight` reaches zero.
    drained: Condvar,

    /// Mutex paired with the condvar (required by [`parking_lot`] API).
    drained_mutex: Mutex<()>,
}

impl DestroyBarrier {
    /// Create an open barrier.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            destroying: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            drained: Condvar::new(),
            drained_mutex: Mutex::new(()),
        }
    }

    /// Register an operation.
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeDestroying`] if a destroy has started.
    pub fn enter(&self) -> Result<OperationGuard<'_>> {
        self.in_flight.fetch_add(1, BARRIER_ORD);
        let guard = OperationGuard { barrier: self };

        if self.destroying.load(BARRIER_ORD) {
            drop(guard);
            return Err(TreeError::TreeDestroying);
        }

        Ok(guard)
    }

    /// Claim exclusive teardown rights and wait for in-flight operations.
    ///
    /// Must not be called from inside an operation on the same tree; it would
    /// wait for itself.
    ///
    /// # Errors
    ///
    /// [`TreeError::DestroyInProgress`] if another destroy holds the barrier.
    pub fn begin_destroy(&self) -> Result<DestroyGuard<'_>> {
        self.destroying
            .compare_exchange(false, true, BARRIER_ORD, BARRIER_ORD)
            .map_err(|_| TreeError::DestroyInProgress)?;
        let guard = DestroyGuard { barrier: self };

        let mut lock = self.drained_mutex.lock();
        while self.in_flight.load(BARRIER_ORD) > 0 {
            debug_log!(
                in_flight = self.in_flight.load(BARRIER_ORD),
                "destroy waiting for in-flight operations"
            );
            self.drained.wait(&mut lock);
        }

        Ok(guard)
    }

    /// Check if a destroy is running.
    #[must_use]
    pub fn is_destroying(&self) -> bool {
        self.destroying.load(BARRIER_ORD)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(BARRIER_ORD)
    }
}

impl Default for DestroyBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl StdFmt::Debug for DestroyBarrier {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("DestroyBarrier")
            .field("destroying", &self.is_destroying())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Registration of one in-flight operation. Deregisters on drop.
#[must_use = "the operation is only registered while the guard lives"]
pub struct OperationGuard<'a> {
    barrier: &'a DestroyBarrier,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if self.barrier.in_flight.fetch_sub(1, BARRIER_ORD) == 1 {
            // Take the mutex so the notify cannot slip between the
            // destroyer's check and its wait.
            let _lock = self.barrier.drained_mutex.lock();
            self.barrier.drained.notify_all();
        }
    }
}

/// Exclusive teardown rights. Reopens the barrier on drop.
#[must_use = "the barrier reopens as soon as the guard drops"]
pub struct DestroyGuard<'a> {
    barrier: &'a DestroyBarrier,
}

impl Drop for DestroyGuard<'_> {
    fn drop(&mut self) {
        self.barrier.destroying.store(false, BARRIER_ORD);
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Fail fast in tests")]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_enter_and_release() {
        let barrier = DestroyBarrier::new();
        {
            let _a = barrier.enter().unwrap();
            let _b = barrier.enter().unwrap();
            assert_eq!(barrier.in_flight(), 2);
        }
        assert_eq!(barrier.in_flight(), 0);
    }

    #[test]
    fn test_enter_fails_while_destroying() {
        let barrier = DestroyBarrier::new();
        let destroy = barrier.begin_destroy().unwrap();

        assert_eq!(barrier.enter().err(), Some(TreeError::TreeDestroying));
        assert_eq!(barrier.in_flight(), 0);

        drop(destroy);
        assert!(barrier.enter().is_ok());
    }

    #[test]
    fn test_single_destroy_at_a_time() {
        let barrier = DestroyBarrier::new();
        let _destroy = barrier.begin_destroy().unwrap();

        assert_eq!(
            barrier.begin_destroy().err(),
            Some(TreeError::DestroyInProgress)
        );
    }

    #[test]
    fn test_destroy_waits_for_in_flight() {
        let barrier = Arc::new(DestroyBarrier::new());
        let finished = Arc::new(AtomicBool::new(false));

        let op = barrier.enter().unwrap();

        let destroyer = {
            let barrier = Arc::clone(&barrier);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let _destroy = barrier.begin_destroy().unwrap();
                // The operation must have completed before we get here.
                assert!(finished.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(barrier.is_destroying());
        finished.store(true, Ordering::SeqCst);
        drop(op);

        destroyer.join().unwrap();
        assert!(!barrier.is_destroying());
    }
}
