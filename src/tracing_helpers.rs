//! Logging macros that vanish without the `tracing` feature.
//!
//! `trace_log!`, `debug_log!`, `warn_log!` and `error_log!` forward to the
//! matching `tracing` macro when the feature is on and expand to nothing
//! otherwise, so the default build carries no logging code.
//!
//! # What the tree emits
//!
//! Spans (feature-gated `#[instrument]`, `debug` unless noted):
//! - `create`, `create_or_find`, `delete`, `match_permutations` with `arity`
//! - `create_with_id` with `id` and `arity`, `destroy_by_id` with `id`
//! - `destroy_all`, `query`
//! - `get` at `trace`, with `arity`
//!
//! Events:
//! - `debug`: record created / deleted (`id`, `arity`), create races lost,
//!   destroy_all start, veto and drain waits
//! - `trace`: node locking on create, values-node pruning, query and
//!   permutation match results
//! - `warn`: `match_permutations` on a tuple large enough to make subset
//!   enumeration expensive
//! - `error`: an index invariant violation, just before the panic
//!
//! ```bash
//! RUST_LOG=assoctree::tree=debug cargo test --features tracing --test stress_tests
//! ```

#![allow(unused_macros, unused_imports)]

/// Trace-level logging (most verbose). Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Debug-level logging. Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Warn-level logging. Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_log {
    ($($arg:tt)*) => {};
}

/// Error-level logging. Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! error_log {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! error_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use error_log;
pub(crate) use trace_log;
pub(crate) use warn_log;
