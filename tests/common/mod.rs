//! Shared fixtures and tracing setup for the integration tests.
//!
//! Call [`init_tracing`] at the top of a test to capture the tree's own
//! events. They only exist when the crate is built with `--features tracing`:
//!
//! ```bash
//! RUST_LOG=assoctree=debug cargo test --features tracing --test stress_tests
//! ```
//!
//! Events go to the console (unless `ASSOCTREE_LOG_CONSOLE=0`) and, as one
//! JSON object per line, to `assoctree.jsonl` under `ASSOCTREE_LOG_DIR`
//! (default `logs/`). Create and delete events carry the record id, so one
//! record can be followed with
//! `jq 'select(.fields.id == "id-00000000000000000007")'`.

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::sync::Once;

use assoctree::{AssociativeTree, Record, SequentialIdGenerator, Tuple};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE: &str = "assoctree.jsonl";

static INIT: Once = Once::new();

/// Install the test subscriber. Only the first call has an effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

fn make_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[expect(clippy::expect_used)]
fn setup_tracing() {
    let log_dir = env::var("ASSOCTREE_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_owned());
    std::fs::create_dir_all(&log_dir).expect("Failed to create log directory");

    // Append: nextest runs each test in its own process.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(std::path::Path::new(&log_dir).join(LOG_FILE))
        .expect("Failed to open log file");

    let console_enabled = !env::var("ASSOCTREE_LOG_CONSOLE").is_ok_and(|v| v == "0");
    let console_layer = console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_filter(make_filter())
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .with_filter(make_filter());

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// ============================================================================
//  Fixtures
// ============================================================================

/// A tree with deterministic ids (`id-00000000000000000000`, ...), so id
/// order equals creation order.
pub fn sequential_tree<T>() -> AssociativeTree<T> {
    AssociativeTree::with_id_generator(SequentialIdGenerator::default())
}

/// Build a tuple of `u32` values.
pub fn tuple(pairs: &[(&str, u32)]) -> Tuple {
    pairs.iter().map(|&(key, value)| (key, value)).collect()
}

/// Collect the payloads of every record matched by a visiting operation.
pub fn collect<T: Clone>(visit: impl FnOnce(&mut dyn FnMut(&Record<T>) -> bool)) -> Vec<T> {
    let mut out = Vec::new();
    visit(&mut |record: &Record<T>| {
        out.push(record.payload().clone());
        true
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        init_tracing();
        tracing::debug!(id = "id-00000000000000000000", arity = 2, "record created");
    }
}
