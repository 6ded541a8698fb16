//! Lock Contention Profiling Binary
//!
//! Drives overlapping create-or-find / delete churn against one tree so that
//! many threads fight over the same ID nodes, then reports operation latency
//! outliers and the tree's debug counters. When tracing is enabled, slow
//! operations are written to a JSON log alongside the tree's own events.
//!
//! Run with:
//! ```bash
//! # Without tracing (fast, just stats)
//! cargo run --release --features mimalloc --bin lock_contention
//!
//! # With tracing (writes to logs/lock_contention.json)
//! RUST_LOG=assoctree=warn,lock_contention=warn cargo run --release --features "mimalloc,tracing" --bin lock_contention
//!
//! # View slow operations:
//! rg "SLOW_OP" logs/lock_contention.json
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use assoctree::{AssociativeTree, DebugCounters, Tuple};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(feature = "tracing")]
type TracingGuard = tracing_appender::non_blocking::WorkerGuard;

#[cfg(not(feature = "tracing"))]
type TracingGuard = ();

// =============================================================================
// Custom Tracing Initialization (JSON to file)
// =============================================================================

#[cfg(feature = "tracing")]
fn init_json_tracing() -> TracingGuard {
    use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = "logs";
    let filter_str = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "assoctree=warn,lock_contention=warn".to_string());

    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::never(log_dir, "lock_contention.json");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_thread_ids(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json()
        .with_filter(EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("warn")));

    let _ = tracing_subscriber::registry().with(file_layer).try_init();

    println!("Tracing enabled: logs/lock_contention.json (filter: {filter_str})");

    guard
}

#[cfg(not(feature = "tracing"))]
fn init_json_tracing() -> TracingGuard {
    println!("Tracing disabled (compile with --features tracing)");
}

// =============================================================================
// Operation Stats (Thread-Local + Aggregation)
// =============================================================================

/// Per-thread operation timing statistics
#[derive(Default)]
struct ThreadOpStats {
    /// Longest operation overall
    max_op_ns: u64,

    /// Number of slow ops (>1ms)
    slow_ops_1ms: u64,

    /// Number of very slow ops (>10ms)
    slow_ops_10ms: u64,

    /// Number of extremely slow ops (>100ms)
    slow_ops_100ms: u64,

    /// Records this thread created
    created: u64,

    /// Records this thread removed
    deleted: u64,
}

impl ThreadOpStats {
    const fn record_op(&mut self, op_ns: u64) {
        if op_ns > self.max_op_ns {
            self.max_op_ns = op_ns;
        }

        if op_ns > 1_000_000 {
            self.slow_ops_1ms += 1;
        }

        if op_ns > 10_000_000 {
            self.slow_ops_10ms += 1;
        }

        if op_ns > 100_000_000 {
            self.slow_ops_100ms += 1;
        }
    }

    const fn merge(&mut self, other: &Self) {
        if other.max_op_ns > self.max_op_ns {
            self.max_op_ns = other.max_op_ns;
        }

        self.slow_ops_1ms += other.slow_ops_1ms;
        self.slow_ops_10ms += other.slow_ops_10ms;
        self.slow_ops_100ms += other.slow_ops_100ms;
        self.created += other.created;
        self.deleted += other.deleted;
    }
}

// =============================================================================
// Benchmark Runner
// =============================================================================

struct BenchmarkConfig {
    threads: usize,
    ops_per_thread: usize,
    /// Distinct values per key; fewer means more threads share an ID node.
    value_space: u32,
}

struct RunResult {
    elapsed: Duration,
    stats: ThreadOpStats,
    remaining: usize,
    debug: DebugCounters,
}

/// Tuples overlap on `group` and `slot`, so concurrent writers contend on
/// the same ID nodes and prune each other's empty levels.
fn churn_tuple(i: usize, value_space: u32) -> Tuple {
    let i = i as u32;
    Tuple::new()
        .with("group", i % 4)
        .with("slot", (i / 4) % value_space)
}

fn run_benchmark(config: &BenchmarkConfig) -> RunResult {
    let tree = Arc::new(AssociativeTree::<u64>::new());

    assoctree::reset_debug_counters();

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let tree = Arc::clone(&tree);
            let ops = config.ops_per_thread;
            let value_space = config.value_space;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();
                let base = t * ops;

                for i in 0..ops {
                    let tuple = churn_tuple(base + i, value_space);
                    let payload = (base + i) as u64;

                    let op_start = Instant::now();
                    if i % 2 == 0 {
                        let mut created = false;
                        let _ = tree.create_or_find(
                            &tuple,
                            || {
                                created = true;
                                Some(payload)
                            },
                            |_| {},
                        );
                        if created {
                            stats.created += 1;
                        }
                    } else if tree.delete(&tuple, |_| true).unwrap_or(false) {
                        stats.deleted += 1;
                    }
                    let op_elapsed = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_elapsed);

                    if op_elapsed > 10_000_000 {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            thread = t,
                            op_index = i,
                            arity = tuple.len(),
                            elapsed_ms = op_elapsed as f64 / 1_000_000.0,
                            "SLOW_OP"
                        );

                        #[cfg(not(feature = "tracing"))]
                        eprintln!(
                            "[T{:02}] SLOW_OP: i={} took {:.2}ms",
                            t,
                            i,
                            op_elapsed as f64 / 1_000_000.0
                        );
                    }
                }

                stats
            })
        })
        .collect();

    let mut merged = ThreadOpStats::default();
    for h in handles {
        let thread_stats = h.join().unwrap();
        merged.merge(&thread_stats);
    }

    let elapsed = start.elapsed();
    let remaining = tree.len();
    tree.check_invariants().unwrap();

    RunResult {
        elapsed,
        stats: merged,
        remaining,
        debug: assoctree::get_all_debug_counters(),
    }
}

fn print_stats(config: &BenchmarkConfig, result: &RunResult, baseline: Duration) {
    let elapsed = result.elapsed;
    let stats = &result.stats;
    let debug = result.debug;

    let total_ops = config.threads * config.ops_per_thread;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("\n{}", "=".repeat(80));
    println!(
        "RESULTS: {} threads x {} ops = {} total ({} values per key)",
        config.threads, config.ops_per_thread, total_ops, config.value_space
    );
    println!("{}", "=".repeat(80));

    println!("\n--- Timing ---");
    println!("Elapsed:     {elapsed:?}");
    println!("Throughput:  {ops_per_sec:.0} ops/sec");

    println!("\n--- Operation Latency ---");
    println!(
        "Max op:      {:.2} ms",
        stats.max_op_ns as f64 / 1_000_000.0
    );
    println!("Slow >1ms:   {}", stats.slow_ops_1ms);
    println!("Slow >10ms:  {}", stats.slow_ops_10ms);
    println!("Slow >100ms: {}", stats.slow_ops_100ms);

    println!("\n--- Records ---");
    println!("Created:     {}", stats.created);
    println!("Deleted:     {}", stats.deleted);
    println!("Remaining:   {}", result.remaining);

    println!("\n--- Debug Counters ---");
    println!("Creates:            {}", debug.create);
    println!("Create conflicts:   {}", debug.create_conflict);
    println!("Create rollbacks:   {}", debug.create_rollback);
    println!("Deletes:            {}", debug.delete);
    println!("Delete vetoes:      {}", debug.delete_veto);
    println!("Pruned ID nodes:    {}", debug.pruned_id_node);
    println!("Pruned value nodes: {}", debug.pruned_values_node);

    if stats.created as usize != stats.deleted as usize + result.remaining {
        println!("\n!!! Created != deleted + remaining, inspect logs");
    }

    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let baseline_ms = baseline.as_secs_f64() * 1000.0;
    if baseline_ms > 0.0 && elapsed_ms > baseline_ms * 3.0 {
        let ratio = elapsed_ms / baseline_ms;
        println!("\n!!! OUTLIER DETECTED: This run was ~{ratio:.1}x slower than median");
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let _guard = init_json_tracing();

    println!("Lock Contention Profiling");
    println!("=========================\n");

    let configs = vec![
        BenchmarkConfig {
            threads: 16,
            ops_per_thread: 50_000,
            value_space: 8,
        },
        BenchmarkConfig {
            threads: 16,
            ops_per_thread: 50_000,
            value_space: 1024,
        },
    ];

    for config in &configs {
        println!(
            "\nRunning: {} threads x {} ops ({} values per key)...",
            config.threads, config.ops_per_thread, config.value_space
        );

        let mut results: Vec<RunResult> = Vec::new();
        for run in 1..=5 {
            print!("  Run {run}/5... ");
            std::io::Write::flush(&mut std::io::stdout()).unwrap();

            let result = run_benchmark(config);
            println!("{:?}", result.elapsed);

            results.push(result);
        }

        let baseline = {
            let mut sorted: Vec<Duration> = results.iter().map(|result| result.elapsed).collect();
            sorted.sort_by_key(Duration::as_nanos);
            sorted[sorted.len() / 2]
        };

        let (slowest_idx, slowest_result) = results
            .iter()
            .enumerate()
            .max_by_key(|(_, result)| result.elapsed.as_nanos())
            .unwrap();

        println!("\n>>> Slowest run was #{} <<<", slowest_idx + 1);
        println!("Baseline (median) run: {baseline:?}");
        print_stats(config, slowest_result, baseline);

        let (fastest_idx, fastest_result) = results
            .iter()
            .enumerate()
            .min_by_key(|(_, result)| result.elapsed.as_nanos())
            .unwrap();

        println!(
            "\nFastest run #{}: {:?} (ratio: {:.1}x)",
            fastest_idx + 1,
            fastest_result.elapsed,
            slowest_result.elapsed.as_secs_f64() / fastest_result.elapsed.as_secs_f64()
        );
    }
}
