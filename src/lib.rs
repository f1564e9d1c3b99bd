//! `cascade-sort` simulates external sorting on a fixed number of sequential
//! storage devices ("tapes") with bounded working memory.
//!
//! Sorting a stream that does not fit in memory proceeds in two stages. First,
//! **replacement selection** pushes the stream through a bounded min-heap and
//! emits the longest ascending runs obtainable from that buffer. Second, a
//! **cascade merge** lays the runs out over the tapes following an ideal
//! distribution (a generalized Fibonacci recurrence, padded with dummy runs)
//! and repeatedly merges all non-output tapes into the output tape, rotating
//! the output role, until one fully sorted run remains. The simulation keeps
//! every tape in memory and reports classical cost metrics: write
//! amplification (alpha) and per-phase load factor (beta).
//!
//! # Overview
//!
//! `cascade-sort` supports the following features:
//!
//! * **Record agnostic:**
//!   any `Ord` record type can be sorted; the bundled CLI works on `i64`.
//! * **Lazy run generation:**
//!   [`SelectionHeap`] is an iterator, so runs can be inspected one at a time
//!   without materializing the whole partition.
//! * **Phase observation:**
//!   an observer hook receives a read-only tape snapshot after every merge
//!   phase, for printing or analysis, without influencing the engine.
//! * **Merge accounting:**
//!   per-phase write counts and run statistics are collected and exposed as
//!   the alpha and beta metrics.
//!
//! # Example
//!
//! ```
//! use cascade_sort::CascadeMergeEngine;
//!
//! let records = vec![7, 1, 5, 6, 3, 8, 2, 10, 4, 9];
//!
//! let mut engine = CascadeMergeEngine::new(records, 3, 5).unwrap();
//! let sorted = engine.run_to_completion().unwrap();
//!
//! assert_eq!(sorted, (1..=10).collect::<Vec<i64>>());
//! println!("write amplification: {:.2}", engine.alpha());
//! ```

pub mod distribution;
pub mod engine;
pub mod heap;
pub mod metrics;
pub mod tape;

pub use distribution::{ideal_distribution, pad_with_dummies, DistributionError};
pub use engine::{CascadeMergeEngine, CascadeMergeEngineBuilder, PhaseObserver, SortError};
pub use heap::{generate_runs, HeapError, SelectionHeap};
pub use metrics::MetricsCollector;
pub use tape::{Run, TapeError, TapeSet};
