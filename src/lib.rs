//! # Zarr Write Benchmark Library
//!
//! Measures how fast a chunked array can be written to local storage under
//! many combinations of storage parameters, and ranks the combinations so the
//! operator can pick the fastest one for their machine and dataset.
//!
//! ## Swept Parameters
//!
//! - **Container format**: Zarr v2 or v3
//! - **Compression**: blosc compressor and level
//! - **Shuffle**: none, byte or bit shuffle
//! - **Chunk shape**: explicit, or suggested from the source shape
//! - **Endianness**: big, little, or none for 1-byte elements
//!
//! ## Architecture Overview
//!
//! - `axis`: per-axis parsing, validation and default candidate sets
//! - `chunking`: deterministic chunk-shape suggestions
//! - `space`: the lazy cross product of all axes, with cross-axis constraints
//! - `backend`: the storage seam (`StorageBackend`) and the Zarr implementation
//! - `benchmark`: the sequential trial executor
//! - `metrics`: trial statistics and the running top-K ranking
//! - `results`: result records and JSON / CSV persistence
//! - `cli`, `logging`, `utils`: command line, tracing setup, formatting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use zarr_write_bench::{
//!     AxisInputs, BenchmarkConfig, BenchmarkRunner, ChunkHeuristic, DType, ParameterSpace,
//!     SourceDescriptor, ZarrBackend,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = SourceDescriptor::load_raw(
//!         "frames.raw".as_ref(),
//!         DType::UInt16,
//!         vec![512, 1080, 1920],
//!     )?;
//!     let inputs = AxisInputs {
//!         compressors: Some("lz4,zstd".to_string()),
//!         ..Default::default()
//!     };
//!     let space = ParameterSpace::resolve(
//!         source.shape(),
//!         source.dtype(),
//!         &inputs,
//!         ChunkHeuristic::default(),
//!     )?;
//!
//!     let mut backend = ZarrBackend::new("/mnt/scratch/zarr-write-bench");
//!     let runner = BenchmarkRunner::new(BenchmarkConfig::default());
//!     let run = runner.run(&space, &source, &mut backend, &AtomicBool::new(false), |_, _| Ok(()))?;
//!
//!     if let Some(best) = run.top.first() {
//!         println!("Fastest: {} ({:.2}s)", best.item.configuration, best.mean_s);
//!     }
//!     Ok(())
//! }
//! ```

pub mod axis;

/// Storage backends behind the `StorageBackend` trait
pub mod backend;

/// Sequential benchmark executor
///
/// Contains `BenchmarkRunner` and `BenchmarkConfig`. Handles warm-up, the
/// delete/recreate/write trial cycle, failure classification and the stop
/// flag.
pub mod benchmark;

pub mod chunking;

/// Command-line interface
///
/// clap derive arguments; converts the per-axis options into the raw
/// `AxisInputs` consumed by the axis resolver.
pub mod cli;

pub mod error;
pub mod logging;

/// Trial statistics (mean, sample standard deviation, throughput) and the
/// bounded top-K ranking
pub mod metrics;

/// Result records and output management
///
/// Supports a final JSON document with run metadata, a streaming JSON array
/// appended after every Configuration and a CSV file.
pub mod results;

pub mod source;
pub mod space;
pub mod utils;

pub use axis::AxisInputs;
pub use backend::{BackendError, StorageBackend, ZarrBackend};
pub use benchmark::{BenchmarkConfig, BenchmarkRunner};
pub use chunking::{suggest_chunk_shapes, ChunkHeuristic};
pub use cli::Args;
pub use error::{BenchError, BenchResult};
pub use results::{ConfigurationResult, ResultStatus, ResultsManager, Run};
pub use source::{DType, SourceDescriptor};
pub use space::{Configuration, ParameterSpace};

/// Current version of the benchmark tool
///
/// Recorded in result metadata so results from different versions can be
/// told apart.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Default number of timed trials per Configuration
    ///
    /// Three is the smallest count that gives a meaningful standard
    /// deviation without tripling the sweep time again.
    pub const REPETITIONS: usize = 3;

    /// Default compression levels
    ///
    /// Capped at 5: higher levels are CPU-bound rather than I/O-bound and
    /// rarely change the write-speed ranking.
    pub const CLEVELS: &[u8] = &[1, 2, 3, 5];

    /// Default ranking size
    pub const TOP_K: usize = 3;

    /// Default untimed warm-up writes
    pub const WARMUP_TRIALS: usize = 1;

    /// Scratch directory created under `--dest`
    pub const DEST_SUBDIR: &str = "zarr-write-bench";

    /// Default output file name
    pub const OUTPUT_FILE: &str = "benchmark_results.json";
}
