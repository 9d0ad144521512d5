use crate::axis::AxisInputs;
use crate::chunking::ChunkHeuristic;
use crate::source::DType;
use clap::Parser;
use std::path::PathBuf;

/// Zarr Write Benchmark - finds the fastest storage parameters for writing an
/// array to this machine's disk
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Raw array dump to write (native byte order, C order)
    #[clap(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory to benchmark in; a scratch array is written (and deleted)
    /// under it on every trial
    #[clap(short = 'd', long, help_heading = "Core Options")]
    pub dest: PathBuf,

    /// Element type of the source
    #[clap(long, value_enum, help_heading = "Core Options")]
    pub dtype: DType,

    /// Source shape, x-delimited (e.g. 1920x1080x512)
    #[clap(long, help_heading = "Core Options")]
    pub shape: String,

    /// Compression levels to try, comma-separated (0-9)
    #[clap(long, help_heading = "Parameter Space")]
    pub clevel: Option<String>,

    /// Blosc compressors to try (blosclz, lz4, lz4hc, snappy, zlib, zstd)
    #[clap(long, help_heading = "Parameter Space")]
    pub compressor: Option<String>,

    /// Shuffle filters to try (none, byte, bit, auto)
    #[clap(long, help_heading = "Parameter Space")]
    pub shuffle: Option<String>,

    /// Byte orders to try (big, little, none); "none" needs a 1-byte dtype
    #[clap(long, help_heading = "Parameter Space")]
    pub endianness: Option<String>,

    /// Zarr format versions to try (2, 3)
    #[clap(long, help_heading = "Parameter Space")]
    pub zarr_version: Option<String>,

    /// Chunk shapes to try: shapes separated by ',', dimensions by 'x'
    /// (e.g. 64x64x64,128x128x128). Suggested automatically when omitted.
    #[clap(long, help_heading = "Parameter Space")]
    pub chunk_size: Option<String>,

    /// Keep the last two axes whole in suggested chunk shapes
    #[clap(long, default_value_t = false, help_heading = "Parameter Space")]
    pub full_frame_chunks: bool,

    /// Timed trials per configuration
    #[clap(short = 'r', long, default_value_t = crate::defaults::REPETITIONS, help_heading = "Timing")]
    pub repetitions: usize,

    /// Untimed writes before the first configuration
    #[clap(short = 'w', long, default_value_t = crate::defaults::WARMUP_TRIALS, help_heading = "Timing")]
    pub warmup_trials: usize,

    /// Number of fastest configurations to report
    #[clap(long, default_value_t = crate::defaults::TOP_K, help_heading = "Timing")]
    pub top: usize,

    /// Print the suggested chunk shapes and parameter space, then exit
    #[clap(long, default_value_t = false)]
    pub suggest_only: bool,

    /// Output file for the final results (JSON format)
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE, help_heading = "Output")]
    pub output_file: PathBuf,

    /// JSON output file appended to after every configuration
    #[clap(long, help_heading = "Output")]
    pub streaming_output: Option<PathBuf>,

    /// CSV file with one row per configuration (overwritten)
    #[clap(long, help_heading = "Output")]
    pub save_csv: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, help_heading = "Output")]
    pub verbose: u8,

    /// Also write logs to this file
    #[clap(long, help_heading = "Output")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// The raw per-axis strings, as the axis resolver expects them
    pub fn axis_inputs(&self) -> AxisInputs {
        AxisInputs {
            zarr_versions: self.zarr_version.clone(),
            clevels: self.clevel.clone(),
            compressors: self.compressor.clone(),
            shuffles: self.shuffle.clone(),
            chunk_sizes: self.chunk_size.clone(),
            endiannesses: self.endianness.clone(),
        }
    }

    pub fn heuristic(&self) -> ChunkHeuristic {
        ChunkHeuristic {
            full_frame: self.full_frame_chunks,
        }
    }

    /// Scratch directory the trials write into
    pub fn bench_dest(&self) -> PathBuf {
        self.dest.join(crate::defaults::DEST_SUBDIR)
    }
}
