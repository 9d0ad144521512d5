use crate::error::BenchError;
use crate::metrics::{Ranked, TrialStatistics};
use crate::source::DType;
use crate::space::Configuration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of benchmarking one Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// All repetitions completed
    Succeeded,
    /// Rejected by the backend before any trial ran
    Failed,
    /// A trial failed; statistics cover the trials that completed, if any
    PartiallyFailed,
}

impl ResultStatus {
    /// Status of a Configuration that ended with `err`.
    ///
    /// A rejection means nothing was attempted; any other error interrupted
    /// the trials, even if none had completed yet.
    pub fn from_failure(err: &BenchError) -> Self {
        match err {
            BenchError::BackendRejection(_) | BenchError::Configuration(_) => ResultStatus::Failed,
            _ => ResultStatus::PartiallyFailed,
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Succeeded => write!(f, "succeeded"),
            ResultStatus::Failed => write!(f, "failed"),
            ResultStatus::PartiallyFailed => write!(f, "partially_failed"),
        }
    }
}

/// Finalized record for one Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationResult {
    /// Position of the Configuration in the sweep, starting at 0
    pub index: usize,
    pub configuration: Configuration,
    pub status: ResultStatus,
    pub failure_reason: Option<String>,
    pub repetitions: usize,
    pub trials_completed: usize,
    pub durations_s: Vec<f64>,
    pub statistics: Option<TrialStatistics>,
}

impl ConfigurationResult {
    /// Build a record from the trials that ran and an optional failure.
    pub fn new(
        index: usize,
        configuration: Configuration,
        repetitions: usize,
        durations_s: Vec<f64>,
        statistics: Option<TrialStatistics>,
        failure: Option<BenchError>,
    ) -> Self {
        let status = failure
            .as_ref()
            .map_or(ResultStatus::Succeeded, ResultStatus::from_failure);
        Self {
            index,
            configuration,
            status,
            failure_reason: failure.map(|e| e.to_string()),
            repetitions,
            trials_completed: durations_s.len(),
            durations_s,
            statistics,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ResultStatus::Succeeded
    }

    pub fn mean_s(&self) -> Option<f64> {
        self.statistics.as_ref().map(|s| s.mean_s)
    }

    pub fn std_dev_s(&self) -> Option<f64> {
        self.statistics.as_ref().map(|s| s.std_dev_s)
    }

    pub fn throughput_bps(&self) -> Option<f64> {
        self.statistics.as_ref().map(|s| s.throughput_bps)
    }
}

/// Everything a sweep produced, in sweep order
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub results: Vec<ConfigurationResult>,
    /// Fastest succeeded Configurations, fastest first
    pub top: Vec<Ranked<ConfigurationResult>>,
    /// Configurations excluded by cross-axis validation
    pub excluded: usize,
    /// Stopped early by the operator
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl Run {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }
}

/// Source description recorded alongside the results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: Option<PathBuf>,
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub bytes: u64,
}

/// Host details for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Top-level document written to the output file
#[derive(Debug, Serialize)]
pub struct FinalResults<'a> {
    pub metadata: RunMetadata,
    pub results: &'a [ConfigurationResult],
    pub top: &'a [Ranked<ConfigurationResult>],
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub backend: String,
    pub repetitions: usize,
    pub source: SourceInfo,
    pub system_info: SystemInfo,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_tests: usize,
    pub failed_tests: usize,
    pub excluded_tests: usize,
    pub interrupted: bool,
    pub elapsed_s: f64,
    pub fastest: Option<Configuration>,
    pub fastest_mean_s: Option<f64>,
}

const CSV_HEADER: [&str; 14] = [
    "index",
    "status",
    "trials",
    "mean write time (s)",
    "write std.dev (s)",
    "throughput (B/s)",
    "dtype",
    "zarr version",
    "clevel",
    "compressor",
    "shuffle",
    "chunk size",
    "endianness",
    "failure",
];

fn csv_row(result: &ConfigurationResult, dtype: DType) -> [String; 14] {
    let config = &result.configuration;
    let number = |v: Option<f64>| v.map(|x| format!("{:.6}", x)).unwrap_or_default();
    [
        result.index.to_string(),
        result.status.to_string(),
        result.trials_completed.to_string(),
        number(result.mean_s()),
        number(result.std_dev_s()),
        number(result.throughput_bps()),
        dtype.v2_code(config.endianness()),
        config.zarr_version().to_string(),
        config.clevel().to_string(),
        config.compressor().to_string(),
        config.shuffle().to_string(),
        config.chunk_shape().to_string(),
        config.endianness().to_string(),
        result.failure_reason.clone().unwrap_or_default(),
    ]
}

/// Persists Configuration Results as they arrive and at the end of a run.
///
/// Three outputs, each optional:
/// - a streaming JSON array, appended to after every Configuration,
/// - a CSV file, one row per Configuration, also written incrementally,
/// - a final JSON document with metadata, every result and the ranking.
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    streaming_file: Option<PathBuf>,
    csv_writer: Option<csv::Writer<File>>,
    streamed: usize,
    run_id: String,
    source: SourceInfo,
    backend: String,
    repetitions: usize,
}

impl ResultsManager {
    pub fn new(
        output_file: Option<&Path>,
        source: SourceInfo,
        backend: &str,
        repetitions: usize,
    ) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            streaming_file: None,
            csv_writer: None,
            streamed: 0,
            run_id: uuid::Uuid::new_v4().to_string(),
            source,
            backend: backend.to_string(),
            repetitions,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stream each result into a JSON array at `path`
    pub fn enable_streaming<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create streaming file {:?}", path))?;
        writeln!(file, "[")?;

        debug!("Enabled streaming to: {:?}", path);
        self.streaming_file = Some(path);
        Ok(())
    }

    /// Write one CSV row per result to `path`, overwriting it
    pub fn enable_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file {:?}", path))?;
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        debug!("Enabled CSV output to: {:?}", path);
        self.csv_writer = Some(writer);
        Ok(())
    }

    /// Persist one finished Configuration
    pub fn record(&mut self, result: &ConfigurationResult) -> Result<()> {
        if let Some(ref streaming_file) = self.streaming_file {
            let mut file = OpenOptions::new().append(true).open(streaming_file)?;
            if self.streamed > 0 {
                writeln!(file, ",")?;
            }
            let json = serde_json::to_string_pretty(result)?;
            write!(file, "{}", json)?;
            file.flush()?;
        }

        // Flushed per row so an interrupted sweep still leaves a usable file.
        if let Some(ref mut writer) = self.csv_writer {
            writer.write_record(csv_row(result, self.source.dtype))?;
            writer.flush()?;
        }

        self.streamed += 1;
        Ok(())
    }

    /// Close the streaming array and write the final document.
    pub fn finalize(&mut self, run: &Run) -> Result<()> {
        if let Some(ref streaming_file) = self.streaming_file {
            let mut file = OpenOptions::new().append(true).open(streaming_file)?;
            writeln!(file, "\n]")?;
            file.flush()?;
        }

        if let Some(ref output_file) = self.output_file {
            let json = serde_json::to_string_pretty(&self.final_results(run))?;
            std::fs::write(output_file, json)
                .with_context(|| format!("Failed to write results to {:?}", output_file))?;
            info!("Results written to: {:?}", output_file);
        }
        Ok(())
    }

    fn final_results<'a>(&self, run: &'a Run) -> FinalResults<'a> {
        let fastest = run.top.first();
        FinalResults {
            metadata: RunMetadata {
                run_id: self.run_id.clone(),
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                backend: self.backend.clone(),
                repetitions: self.repetitions,
                source: self.source.clone(),
                system_info: SystemInfo::default(),
            },
            results: &run.results,
            top: &run.top,
            summary: RunSummary {
                total_tests: run.results.len(),
                failed_tests: run.failed_count(),
                excluded_tests: run.excluded,
                interrupted: run.interrupted,
                elapsed_s: run.elapsed.as_secs_f64(),
                fastest: fastest.map(|r| r.item.configuration.clone()),
                fastest_mean_s: fastest.map(|r| r.mean_s),
            },
        }
    }
}
