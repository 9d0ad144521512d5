//! # Benchmark Executor
//!
//! This module drives the sweep: it walks the parameter space in order, runs
//! repeated timed write trials for each valid Configuration, finalizes the
//! statistics and keeps the running top-K ranking.
//!
//! ## Trial Lifecycle
//!
//! For every Configuration:
//!
//! 1. **Open**: the backend checks it can realize the Configuration. A
//!    rejection marks the Configuration failed with zero trials.
//! 2. **Warm-up** (first opened Configuration only): untimed writes whose
//!    durations are discarded.
//! 3. **Trials**: R times, delete and recreate the destination, start the
//!    timer, write the whole source, stop the timer once the write returns.
//! 4. **Finalize**: compute mean, sample standard deviation and throughput,
//!    offer the result to the ranking, hand it to the caller.
//!
//! An I/O failure in a trial abandons that Configuration's remaining trials
//! and marks it partially failed. No failure of one Configuration stops the
//! sweep.
//!
//! ## Scheduling
//!
//! Everything runs sequentially on the calling thread. Concurrent writes to
//! one disk would distort the timings, so there is no parallelism here. The
//! stop flag is polled between Configurations, never during a trial.

use crate::backend::{BackendError, StorageBackend};
use crate::cli::Args;
use crate::error::BenchError;
use crate::metrics::{Ranking, TrialCollector};
use crate::results::{ConfigurationResult, Run};
use crate::source::SourceDescriptor;
use crate::space::{Configuration, ParameterSpace};
use crate::utils::{create_progress_indicator, format_duration, format_rate};
use anyhow::{bail, Result};
use colored::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Sweep-wide settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Timed trials per Configuration (R)
    pub repetitions: usize,

    /// Untimed writes before the first measured Configuration
    ///
    /// The first write into a cold destination is often much slower than
    /// the rest, so it is run and thrown away.
    pub warmup_trials: usize,

    /// Size of the running ranking (K)
    pub top_k: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            repetitions: crate::defaults::REPETITIONS,
            warmup_trials: crate::defaults::WARMUP_TRIALS,
            top_k: crate::defaults::TOP_K,
        }
    }
}

impl BenchmarkConfig {
    /// Build the sweep settings from parsed arguments.
    ///
    /// ## Validation
    /// - At least one repetition is required; zero would produce results
    ///   with no timings at all.
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.repetitions == 0 {
            bail!("--repetitions must be at least 1");
        }
        Ok(Self {
            repetitions: args.repetitions,
            warmup_trials: args.warmup_trials,
            top_k: args.top,
        })
    }
}

const PROGRESS_WIDTH: usize = 20;

/// Header line logged before each Configuration
struct ProgressHeader<'a> {
    position: usize,
    total: usize,
    config: &'a Configuration,
}

impl std::fmt::Display for ProgressHeader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let percent = if self.total > 0 {
            100.0 * self.position as f64 / self.total as f64
        } else {
            0.0
        };
        write!(
            f,
            "Configuration {}/{} ({:.1}%): {}",
            self.position + 1,
            self.total,
            percent,
            self.config
        )
    }
}

/// Runs a sweep over a [`ParameterSpace`] against one storage backend.
///
/// ## Usage Pattern
///
/// ```rust,no_run
/// # use zarr_write_bench::axis::AxisInputs;
/// # use zarr_write_bench::backend::ZarrBackend;
/// # use zarr_write_bench::benchmark::{BenchmarkConfig, BenchmarkRunner};
/// # use zarr_write_bench::chunking::ChunkHeuristic;
/// # use zarr_write_bench::source::{DType, SourceDescriptor};
/// # use zarr_write_bench::space::ParameterSpace;
/// # use std::sync::atomic::AtomicBool;
/// # fn main() -> anyhow::Result<()> {
/// let source = SourceDescriptor::new(DType::UInt8, vec![64, 64], vec![0; 4096])?;
/// let space = ParameterSpace::resolve(
///     source.shape(),
///     source.dtype(),
///     &AxisInputs::default(),
///     ChunkHeuristic::default(),
/// )?;
/// let mut backend = ZarrBackend::new("/tmp/zarr-write-bench");
/// let stop = AtomicBool::new(false);
///
/// let runner = BenchmarkRunner::new(BenchmarkConfig::default());
/// let run = runner.run(&space, &source, &mut backend, &stop, |_, _| Ok(()))?;
/// println!("{} configurations measured", run.results.len());
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the whole sweep.
    ///
    /// `on_result` is called once per finished Configuration, in sweep order,
    /// with a flag telling whether it is the new fastest. After its first
    /// error (e.g. the streaming file became unwritable) it is logged and no
    /// longer called; the sweep itself carries on.
    ///
    /// Returns every Configuration Result gathered, including when `stop`
    /// was raised part way through.
    pub fn run<F>(
        &self,
        space: &ParameterSpace,
        source: &SourceDescriptor,
        backend: &mut dyn StorageBackend,
        stop: &AtomicBool,
        mut on_result: F,
    ) -> Result<Run>
    where
        F: FnMut(&ConfigurationResult, bool) -> Result<()>,
    {
        let started = Instant::now();
        let total = space.num_valid();
        let mut ranking: Ranking<ConfigurationResult> = Ranking::new(self.config.top_k);
        let mut results = Vec::new();
        let mut excluded = 0;
        let mut warned_reasons = HashSet::new();
        let mut warmed_up = self.config.warmup_trials == 0;
        let mut interrupted = false;
        let mut sink_ok = true;

        info!(
            "Benchmarking {} configurations with the {} backend, {} repetitions each",
            total,
            backend.name(),
            self.config.repetitions
        );

        for checked in space.iter_checked() {
            // Cooperative stop: only ever between Configurations.
            if stop.load(Ordering::SeqCst) {
                warn!(
                    "Stop requested; ending sweep after {} of {} configurations",
                    results.len(),
                    total
                );
                interrupted = true;
                break;
            }

            let config = match checked {
                Ok(config) => config,
                Err(err) => {
                    // Invalid combination: count it, warn once per reason.
                    excluded += 1;
                    let reason = err.to_string();
                    if warned_reasons.insert(reason.clone()) {
                        warn!("Skipping configurations: {}", reason);
                    }
                    continue;
                }
            };

            let index = results.len();
            info!(
                "{} {}",
                create_progress_indicator(index, total, PROGRESS_WIDTH),
                ProgressHeader {
                    position: index,
                    total,
                    config: &config,
                }
                .to_string()
                .green()
            );

            let result = self.execute(index, config, source, backend, &mut warmed_up);

            let new_best = match result.mean_s() {
                Some(mean) if result.succeeded() => {
                    let previous_best = ranking.best().map(|b| b.mean_s);
                    let is_best = ranking.offer(index, mean, result.clone());
                    // The first result is trivially the best; only flag improvements.
                    is_best && previous_best.is_some()
                }
                _ => false,
            };
            if let Some(mean) = result.mean_s() {
                let line = format!("Mean: {}", format_duration(mean));
                if new_best {
                    info!("{} {}", line, "(fastest yet)".yellow());
                } else {
                    info!("{}", line);
                }
            }

            // A broken sink must not cost the measurements: keep sweeping so
            // the caller can still rank and report what was gathered.
            if sink_ok {
                if let Err(err) = on_result(&result, new_best) {
                    error!("Recording results failed, continuing without it: {:#}", err);
                    sink_ok = false;
                }
            }
            results.push(result);
        }

        if excluded > 0 {
            info!("{} configurations excluded by validation", excluded);
        }

        Ok(Run {
            results,
            top: ranking.top().to_vec(),
            excluded,
            interrupted,
            elapsed: started.elapsed(),
        })
    }

    /// Benchmark one Configuration; never fails, failures are recorded.
    fn execute(
        &self,
        index: usize,
        config: Configuration,
        source: &SourceDescriptor,
        backend: &mut dyn StorageBackend,
        warmed_up: &mut bool,
    ) -> ConfigurationResult {
        let repetitions = self.config.repetitions;
        let mut collector = TrialCollector::new(source.num_bytes(), repetitions);

        // Nothing has touched the destination yet, so any open error is a
        // rejection: failed, zero trials.
        if let Err(err) = backend.open(&config, source) {
            let err = match err {
                BackendError::Rejected(reason) | BackendError::Io(reason) => {
                    BenchError::BackendRejection(reason)
                }
            };
            warn!("{}", err);
            return ConfigurationResult::new(
                index,
                config,
                repetitions,
                Vec::new(),
                None,
                Some(err),
            );
        }

        // Warm-up rides on the first Configuration the backend accepts.
        if !*warmed_up {
            self.warm_up(source, backend);
            *warmed_up = true;
        }

        // A trial I/O error keeps the durations gathered so far.
        let failure = self.run_trials(source, backend, &mut collector).err();
        if let Some(ref err) = failure {
            error!(
                "{} (after {}/{} trials)",
                err,
                collector.trials(),
                repetitions
            );
        }

        if let Err(err) = backend.close() {
            warn!("Failed to close backend: {}", err);
        }

        ConfigurationResult::new(
            index,
            config,
            repetitions,
            collector.durations().to_vec(),
            collector.finalize(),
            failure,
        )
    }

    fn warm_up(&self, source: &SourceDescriptor, backend: &mut dyn StorageBackend) {
        info!(
            "Warming up with {} untimed write(s); the first write is often much slower",
            self.config.warmup_trials
        );
        for _ in 0..self.config.warmup_trials {
            let outcome = backend.reset().and_then(|()| backend.write(source));
            if let Err(err) = outcome {
                warn!("Warm-up write failed: {}", err);
                return;
            }
        }
    }

    fn run_trials(
        &self,
        source: &SourceDescriptor,
        backend: &mut dyn StorageBackend,
        collector: &mut TrialCollector,
    ) -> Result<(), BenchError> {
        let repetitions = self.config.repetitions;
        for trial in 0..repetitions {
            // Delete and recreate outside the timed region.
            backend.reset()?;

            // Time only the write; it returns once every chunk is stored.
            let start = Instant::now();
            backend.write(source)?;
            let elapsed = start.elapsed();

            collector.record(elapsed);
            info!(
                "Test {}/{}: {} ({})",
                trial + 1,
                repetitions,
                format_duration(elapsed.as_secs_f64()),
                format_rate(source.num_bytes() as f64 / elapsed.as_secs_f64().max(f64::EPSILON))
            );
        }
        debug!("Completed {} trials", collector.trials());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisInputs;
    use crate::chunking::ChunkHeuristic;
    use crate::results::ResultStatus;
    use crate::source::DType;

    /// Counts calls and fails on request.
    #[derive(Default)]
    struct CountingBackend {
        opens: usize,
        resets: usize,
        writes: usize,
        reject_open: Option<usize>,
        fail_reset: Option<usize>,
        fail_write: Option<usize>,
    }

    impl StorageBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn open(&mut self, _: &Configuration, _: &SourceDescriptor) -> Result<(), BackendError> {
            self.opens += 1;
            if self.reject_open == Some(self.opens) {
                return Err(BackendError::Rejected("unsupported".into()));
            }
            Ok(())
        }

        fn reset(&mut self) -> Result<(), BackendError> {
            self.resets += 1;
            if self.fail_reset == Some(self.resets) {
                return Err(BackendError::Io("cannot recreate destination".into()));
            }
            Ok(())
        }

        fn write(&mut self, _: &SourceDescriptor) -> Result<(), BackendError> {
            self.writes += 1;
            if self.fail_write == Some(self.writes) {
                return Err(BackendError::Io("disk full".into()));
            }
            Ok(())
        }
    }

    fn fixture(compressors: &str) -> (ParameterSpace, SourceDescriptor) {
        let source = SourceDescriptor::new(DType::UInt8, vec![16, 16], vec![1; 256]).unwrap();
        let inputs = AxisInputs {
            zarr_versions: Some("3".into()),
            clevels: Some("1".into()),
            compressors: Some(compressors.into()),
            shuffles: Some("none".into()),
            chunk_sizes: Some("16x16".into()),
            endiannesses: None,
        };
        let space = ParameterSpace::resolve(
            source.shape(),
            source.dtype(),
            &inputs,
            ChunkHeuristic::default(),
        )
        .unwrap();
        (space, source)
    }

    fn runner(repetitions: usize, warmup_trials: usize) -> BenchmarkRunner {
        BenchmarkRunner::new(BenchmarkConfig {
            repetitions,
            warmup_trials,
            top_k: 3,
        })
    }

    #[test]
    fn test_every_trial_resets_then_writes() {
        let (space, source) = fixture("lz4,zstd");
        let mut backend = CountingBackend::default();
        let stop = AtomicBool::new(false);

        let run = runner(3, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        assert_eq!(run.results.len(), 2);
        assert!(run.results.iter().all(|r| r.trials_completed == 3));
        assert_eq!(backend.opens, 2);
        assert_eq!(backend.resets, 6);
        assert_eq!(backend.writes, 6);
        assert_eq!(run.top.len(), 2);
        assert!(!run.interrupted);
    }

    #[test]
    fn test_warmup_runs_once() {
        let (space, source) = fixture("lz4,zstd,zlib");
        let mut backend = CountingBackend::default();
        let stop = AtomicBool::new(false);

        let run = runner(2, 2)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        assert_eq!(backend.writes, 2 + 3 * 2);
        assert!(run.results.iter().all(|r| r.trials_completed == 2));
    }

    #[test]
    fn test_rejection_yields_failed_with_zero_trials() {
        let (space, source) = fixture("lz4,zstd,zlib");
        let mut backend = CountingBackend {
            reject_open: Some(2),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);

        let run = runner(2, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        assert_eq!(run.results.len(), 3);
        assert_eq!(run.results[1].status, ResultStatus::Failed);
        assert_eq!(run.results[1].trials_completed, 0);
        assert_eq!(run.results[0].status, ResultStatus::Succeeded);
        assert_eq!(run.results[2].status, ResultStatus::Succeeded);
        assert_eq!(run.top.len(), 2);
    }

    #[test]
    fn test_trial_io_error_abandons_remaining_trials() {
        let (space, source) = fixture("lz4,zstd");
        let mut backend = CountingBackend {
            fail_write: Some(2),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);

        let run = runner(3, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        let first = &run.results[0];
        assert_eq!(first.status, ResultStatus::PartiallyFailed);
        assert_eq!(first.trials_completed, 1);
        assert!(first.failure_reason.as_deref().unwrap().contains("disk full"));
        assert_eq!(run.results[1].trials_completed, 3);
        assert_eq!(run.top.len(), 1);
        assert_eq!(run.top[0].index, 1);
    }

    #[test]
    fn test_stop_flag_checked_between_configurations() {
        let (space, source) = fixture("blosclz,lz4,lz4hc,snappy,zlib,zstd");
        let mut backend = CountingBackend::default();
        let stop = AtomicBool::new(false);

        let run = runner(1, 0)
            .run(&space, &source, &mut backend, &stop, |result, _| {
                if result.index == 1 {
                    stop.store(true, Ordering::SeqCst);
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(run.results.len(), 2);
        assert!(run.interrupted);
        assert_eq!(backend.opens, 2);
    }

    #[test]
    fn test_first_trial_io_error_is_partial_failure() {
        let (space, source) = fixture("lz4,zstd");
        let mut backend = CountingBackend {
            fail_write: Some(1),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);

        let run = runner(3, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        let first = &run.results[0];
        assert_eq!(first.status, ResultStatus::PartiallyFailed);
        assert_eq!(first.trials_completed, 0);
        assert!(first.statistics.is_none());
        assert_eq!(run.results[1].status, ResultStatus::Succeeded);
        assert_eq!(run.top.len(), 1);
    }

    #[test]
    fn test_reset_failure_is_partial_failure() {
        let (space, source) = fixture("lz4,zstd");
        let mut backend = CountingBackend {
            fail_reset: Some(2),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);

        let run = runner(3, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        let first = &run.results[0];
        assert_eq!(first.status, ResultStatus::PartiallyFailed);
        assert_eq!(first.trials_completed, 1);
        assert!(first
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("cannot recreate destination"));
        // Only one write happened before the failed reset.
        assert_eq!(backend.writes, 1 + 3);
        assert_eq!(run.results[1].trials_completed, 3);
    }

    #[test]
    fn test_warmup_failure_does_not_abort() {
        let (space, source) = fixture("lz4,zstd");
        let mut backend = CountingBackend {
            fail_write: Some(1),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);

        let run = runner(2, 3)
            .run(&space, &source, &mut backend, &stop, |_, _| Ok(()))
            .unwrap();

        // The failed warm-up write ends warm-up; every timed trial still runs.
        assert_eq!(backend.writes, 1 + 2 * 2);
        assert!(run.results.iter().all(|r| r.succeeded()));
        assert_eq!(run.top.len(), 2);
    }

    #[test]
    fn test_callback_error_keeps_sweeping() {
        let (space, source) = fixture("lz4,zstd,zlib");
        let mut backend = CountingBackend::default();
        let stop = AtomicBool::new(false);
        let mut calls = 0;

        let run = runner(1, 0)
            .run(&space, &source, &mut backend, &stop, |_, _| {
                calls += 1;
                anyhow::bail!("output unwritable")
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(backend.opens, 3);
        assert_eq!(run.results.len(), 3);
        assert_eq!(run.top.len(), 3);
    }

    #[test]
    fn test_progress_header() {
        let (space, _) = fixture("lz4");
        let config = space.iter().next().unwrap();
        let header = ProgressHeader {
            position: 1,
            total: 4,
            config: &config,
        };
        assert!(header.to_string().starts_with("Configuration 2/4 (25.0%): zarr version: 3"));
    }
}
