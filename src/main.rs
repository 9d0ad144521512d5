//! # Zarr Write Benchmark - Main Entry Point
//!
//! 1. **Initialize logging**: colorized console output, optional log file
//! 2. **Parse arguments** and resolve the parameter space
//! 3. **Load the source** array into memory
//! 4. **Run the sweep** on a blocking thread while Ctrl-C raises the stop flag
//! 5. **Report**: write result files and print the fastest configurations
//!
//! Malformed options and chunk shapes that do not fit the source abort before
//! anything is written. Failures of individual configurations never abort the
//! sweep.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use zarr_write_bench::{
    axis::parse_shape,
    backend::{StorageBackend, ZarrBackend},
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::Args,
    logging::init_logging,
    results::{ResultsManager, Run, SourceInfo},
    source::SourceDescriptor,
    space::ParameterSpace,
    utils::{format_bytes, format_duration, format_rate, Table},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.verbose, args.log_file.as_deref())?;

    let shape = parse_shape(&args.shape)?;
    let space = ParameterSpace::resolve(&shape, args.dtype, &args.axis_inputs(), args.heuristic())?;

    for line in space.to_string().lines() {
        info!("{}", line);
    }

    if args.suggest_only {
        return Ok(());
    }

    let valid = space.num_valid();
    if valid == 0 {
        anyhow::bail!(
            "none of the {} parameter combinations is valid for {}",
            space.num_combinations(),
            args.dtype
        );
    }

    let config = BenchmarkConfig::from_args(&args)?;

    info!("Loading {:?}", args.source);
    let source = SourceDescriptor::load_raw(&args.source, args.dtype, shape)
        .with_context(|| format!("Failed to load source {:?}", args.source))?;
    info!(
        "Loaded {} ({}) as {}",
        args.source.display(),
        format_bytes(source.num_bytes()),
        source.dtype()
    );

    let backend = ZarrBackend::new(args.bench_dest());
    let mut results_manager = ResultsManager::new(
        Some(args.output_file.as_path()),
        SourceInfo {
            path: Some(args.source.clone()),
            dtype: source.dtype(),
            shape: source.shape().to_vec(),
            bytes: source.num_bytes(),
        },
        backend.name(),
        config.repetitions,
    );
    if let Some(ref streaming_file) = args.streaming_output {
        info!("Streaming results to: {:?}", streaming_file);
        results_manager.enable_streaming(streaming_file)?;
    }
    if let Some(ref csv_file) = args.save_csv {
        info!("Saving CSV results to: {:?}", csv_file);
        results_manager.enable_csv(csv_file)?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current configuration");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let top_k = config.top_k;
    let runner = BenchmarkRunner::new(config);
    let sweep_stop = Arc::clone(&stop);
    let (run, mut results_manager) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut backend = backend;
        let run = runner.run(&space, &source, &mut backend, &sweep_stop, |result, _| {
            results_manager.record(result)
        })?;
        if let Err(e) = std::fs::remove_dir_all(backend.dest()) {
            warn!("Could not remove scratch directory {:?}: {}", backend.dest(), e);
        }
        Ok((run, results_manager))
    })
    .await??;

    results_manager.finalize(&run)?;
    print_ranking(&run, top_k);

    if run.interrupted {
        warn!(
            "Sweep interrupted after {} configurations",
            run.results.len()
        );
    }
    if run.failed_count() > 0 {
        error!("{} configurations failed", run.failed_count());
    }
    info!(
        "Finished {} configurations in {}",
        run.results.len(),
        format_duration(run.elapsed.as_secs_f64())
    );
    Ok(())
}

/// Print the top configurations, fastest last so it ends up next to the prompt.
fn print_ranking(run: &Run, top_k: usize) {
    if run.top.is_empty() {
        warn!("No configuration completed all of its trials");
        return;
    }

    println!();
    println!("{}", format!("Top {} configurations", top_k.min(run.top.len())).green());
    let mut table = Table::new(
        &["Rank", "Mean", "Std.dev", "Throughput", "Configuration"],
        &[4, 10, 10, 12, 88],
    );
    for (rank, entry) in run.top.iter().enumerate().rev() {
        let result = &entry.item;
        table.row(&[
            format!("#{}", rank + 1),
            format_duration(entry.mean_s),
            format_duration(result.std_dev_s().unwrap_or_default()),
            format_rate(result.throughput_bps().unwrap_or_default()),
            result.configuration.to_string(),
        ]);
    }
    print!("{}", table.render());

    if let Some(best) = run.top.first() {
        println!(
            "{} {}",
            "Fastest:".yellow().bold(),
            best.item.configuration.to_string().bold()
        );
    }
}
