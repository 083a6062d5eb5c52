//! Cloud Backup - Main entry point
//!
//! Backs up every folder in the source list and exits.

use anyhow::{bail, Result};
use clap::Parser;
use cloud_backup::{
    coordinator::{read_source_paths, Coordinator, RunOutcome},
    daemon::shutdown::ShutdownCoordinator,
    utils::{self, format::format_elapsed},
    Config, ZipBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File listing the source folders (overrides config)
    #[arg(short, long, value_name = "FILE")]
    paths: Option<PathBuf>,

    /// Destination directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = args.config {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    if let Some(paths) = args.paths {
        config.backup.source_paths_file = paths;
    }
    if let Some(destination) = args.destination {
        config.backup.destination_dir = destination;
    }

    // Initialize logging; the guards flush the writers on exit
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let _log_guards = utils::logger::init(
        log_level,
        config.log.output,
        &config.backup.log_dir,
        &config.log.file_name,
    )?;

    let started = Instant::now();
    tracing::info!("Starting...");
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "cloud-backup");

    let paths = read_source_paths(&config.backup.source_paths_file)?;

    // A signal stops the run without finalizing
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let signal_watch = Arc::clone(&shutdown);
    let signal_handle = tokio::spawn(async move {
        if let Err(e) = signal_watch.wait_for_signal().await {
            tracing::warn!("Signal handling unavailable: {}", e);
        }
    });

    let coordinator = Coordinator::with_cancel(&config, paths, Arc::new(ZipBackend::new()), shutdown.token());
    tracing::debug!(run_id = %coordinator.run_id(), "Coordinator created");
    let report = coordinator.run().await;
    signal_handle.abort();

    tracing::info!("Finished in {}.", format_elapsed(started.elapsed()));

    match report.outcome {
        RunOutcome::Finalized { log_backup } => {
            if !log_backup.failed.is_empty() {
                tracing::warn!("{} log file(s) were not backed up", log_backup.failed.len());
            }
            Ok(())
        }
        RunOutcome::Aborted { job: Some(job), error } => {
            bail!("backup stopped while processing {}: {}", job.source.display(), error)
        }
        RunOutcome::Aborted { job: None, error } => bail!("backup stopped: {}", error),
        RunOutcome::Interrupted => bail!(
            "backup interrupted after {} of {} folders",
            report.processed,
            report.total
        ),
    }
}
