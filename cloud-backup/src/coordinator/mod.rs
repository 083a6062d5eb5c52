//! Coordinator: drives one backup run from the folder list to finalization.
//!
//! The Coordinator classifies and dispatches every folder, then consumes
//! completion signals from its own queue until each job has reported once.
//! At that point it finalizes: the log files are backed up and the
//! components are shut down. A fatal error from any job, or an external
//! cancellation, stops the remaining workers and the run ends without
//! finalizing.

pub mod sources;
pub mod tracker;

use crate::config::Config;
use crate::executor::job::JobContext;
use crate::executor::{pool_size, WorkerPool};
use crate::fs::archive::ArchiveBackend;
use crate::messages::{CommitterMessage, CoordinatorMessage, Job, Kind, LogBackupReport};
use crate::stats::StatisticsReporter;
use crate::transfer::BackupCommitter;
use crate::utils::errors::BackupError;
use chrono::{DateTime, Utc};
use sources::plan_jobs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracker::{CompletionTracker, OutcomeCounts};
use tracing::{error, info, warn};
use uuid::Uuid;

pub use sources::{load_paths, read_source_paths};

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every job reported and the log files were backed up
    Finalized { log_backup: LogBackupReport },
    /// A fatal error stopped the run. `job` is the job it came from, if any.
    Aborted {
        job: Option<Job>,
        error: BackupError,
    },
    /// The run was cancelled from outside, e.g. by a signal
    Interrupted,
}

/// Summary returned by [`Coordinator::run`]
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub processed: usize,
    pub counts: OutcomeCounts,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_finalized(&self) -> bool {
        matches!(self.outcome, RunOutcome::Finalized { .. })
    }
}

enum Step {
    Finalize,
    Abort {
        job: Option<Job>,
        error: BackupError,
    },
    Interrupted,
}

pub struct Coordinator {
    run_id: Uuid,
    paths: Vec<String>,
    backend: Arc<dyn ArchiveBackend>,
    destination_dir: PathBuf,
    log_dir: PathBuf,
    log_files: Vec<String>,
    visual_studio_marker: String,
    excluded_segments: Vec<String>,
    max_workers: Option<usize>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Create a coordinator for the given folder list (no cancellation support)
    pub fn new(config: &Config, paths: Vec<String>, backend: Arc<dyn ArchiveBackend>) -> Self {
        Self::with_cancel(config, paths, backend, CancellationToken::new())
    }

    /// Create a coordinator that stops when `cancel` fires
    pub fn with_cancel(
        config: &Config,
        paths: Vec<String>,
        backend: Arc<dyn ArchiveBackend>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            paths,
            backend,
            destination_dir: config.backup.destination_dir.clone(),
            log_dir: config.backup.log_dir.clone(),
            log_files: config.backup.log_files.clone(),
            visual_studio_marker: config.backup.visual_studio_marker.clone(),
            excluded_segments: config.backup.excluded_segments.clone(),
            max_workers: config.performance.max_workers,
            cancel,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run every folder to completion and finalize, or stop on the first
    /// fatal error.
    pub async fn run(self) -> RunReport {
        let started_at = Utc::now();
        let jobs = plan_jobs(&self.paths, &self.visual_studio_marker);
        let total = jobs.len();
        let mut tracker = CompletionTracker::new(total);

        info!(run_id = %self.run_id, folders = total, "Backup run started");

        let (coordinator_tx, mut inbox) = mpsc::unbounded_channel();
        let (stats, stats_handle) = StatisticsReporter::spawn();
        let (committer, committer_handle) = BackupCommitter::new(
            Arc::clone(&self.backend),
            self.destination_dir.clone(),
            self.log_dir.clone(),
            self.log_files.clone(),
            coordinator_tx.clone(),
        )
        .spawn();

        let workers_cancel = self.cancel.child_token();
        let mut pool = (total > 0).then(|| {
            let ctx = JobContext {
                backend: Arc::clone(&self.backend),
                excluded_segments: self.excluded_segments.clone(),
                stats: stats.clone(),
                committer: committer.clone(),
            };
            WorkerPool::spawn(
                pool_size(total, self.max_workers),
                ctx,
                coordinator_tx.clone(),
                workers_cancel.clone(),
            )
        });
        // Only workers and the committer report from here on
        drop(coordinator_tx);

        let step = match pool.as_mut().map(|pool| dispatch(pool, jobs)) {
            Some(Err((job, error))) => Step::Abort {
                job: Some(job),
                error,
            },
            _ => self.supervise(&mut inbox, &mut tracker).await,
        };

        let outcome = match step {
            Step::Finalize => {
                info!("Finished processing {} folders.", tracker.total());
                let counts = tracker.counts();
                info!(
                    changed = counts.changed,
                    unchanged = counts.unchanged,
                    skipped = counts.skipped,
                    "Run summary"
                );

                let log_backup = backup_log_files(&committer).await;

                workers_cancel.cancel();
                if let Some(pool) = pool {
                    pool.shutdown().await;
                }
                drop(committer);
                drop(stats);
                for handle in [committer_handle, stats_handle] {
                    if let Err(e) = handle.await {
                        warn!("Component task failed during shutdown: {}", e);
                    }
                }

                RunOutcome::Finalized { log_backup }
            }
            Step::Abort { job, error } => {
                match &job {
                    Some(job) => error!("Fatal error in {}: {}", job.source.display(), error),
                    None => error!("Fatal error: {}", error),
                }
                warn!("Stopping remaining workers, run will not finalize");

                workers_cancel.cancel();
                if let Some(pool) = pool {
                    pool.abort();
                }
                committer_handle.abort();
                stats_handle.abort();

                RunOutcome::Aborted { job, error }
            }
            Step::Interrupted => {
                warn!("Run cancelled, stopping remaining workers");

                workers_cancel.cancel();
                if let Some(pool) = pool {
                    pool.abort();
                }
                committer_handle.abort();
                stats_handle.abort();

                RunOutcome::Interrupted
            }
        };

        RunReport {
            run_id: self.run_id,
            started_at,
            total: tracker.total(),
            processed: tracker.processed(),
            counts: tracker.counts(),
            outcome,
        }
    }

    /// Consume completion signals until the run finalizes or must stop
    async fn supervise(
        &self,
        inbox: &mut mpsc::UnboundedReceiver<CoordinatorMessage>,
        tracker: &mut CompletionTracker,
    ) -> Step {
        if tracker.try_finalize() {
            return Step::Finalize;
        }

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Step::Interrupted,
                message = inbox.recv() => message,
            };

            match message {
                Some(CoordinatorMessage::Completed(completed)) => {
                    if tracker.record(&completed) {
                        return Step::Finalize;
                    }
                }
                Some(CoordinatorMessage::Fatal { job, error }) => {
                    return Step::Abort {
                        job: Some(job),
                        error,
                    }
                }
                None => {
                    return Step::Abort {
                        job: None,
                        error: BackupError::ChannelClosed("coordinator queue"),
                    }
                }
            }
        }
    }
}

/// Hand every job to the pool, Visual Studio folders first
fn dispatch(pool: &mut WorkerPool, jobs: Vec<Job>) -> Result<(), (Job, BackupError)> {
    info!(workers = pool.size(), folders = jobs.len(), "Dispatching jobs");
    let mut current = None;

    for job in jobs {
        if current != Some(job.kind) {
            match job.kind {
                Kind::VisualStudio => info!("Visual Studio projects..."),
                Kind::Regular => info!("Folders for encryption..."),
            }
            current = Some(job.kind);
        }

        info!("Processing {}...", job.source.display());
        if let Err(e) = pool.dispatch(job.clone()) {
            return Err((job, e));
        }
    }

    Ok(())
}

/// Ask the committer to copy the log files and wait for its answer
async fn backup_log_files(committer: &mpsc::UnboundedSender<CommitterMessage>) -> LogBackupReport {
    let (done, report) = oneshot::channel();
    if committer.send(CommitterMessage::BackupLogFiles { done }).is_err() {
        warn!("Backup committer stopped, log files not backed up");
        return LogBackupReport::default();
    }

    report.await.unwrap_or_else(|_| {
        warn!("Backup committer stopped before backing up the log files");
        LogBackupReport::default()
    })
}
