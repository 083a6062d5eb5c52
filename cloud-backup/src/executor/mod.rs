//! Worker Pool: a fixed set of worker tasks that process jobs in isolation.
//!
//! Each worker owns an inbound queue and handles one job at a time; jobs are
//! handed out round-robin. Jobs that write the same committed archive (sibling
//! Visual Studio projects under one umbrella folder) always go to the same
//! worker, so they run one after the other. Workers report unchanged and skipped jobs to the
//! Coordinator themselves. Changed jobs are reported by the Backup Committer
//! once the archive has been copied.

pub mod job;

use crate::fs::paths::committed_archive_path;
use crate::messages::{CoordinatorMessage, Job, JobOutcome};
use crate::utils::errors::{BackupError, Result};
use job::{run_job, JobContext};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of workers for `jobs` folders, optionally capped.
pub fn pool_size(jobs: usize, max_workers: Option<usize>) -> usize {
    match max_workers {
        Some(cap) => jobs.min(cap),
        None => jobs,
    }
}

pub struct WorkerPool {
    workers: Vec<mpsc::UnboundedSender<Job>>,
    handles: Vec<JoinHandle<()>>,
    /// Worker assigned to each committed archive seen so far
    assignments: HashMap<PathBuf, usize>,
    next: usize,
}

impl WorkerPool {
    /// Spawn `size` workers sharing `ctx`.
    ///
    /// Workers stop between jobs once `cancel` fires.
    pub fn spawn(
        size: usize,
        ctx: JobContext,
        coordinator: mpsc::UnboundedSender<CoordinatorMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let mut workers = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);

        for id in 0..size {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.push(tx);
            handles.push(tokio::spawn(worker_loop(
                id,
                rx,
                ctx.clone(),
                coordinator.clone(),
                cancel.clone(),
            )));
        }

        debug!(workers = size, "Worker pool started");
        Self {
            workers,
            handles,
            assignments: HashMap::new(),
            next: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job on the next worker in turn, or on the worker already
    /// holding a job for the same committed archive
    pub fn dispatch(&mut self, job: Job) -> Result<()> {
        if self.workers.is_empty() {
            return Err(BackupError::ChannelClosed("worker pool"));
        }

        // A path with no archive name fails inside the job; route it by source
        let archive = committed_archive_path(&job.source, job.kind).unwrap_or_else(|_| job.source.clone());
        let worker = match self.assignments.get(&archive) {
            Some(&worker) => {
                debug!(archive = %archive.display(), worker, "Archive shared with an earlier job");
                worker
            }
            None => {
                let worker = self.next % self.workers.len();
                self.next = self.next.wrapping_add(1);
                self.assignments.insert(archive, worker);
                worker
            }
        };

        self.workers[worker]
            .send(job)
            .map_err(|_| BackupError::ChannelClosed("worker queue"))
    }

    /// Close the queues and wait for the workers to finish what they hold
    pub async fn shutdown(self) {
        drop(self.workers);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Worker task failed: {}", e);
            }
        }
    }

    /// Stop every worker without waiting for queued jobs
    pub fn abort(self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn worker_loop(
    id: usize,
    mut inbox: mpsc::UnboundedReceiver<Job>,
    ctx: JobContext,
    coordinator: mpsc::UnboundedSender<CoordinatorMessage>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = inbox.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        debug!(worker = id, path = %job.source.display(), "Worker picked up job");

        if let Some(message) = process(&ctx, job).await {
            if coordinator.send(message).is_err() {
                debug!(worker = id, "Coordinator gone, worker stopping");
                break;
            }
        }
    }

    debug!(worker = id, "Worker stopped");
}

/// Run one job off the async executor and turn its result into the message
/// the Coordinator should see, if any.
async fn process(ctx: &JobContext, job: Job) -> Option<CoordinatorMessage> {
    let task_ctx = ctx.clone();
    let task_job = job.clone();
    let result = tokio::task::spawn_blocking(move || run_job(&task_ctx, &task_job)).await;

    match result {
        // The committer reports completion after the copy
        Ok(Ok(JobOutcome::Changed)) => None,
        Ok(Ok(outcome)) => Some(CoordinatorMessage::Completed(job.completed(outcome))),
        Ok(Err(e)) if e.is_recoverable() => {
            warn!("Skipping folder: {} ({})", job.source.display(), e);
            Some(CoordinatorMessage::Completed(job.completed(JobOutcome::Skipped)))
        }
        Ok(Err(error)) => Some(CoordinatorMessage::Fatal { job, error }),
        Err(e) => Some(CoordinatorMessage::Fatal {
            job,
            error: BackupError::TaskFailed(e.to_string()),
        }),
    }
}
