//! Messages exchanged between the run's components.
//!
//! Every component owns an inbound queue and reacts to one message at a time:
//! - Coordinator → Worker Pool: [`Job`]
//! - Worker → Backup Committer: [`CommitterMessage::Backup`]
//! - Worker → Statistics Reporter: [`StatsMessage`]
//! - Worker / Committer → Coordinator: [`CoordinatorMessage`]

use crate::sync::diff::Differences;
use crate::utils::errors::BackupError;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

/// How a source folder is archived and named at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// All contents are archived; the destination copy is marked for encryption.
    Regular,
    /// Build output (`bin`, `obj`) is left out; the archive covers the
    /// umbrella folder above `Projects`.
    VisualStudio,
}

impl Kind {
    /// Classify a source folder path. Evaluated once, at dispatch time.
    pub fn classify(path: &str, visual_studio_marker: &str) -> Self {
        if path.contains(visual_studio_marker) {
            Kind::VisualStudio
        } else {
            Kind::Regular
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Regular => write!(f, "regular"),
            Kind::VisualStudio => write!(f, "visual-studio"),
        }
    }
}

/// Sequence number of a job within one run, assigned in dispatch order
pub type JobId = usize;

/// One unit of work: a single source folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub source: PathBuf,
    pub kind: Kind,
}

impl Job {
    pub fn new(id: JobId, source: impl Into<PathBuf>, kind: Kind) -> Self {
        Self {
            id,
            source: source.into(),
            kind,
        }
    }

    /// Completion signal for this job
    pub fn completed(&self, outcome: JobOutcome) -> JobCompleted {
        JobCompleted {
            job_id: self.id,
            source: self.source.clone(),
            kind: self.kind,
            outcome,
        }
    }
}

/// Instruction to copy a freshly committed archive to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInstruction {
    pub job_id: JobId,
    pub source: PathBuf,
    pub archive: PathBuf,
    pub kind: Kind,
}

/// Differences found in one folder's archive
#[derive(Debug, Clone)]
pub struct FolderChanges {
    pub archive: PathBuf,
    pub differences: Differences,
}

/// Messages handled by the Statistics Reporter
#[derive(Debug, Clone)]
pub enum StatsMessage {
    Changes(FolderChanges),
    NoChange(String),
}

/// Text of the notice sent when a folder has not changed
pub fn no_changes_notice(source: &Path) -> String {
    format!("No changes detected in {}...", source.display())
}

/// Terminal state of a job, as reported to the Coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// A new committed archive was written and copied to the destination
    Changed,
    /// The candidate matched the committed archive and was discarded
    Unchanged,
    /// A recoverable error ended the job early
    Skipped,
}

/// Completion signal for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompleted {
    pub job_id: JobId,
    pub source: PathBuf,
    pub kind: Kind,
    pub outcome: JobOutcome,
}

/// Messages handled by the Coordinator
#[derive(Debug)]
pub enum CoordinatorMessage {
    Completed(JobCompleted),
    /// An error outside the recoverable category; the run must stop.
    Fatal { job: Job, error: BackupError },
}

/// Result of copying the auxiliary log files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBackupReport {
    /// Destination files written
    pub copied: Vec<PathBuf>,
    /// Log files that could not be copied
    pub failed: Vec<PathBuf>,
}

impl BackupInstruction {
    /// Completion signal for the job this instruction belongs to
    pub fn completed(&self, outcome: JobOutcome) -> JobCompleted {
        JobCompleted {
            job_id: self.job_id,
            source: self.source.clone(),
            kind: self.kind,
            outcome,
        }
    }
}

/// Messages handled by the Backup Committer
#[derive(Debug)]
pub enum CommitterMessage {
    Backup(BackupInstruction),
    BackupLogFiles {
        done: oneshot::Sender<LogBackupReport>,
    },
}
