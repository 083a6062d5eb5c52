//! Error types for the backup run.
//!
//! Errors fall into two categories. Recoverable errors are scoped to one job:
//! the worker logs them and the job still counts as completed. Everything else
//! is fatal and stops the whole run without finalizing.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} does not exist.", .0.display())]
    PathMissing(PathBuf),

    #[error("Archive I/O error on {}: {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error on {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("Walk directory error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid source path: {0}")]
    InvalidSourcePath(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Unclassified error: {0}")]
    Unclassified(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    /// Wrap an I/O error with the archive or destination path it happened on.
    pub fn archive_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        BackupError::ArchiveIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Map a zip error, keeping the underlying I/O error when there is one.
    pub fn zip(path: impl AsRef<Path>, err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(source) => Self::archive_io(path, source),
            other => BackupError::Archive {
                path: path.as_ref().to_path_buf(),
                message: other.to_string(),
            },
        }
    }

    /// Whether the error is scoped to a single job.
    ///
    /// Recoverable errors are logged and the job is counted as completed.
    /// Anything else stops the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BackupError::PathMissing(_)
            | BackupError::ArchiveIo { .. }
            | BackupError::Io(_)
            | BackupError::Archive { .. } => true,
            BackupError::Walk(e) => e.io_error().is_some(),
            BackupError::Config(_)
            | BackupError::InvalidSourcePath(_)
            | BackupError::ChannelClosed(_)
            | BackupError::TaskFailed(_)
            | BackupError::Unclassified(_) => false,
        }
    }
}
