//! Backup Committer: copies committed archives to the destination storage.
//!
//! Runs as a single task draining its own queue, one message at a time.
//! A [`CommitterMessage::Backup`] copies the archive and then reports the job
//! complete to the Coordinator. A failed copy is logged and the job is still
//! reported, so the run can finish. [`CommitterMessage::BackupLogFiles`]
//! copies the auxiliary log files and answers on the supplied channel.

use crate::fs::archive::ArchiveBackend;
use crate::fs::paths::destination_path;
use crate::messages::{
    BackupInstruction, CommitterMessage, CoordinatorMessage, Job, JobOutcome, LogBackupReport,
};
use crate::utils::errors::{BackupError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct BackupCommitter {
    backend: Arc<dyn ArchiveBackend>,
    destination_dir: PathBuf,
    log_dir: PathBuf,
    log_files: Vec<String>,
    coordinator: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl BackupCommitter {
    pub fn new(
        backend: Arc<dyn ArchiveBackend>,
        destination_dir: PathBuf,
        log_dir: PathBuf,
        log_files: Vec<String>,
        coordinator: mpsc::UnboundedSender<CoordinatorMessage>,
    ) -> Self {
        Self {
            backend,
            destination_dir,
            log_dir,
            log_files,
            coordinator,
        }
    }

    /// Start the committer task. It stops once every sender is dropped.
    pub fn spawn(self) -> (mpsc::UnboundedSender<CommitterMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(self, mut inbox: mpsc::UnboundedReceiver<CommitterMessage>) {
        while let Some(message) = inbox.recv().await {
            match message {
                CommitterMessage::Backup(instruction) => self.commit(instruction).await,
                CommitterMessage::BackupLogFiles { done } => {
                    let report = self.backup_log_files().await;
                    if done.send(report).is_err() {
                        debug!("Log file backup finished after the requester went away");
                    }
                }
            }
        }

        debug!("Backup committer stopped");
    }

    async fn commit(&self, instruction: BackupInstruction) {
        let message = match self.copy_archive(&instruction).await {
            Ok(destination) => {
                info!("Backed up to: {}", destination.display());
                CoordinatorMessage::Completed(instruction.completed(JobOutcome::Changed))
            }
            Err(e) if e.is_recoverable() => {
                warn!("Skipping folder: {} ({})", instruction.source.display(), e);
                CoordinatorMessage::Completed(instruction.completed(JobOutcome::Skipped))
            }
            Err(e) => CoordinatorMessage::Fatal {
                job: Job::new(instruction.job_id, instruction.source.clone(), instruction.kind),
                error: e,
            },
        };

        if self.coordinator.send(message).is_err() {
            debug!(source = %instruction.source.display(), "Coordinator gone, completion dropped");
        }
    }

    async fn copy_archive(&self, instruction: &BackupInstruction) -> Result<PathBuf> {
        let destination = destination_path(&self.destination_dir, instruction)?;
        let destination_dir = self.destination_dir.clone();
        let archive = instruction.archive.clone();
        let backend = Arc::clone(&self.backend);

        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            std::fs::create_dir_all(&destination_dir)
                .map_err(|e| BackupError::archive_io(&destination_dir, e))?;
            let bytes = backend.copy(&archive, &destination)?;
            debug!(archive = %archive.display(), bytes, "Archive copied");
            Ok(destination)
        })
        .await
        .map_err(|e| BackupError::TaskFailed(e.to_string()))?
    }

    /// Copy every configured log file into the destination. Failures are
    /// logged and listed in the report; they never fail the run.
    async fn backup_log_files(&self) -> LogBackupReport {
        let sources: Vec<PathBuf> = self.log_files.iter().map(|name| self.log_dir.join(name)).collect();
        let destination_dir = self.destination_dir.clone();
        let backend = Arc::clone(&self.backend);

        let result = tokio::task::spawn_blocking(move || {
            let mut report = LogBackupReport::default();

            if let Err(e) = std::fs::create_dir_all(&destination_dir) {
                warn!("Cannot create {}: {}", destination_dir.display(), e);
                report.failed = sources;
                return report;
            }

            for source in sources {
                let Some(name) = source.file_name() else {
                    warn!("Log file path has no file name: {}", source.display());
                    report.failed.push(source);
                    continue;
                };

                let target = destination_dir.join(name);
                match backend.copy(&source, &target) {
                    Ok(_) => {
                        info!("Backed up to: {}", target.display());
                        report.copied.push(target);
                    }
                    Err(e) => {
                        warn!("Failed to back up log file {}: {}", source.display(), e);
                        report.failed.push(source);
                    }
                }
            }

            report
        })
        .await;

        match result {
            Ok(report) => report,
            Err(e) => {
                warn!("Log file backup task failed: {}", e);
                LogBackupReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::archive::ZipBackend;
    use crate::messages::Kind;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    fn committer(
        temp: &Path,
        log_files: Vec<String>,
    ) -> (BackupCommitter, mpsc::UnboundedReceiver<CoordinatorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let committer = BackupCommitter::new(
            Arc::new(ZipBackend::new()),
            temp.join("destination"),
            temp.join("logs"),
            log_files,
            tx,
        );
        (committer, rx)
    }

    fn expect_completed(message: Option<CoordinatorMessage>) -> crate::messages::JobCompleted {
        match message {
            Some(CoordinatorMessage::Completed(completed)) => completed,
            other => panic!("expected a completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_regular_archive_copied_under_encrypted_name() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Letters.zip");
        fs::write(&archive, b"zip bytes").unwrap();

        let (committer, mut coordinator) = committer(temp.path(), Vec::new());
        let (tx, handle) = committer.spawn();

        tx.send(CommitterMessage::Backup(BackupInstruction {
            job_id: 7,
            source: temp.path().join("Letters"),
            archive,
            kind: Kind::Regular,
        }))
        .unwrap();

        let completed = expect_completed(coordinator.recv().await);
        assert_eq!(completed.job_id, 7);
        assert_eq!(completed.outcome, JobOutcome::Changed);

        let copied = temp.path().join("destination/Letters.zip.encrypted");
        assert_eq!(fs::read(copied).unwrap(), b"zip bytes");

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_visual_studio_archive_keeps_its_name() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Visual Studio 2015.zip");
        fs::write(&archive, b"vs").unwrap();

        let (committer, mut coordinator) = committer(temp.path(), Vec::new());
        let (tx, _handle) = committer.spawn();

        tx.send(CommitterMessage::Backup(BackupInstruction {
            job_id: 0,
            source: temp.path().join("Visual Studio 2015/Projects/App"),
            archive,
            kind: Kind::VisualStudio,
        }))
        .unwrap();

        assert_eq!(expect_completed(coordinator.recv().await).outcome, JobOutcome::Changed);
        assert!(temp.path().join("destination/Visual Studio 2015.zip").exists());
    }

    #[tokio::test]
    async fn test_failed_copy_still_completes() {
        let temp = TempDir::new().unwrap();
        let (committer, mut coordinator) = committer(temp.path(), Vec::new());
        let (tx, _handle) = committer.spawn();

        tx.send(CommitterMessage::Backup(BackupInstruction {
            job_id: 1,
            source: temp.path().join("Letters"),
            archive: temp.path().join("Letters.zip"),
            kind: Kind::Regular,
        }))
        .unwrap();

        let completed = expect_completed(coordinator.recv().await);
        assert_eq!(completed.outcome, JobOutcome::Skipped);
        assert!(!temp.path().join("destination/Letters.zip.encrypted").exists());
    }

    #[tokio::test]
    async fn test_backup_log_files_reports_each_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("logs")).unwrap();
        fs::write(temp.path().join("logs/cloud-backup.log"), b"Starting...").unwrap();

        let (committer, _coordinator) = committer(
            temp.path(),
            vec!["cloud-backup.log".to_string(), "missing.log".to_string()],
        );
        let (tx, _handle) = committer.spawn();

        let (done, report) = oneshot::channel();
        tx.send(CommitterMessage::BackupLogFiles { done }).unwrap();
        let report = report.await.unwrap();

        assert_eq!(report.copied, vec![temp.path().join("destination/cloud-backup.log")]);
        assert_eq!(report.failed, vec![temp.path().join("logs/missing.log")]);
        assert_eq!(
            fs::read(temp.path().join("destination/cloud-backup.log")).unwrap(),
            b"Starting..."
        );
    }
}
