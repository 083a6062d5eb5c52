//! The body of a single backup job.
//!
//! Builds a candidate archive for the folder, compares it with the committed
//! archive and either discards it or promotes it and hands the result to the
//! Backup Committer. Everything here blocks; the pool runs it on the
//! blocking thread pool.

use crate::fs::archive::ArchiveBackend;
use crate::fs::paths::{candidate_archive_path, committed_archive_path};
use crate::fs::walker::WalkOptions;
use crate::messages::{
    no_changes_notice, BackupInstruction, CommitterMessage, FolderChanges, Job, JobOutcome, Kind,
    StatsMessage,
};
use crate::sync::diff::compute_differences;
use crate::sync::snapshot::Snapshot;
use crate::transfer::encrypt::encrypt_archive;
use crate::utils::errors::{BackupError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What every worker shares: the archive primitives and the queues of the
/// components it reports to.
#[derive(Clone)]
pub struct JobContext {
    pub backend: Arc<dyn ArchiveBackend>,
    pub excluded_segments: Vec<String>,
    pub stats: mpsc::UnboundedSender<StatsMessage>,
    pub committer: mpsc::UnboundedSender<CommitterMessage>,
}

impl JobContext {
    fn walk_options(&self, kind: Kind) -> WalkOptions {
        match kind {
            Kind::Regular => WalkOptions::all(),
            Kind::VisualStudio => WalkOptions::excluding(self.excluded_segments.iter().cloned()),
        }
    }

    fn report(&self, message: StatsMessage) {
        if self.stats.send(message).is_err() {
            debug!("Statistics reporter gone, report dropped");
        }
    }
}

/// Process one job.
///
/// Returns [`JobOutcome::Unchanged`] when the folder matches its committed
/// archive; the caller reports that completion. [`JobOutcome::Changed`] means
/// a backup instruction went to the committer, which reports completion
/// after the copy.
pub fn run_job(ctx: &JobContext, job: &Job) -> Result<JobOutcome> {
    debug!(path = %job.source.display(), kind = %job.kind, "Job received");

    if !ctx.backend.directory_exists(&job.source) {
        return Err(BackupError::PathMissing(job.source.clone()));
    }

    let committed = committed_archive_path(&job.source, job.kind)?;
    let candidate = candidate_archive_path(&committed);

    if ctx.backend.exists(&candidate) {
        debug!(candidate = %candidate.display(), "Removing stale candidate archive");
        ctx.backend.delete(&candidate)?;
    }

    let snapshot = ctx
        .backend
        .create_from_directory(&job.source, &candidate, &ctx.walk_options(job.kind))?;
    info!("Created Preview Zip: {}", candidate.display());
    debug!(entries = snapshot.len(), bytes = snapshot.total_bytes(), "Candidate archive built");

    let result = promote_candidate(ctx, job, &committed, &candidate, &snapshot);
    if result.is_err() {
        discard_candidate(ctx, &candidate);
    }
    result
}

fn promote_candidate(
    ctx: &JobContext,
    job: &Job,
    committed: &Path,
    candidate: &Path,
    snapshot: &Snapshot,
) -> Result<JobOutcome> {
    if !ctx.backend.exists(committed) {
        ctx.backend.replace(candidate, committed)?;
        info!("Created New Zip: {}", committed.display());
    } else {
        let previous = ctx.backend.read_snapshot(committed)?;
        let differences = compute_differences(&previous, snapshot);

        if differences.is_empty() {
            ctx.backend.delete(candidate)?;
            info!("Deleted Preview Zip: {}", candidate.display());
            ctx.report(StatsMessage::NoChange(no_changes_notice(&job.source)));
            return Ok(JobOutcome::Unchanged);
        }

        ctx.backend.replace(candidate, committed)?;
        info!("Created Updated Zip: {}", committed.display());
        ctx.report(StatsMessage::Changes(FolderChanges {
            archive: committed.to_path_buf(),
            differences,
        }));
    }

    let archive = match job.kind {
        Kind::Regular => encrypt_archive(committed),
        Kind::VisualStudio => committed.to_path_buf(),
    };

    ctx.committer
        .send(CommitterMessage::Backup(BackupInstruction {
            job_id: job.id,
            source: job.source.clone(),
            archive,
            kind: job.kind,
        }))
        .map_err(|_| BackupError::ChannelClosed("backup committer"))?;

    Ok(JobOutcome::Changed)
}

/// Best-effort removal of a candidate left behind by a failed job
fn discard_candidate(ctx: &JobContext, candidate: &Path) {
    if ctx.backend.exists(candidate) {
        if let Err(e) = ctx.backend.delete(candidate) {
            warn!("Failed to remove candidate {}: {}", candidate.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::archive::ZipBackend;
    use crate::fs::walker::WalkOptions;
    use std::fs;
    use tempfile::TempDir;

    struct Harness {
        ctx: JobContext,
        stats: mpsc::UnboundedReceiver<StatsMessage>,
        committer: mpsc::UnboundedReceiver<CommitterMessage>,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(ZipBackend::new()))
    }

    fn harness_with(backend: Arc<dyn ArchiveBackend>) -> Harness {
        let (stats_tx, stats) = mpsc::unbounded_channel();
        let (committer_tx, committer) = mpsc::unbounded_channel();
        Harness {
            ctx: JobContext {
                backend,
                excluded_segments: vec!["bin".to_string(), "obj".to_string()],
                stats: stats_tx,
                committer: committer_tx,
            },
            stats,
            committer,
        }
    }

    /// Zip backend whose rename over the committed archive always fails
    struct ReplaceFails(ZipBackend);

    impl ArchiveBackend for ReplaceFails {
        fn directory_exists(&self, path: &Path) -> bool {
            self.0.directory_exists(path)
        }
        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }
        fn create_from_directory(&self, source: &Path, archive: &Path, options: &WalkOptions) -> Result<Snapshot> {
            self.0.create_from_directory(source, archive, options)
        }
        fn read_snapshot(&self, archive: &Path) -> Result<Snapshot> {
            self.0.read_snapshot(archive)
        }
        fn replace(&self, _: &Path, committed: &Path) -> Result<()> {
            Err(BackupError::archive_io(
                committed,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }
        fn delete(&self, path: &Path) -> Result<()> {
            self.0.delete(path)
        }
        fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
            self.0.copy(from, to)
        }
    }

    fn instruction(message: Option<CommitterMessage>) -> BackupInstruction {
        match message {
            Some(CommitterMessage::Backup(instruction)) => instruction,
            other => panic!("expected a backup instruction, got {other:?}"),
        }
    }

    #[test]
    fn test_first_run_creates_committed_archive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();

        let mut harness = harness();
        let job = Job::new(0, &source, Kind::Regular);
        let outcome = run_job(&harness.ctx, &job).unwrap();

        assert_eq!(outcome, JobOutcome::Changed);
        assert!(temp.path().join("Letters.zip").exists());
        assert!(!temp.path().join("Letters.preview.zip").exists());

        let instruction = instruction(harness.committer.try_recv().ok());
        assert_eq!(instruction.archive, temp.path().join("Letters.zip"));
        assert_eq!(instruction.kind, Kind::Regular);
        // No comparison happens on a first run
        assert!(harness.stats.try_recv().is_err());
    }

    #[test]
    fn test_unchanged_folder_discards_candidate() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();

        let mut harness = harness();
        let job = Job::new(0, &source, Kind::Regular);
        run_job(&harness.ctx, &job).unwrap();
        let _ = harness.committer.try_recv();
        let before = fs::read(temp.path().join("Letters.zip")).unwrap();

        let outcome = run_job(&harness.ctx, &job).unwrap();

        assert_eq!(outcome, JobOutcome::Unchanged);
        assert!(!temp.path().join("Letters.preview.zip").exists());
        assert_eq!(fs::read(temp.path().join("Letters.zip")).unwrap(), before);
        assert!(harness.committer.try_recv().is_err());
        match harness.stats.try_recv() {
            Ok(StatsMessage::NoChange(notice)) => assert!(notice.starts_with("No changes detected in")),
            other => panic!("expected a no-change notice, got {other:?}"),
        }
    }

    #[test]
    fn test_changed_folder_replaces_archive_and_reports() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();
        fs::write(source.join("b.txt"), b"bye").unwrap();

        let mut harness = harness();
        let job = Job::new(4, &source, Kind::Regular);
        run_job(&harness.ctx, &job).unwrap();
        let _ = harness.committer.try_recv();

        fs::write(source.join("a.txt"), b"hello again").unwrap();
        fs::remove_file(source.join("b.txt")).unwrap();
        fs::write(source.join("c.txt"), b"new").unwrap();

        let outcome = run_job(&harness.ctx, &job).unwrap();
        assert_eq!(outcome, JobOutcome::Changed);

        match harness.stats.try_recv() {
            Ok(StatsMessage::Changes(changes)) => {
                assert_eq!(changes.differences.total(), 3);
                assert!(changes.differences.added.contains_key("c.txt"));
                assert!(changes.differences.changed.contains_key("a.txt"));
                assert!(changes.differences.removed.contains_key("b.txt"));
            }
            other => panic!("expected folder changes, got {other:?}"),
        }

        let committed = ZipBackend::new().read_snapshot(&temp.path().join("Letters.zip")).unwrap();
        assert!(committed.contains("c.txt"));
        assert!(!committed.contains("b.txt"));
        assert_eq!(instruction(harness.committer.try_recv().ok()).job_id, 4);
    }

    #[test]
    fn test_visual_studio_excludes_build_output() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Visual Studio 2015/Projects/App");
        fs::create_dir_all(source.join("bin/Debug")).unwrap();
        fs::create_dir_all(source.join("obj")).unwrap();
        fs::write(source.join("Program.cs"), b"class Program {}").unwrap();
        fs::write(source.join("bin/Debug/App.exe"), b"MZ").unwrap();
        fs::write(source.join("obj/App.pdb"), b"pdb").unwrap();

        let mut harness = harness();
        run_job(&harness.ctx, &Job::new(0, &source, Kind::VisualStudio)).unwrap();

        let archive = temp.path().join("Visual Studio 2015.zip");
        let snapshot = ZipBackend::new().read_snapshot(&archive).unwrap();
        assert_eq!(snapshot.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(), vec!["Program.cs"]);
        assert_eq!(instruction(harness.committer.try_recv().ok()).archive, archive);
    }

    #[test]
    fn test_stale_candidate_is_replaced() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();
        fs::write(temp.path().join("Letters.preview.zip"), b"left over from a crash").unwrap();

        let harness = harness();
        let outcome = run_job(&harness.ctx, &Job::new(0, &source, Kind::Regular)).unwrap();

        assert_eq!(outcome, JobOutcome::Changed);
        assert!(!temp.path().join("Letters.preview.zip").exists());
    }

    #[test]
    fn test_missing_folder_is_recoverable() {
        let temp = TempDir::new().unwrap();
        let harness = harness();
        let err = run_job(&harness.ctx, &Job::new(0, temp.path().join("gone"), Kind::Regular)).unwrap_err();

        assert!(matches!(err, BackupError::PathMissing(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_corrupt_committed_archive_leaves_no_candidate() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();
        fs::write(temp.path().join("Letters.zip"), b"not a zip").unwrap();

        let harness = harness();
        let err = run_job(&harness.ctx, &Job::new(0, &source, Kind::Regular)).unwrap_err();

        assert!(err.is_recoverable());
        assert!(!temp.path().join("Letters.preview.zip").exists());
        assert_eq!(fs::read(temp.path().join("Letters.zip")).unwrap(), b"not a zip");
    }

    #[test]
    fn test_failed_replace_reports_no_changes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Letters");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();

        let first = harness();
        run_job(&first.ctx, &Job::new(0, &source, Kind::Regular)).unwrap();
        let committed = fs::read(temp.path().join("Letters.zip")).unwrap();

        fs::write(source.join("a.txt"), b"hello again").unwrap();
        let mut harness = harness_with(Arc::new(ReplaceFails(ZipBackend::new())));
        let err = run_job(&harness.ctx, &Job::new(0, &source, Kind::Regular)).unwrap_err();

        assert!(err.is_recoverable());
        assert!(harness.stats.try_recv().is_err());
        assert!(harness.committer.try_recv().is_err());
        assert_eq!(fs::read(temp.path().join("Letters.zip")).unwrap(), committed);
        assert!(!temp.path().join("Letters.preview.zip").exists());
    }
}
