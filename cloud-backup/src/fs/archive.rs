//! Archive and file primitives used by workers and the committer.
//!
//! [`ArchiveBackend`] is the seam between the orchestration code and the
//! filesystem. [`ZipBackend`] is the production implementation; tests can
//! substitute their own to inject failures.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::sync::snapshot::{EntryIdentity, Snapshot};
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Filesystem and archive operations needed by a backup run.
///
/// All operations are blocking; callers run them off the async executor.
pub trait ArchiveBackend: Send + Sync {
    /// Whether `path` exists and is a directory
    fn directory_exists(&self, path: &Path) -> bool;

    /// Whether a file exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Archive the files below `source` into a new archive at `archive`.
    ///
    /// Returns the snapshot of what was written.
    fn create_from_directory(&self, source: &Path, archive: &Path, options: &WalkOptions) -> Result<Snapshot>;

    /// Read the entry list of an existing archive
    fn read_snapshot(&self, archive: &Path) -> Result<Snapshot>;

    /// Move `candidate` over `committed` in a single rename
    fn replace(&self, candidate: &Path, committed: &Path) -> Result<()>;

    /// Delete a file
    fn delete(&self, path: &Path) -> Result<()>;

    /// Copy a file, overwriting the target. Returns the bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
}

/// Zip archives on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBackend;

impl ZipBackend {
    pub fn new() -> Self {
        Self
    }

    fn file_options(&self, size: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u64::from(u32::MAX))
    }

    fn write_archive(&self, source: &Path, archive: &Path, options: &WalkOptions) -> Result<Snapshot> {
        let files = walk_directory(source, options)?;

        let out = File::create(archive).map_err(|e| BackupError::archive_io(archive, e))?;
        let mut writer = ZipWriter::new(BufWriter::new(out));

        for file in &files {
            let name = file.archive_name();
            writer
                .start_file(name.as_str(), self.file_options(file.size))
                .map_err(|e| BackupError::zip(archive, e))?;

            let mut input = File::open(&file.path).map_err(|e| BackupError::archive_io(&file.path, e))?;
            io::copy(&mut input, &mut writer).map_err(|e| BackupError::archive_io(archive, e))?;
        }

        let mut out = writer.finish().map_err(|e| BackupError::zip(archive, e))?;
        out.flush().map_err(|e| BackupError::archive_io(archive, e))?;
        drop(out);

        // Identities come from the written central directory so both sides of
        // a later comparison are read the same way.
        let snapshot = self.read_snapshot(archive)?;

        debug!(archive = %archive.display(), entries = snapshot.len(), "Archive written");
        Ok(snapshot)
    }
}

impl ArchiveBackend for ZipBackend {
    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_from_directory(&self, source: &Path, archive: &Path, options: &WalkOptions) -> Result<Snapshot> {
        if !self.directory_exists(source) {
            return Err(BackupError::PathMissing(source.to_path_buf()));
        }

        let result = self.write_archive(source, archive, options);
        if result.is_err() && archive.exists() {
            // Never leave a half-written candidate behind
            let _ = fs::remove_file(archive);
        }
        result
    }

    fn read_snapshot(&self, archive: &Path) -> Result<Snapshot> {
        let file = File::open(archive).map_err(|e| BackupError::archive_io(archive, e))?;
        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| BackupError::zip(archive, e))?;

        let mut snapshot = Snapshot::new();
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index).map_err(|e| BackupError::zip(archive, e))?;
            if entry.is_dir() {
                continue;
            }
            snapshot.insert(entry.name(), EntryIdentity::new(entry.size(), entry.crc32()));
        }

        Ok(snapshot)
    }

    fn replace(&self, candidate: &Path, committed: &Path) -> Result<()> {
        fs::rename(candidate, committed).map_err(|e| BackupError::archive_io(committed, e))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| BackupError::archive_io(path, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).map_err(|e| BackupError::archive_io(from, e))
    }
}
