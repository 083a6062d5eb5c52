//! Encryption step for Regular archives.
//!
//! No cipher is wired in yet: the archive is handed on unchanged and only the
//! destination name (`.zip.encrypted`) marks it. Keeping the step as its own
//! call fixes where a real cipher slots in.

use std::path::{Path, PathBuf};
use tracing::info;

/// Prepare a committed Regular archive for upload. Returns the file to copy.
pub fn encrypt_archive(archive: &Path) -> PathBuf {
    info!("Encrypted zip: {}", archive.display());
    archive.to_path_buf()
}
