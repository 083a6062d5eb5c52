//! Archive and destination path derivation.
//!
//! | Kind | Committed archive | Destination file |
//! |------|-------------------|------------------|
//! | Regular | `<folder>.zip` | `<destination>/<folder name>.zip.encrypted` |
//! | VisualStudio | `<parent of last "Projects">.zip` | `<destination>/<archive file name>` |
//!
//! The candidate archive always sits next to the committed one as
//! `<name>.preview.zip`.

use crate::messages::{BackupInstruction, Kind};
use crate::utils::errors::{BackupError, Result};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

const ARCHIVE_EXTENSION: &str = "zip";
const CANDIDATE_EXTENSION: &str = "preview.zip";
const ENCRYPTED_SUFFIX: &str = ".zip.encrypted";
const PROJECTS_SEGMENT: &str = "Projects";

/// Path of the committed archive for a source folder
pub fn committed_archive_path(source: &Path, kind: Kind) -> Result<PathBuf> {
    let folder = match kind {
        Kind::Regular => normalize(source),
        Kind::VisualStudio => umbrella_folder(source)?,
    };

    if folder.file_name().is_none() {
        return Err(BackupError::InvalidSourcePath(format!(
            "{} has no folder name",
            source.display()
        )));
    }

    Ok(with_suffix(&folder, ARCHIVE_EXTENSION))
}

/// Path of the candidate archive built next to a committed archive
pub fn candidate_archive_path(committed: &Path) -> PathBuf {
    committed.with_extension(CANDIDATE_EXTENSION)
}

/// Destination file for a backup instruction
pub fn destination_path(destination_dir: &Path, instruction: &BackupInstruction) -> Result<PathBuf> {
    let file_name = match instruction.kind {
        Kind::VisualStudio => instruction.archive.file_name().map(OsString::from),
        Kind::Regular => normalize(&instruction.source).file_name().map(|name| {
            let mut name = name.to_os_string();
            name.push(ENCRYPTED_SUFFIX);
            name
        }),
    };

    file_name
        .map(|name| destination_dir.join(name))
        .ok_or_else(|| {
            BackupError::InvalidSourcePath(format!(
                "cannot name a destination file for {}",
                instruction.source.display()
            ))
        })
}

/// Folder above the last `Projects` segment of a Visual Studio path
fn umbrella_folder(source: &Path) -> Result<PathBuf> {
    let components: Vec<Component<'_>> = source.components().collect();
    let projects = components
        .iter()
        .rposition(|c| c.as_os_str() == PROJECTS_SEGMENT)
        .ok_or_else(|| {
            BackupError::InvalidSourcePath(format!(
                "{} has no {} segment",
                source.display(),
                PROJECTS_SEGMENT
            ))
        })?;

    Ok(components[..projects].iter().collect())
}

/// Drop trailing separators and `.` segments
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

fn with_suffix(folder: &Path, extension: &str) -> PathBuf {
    let mut path = folder.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
