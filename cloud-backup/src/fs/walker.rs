//! Directory traversal for building archives.
//!
//! Collects every regular file below a source folder together with the
//! archive entry name it is stored under. Any entry whose name matches one of
//! the excluded segments is skipped; for a directory that includes everything
//! below it.

use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Path segments excluded anywhere below the root
    pub excluded_segments: Vec<String>,
}

impl WalkOptions {
    /// Walk everything below the root
    pub fn all() -> Self {
        Self::default()
    }

    /// Leave out entries with one of the given names
    pub fn excluding<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            follow_links: false,
            excluded_segments: segments.into_iter().map(Into::into).collect(),
        }
    }
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> Result<Self, walkdir::Error> {
        let metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Self {
            path,
            relative_path,
            size: metadata.len(),
        })
    }

    /// Entry name inside an archive: relative path joined with `/`
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk a directory tree and collect all files
///
/// # Arguments
/// * `root` - Root directory to start walking from
/// * `options` - Walking options
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - Files found, in a stable (sorted) order
/// * `Err(walkdir::Error)` - If a directory cannot be read
pub fn walk_directory(root: &Path, options: &WalkOptions) -> Result<Vec<FileInfo>, walkdir::Error> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !should_exclude(entry, &options.excluded_segments));

    for entry in walker {
        let entry = entry?;

        // Only files end up in the archive
        if !entry.file_type().is_file() {
            continue;
        }

        files.push(FileInfo::from_entry(&entry, root)?);
    }

    Ok(files)
}

/// Check if an entry below the root is excluded by name
fn should_exclude(entry: &DirEntry, segments: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    segments.iter().any(|s| name == s.as_str())
}
