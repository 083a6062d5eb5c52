//! Source folder list and dispatch plan.

use crate::messages::{Job, Kind};
use crate::utils::errors::{BackupError, Result};
use std::path::Path;

/// Trim each line and drop the blank ones
pub fn load_paths<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| line.as_ref().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Read the source folder list, one path per line
pub fn read_source_paths(file: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(file).map_err(|e| {
        BackupError::Config(format!(
            "failed to read source folder list {}: {}",
            file.display(),
            e
        ))
    })?;
    Ok(load_paths(content.lines()))
}

/// Classify every path and order the jobs for dispatch.
///
/// Visual Studio folders come first, then Regular ones; each group keeps the
/// order of the list. Job ids follow dispatch order.
pub fn plan_jobs(paths: &[String], visual_studio_marker: &str) -> Vec<Job> {
    let (visual_studio, regular): (Vec<&String>, Vec<&String>) = paths
        .iter()
        .partition(|path| Kind::classify(path, visual_studio_marker) == Kind::VisualStudio);

    visual_studio
        .into_iter()
        .map(|path| (path, Kind::VisualStudio))
        .chain(regular.into_iter().map(|path| (path, Kind::Regular)))
        .enumerate()
        .map(|(id, (path, kind))| Job::new(id, path, kind))
        .collect()
}
