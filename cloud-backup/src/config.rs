//! Configuration management for the backup run.
//!
//! Loads configuration from a TOML file; every field has a default so a
//! partial file (or no file at all) is valid.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// File listing one source folder per line
    #[serde(default = "default_source_paths_file")]
    pub source_paths_file: PathBuf,

    /// Destination storage root that committed archives are copied into
    #[serde(default = "default_destination_dir")]
    pub destination_dir: PathBuf,

    /// Directory holding the auxiliary log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log file names copied to the destination when the run finalizes
    #[serde(default = "default_log_files")]
    pub log_files: Vec<String>,

    /// Substring that marks a source folder as a Visual Studio project
    #[serde(default = "default_visual_studio_marker")]
    pub visual_studio_marker: String,

    /// Path segments left out of Visual Studio archives
    #[serde(default = "default_excluded_segments")]
    pub excluded_segments: Vec<String>,
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_stdout(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }

    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output (stdout, file, both)
    #[serde(default = "default_log_output")]
    pub output: LogOutput,

    /// Name of the log file written under `backup.log_dir`
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Upper bound on worker tasks. Unset means one worker per folder.
    #[serde(default)]
    pub max_workers: Option<usize>,
}

// Default values
fn default_source_paths_file() -> PathBuf {
    PathBuf::from("SourceFolderPaths.txt")
}

fn default_destination_dir() -> PathBuf {
    PathBuf::from("backup-destination")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_files() -> Vec<String> {
    vec![default_log_file_name()]
}

fn default_visual_studio_marker() -> String {
    "Visual Studio".to_string()
}

fn default_excluded_segments() -> Vec<String> {
    vec!["bin".to_string(), "obj".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> LogOutput {
    LogOutput::Both
}

fn default_log_file_name() -> String {
    "cloud-backup.log".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_paths_file: default_source_paths_file(),
            destination_dir: default_destination_dir(),
            log_dir: default_log_dir(),
            log_files: default_log_files(),
            visual_studio_marker: default_visual_studio_marker(),
            excluded_segments: default_excluded_segments(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
            file_name: default_log_file_name(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| BackupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backup.visual_studio_marker.trim().is_empty() {
            return Err(BackupError::Config(
                "backup.visual_studio_marker must not be empty".to_string(),
            ));
        }
        if self.performance.max_workers == Some(0) {
            return Err(BackupError::Config(
                "performance.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
