//! Utility modules for the backup run.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{BackupError, Result};
