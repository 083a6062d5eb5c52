//! Cloud Backup Library
//!
//! Snapshot-and-compare folder backup. Every source folder is archived into a
//! candidate, compared with its committed archive and, when it changed,
//! promoted and copied to the destination storage. Folders are processed by a
//! pool of isolated workers under a single coordinator.

pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod messages;
pub mod stats;
pub mod sync;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, RunOutcome, RunReport};
pub use fs::archive::{ArchiveBackend, ZipBackend};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
