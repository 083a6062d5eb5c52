//! Moving committed archives to the destination storage.

pub mod committer;
pub mod encrypt;

pub use committer::BackupCommitter;
