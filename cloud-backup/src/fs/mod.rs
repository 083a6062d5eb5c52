//! File system access for the backup run.

pub mod archive;
pub mod paths;
pub mod walker;
