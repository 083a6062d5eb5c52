//! Snapshot comparison.
//!
//! [`snapshot`] describes what an archive holds; [`diff`] compares two of them.

pub mod diff;
pub mod snapshot;
