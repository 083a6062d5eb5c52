//! Process-level concerns around a run.

pub mod shutdown;
