//! Logging configuration using tracing.

use crate::config::LogOutput;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level.
///
/// When `output` includes a file, log lines are also written to
/// `log_dir/file_name`, which is one of the files copied to the destination
/// once the run finalizes; those writes are synchronous. The returned guards
/// flush the non-blocking stdout writer on drop and must be held until the
/// process exits.
pub fn init(
    level: &str,
    output: LogOutput,
    log_dir: &Path,
    file_name: &str,
) -> anyhow::Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut guards = Vec::new();

    let stdout_layer = if output.writes_stdout() {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(false),
        )
    } else {
        None
    };

    let file_layer = if output.writes_file() {
        std::fs::create_dir_all(log_dir)?;
        // Synchronous: the file is copied at Finalize and must already hold
        // every line logged before that point.
        let appender = tracing_appender::rolling::never(log_dir, file_name);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guards)
}
