//! Statistics Reporter: logs what changed in each folder.
//!
//! Purely an observer. It keeps no state between messages and nothing it does
//! can affect how the run completes.

use crate::messages::{FolderChanges, StatsMessage};
use crate::sync::diff::Differences;
use crate::utils::format::format_bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct StatisticsReporter;

impl StatisticsReporter {
    /// Start the reporter task. It stops once every sender is dropped.
    pub fn spawn() -> (mpsc::UnboundedSender<StatsMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run(rx));
        (tx, handle)
    }

    async fn run(mut inbox: mpsc::UnboundedReceiver<StatsMessage>) {
        while let Some(message) = inbox.recv().await {
            match message {
                StatsMessage::Changes(changes) => {
                    info!("Received: FolderChanges for {}", changes.archive.display());
                    for line in change_report(&changes) {
                        info!("{}", line);
                    }
                }
                StatsMessage::NoChange(notice) => info!("Received: {}", notice),
            }
        }

        debug!("Statistics reporter stopped");
    }
}

/// Log lines describing one folder's changes.
///
/// The folder and difference count come first, then each non-empty bucket
/// as a label followed by one line per entry.
pub fn change_report(changes: &FolderChanges) -> Vec<String> {
    let differences = &changes.differences;
    let mut lines = vec![
        format!("In {}...", changes.archive.display()),
        format!("Number of differences = {}.", differences.total()),
    ];

    push_buckets(&mut lines, differences);
    lines
}

fn push_buckets(lines: &mut Vec<String>, differences: &Differences) {
    if !differences.added.is_empty() {
        lines.push("Added...".to_string());
        for (path, entry) in &differences.added {
            lines.push(format!("  {} ({})", path, format_bytes(entry.size)));
        }
    }

    if !differences.changed.is_empty() {
        lines.push("Changed...".to_string());
        for (path, change) in &differences.changed {
            lines.push(format!(
                "  {} ({} -> {})",
                path,
                format_bytes(change.previous.size),
                format_bytes(change.candidate.size)
            ));
        }
    }

    if !differences.removed.is_empty() {
        lines.push("Removed...".to_string());
        for (path, entry) in &differences.removed {
            lines.push(format!("  {} ({})", path, format_bytes(entry.size)));
        }
    }
}
