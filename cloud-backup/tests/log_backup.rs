//! The log file copied at Finalize holds the run's own closing lines.
//!
//! Kept in its own test binary: it installs the global subscriber.

use cloud_backup::config::LogOutput;
use cloud_backup::utils::logger;
use cloud_backup::{Config, Coordinator, RunOutcome, ZipBackend};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn copied_log_contains_finalize_lines() {
    let temp = TempDir::new().unwrap();
    let log_dir = temp.path().join("logs");
    std::env::remove_var("RUST_LOG");
    let _guards = logger::init("info", LogOutput::File, &log_dir, "cloud-backup.log").unwrap();

    let mut config = Config::default();
    config.backup.log_dir = log_dir;
    config.backup.log_files = vec!["cloud-backup.log".to_string()];

    for run in 0..10 {
        config.backup.destination_dir = temp.path().join(format!("destination-{run}"));
        let coordinator = Coordinator::new(&config, Vec::new(), Arc::new(ZipBackend::new()));
        let run_id = coordinator.run_id().to_string();
        let report = coordinator.run().await;

        match report.outcome {
            RunOutcome::Finalized { log_backup } => assert!(log_backup.failed.is_empty()),
            other => panic!("expected a finalized run, got {other:?}"),
        }

        let copied = fs::read_to_string(config.backup.destination_dir.join("cloud-backup.log")).unwrap();
        let own_lines: Vec<&str> = copied
            .lines()
            .skip_while(|line| !line.contains(&run_id))
            .collect();
        assert!(!own_lines.is_empty(), "run {run} start missing from the copied log");
        assert!(
            own_lines.iter().any(|line| line.contains("Finished processing 0 folders.")),
            "run {run} finalize line missing from the copied log"
        );
    }
}
