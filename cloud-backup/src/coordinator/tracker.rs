//! Completion tracking for a run.

use crate::messages::{JobCompleted, JobId, JobOutcome};
use std::collections::HashSet;
use tracing::warn;

/// Completions per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Counts completion signals against the number of jobs in the run.
///
/// Each job counts once, however many signals arrive for it, and the count
/// never exceeds the total. [`CompletionTracker::try_finalize`] reports
/// completion exactly once.
#[derive(Debug)]
pub struct CompletionTracker {
    total: usize,
    completed: HashSet<JobId>,
    counts: OutcomeCounts,
    finalized: bool,
}

impl CompletionTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: HashSet::with_capacity(total),
            counts: OutcomeCounts::default(),
            finalized: false,
        }
    }

    /// Record a completion signal.
    ///
    /// Returns true when this signal completes the run.
    pub fn record(&mut self, signal: &JobCompleted) -> bool {
        if self.finalized {
            warn!(
                job_id = signal.job_id,
                path = %signal.source.display(),
                "Completion received after the run finalized, ignoring"
            );
            return false;
        }

        if signal.job_id >= self.total {
            warn!(
                job_id = signal.job_id,
                path = %signal.source.display(),
                "Completion received for an unknown job, ignoring"
            );
            return false;
        }

        if !self.completed.insert(signal.job_id) {
            warn!(
                job_id = signal.job_id,
                path = %signal.source.display(),
                "Duplicate completion received, ignoring"
            );
            return false;
        }

        match signal.outcome {
            JobOutcome::Changed => self.counts.changed += 1,
            JobOutcome::Unchanged => self.counts.unchanged += 1,
            JobOutcome::Skipped => self.counts.skipped += 1,
        }

        self.try_finalize()
    }

    /// Mark the run finalized if every job has reported.
    ///
    /// True at most once per tracker. A run with no jobs finalizes on the
    /// first call.
    pub fn try_finalize(&mut self) -> bool {
        if self.finalized || self.completed.len() < self.total {
            return false;
        }
        self.finalized = true;
        true
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.completed.len()
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Job, Kind};

    fn signal(id: JobId, outcome: JobOutcome) -> JobCompleted {
        Job::new(id, format!("/data/folder-{id}"), Kind::Regular).completed(outcome)
    }

    #[test]
    fn test_finalizes_on_last_completion() {
        let mut tracker = CompletionTracker::new(3);

        assert!(!tracker.record(&signal(0, JobOutcome::Changed)));
        assert!(!tracker.record(&signal(2, JobOutcome::Skipped)));
        assert!(!tracker.is_finalized());
        assert!(tracker.record(&signal(1, JobOutcome::Unchanged)));

        assert!(tracker.is_finalized());
        assert_eq!(tracker.processed(), 3);
        assert_eq!(
            tracker.counts(),
            OutcomeCounts {
                changed: 1,
                unchanged: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_signal_counts_once() {
        let mut tracker = CompletionTracker::new(2);

        assert!(!tracker.record(&signal(0, JobOutcome::Changed)));
        assert!(!tracker.record(&signal(0, JobOutcome::Changed)));
        assert_eq!(tracker.processed(), 1);
        assert!(!tracker.is_finalized());

        assert!(tracker.record(&signal(1, JobOutcome::Changed)));
    }

    #[test]
    fn test_signals_after_finalize_are_ignored() {
        let mut tracker = CompletionTracker::new(1);
        assert!(tracker.record(&signal(0, JobOutcome::Unchanged)));

        assert!(!tracker.record(&signal(0, JobOutcome::Unchanged)));
        assert!(!tracker.try_finalize());
        assert_eq!(tracker.processed(), 1);
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let mut tracker = CompletionTracker::new(1);
        assert!(!tracker.record(&signal(5, JobOutcome::Changed)));
        assert_eq!(tracker.processed(), 0);
    }

    #[test]
    fn test_empty_run_finalizes_once() {
        let mut tracker = CompletionTracker::new(0);
        assert!(tracker.try_finalize());
        assert!(!tracker.try_finalize());
        assert_eq!(tracker.total(), 0);
    }
}
