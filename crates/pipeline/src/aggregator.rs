//! Folds dispatch outcomes into an [`ImportReport`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mailsync_core::{DispatchOutcome, ImportReport};

/// Running tally for one import run.
///
/// Outcomes are appended by the single coordinating task in the order
/// they are handed over; concurrent batch tasks only return values.
#[derive(Debug)]
pub struct Aggregator {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    succeeded: usize,
    already_existed: usize,
    failures: Vec<DispatchOutcome>,
    skipped_invalid: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            succeeded: 0,
            already_existed: 0,
            failures: Vec::new(),
            skipped_invalid: 0,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record(&mut self, outcome: DispatchOutcome) {
        if outcome.success {
            self.succeeded += 1;
            if outcome.is_already_exists() {
                self.already_existed += 1;
            }
        } else {
            self.failures.push(outcome);
        }
    }

    pub fn record_all(&mut self, outcomes: impl IntoIterator<Item = DispatchOutcome>) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    pub fn skip_invalid(&mut self) {
        self.skipped_invalid += 1;
    }

    /// Outcomes recorded so far.
    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn finish(self, skipped_malformed: usize, cancelled: bool) -> ImportReport {
        ImportReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            total: self.succeeded + self.failures.len(),
            succeeded: self.succeeded,
            failed: self.failures.len(),
            skipped_invalid: self.skipped_invalid,
            skipped_malformed,
            already_existed: self.already_existed,
            cancelled,
            failures: self.failures,
        }
    }
}

/// Reduce a finished stream of outcomes plus the mapper's skip count.
pub fn aggregate(
    outcomes: impl IntoIterator<Item = DispatchOutcome>,
    skipped_count: usize,
) -> ImportReport {
    let mut aggregator = Aggregator::new();
    aggregator.record_all(outcomes);
    aggregator.skipped_invalid = skipped_count;
    aggregator.finish(0, false)
}
