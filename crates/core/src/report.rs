use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::DispatchOutcome;

/// Number of failures shown in human-readable summaries.
pub const FAILURE_DISPLAY_CAP: usize = 10;

/// Final tally of one import run.
///
/// `total == succeeded + failed` always holds; skipped records never
/// became outcomes and are counted separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records the mapper rejected (missing or malformed email).
    pub skipped_invalid: usize,
    /// Source rows dropped before mapping (too few columns).
    pub skipped_malformed: usize,
    /// Successes that were already present at the destination.
    pub already_existed: usize,
    pub cancelled: bool,
    /// Every failed outcome, in aggregation order.
    pub failures: Vec<DispatchOutcome>,
}

impl ImportReport {
    /// Fraction of dispatched contacts that succeeded, in percent.
    /// An empty run reports 0%.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }

    /// The first `cap` failures plus how many were left out.
    pub fn failures_preview(&self, cap: usize) -> (&[DispatchOutcome], usize) {
        let shown = self.failures.len().min(cap);
        (&self.failures[..shown], self.failures.len() - shown)
    }

    /// Plain-text summary block. Failure detail is capped at `cap` lines.
    pub fn summary_lines(&self, cap: usize) -> Vec<String> {
        let mut lines = vec![
            format!("Total dispatched:   {}", self.total),
            format!("Succeeded:          {}", self.succeeded),
            format!("  already existed:  {}", self.already_existed),
            format!("Failed:             {}", self.failed),
            format!("Skipped (invalid):  {}", self.skipped_invalid),
            format!("Skipped (malformed): {}", self.skipped_malformed),
            format!("Success rate:       {:.1}%", self.success_rate()),
        ];
        if self.cancelled {
            lines.push("Run was cancelled before the source was exhausted".to_string());
        }

        let (shown, hidden) = self.failures_preview(cap);
        if !shown.is_empty() {
            lines.push("Failures:".to_string());
            for f in shown {
                let status = f
                    .status_code
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                lines.push(format!(
                    "  {} [{}] {}",
                    f.email,
                    status,
                    f.error.as_deref().unwrap_or("unknown error")
                ));
            }
            if hidden > 0 {
                lines.push(format!("  ...and {hidden} more"));
            }
        }
        lines
    }
}
