use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use mailsync_core::report::FAILURE_DISPLAY_CAP;
use mailsync_core::{DispatchOutcome, ImportConfig, ImportReport, ValidationError};
use mailsync_pipeline::ImportObserver;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const CREATED: Color = Color::Green;
    const EXISTING: Color = Color::DarkGreen;
    const SKIPPED: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Writes the banner, summary and errors to stdout.
#[derive(Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print the startup banner.
    pub fn print_banner(&self, config: &ImportConfig) -> Result<()> {
        let mut stdout = io::stdout();
        let source = config
            .source
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("mailsync"),
            ResetColor,
            Print(" - contact import\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Source: {source}\n")),
            Print(format!(
                "Mode: {} | batch size: {} | delay: {}ms | attempts: {}\n",
                config.pacing.mode,
                config.pacing.batch_size,
                config.pacing.delay.as_millis(),
                config.retry.max_attempts
            )),
            Print("Ctrl+C stops after the current batch.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the final report, failures capped for readability.
    pub fn print_summary(&self, report: &ImportReport) -> Result<()> {
        let mut stdout = io::stdout();
        let rate_color = if report.failed == 0 { Colors::CREATED } else { Colors::SKIPPED };
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::HEADER),
            Print(format!("Import summary (run {})\n", report.run_id)),
            ResetColor,
        )?;
        let mut in_failures = false;
        for line in report.summary_lines(FAILURE_DISPLAY_CAP) {
            in_failures |= line.starts_with("Failures");
            let color = if in_failures {
                Colors::ERROR
            } else if line.starts_with("Success rate") {
                rate_color
            } else if line.starts_with("Run was cancelled") {
                Colors::SKIPPED
            } else {
                Color::Reset
            };
            execute!(stdout, SetForegroundColor(color), Print(format!("{line}\n")), ResetColor)?;
        }
        let elapsed = report.finished_at - report.started_at;
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("Elapsed: {:.1}s\n", elapsed.num_milliseconds() as f64 / 1000.0)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

/// Per-contact progress lines.
#[derive(Default)]
pub struct ProgressPrinter {
    processed: AtomicUsize,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, color: Color, text: String) {
        let mut stdout = io::stdout();
        // Progress is best effort; a closed stdout must not stop the run.
        execute!(stdout, SetForegroundColor(color), Print(text), ResetColor).ok();
        stdout.flush().ok();
    }
}

/// Short status label for an outcome.
pub fn outcome_label(outcome: &DispatchOutcome) -> &'static str {
    match (outcome.success, outcome.is_already_exists()) {
        (true, true) => "exists",
        (true, false) => "created",
        (false, _) => "failed",
    }
}

impl ImportObserver for ProgressPrinter {
    fn on_outcome(&self, outcome: &DispatchOutcome) {
        let n = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let color = match outcome_label(outcome) {
            "created" => Colors::CREATED,
            "exists" => Colors::EXISTING,
            _ => Colors::ERROR,
        };
        let detail = match (&outcome.error, outcome.status_code) {
            (Some(err), Some(status)) => format!(" ({status}: {err})"),
            (Some(err), None) => format!(" ({err})"),
            (None, Some(status)) => format!(" ({status})"),
            (None, None) => String::new(),
        };
        self.line(
            color,
            format!("[{n:>5}] {:<8} {}{detail}\n", outcome_label(outcome), outcome.email),
        );
    }

    fn on_skip(&self, error: &ValidationError) {
        self.line(Colors::SKIPPED, format!("[ skip] {error}\n"));
    }

    fn on_batch_complete(&self, index: usize, size: usize) {
        if size > 1 {
            self.line(Colors::DIM, format!("-- batch {index} done ({size} contacts)\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_outcome() {
        assert_eq!(outcome_label(&DispatchOutcome::created("a@x.com", 201, 1)), "created");
        assert_eq!(outcome_label(&DispatchOutcome::already_exists("a@x.com", 409, 1)), "exists");
        assert_eq!(
            outcome_label(&DispatchOutcome::failed("a@x.com", Some(500), "boom", 3)),
            "failed"
        );
    }

    #[test]
    fn progress_counts_outcomes() {
        let printer = ProgressPrinter::new();
        printer.on_outcome(&DispatchOutcome::created("a@x.com", 201, 1));
        printer.on_outcome(&DispatchOutcome::failed("b@x.com", None, "timeout", 3));
        assert_eq!(printer.processed.load(Ordering::SeqCst), 2);
    }
}
