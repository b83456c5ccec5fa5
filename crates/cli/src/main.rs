mod cli;
mod config;
mod terminal;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use mailsync_core::config::load_dotenv;
use mailsync_core::{ImportError, ImportReport};
use mailsync_pipeline::Importer;

use crate::cli::CliArgs;
use crate::config::build_config;
use crate::terminal::{ProgressPrinter, Terminal};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    load_dotenv();

    // Logs go to stderr; stdout carries progress and the summary.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let terminal = Terminal::new();

    let config = build_config(&args).context("invalid arguments")?;
    config.log_summary();
    terminal.print_banner(&config)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current batch");
                cancel.cancel();
            }
        });
    }

    let importer = Importer::new(config)
        .with_observer(Arc::new(ProgressPrinter::new()))
        .with_cancellation(cancel);

    let report = match importer.run().await {
        Ok(report) => report,
        Err(e) => return import_failed(&terminal, &e),
    };

    terminal.print_summary(&report)?;

    if let Some(path) = &args.report_json {
        write_report(path, &report)?;
        terminal.print_info(&format!("Report written to {}", path.display()))?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Report an aborted run once, on the terminal, and fail the process.
fn import_failed(terminal: &Terminal, err: &ImportError) -> Result<ExitCode> {
    error!(error = %err, "import aborted");
    terminal.print_error(&err.to_string())?;
    Ok(ExitCode::FAILURE)
}

fn write_report(path: &Path, report: &ImportReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(())
}
