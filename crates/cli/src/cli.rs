use std::path::PathBuf;

use clap::Parser;
use mailsync_core::SchedulingMode;

/// Bulk-import contacts into Plunk.
///
/// Reads contacts from a delimited or JSON file, a REST table, an SQL RPC
/// or PostgreSQL, and creates each one through the Plunk contacts API with
/// pacing and retries. Credentials come from the environment (or `.env`).
#[derive(Parser, Debug)]
#[command(name = "mailsync", version, about = "Bulk-import contacts into Plunk")]
pub struct CliArgs {
    /// Contact source: a .csv/.tsv/.json/.jsonl path, `rest:<table>`,
    /// `rpc:<function>` or `postgres`
    #[arg(long)]
    pub source: String,

    /// Field delimiter for delimited files (default: tab for .tsv, comma otherwise)
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Treat the first row of a delimited file as a header
    #[arg(long)]
    pub skip_header: bool,

    /// Column index or field name holding the email address
    #[arg(long)]
    pub email_column: Option<String>,

    /// Copy a source value into an attribute, e.g. `name=1` or `city=city`
    #[arg(long = "field", value_name = "NAME=KEY")]
    pub fields: Vec<String>,

    /// Like --field, but parse the value as a boolean
    #[arg(long = "flag-field", value_name = "NAME=KEY")]
    pub flag_fields: Vec<String>,

    /// Column index or field name holding the subscribed flag
    #[arg(long)]
    pub subscribed_field: Option<String>,

    /// Contacts without a subscribed value are created unsubscribed
    #[arg(long)]
    pub unsubscribed_by_default: bool,

    /// TOML file describing the field map
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// Contacts dispatched concurrently per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pause between batches (or contacts in sequential mode), in seconds
    #[arg(long)]
    pub delay: Option<f64>,

    /// Attempts per contact, including the first
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Pause between attempts, in seconds
    #[arg(long)]
    pub backoff: Option<f64>,

    /// Grow the backoff by this factor after each failed attempt
    #[arg(long)]
    pub backoff_multiplier: Option<f64>,

    /// Scheduling mode: batch or sequential
    #[arg(long)]
    pub mode: Option<SchedulingMode>,

    /// Columns to select from a REST table
    #[arg(long)]
    pub select: Option<String>,

    /// REST filter, e.g. `email=not.is.null` (repeatable)
    #[arg(long = "filter", value_name = "COLUMN=EXPR")]
    pub filters: Vec<String>,

    /// SQL for rpc and postgres sources
    #[arg(long)]
    pub query: Option<String>,

    /// Rows per page for paged sources
    #[arg(long)]
    pub page_size: Option<usize>,

    /// REST table with profile rows to join onto each record
    #[arg(long)]
    pub join_table: Option<String>,

    /// Join keys as `RECORD_KEY=PROFILE_KEY`
    #[arg(long, default_value = "id=id")]
    pub join_on: String,

    /// Send attributes under `data` instead of at the top level
    #[arg(long)]
    pub nest_attributes: bool,

    /// Write the full report as JSON to this path
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Configuration profile (prefix for environment keys)
    #[arg(long, env = "MAILSYNC_PROFILE")]
    pub profile: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_invocation() {
        let args = CliArgs::try_parse_from([
            "mailsync",
            "--source",
            "contacts.csv",
            "--field",
            "name=1",
            "--field",
            "city=2",
            "--batch-size",
            "5",
            "--delay",
            "0.5",
            "--mode",
            "sequential",
        ])
        .unwrap();
        assert_eq!(args.fields, vec!["name=1", "city=2"]);
        assert_eq!(args.batch_size, Some(5));
        assert_eq!(args.delay, Some(0.5));
        assert_eq!(args.mode, Some(SchedulingMode::Sequential));
        assert_eq!(args.join_on, "id=id");
    }

    #[test]
    fn source_is_required() {
        assert!(CliArgs::try_parse_from(["mailsync"]).is_err());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(CliArgs::try_parse_from(["mailsync", "--source", "a.csv", "--mode", "parallel"]).is_err());
    }
}
