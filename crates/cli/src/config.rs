//! Turns command-line arguments into an [`ImportConfig`].
//!
//! Environment values (profile-aware) are loaded first; flags override
//! them. The field map comes from an optional TOML mapping file, then
//! `--email-column`, `--field`, `--flag-field` and `--subscribed-field`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use mailsync_core::config::{
    FieldMap, PacingConfig, SourceDescriptor, TableQuery, DEFAULT_PAGE_SIZE,
};
use mailsync_core::{ImportConfig, SourceKey};

use crate::cli::CliArgs;

/// Field map as written in a mapping file.
///
/// ```toml
/// email = "email"          # or a column index: email = 0
/// subscribed = "opt_in"
/// default_subscribed = true
///
/// [[attributes]]
/// name = "name"
/// source = "full_name"
///
/// [[attributes]]
/// name = "verified"
/// source = 3
/// flag = true
/// ```
#[derive(Debug, Deserialize)]
pub struct MappingFile {
    #[serde(flatten)]
    pub field_map: FieldMap,
    #[serde(default)]
    pub default_subscribed: Option<bool>,
}

impl MappingFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping file: {}", path.display()))?;
        let mapping: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse mapping file: {}", path.display()))?;
        debug!(path = %path.display(), attributes = mapping.field_map.attributes.len(), "loaded mapping file");
        Ok(mapping)
    }
}

/// Build the run configuration from the environment and `args`.
pub fn build_config(args: &CliArgs) -> Result<ImportConfig> {
    let mut config = match args.profile.as_deref() {
        Some(profile) => ImportConfig::for_profile(profile),
        None => ImportConfig::from_env(),
    };

    let source = parse_source(args)?;

    let mut explicit_email = false;
    if let Some(path) = &args.mapping {
        let mapping = MappingFile::load(path)?;
        config.field_map = mapping.field_map;
        if let Some(default) = mapping.default_subscribed {
            config.default_subscribed = default;
        }
        explicit_email = true;
    }
    if let Some(key) = &args.email_column {
        config.field_map.email = parse_key(key);
        explicit_email = true;
    }
    if !explicit_email && !source.has_columns() {
        config.field_map.email = SourceKey::Name("email".to_string());
    }
    for entry in &args.fields {
        let (name, key) = parse_assignment(entry, "--field")?;
        config.field_map = config.field_map.with_attribute(name, key);
    }
    for entry in &args.flag_fields {
        let (name, key) = parse_assignment(entry, "--flag-field")?;
        config.field_map = config.field_map.with_flag(name, key);
    }
    if let Some(key) = &args.subscribed_field {
        config.field_map.subscribed = Some(parse_key(key));
    }
    if args.unsubscribed_by_default {
        config.default_subscribed = false;
    }
    config.source = Some(source);

    if let Some(mode) = args.mode {
        let delay_set = args.delay.is_some() || PacingConfig::delay_from_env(&config.profile);
        if !delay_set && mode != config.pacing.mode {
            config.pacing.delay = Duration::from_millis(PacingConfig::default_delay_ms(mode));
        }
        config.pacing.mode = mode;
    }
    if let Some(size) = args.batch_size {
        config.pacing.batch_size = size;
    }
    if let Some(delay) = args.delay {
        config.pacing.delay = seconds(delay, "--delay")?;
    }
    if let Some(attempts) = args.max_retries {
        config.retry.max_attempts = attempts;
    }
    if let Some(backoff) = args.backoff {
        config.retry.backoff = seconds(backoff, "--backoff")?;
    }
    if let Some(multiplier) = args.backoff_multiplier {
        config.retry.backoff_multiplier = multiplier;
    }
    if args.nest_attributes {
        config.plunk.nest_attributes = true;
    }

    Ok(config)
}

/// Interpret `--source` (plus the flags that qualify it).
pub fn parse_source(args: &CliArgs) -> Result<SourceDescriptor> {
    let page_size = args.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    let base = if let Some(table) = args.source.strip_prefix("rest:") {
        let mut query = TableQuery::new(table);
        if let Some(select) = &args.select {
            query.select = select.clone();
        }
        for filter in &args.filters {
            let (column, expr) = filter
                .split_once('=')
                .with_context(|| format!("--filter '{filter}' must look like COLUMN=EXPR"))?;
            query.filters.push((column.trim().to_string(), expr.trim().to_string()));
        }
        query.page_size = page_size;
        SourceDescriptor::RestTable(query)
    } else if let Some(function) = args.source.strip_prefix("rpc:") {
        let Some(query) = args.query.clone() else {
            bail!("--query is required for rpc sources");
        };
        SourceDescriptor::Rpc {
            function: function.to_string(),
            query,
        }
    } else if args.source == "postgres" {
        let Some(query) = args.query.clone() else {
            bail!("--query is required for the postgres source");
        };
        SourceDescriptor::Postgres { query, page_size }
    } else {
        file_source(args)?
    };

    let Some(table) = &args.join_table else {
        return Ok(base);
    };
    let (identity_key, profile_key) = args
        .join_on
        .split_once('=')
        .with_context(|| format!("--join-on '{}' must look like RECORD_KEY=PROFILE_KEY", args.join_on))?;
    let mut profile = TableQuery::new(table.as_str());
    profile.page_size = page_size;
    Ok(SourceDescriptor::Joined {
        identity: Box::new(base),
        profile: Box::new(SourceDescriptor::RestTable(profile)),
        identity_key: identity_key.trim().to_string(),
        profile_key: profile_key.trim().to_string(),
    })
}

fn file_source(args: &CliArgs) -> Result<SourceDescriptor> {
    let path = PathBuf::from(&args.source);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if matches!(extension.as_str(), "json" | "jsonl" | "ndjson") {
        return Ok(SourceDescriptor::JsonFile { path });
    }

    let delimiter = match args.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => bail!("--delimiter must be a single ASCII character, got '{c}'"),
        None if extension == "tsv" => b'\t',
        None => b',',
    };
    Ok(SourceDescriptor::DelimitedFile {
        path,
        delimiter,
        skip_header: args.skip_header,
    })
}

fn parse_key(raw: &str) -> SourceKey {
    match raw.parse::<SourceKey>() {
        Ok(key) => key,
        Err(never) => match never {},
    }
}

fn parse_assignment(entry: &str, flag: &str) -> Result<(String, SourceKey)> {
    let Some((name, key)) = entry.split_once('=') else {
        bail!("{flag} '{entry}' must look like NAME=KEY");
    };
    let name = name.trim();
    if name.is_empty() || key.trim().is_empty() {
        bail!("{flag} '{entry}' must look like NAME=KEY");
    }
    Ok((name.to_string(), parse_key(key)))
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag} must be a non-negative number of seconds"))
}
