use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::record::SourceKey;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

// ── Defaults ──────────────────────────────────────────────────

pub const DEFAULT_PLUNK_BASE_URL: &str = "https://api.useplunk.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;
pub const DEFAULT_SEQUENTIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

// ── Top-level config ──────────────────────────────────────────

/// Everything one import run needs. Built from the environment, then
/// overridden by CLI flags, then checked with [`ImportConfig::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub plunk: PlunkConfig,
    pub supabase: SupabaseConfig,
    pub postgres: PostgresConfig,
    pub source: Option<SourceDescriptor>,
    pub field_map: FieldMap,
    pub default_subscribed: bool,
    pub pacing: PacingConfig,
    pub retry: RetryConfig,
}

impl ImportConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MAILSYNC_PROFILE`; when set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env::var("MAILSYNC_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            plunk: PlunkConfig::from_env_profiled(p),
            supabase: SupabaseConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            source: None,
            field_map: FieldMap::default(),
            default_subscribed: profiled_env_bool(p, "IMPORT_DEFAULT_SUBSCRIBED", true),
            pacing: PacingConfig::from_env_profiled(p),
            retry: RetryConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Fail fast on anything that would make the run pointless.
    ///
    /// Only checks presence and shape; a file that exists but cannot be
    /// opened is reported when the source is opened.
    pub fn validate(&self) -> Result<(), ImportError> {
        self.validate_settings()?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ImportError::config("no contact source configured"))?;
        if !source.has_columns() {
            if let Some(key) = self.field_map.keys().find(|k| matches!(k, SourceKey::Index(_))) {
                return Err(ImportError::config(format!(
                    "{key} cannot be used with {source}: its records only have named fields"
                )));
            }
        }
        self.validate_source(source)
    }

    /// Checks everything except the source descriptor, for callers that
    /// supply an already opened source.
    pub fn validate_settings(&self) -> Result<(), ImportError> {
        if self.plunk.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ImportError::config("PLUNK_API_KEY is not set"));
        }
        url::Url::parse(&self.plunk.base_url).map_err(|e| {
            ImportError::config(format!("invalid PLUNK_BASE_URL '{}': {e}", self.plunk.base_url))
        })?;
        if self.plunk.timeout_secs == 0 {
            return Err(ImportError::config("PLUNK_TIMEOUT_SECS must be at least 1"));
        }
        if let Some(raw) = profiled_env_opt(&self.profile, "IMPORT_MODE") {
            raw.parse::<SchedulingMode>()
                .map_err(|e| ImportError::config(format!("invalid IMPORT_MODE: {e}")))?;
        }

        if self.pacing.batch_size == 0 {
            return Err(ImportError::config("batch size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ImportError::config("max attempts must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ImportError::config("backoff multiplier must be >= 1.0"));
        }
        Ok(())
    }

    fn validate_source(&self, source: &SourceDescriptor) -> Result<(), ImportError> {
        match source {
            SourceDescriptor::DelimitedFile { path, .. } | SourceDescriptor::JsonFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ImportError::config("source file path is empty"));
                }
                if let (SourceDescriptor::DelimitedFile { skip_header: false, .. }, SourceKey::Name(name)) =
                    (source, &self.field_map.email)
                {
                    return Err(ImportError::config(format!(
                        "email field '{name}' is addressed by name but the file has no header row"
                    )));
                }
            }
            SourceDescriptor::RestTable(_) | SourceDescriptor::Rpc { .. } => {
                if !self.supabase.is_configured() {
                    return Err(ImportError::config(
                        "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set for database sources",
                    ));
                }
            }
            SourceDescriptor::Postgres { query, .. } => {
                if !self.postgres.is_configured() {
                    return Err(ImportError::config(
                        "PG_URL or PG_USERNAME must be set for the postgres source",
                    ));
                }
                if query.trim().is_empty() {
                    return Err(ImportError::config("postgres source needs a query"));
                }
            }
            SourceDescriptor::Joined { identity, profile, .. } => {
                self.validate_source(identity)?;
                self.validate_source(profile)?;
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  plunk:    base_url={}, api_key={}, timeout={}s",
            self.plunk.base_url,
            if self.plunk.api_key.is_some() { "set" } else { "(missing)" },
            self.plunk.timeout_secs
        );
        match &self.source {
            Some(source) => tracing::info!("  source:   {}", source),
            None => tracing::info!("  source:   (none)"),
        }
        tracing::info!(
            "  pacing:   mode={}, batch_size={}, delay={}ms",
            self.pacing.mode,
            self.pacing.batch_size,
            self.pacing.delay.as_millis()
        );
        tracing::info!(
            "  retry:    max_attempts={}, backoff={}ms, multiplier={}",
            self.retry.max_attempts,
            self.retry.backoff.as_millis(),
            self.retry.backoff_multiplier
        );
    }
}

// ── Plunk (destination email service) ────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlunkConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Send attributes under `data` instead of at the top level.
    pub nest_attributes: bool,
}

impl PlunkConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_key: profiled_env_opt(p, "PLUNK_API_KEY"),
            base_url: profiled_env_or(p, "PLUNK_BASE_URL", DEFAULT_PLUNK_BASE_URL),
            timeout_secs: profiled_env_parse(p, "PLUNK_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS),
            nest_attributes: profiled_env_bool(p, "PLUNK_NEST_ATTRIBUTES", false),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Supabase (REST / RPC database access) ────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
}

impl SupabaseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "SUPABASE_URL"),
            service_key: profiled_env_opt(p, "SUPABASE_SERVICE_ROLE_KEY"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.service_key.is_some()
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "PG_URL"),
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT").unwrap_or(5432),
            database: profiled_env_or(p, "PG_DATABASE", "postgres"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS").unwrap_or(2),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some()
    }
}

// ── Sources ───────────────────────────────────────────────────

/// A REST table read: `GET {url}/rest/v1/{table}?select=..&{filters}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    pub select: String,
    /// PostgREST filters, e.g. `("email", "not.is.null")`.
    pub filters: Vec<(String, String)>,
    pub page_size: usize,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Where contact records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDescriptor {
    DelimitedFile {
        path: PathBuf,
        delimiter: u8,
        /// Treat the first row as a header (its cells become field names).
        skip_header: bool,
    },
    JsonFile {
        path: PathBuf,
    },
    RestTable(TableQuery),
    Rpc {
        function: String,
        query: String,
    },
    Postgres {
        query: String,
        page_size: usize,
    },
    /// Identity rows enriched with profile rows matched on a shared key.
    Joined {
        identity: Box<SourceDescriptor>,
        profile: Box<SourceDescriptor>,
        identity_key: String,
        profile_key: String,
    },
}

impl SourceDescriptor {
    /// Whether records carry positional columns. Joins keep the identity
    /// source's columns.
    pub fn has_columns(&self) -> bool {
        match self {
            SourceDescriptor::DelimitedFile { .. } => true,
            SourceDescriptor::Joined { identity, .. } => identity.has_columns(),
            _ => false,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::DelimitedFile { path, delimiter, .. } => {
                write!(f, "file {} (delimiter {:?})", path.display(), *delimiter as char)
            }
            SourceDescriptor::JsonFile { path } => write!(f, "json {}", path.display()),
            SourceDescriptor::RestTable(q) => write!(f, "table {} (select {})", q.table, q.select),
            SourceDescriptor::Rpc { function, .. } => write!(f, "rpc {function}"),
            SourceDescriptor::Postgres { .. } => write!(f, "postgres query"),
            SourceDescriptor::Joined {
                identity,
                profile,
                identity_key,
                profile_key,
            } => write!(f, "{identity} joined with {profile} on {identity_key}={profile_key}"),
        }
    }
}

// ── Field map ─────────────────────────────────────────────────

/// One custom attribute copied from the source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeField {
    pub name: String,
    pub source: SourceKey,
    /// Parse the value as a boolean instead of copying text.
    #[serde(default)]
    pub flag: bool,
}

/// Declarative mapping from source locations to contact fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    pub email: SourceKey,
    #[serde(default)]
    pub subscribed: Option<SourceKey>,
    #[serde(default)]
    pub attributes: Vec<AttributeField>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            email: SourceKey::Index(0),
            subscribed: None,
            attributes: Vec::new(),
        }
    }
}

impl FieldMap {
    pub fn with_attribute(mut self, name: impl Into<String>, source: SourceKey) -> Self {
        self.attributes.push(AttributeField {
            name: name.into(),
            source,
            flag: false,
        });
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, source: SourceKey) -> Self {
        self.attributes.push(AttributeField {
            name: name.into(),
            source,
            flag: true,
        });
        self
    }

    /// Every source location the map reads from.
    pub fn keys(&self) -> impl Iterator<Item = &SourceKey> {
        std::iter::once(&self.email)
            .chain(self.subscribed.iter())
            .chain(self.attributes.iter().map(|a| &a.source))
    }

    /// Column index the email lives in, when addressed positionally.
    pub fn email_column(&self) -> Option<usize> {
        match self.email {
            SourceKey::Index(i) => Some(i),
            SourceKey::Name(_) => None,
        }
    }
}

// ── Pacing ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// One contact at a time, pausing between contacts.
    Sequential,
    /// Fixed-size batches dispatched concurrently, pausing between batches.
    ConcurrentBatch,
}

impl FromStr for SchedulingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(SchedulingMode::Sequential),
            "batch" | "concurrent" | "concurrent-batch" => Ok(SchedulingMode::ConcurrentBatch),
            other => Err(format!("unknown scheduling mode '{other}' (expected 'sequential' or 'batch')")),
        }
    }
}

impl fmt::Display for SchedulingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingMode::Sequential => f.write_str("sequential"),
            SchedulingMode::ConcurrentBatch => f.write_str("batch"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub mode: SchedulingMode,
    pub batch_size: usize,
    /// Pause between dispatch units (contacts or batches).
    pub delay: Duration,
}

impl PacingConfig {
    fn from_env_profiled(p: &str) -> Self {
        let mode = profiled_env_opt(p, "IMPORT_MODE")
            .and_then(|m| m.parse().ok())
            .unwrap_or(SchedulingMode::ConcurrentBatch);
        let delay_ms = profiled_env_parse(p, "IMPORT_DELAY_MS")
            .unwrap_or_else(|| Self::default_delay_ms(mode));
        Self {
            mode,
            batch_size: profiled_env_parse(p, "IMPORT_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Whether `IMPORT_DELAY_MS` is set for this profile.
    pub fn delay_from_env(profile: &str) -> bool {
        profiled_env_parse::<u64>(&profile.to_uppercase(), "IMPORT_DELAY_MS").is_some()
    }

    pub fn default_delay_ms(mode: SchedulingMode) -> u64 {
        match mode {
            SchedulingMode::Sequential => DEFAULT_SEQUENTIAL_DELAY_MS,
            SchedulingMode::ConcurrentBatch => DEFAULT_BATCH_DELAY_MS,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::ConcurrentBatch,
            batch_size: DEFAULT_BATCH_SIZE,
            delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }
}

// ── Retry ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
    /// 1.0 keeps the pause fixed; larger values grow it per attempt.
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_parse(p, "IMPORT_MAX_ATTEMPTS").unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff: Duration::from_millis(
                profiled_env_parse(p, "IMPORT_BACKOFF_MS").unwrap_or(DEFAULT_BACKOFF_MS),
            ),
            backoff_multiplier: profiled_env_parse(p, "IMPORT_BACKOFF_MULTIPLIER").unwrap_or(1.0),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            backoff_multiplier: 1.0,
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}
