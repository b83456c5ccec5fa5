use tracing::info;

use mailsync_core::config::SourceDescriptor;
use mailsync_core::{ImportConfig, ImportError};

use crate::delimited::{DelimitedOptions, DelimitedSource};
use crate::join::JoinSource;
use crate::json_file::JsonFileSource;
use crate::postgres::PostgresSource;
use crate::rest::{RestConnection, RestTableSource, RpcSource};
use crate::traits::ContactSource;

/// Open the adapter for `descriptor`.
///
/// Files are opened eagerly so a missing path fails before any dispatch.
/// Network sources connect lazily on the first read.
pub fn open_source(
    descriptor: &SourceDescriptor,
    config: &ImportConfig,
) -> Result<Box<dyn ContactSource>, ImportError> {
    info!(source = %descriptor, "opening contact source");
    let source: Box<dyn ContactSource> = match descriptor {
        SourceDescriptor::DelimitedFile {
            path,
            delimiter,
            skip_header,
        } => {
            let options = DelimitedOptions {
                delimiter: *delimiter,
                skip_header: *skip_header,
                email_column: config.field_map.email_column(),
            };
            Box::new(DelimitedSource::open(path, options)?)
        }
        SourceDescriptor::JsonFile { path } => Box::new(JsonFileSource::open(path)?),
        SourceDescriptor::RestTable(query) => {
            Box::new(RestTableSource::new(rest_connection(config)?, query.clone()))
        }
        SourceDescriptor::Rpc { function, query } => Box::new(RpcSource::new(
            rest_connection(config)?,
            function.clone(),
            query.clone(),
        )),
        SourceDescriptor::Postgres { query, page_size } => Box::new(PostgresSource::new(
            config.postgres.connection_string(),
            config.postgres.max_connections,
            query,
            *page_size,
        )),
        SourceDescriptor::Joined {
            identity,
            profile,
            identity_key,
            profile_key,
        } => Box::new(JoinSource::new(
            open_source(identity, config)?,
            open_source(profile, config)?,
            identity_key.clone(),
            profile_key.clone(),
        )),
    };
    Ok(source)
}

fn rest_connection(config: &ImportConfig) -> Result<RestConnection, ImportError> {
    match (&config.supabase.url, &config.supabase.service_key) {
        (Some(url), Some(key)) => RestConnection::new(url, key),
        _ => Err(ImportError::config(
            "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set for database sources",
        )),
    }
}
