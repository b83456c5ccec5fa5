//! Direct PostgreSQL source.
//!
//! Wraps an arbitrary query so every row comes back as one JSON object,
//! then pages through it with `LIMIT`/`OFFSET`. The pool is created on
//! first read and closed once the query is exhausted.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use mailsync_core::{ContactRecord, ImportError};

use crate::json_value::row_to_record;
use crate::traits::ContactSource;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct PostgresSource {
    url: String,
    max_connections: u32,
    sql: String,
    page_size: usize,
    pool: Option<PgPool>,
    offset: usize,
    buffer: VecDeque<ContactRecord>,
    exhausted: bool,
    skipped: usize,
}

/// Wrap a user query so each row is returned as JSON text.
pub fn wrap_query(query: &str) -> String {
    let inner = query.trim().trim_end_matches(';');
    format!("SELECT row_to_json(q)::text FROM ({inner}) AS q LIMIT $1 OFFSET $2")
}

impl PostgresSource {
    pub fn new(url: impl Into<String>, max_connections: u32, query: &str, page_size: usize) -> Self {
        Self {
            url: url.into(),
            max_connections: max_connections.max(1),
            sql: wrap_query(query),
            page_size: page_size.max(1),
            pool: None,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            skipped: 0,
        }
    }

    async fn pool(&mut self) -> Result<PgPool, ImportError> {
        if let Some(pool) = &self.pool {
            return Ok(pool.clone());
        }
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&self.url)
            .await
            .map_err(|e| ImportError::source(format!("failed to connect to PostgreSQL: {e}")))?;
        info!("PostgreSQL source connected");
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    async fn fetch_page(&mut self) -> Result<(), ImportError> {
        let pool = self.pool().await?;
        debug!(offset = self.offset, limit = self.page_size, "fetching postgres page");

        let rows: Vec<String> = sqlx::query_scalar(&self.sql)
            .bind(self.page_size as i64)
            .bind(self.offset as i64)
            .fetch_all(&pool)
            .await
            .map_err(|e| ImportError::source(format!("postgres query failed: {e}")))?;

        let count = rows.len();
        for (i, text) in rows.iter().enumerate() {
            let parsed = serde_json::from_str::<serde_json::Value>(text).ok();
            match parsed.as_ref().and_then(|v| row_to_record(v, self.offset + i)) {
                Some(record) => self.buffer.push_back(record),
                None => self.skipped += 1,
            }
        }
        self.offset += count;

        if count < self.page_size {
            self.exhausted = true;
            pool.close().await;
            self.pool = None;
            info!(rows = self.offset, "postgres read complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ContactSource for PostgresSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    fn skipped_rows(&self) -> usize {
        self.skipped
    }

    fn describe(&self) -> String {
        "postgres query".to_string()
    }
}
