//! Database sources reached over HTTP: REST table reads and SQL RPC calls.
//!
//! Both speak the PostgREST dialect (`/rest/v1/...`) with the service key
//! sent as `apikey` and as a bearer token. Any transport or HTTP failure
//! fails the whole read with [`ImportError::SourceUnavailable`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use mailsync_core::config::TableQuery;
use mailsync_core::{ContactRecord, ImportError};

use crate::json_value::{extract_rows, row_to_record};
use crate::traits::ContactSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details shared by the REST and RPC sources.
#[derive(Clone)]
pub struct RestConnection {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestConnection {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, ImportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ImportError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.service_key),
            )
    }

    /// Send a request and return the parsed body plus any `Content-Range` total.
    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<(Value, Option<usize>), ImportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ImportError::source(format!("{what}: request failed: {e}")))?;

        let status = response.status();
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(%status, what, body = %body, "database source returned non-2xx status");
            return Err(ImportError::source(format!("{what}: {status}: {body}")));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ImportError::source(format!("{what}: invalid JSON body: {e}")))?;
        Ok((body, total))
    }
}

/// Parse the total out of `Content-Range: 0-999/4210`. `*` means unknown.
fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

// ── REST table ────────────────────────────────────────────────────

/// Pages through a table with `limit`/`offset`.
///
/// A page shorter than `page_size` ends the stream, so backends that
/// return everything in one response are read in a single request. A page
/// longer than requested means the backend ignored paging and is treated
/// as the complete result.
pub struct RestTableSource {
    conn: RestConnection,
    query: TableQuery,
    offset: usize,
    buffer: VecDeque<ContactRecord>,
    exhausted: bool,
    skipped: usize,
}

impl RestTableSource {
    pub fn new(conn: RestConnection, query: TableQuery) -> Self {
        Self {
            conn,
            query,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            skipped: 0,
        }
    }

    async fn fetch_page(&mut self) -> Result<(), ImportError> {
        let url = format!("{}/rest/v1/{}", self.conn.base_url, self.query.table);
        let mut params: Vec<(String, String)> = vec![("select".into(), self.query.select.clone())];
        params.extend(self.query.filters.iter().cloned());
        let paged = self.query.page_size > 0;
        if paged {
            params.push(("limit".into(), self.query.page_size.to_string()));
            params.push(("offset".into(), self.offset.to_string()));
        }

        debug!(table = %self.query.table, offset = self.offset, "fetching page");
        let request = self.conn.client.get(&url).query(&params);
        let (body, total) = self
            .conn
            .send_json(request, &format!("table {}", self.query.table))
            .await?;

        let rows = extract_rows(body).ok_or_else(|| {
            ImportError::source(format!("table {}: response is not a row array", self.query.table))
        })?;
        let count = rows.len();

        for (i, row) in rows.iter().enumerate() {
            match row_to_record(row, self.offset + i) {
                Some(record) => self.buffer.push_back(record),
                None => self.skipped += 1,
            }
        }
        self.offset += count;

        let short_page = !paged || count < self.query.page_size;
        let oversized_page = paged && count > self.query.page_size;
        let reached_total = total.map_or(false, |t| self.offset >= t);
        if short_page || oversized_page || reached_total {
            self.exhausted = true;
            info!(table = %self.query.table, rows = self.offset, "table read complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ContactSource for RestTableSource {
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
        format!("table {}", self.query.table)
    }
}

// ── SQL RPC ───────────────────────────────────────────────────────

/// Runs a raw query through an SQL-execution RPC; the full result arrives
/// in one response.
pub struct RpcSource {
    conn: RestConnection,
    function: String,
    query: String,
    rows: Option<std::vec::IntoIter<Value>>,
    index: usize,
    skipped: usize,
}

impl RpcSource {
    pub fn new(conn: RestConnection, function: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            conn,
            function: function.into(),
            query: query.into(),
            rows: None,
            index: 0,
            skipped: 0,
        }
    }

    async fn execute(&self) -> Result<Vec<Value>, ImportError> {
        let url = format!("{}/rest/v1/rpc/{}", self.conn.base_url, self.function);
        let request = self
            .conn
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": self.query }));
        let (body, _) = self
            .conn
            .send_json(request, &format!("rpc {}", self.function))
            .await?;

        let rows = match body {
            // Some SQL RPCs return the result array as a JSON-encoded string.
            Value::String(s) => serde_json::from_str(&s).ok().and_then(extract_rows),
            other => extract_rows(other),
        };
        rows.ok_or_else(|| {
            ImportError::source(format!("rpc {}: response is not a row array", self.function))
        })
    }
}

#[async_trait]
impl ContactSource for RpcSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        if self.rows.is_none() {
            let rows = self.execute().await?;
            info!(function = %self.function, rows = rows.len(), "rpc query complete");
            self.rows = Some(rows.into_iter());
        }
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        for row in rows.by_ref() {
            let index = self.index;
            self.index += 1;
            match row_to_record(&row, index) {
                Some(record) => return Ok(Some(record)),
                None => self.skipped += 1,
            }
        }
        Ok(None)
    }

    fn skipped_rows(&self) -> usize {
        self.skipped
    }

    fn describe(&self) -> String {
        format!("rpc {}", self.function)
    }
}
