//! Plunk contacts API client.
//!
//! `POST {base_url}/v1/contacts` with a bearer token. One client (and its
//! connection pool) is built per import run and dropped when the run ends.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};

use mailsync_core::config::PlunkConfig;
use mailsync_core::{ImportError, MappedContact};

use crate::traits::{ApiResponse, ContactApi, DispatchError};

#[derive(Debug, Clone)]
pub struct PlunkClient {
    client: reqwest::Client,
    endpoint: String,
    nest_attributes: bool,
}

impl PlunkClient {
    /// Build the client. Fails when the API key is missing or cannot be
    /// used as a header value.
    pub fn new(config: &PlunkConfig) -> Result<Self, ImportError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImportError::config("PLUNK_API_KEY is not set"))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ImportError::config("PLUNK_API_KEY contains invalid characters"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ImportError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/contacts", config.base_url.trim_end_matches('/')),
            nest_attributes: config.nest_attributes,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ContactApi for PlunkClient {
    async fn create_contact(&self, contact: &MappedContact) -> Result<ApiResponse, DispatchError> {
        let payload = if self.nest_attributes {
            contact.nested_payload()
        } else {
            contact.flat_payload()
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }

    fn name(&self) -> &str {
        "plunk"
    }
}
