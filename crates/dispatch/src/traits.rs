//! Destination API trait and transport error type.

use std::time::Duration;

use mailsync_core::MappedContact;

/// Failure to get any HTTP response for a request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Raw response to one create-contact call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, when the service sent one in seconds.
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// The email service's contact endpoint.
#[async_trait::async_trait]
pub trait ContactApi: Send + Sync {
    /// Issue one create-contact request. Any HTTP status is `Ok`; only a
    /// request that produced no response at all is an error.
    async fn create_contact(&self, contact: &MappedContact) -> Result<ApiResponse, DispatchError>;

    /// Name used in logs (e.g. "plunk").
    fn name(&self) -> &str;
}
