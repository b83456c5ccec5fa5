//! Single-attempt dispatch and response classification.
//!
//! One call to [`dispatch`] issues exactly one request and never fails:
//! every per-contact condition, transport errors included, comes back as
//! an [`Attempt`] carrying a [`DispatchOutcome`].

use std::time::Duration;

use mailsync_core::{DispatchOutcome, MappedContact};

use crate::traits::ContactApi;

/// Response bodies kept in outcomes are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 200;

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// Success, already-exists, or a definitive client error.
    Settled(DispatchOutcome),
    /// Transport failure or non-terminal status; worth another attempt.
    Transient {
        outcome: DispatchOutcome,
        retry_after: Option<Duration>,
    },
}

impl Attempt {
    pub fn outcome(&self) -> &DispatchOutcome {
        match self {
            Attempt::Settled(outcome) => outcome,
            Attempt::Transient { outcome, .. } => outcome,
        }
    }
}

/// How a status code is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Created,
    AlreadyExists,
    Retryable,
    Terminal,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Created,
        409 => StatusClass::AlreadyExists,
        408 | 429 => StatusClass::Retryable,
        400..=499 => StatusClass::Terminal,
        _ => StatusClass::Retryable,
    }
}

/// Cut `body` to [`ERROR_BODY_LIMIT`] characters.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

fn failure_text(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        truncate_body(body)
    }
}

/// Submit `contact` once and classify the result.
pub async fn dispatch(api: &dyn ContactApi, contact: &MappedContact) -> Attempt {
    let email = contact.email.as_str();
    let response = match api.create_contact(contact).await {
        Ok(response) => response,
        Err(e) => {
            return Attempt::Transient {
                outcome: DispatchOutcome::failed(email, None, truncate_body(&e.to_string()), 1),
                retry_after: None,
            }
        }
    };

    let status = response.status;
    match classify_status(status) {
        StatusClass::Created => {
            tracing::debug!(email, status, api = api.name(), "contact created");
            Attempt::Settled(DispatchOutcome::created(email, status, 1))
        }
        StatusClass::AlreadyExists => {
            tracing::debug!(email, status, api = api.name(), "contact already exists");
            Attempt::Settled(DispatchOutcome::already_exists(email, status, 1))
        }
        StatusClass::Terminal => {
            tracing::warn!(email, status, body = %truncate_body(&response.body), "contact rejected");
            Attempt::Settled(DispatchOutcome::failed(
                email,
                Some(status),
                failure_text(status, &response.body),
                1,
            ))
        }
        StatusClass::Retryable => Attempt::Transient {
            outcome: DispatchOutcome::failed(
                email,
                Some(status),
                failure_text(status, &response.body),
                1,
            ),
            retry_after: response.retry_after,
        },
    }
}
