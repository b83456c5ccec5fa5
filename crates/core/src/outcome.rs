use serde::{Deserialize, Serialize};

/// Error text recorded when every attempt for a contact failed.
pub const RETRIES_EXHAUSTED: &str = "Failed after all retries";

/// Informational note attached to a successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeNote {
    AlreadyExists,
}

/// Result of submitting one contact, after any retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub email: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub note: Option<OutcomeNote>,
    pub error: Option<String>,
    pub attempts_used: u32,
}

impl DispatchOutcome {
    pub fn created(email: impl Into<String>, status: u16, attempts_used: u32) -> Self {
        Self {
            email: email.into(),
            success: true,
            status_code: Some(status),
            note: None,
            error: None,
            attempts_used,
        }
    }

    pub fn already_exists(email: impl Into<String>, status: u16, attempts_used: u32) -> Self {
        Self {
            email: email.into(),
            success: true,
            status_code: Some(status),
            note: Some(OutcomeNote::AlreadyExists),
            error: None,
            attempts_used,
        }
    }

    pub fn failed(
        email: impl Into<String>,
        status_code: Option<u16>,
        error: impl Into<String>,
        attempts_used: u32,
    ) -> Self {
        Self {
            email: email.into(),
            success: false,
            status_code,
            note: None,
            error: Some(error.into()),
            attempts_used,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.note == Some(OutcomeNote::AlreadyExists)
    }
}
