use thiserror::Error;

use crate::record::RecordPosition;

/// Errors that abort an import run. Everything else is recorded in the
/// report and processing continues.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
}

impl ImportError {
    pub fn config(msg: impl Into<String>) -> Self {
        ImportError::Configuration(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        ImportError::SourceUnavailable(msg.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    InvalidEmail,
    TooFewColumns,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrorKind::InvalidEmail => f.write_str("invalid email"),
            ValidationErrorKind::TooFewColumns => f.write_str("too few columns"),
        }
    }
}

/// A single record that cannot be imported. Logged and counted, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{position}: {kind} ({detail})")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub position: RecordPosition,
    pub detail: String,
}

impl ValidationError {
    pub fn invalid_email(position: RecordPosition, detail: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidEmail,
            position,
            detail: detail.into(),
        }
    }

    pub fn too_few_columns(position: RecordPosition, found: usize, needed: usize) -> Self {
        Self {
            kind: ValidationErrorKind::TooFewColumns,
            position,
            detail: format!("found {found}, need at least {needed}"),
        }
    }
}
