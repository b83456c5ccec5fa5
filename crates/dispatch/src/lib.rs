//! Contact delivery to the email service.
//!
//! This crate provides:
//! - `ContactApi` trait for the destination API, with the Plunk HTTP client
//! - single-attempt dispatch with outcome classification
//! - the retry policy layered on top of it
//! - concurrent batch dispatch and inter-unit pacing

pub mod batch;
pub mod dispatcher;
pub mod pacing;
pub mod plunk;
pub mod retry;
pub mod traits;

pub use batch::dispatch_batch;
pub use dispatcher::{dispatch, Attempt};
pub use pacing::{Pacer, TokioPacer};
pub use plunk::PlunkClient;
pub use retry::{with_retries, RetryPolicy};
pub use traits::{ApiResponse, ContactApi, DispatchError};
