//! Concurrent dispatch of one batch.

use futures::future::join_all;
use tracing::debug;

use mailsync_core::{DispatchOutcome, MappedContact};

use crate::retry::{with_retries, RetryPolicy};
use crate::traits::ContactApi;

/// Dispatch every contact in `contacts` concurrently, each under its own
/// retry loop, and wait for all of them.
///
/// Each task returns its outcome; the caller owns the collected vector,
/// so no state is shared between tasks.
pub async fn dispatch_batch(
    api: &dyn ContactApi,
    contacts: &[MappedContact],
    policy: &RetryPolicy,
) -> Vec<DispatchOutcome> {
    let futures: Vec<_> = contacts
        .iter()
        .map(|contact| with_retries(api, contact, policy))
        .collect();

    let outcomes = join_all(futures).await;
    debug!(
        size = outcomes.len(),
        succeeded = outcomes.iter().filter(|o| o.success).count(),
        "batch complete"
    );
    outcomes
}
