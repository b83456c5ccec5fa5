//! Pause between dispatch units.

use std::time::Duration;

/// Waits between dispatch units (single contacts or whole batches).
///
/// The orchestrator calls `pause` before every unit except the first, so
/// a run of N units pauses N-1 times.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
