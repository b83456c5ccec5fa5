//! Progress hooks.

use mailsync_core::{DispatchOutcome, ValidationError};

/// Receives progress events while a run is in flight.
///
/// Observers only watch: nothing they do changes the report.
pub trait ImportObserver: Send + Sync {
    /// A contact finished dispatching.
    fn on_outcome(&self, _outcome: &DispatchOutcome) {}

    /// A record was rejected by the mapper.
    fn on_skip(&self, _error: &ValidationError) {}

    /// A dispatch unit finished. `index` is 1-based; `size` is the number
    /// of outcomes it produced.
    fn on_batch_complete(&self, _index: usize, _size: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ImportObserver for NoopObserver {}
