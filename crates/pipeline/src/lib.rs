//! The import pipeline: map, dispatch, aggregate.
//!
//! [`Importer`] is the entry point. It reads records from a
//! [`ContactSource`](mailsync_source::ContactSource), maps them with
//! [`mapper::map`], sends them through the retry policy one at a time or in
//! concurrent batches, and folds every outcome into an
//! [`ImportReport`](mailsync_core::ImportReport).

pub mod aggregator;
pub mod mapper;
pub mod observer;
pub mod orchestrator;

pub use aggregator::{aggregate, Aggregator};
pub use mapper::map;
pub use observer::{ImportObserver, NoopObserver};
pub use orchestrator::Importer;
