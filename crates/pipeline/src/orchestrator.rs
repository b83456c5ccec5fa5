//! Import orchestration.
//!
//! The importer pulls records from the source one dispatch unit at a
//! time: a single contact in sequential mode, `batch_size` contacts in
//! batch mode. Each unit is mapped, dispatched (concurrently in batch
//! mode), and folded into the report before the next unit is read. The
//! configured delay runs before every unit except the first.
//!
//! Cancellation is checked between units. A unit that has started always
//! finishes and is aggregated; a pacing pause ends early. A run whose
//! source was already exhausted is not reported as cancelled.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mailsync_core::{ImportConfig, ImportError, ImportReport, MappedContact, SchedulingMode};
use mailsync_dispatch::{dispatch_batch, with_retries, ContactApi, Pacer, PlunkClient, RetryPolicy, TokioPacer};
use mailsync_source::{open_source, ContactSource};

use crate::aggregator::Aggregator;
use crate::mapper;
use crate::observer::{ImportObserver, NoopObserver};

pub struct Importer {
    config: ImportConfig,
    observer: Arc<dyn ImportObserver>,
    pacer: Arc<dyn Pacer>,
    cancel: CancellationToken,
}

impl Importer {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
            pacer: Arc::new(TokioPacer),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Stop before dispatching the next unit once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate config, open the configured source and the Plunk client,
    /// and run the import.
    ///
    /// Only [`ImportError`]s escape: configuration problems before any
    /// record is read, and a source that cannot be read.
    pub async fn run(&self) -> Result<ImportReport, ImportError> {
        self.config.validate()?;
        let descriptor = self
            .config
            .source
            .as_ref()
            .ok_or_else(|| ImportError::config("no contact source configured"))?;

        let mut source = open_source(descriptor, &self.config)?;
        let api = PlunkClient::new(&self.config.plunk)?;
        info!(endpoint = api.endpoint(), "plunk client ready");

        self.drive(source.as_mut(), &api).await
    }

    /// Run against a source and API the caller already holds.
    pub async fn run_with(
        &self,
        source: &mut dyn ContactSource,
        api: &dyn ContactApi,
    ) -> Result<ImportReport, ImportError> {
        self.config.validate_settings()?;
        self.drive(source, api).await
    }

    async fn drive(
        &self,
        source: &mut dyn ContactSource,
        api: &dyn ContactApi,
    ) -> Result<ImportReport, ImportError> {
        let pacing = &self.config.pacing;
        let policy = RetryPolicy::from(&self.config.retry);
        let unit_size = match pacing.mode {
            SchedulingMode::Sequential => 1,
            SchedulingMode::ConcurrentBatch => pacing.batch_size.max(1),
        };

        let mut aggregator = Aggregator::new();
        info!(
            run_id = %aggregator.run_id(),
            source = %source.describe(),
            api = api.name(),
            mode = %pacing.mode,
            unit_size,
            delay_ms = pacing.delay.as_millis() as u64,
            "import started"
        );

        let mut units = 0usize;
        let mut cancelled = false;
        loop {
            let contacts = self.next_unit(source, unit_size, &mut aggregator).await?;
            if contacts.is_empty() {
                break;
            }

            // Only a unit left undispatched marks the run as cancelled.
            if self.cancel.is_cancelled() || (units > 0 && !self.pause().await) {
                cancelled = true;
                break;
            }

            let outcomes = match pacing.mode {
                SchedulingMode::Sequential => {
                    vec![with_retries(api, &contacts[0], &policy).await]
                }
                SchedulingMode::ConcurrentBatch => dispatch_batch(api, &contacts, &policy).await,
            };

            units += 1;
            let size = outcomes.len();
            for outcome in outcomes {
                self.observer.on_outcome(&outcome);
                aggregator.record(outcome);
            }
            self.observer.on_batch_complete(units, size);
            if pacing.mode == SchedulingMode::ConcurrentBatch {
                info!(batch = units, size, processed = aggregator.total(), "batch dispatched");
            }
        }

        if cancelled {
            warn!(units, "import cancelled; remaining records were not dispatched");
        }

        let report = aggregator.finish(source.skipped_rows(), cancelled);
        info!(
            run_id = %report.run_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped_invalid = report.skipped_invalid,
            skipped_malformed = report.skipped_malformed,
            "import finished"
        );
        Ok(report)
    }

    /// Read and map records until `size` valid contacts are collected or
    /// the source runs dry. Rejected records are counted and skipped.
    async fn next_unit(
        &self,
        source: &mut dyn ContactSource,
        size: usize,
        aggregator: &mut Aggregator,
    ) -> Result<Vec<MappedContact>, ImportError> {
        let mut contacts = Vec::with_capacity(size);
        while contacts.len() < size {
            let Some(record) = source.next_record().await? else {
                break;
            };
            match mapper::map(&record, &self.config.field_map, self.config.default_subscribed) {
                Ok(contact) => contacts.push(contact),
                Err(err) => {
                    warn!(error = %err, "skipping record");
                    self.observer.on_skip(&err);
                    aggregator.skip_invalid();
                }
            }
        }
        Ok(contacts)
    }

    /// Wait out the inter-unit delay. Returns false when cancelled first.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = self.pacer.pause(self.config.pacing.delay) => true,
        }
    }
}
