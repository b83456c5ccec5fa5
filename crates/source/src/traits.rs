//! Source trait shared by all adapters.

use async_trait::async_trait;
use mailsync_core::{ContactRecord, ImportError};

/// A finite, forward-only stream of contact records.
///
/// Sources are not restartable: opening the descriptor again re-reads
/// from the start. Row-level problems (short rows, undecodable lines) are
/// logged and skipped inside the adapter; only a source that cannot be
/// read at all returns an error.
#[async_trait]
pub trait ContactSource: Send {
    /// Next record, or `None` once the source is exhausted.
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError>;

    /// Rows dropped so far because they could not form a record.
    fn skipped_rows(&self) -> usize {
        0
    }

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Drain a source into memory.
pub async fn collect_records(
    source: &mut dyn ContactSource,
) -> Result<Vec<ContactRecord>, ImportError> {
    let mut records = Vec::new();
    while let Some(record) = source.next_record().await? {
        records.push(record);
    }
    Ok(records)
}

/// In-memory source, used by tests and by callers that already hold rows.
pub struct VecSource {
    records: std::vec::IntoIter<ContactRecord>,
    skipped: usize,
}

impl VecSource {
    pub fn new(records: Vec<ContactRecord>) -> Self {
        Self {
            records: records.into_iter(),
            skipped: 0,
        }
    }

    /// Report `skipped` rows as already dropped by the source.
    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }
}

#[async_trait]
impl ContactSource for VecSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        Ok(self.records.next())
    }

    fn skipped_rows(&self) -> usize {
        self.skipped
    }

    fn describe(&self) -> String {
        "in-memory records".to_string()
    }
}
