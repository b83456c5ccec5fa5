//! JSON file source: an array of objects, or one object per line
//! (`.jsonl` / `.ndjson`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use mailsync_core::{ContactRecord, ImportError};

use crate::json_value::{extract_rows, row_to_record};
use crate::traits::ContactSource;

pub struct JsonFileSource {
    path: PathBuf,
    rows: std::vec::IntoIter<Value>,
    index: usize,
    skipped: usize,
}

impl JsonFileSource {
    /// Read and parse `path`. Unreadable or unparseable files are
    /// configuration errors; nothing has been dispatched yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|e| {
            ImportError::config(format!("cannot read source file {}: {e}", path.display()))
        })?;

        let mut skipped = 0;
        let rows = if is_line_delimited(&path) {
            let mut rows = Vec::new();
            for (i, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(v) => rows.push(v),
                    Err(e) => {
                        warn!(path = %path.display(), line = i + 1, error = %e, "skipping unparseable line");
                        skipped += 1;
                    }
                }
            }
            rows
        } else {
            let body: Value = serde_json::from_str(&text).map_err(|e| {
                ImportError::config(format!("invalid JSON in {}: {e}", path.display()))
            })?;
            extract_rows(body).ok_or_else(|| {
                ImportError::config(format!(
                    "{} does not contain an array of contact objects",
                    path.display()
                ))
            })?
        };

        debug!(path = %path.display(), rows = rows.len(), "opened json source");

        Ok(Self {
            path,
            rows: rows.into_iter(),
            index: 0,
            skipped,
        })
    }
}

fn is_line_delimited(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

#[async_trait]
impl ContactSource for JsonFileSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        for row in self.rows.by_ref() {
            let index = self.index;
            self.index += 1;
            match row_to_record(&row, index) {
                Some(record) => return Ok(Some(record)),
                None => {
                    warn!(path = %self.path.display(), index, "skipping non-object entry");
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }

    fn skipped_rows(&self) -> usize {
        self.skipped
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
