//! Delimited (CSV/TSV) file source.
//!
//! Reads one record per non-empty row. Rows with fewer columns than the
//! email column needs are skipped and logged with their 1-based line
//! number; they never abort the stream.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, warn};

use mailsync_core::{ContactRecord, ImportError, RecordPosition, ValidationError};

use crate::traits::ContactSource;

/// Options for a delimited file read.
#[derive(Debug, Clone)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    /// Consume the first row as a header; its cells name the columns.
    pub skip_header: bool,
    /// Rows must have a value at this index to be emitted.
    pub email_column: Option<usize>,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            skip_header: false,
            email_column: Some(0),
        }
    }
}

pub struct DelimitedSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    options: DelimitedOptions,
    headers: Option<Vec<String>>,
    header_pending: bool,
    row: csv::StringRecord,
    skipped: usize,
}

impl DelimitedSource {
    /// Open `path`. A missing or unreadable file is a configuration error.
    pub fn open(path: impl AsRef<Path>, options: DelimitedOptions) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| {
                ImportError::config(format!("cannot open source file {}: {e}", path.display()))
            })?;

        debug!(path = %path.display(), delimiter = ?(options.delimiter as char), "opened delimited source");

        Ok(Self {
            path,
            reader,
            header_pending: options.skip_header,
            options,
            headers: None,
            row: csv::StringRecord::new(),
            skipped: 0,
        })
    }

    fn skip_row(&mut self, err: ValidationError) {
        warn!(path = %self.path.display(), error = %err, "skipping row");
        self.skipped += 1;
    }
}

#[async_trait]
impl ContactSource for DelimitedSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        loop {
            match self.reader.read_record(&mut self.row) {
                Ok(true) => {}
                Ok(false) => return Ok(None),
                Err(e) => match e.kind() {
                    csv::ErrorKind::Utf8 { pos, .. } => {
                        let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
                        warn!(path = %self.path.display(), line, "skipping row that is not valid UTF-8");
                        self.skipped += 1;
                        continue;
                    }
                    _ => {
                        return Err(ImportError::source(format!(
                            "failed reading {}: {e}",
                            self.path.display()
                        )))
                    }
                },
            }

            let line = self.row.position().map(|p| p.line() as usize).unwrap_or(0);
            let cells: Vec<String> = self.row.iter().map(str::to_string).collect();

            if self.header_pending {
                self.header_pending = false;
                self.headers = Some(cells.iter().map(|h| h.trim().to_string()).collect());
                continue;
            }

            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }

            if let Some(col) = self.options.email_column {
                if cells.len() <= col {
                    let found = cells.len();
                    self.skip_row(ValidationError::too_few_columns(
                        RecordPosition::Line(line),
                        found,
                        col + 1,
                    ));
                    continue;
                }
            }

            let mut record = ContactRecord::from_columns(RecordPosition::Line(line), cells);
            if let Some(headers) = &self.headers {
                record.named = headers
                    .iter()
                    .zip(record.columns.iter())
                    .filter(|(h, _)| !h.is_empty())
                    .map(|(h, v)| (h.clone(), v.clone()))
                    .collect::<IndexMap<_, _>>();
            }
            return Ok(Some(record));
        }
    }

    fn skipped_rows(&self) -> usize {
        self.skipped
    }

    fn describe(&self) -> String {
        format!("delimited file {}", self.path.display())
    }
}
