pub mod config;
pub mod contact;
pub mod error;
pub mod outcome;
pub mod record;
pub mod report;

pub use config::{ImportConfig, SchedulingMode};
pub use contact::{AttributeValue, MappedContact};
pub use error::*;
pub use outcome::{DispatchOutcome, OutcomeNote};
pub use record::{ContactRecord, RecordPosition, SourceKey};
pub use report::ImportReport;
