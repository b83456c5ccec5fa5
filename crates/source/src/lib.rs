//! Contact source adapters.
//!
//! Every adapter yields [`ContactRecord`]s lazily through the
//! [`ContactSource`] trait:
//! - delimited (CSV/TSV) and JSON files
//! - REST table reads with transparent pagination
//! - SQL-execution RPC calls
//! - client-side joins of an identity source with a profile source
//! - direct PostgreSQL queries
//!
//! [`ContactRecord`]: mailsync_core::ContactRecord

pub mod delimited;
pub mod join;
pub mod json_file;
pub mod json_value;
pub mod open;
pub mod postgres;
pub mod rest;
pub mod traits;

pub use open::open_source;
pub use traits::{collect_records, ContactSource, VecSource};
