//! Normalize JSON rows into string-valued records.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use mailsync_core::{ContactRecord, RecordPosition};

/// Wrapper keys some backends put around a result array.
const ROW_ARRAY_KEYS: &[&str] = &["data", "rows", "result", "contacts", "users"];

/// Render a JSON value as a record field. `null` and empty strings yield
/// `None`; arrays and objects are kept as JSON text.
pub fn value_to_field(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Flatten one JSON object, preserving key order.
pub fn flatten_object(obj: &Map<String, Value>) -> IndexMap<String, String> {
    obj.iter()
        .filter_map(|(k, v)| value_to_field(v).map(|s| (k.clone(), s)))
        .collect()
}

/// Pull the row array out of a response body: either the body itself or
/// an array under one of the well-known wrapper keys.
pub fn extract_rows(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(rows) => Some(rows),
        Value::Object(mut obj) => ROW_ARRAY_KEYS
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(rows)) => Some(rows),
                _ => None,
            }),
        _ => None,
    }
}

/// Build a record from a row, or `None` when the row is not an object.
pub fn row_to_record(row: &Value, index: usize) -> Option<ContactRecord> {
    row.as_object()
        .map(|obj| ContactRecord::from_named(RecordPosition::Index(index), flatten_object(obj)))
}
