use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a record came from, for error reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordPosition {
    /// 1-based line number in a delimited file.
    Line(usize),
    /// 0-based index in a JSON file or remote result set.
    Index(usize),
}

impl fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPosition::Line(n) => write!(f, "line {n}"),
            RecordPosition::Index(n) => write!(f, "record #{n}"),
        }
    }
}

/// Location of a value inside a [`ContactRecord`]: a column index or a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceKey {
    Index(usize),
    Name(String),
}

impl FromStr for SourceKey {
    type Err = std::convert::Infallible;

    /// All-digit strings address a column, anything else a named field.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<usize>() {
            Ok(idx) => Ok(SourceKey::Index(idx)),
            Err(_) => Ok(SourceKey::Name(trimmed.to_string())),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKey::Index(i) => write!(f, "column {i}"),
            SourceKey::Name(n) => write!(f, "field '{n}'"),
        }
    }
}

/// One raw input row, normalized to strings.
///
/// Delimited files fill `columns` (and `named` when a header row was read);
/// JSON and remote sources fill `named` only.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub position: RecordPosition,
    pub columns: Vec<String>,
    pub named: IndexMap<String, String>,
}

impl ContactRecord {
    pub fn from_columns(position: RecordPosition, columns: Vec<String>) -> Self {
        Self {
            position,
            columns,
            named: IndexMap::new(),
        }
    }

    pub fn from_named(position: RecordPosition, named: IndexMap<String, String>) -> Self {
        Self {
            position,
            columns: Vec::new(),
            named,
        }
    }

    /// Look up a raw value. Index keys only address positional columns;
    /// named fields are never reached by position.
    pub fn get(&self, key: &SourceKey) -> Option<&str> {
        match key {
            SourceKey::Index(i) => self.columns.get(*i).map(String::as_str),
            SourceKey::Name(name) => self.named.get(name).map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_key_parses_digits_as_index() {
        assert_eq!("3".parse::<SourceKey>().unwrap(), SourceKey::Index(3));
        assert_eq!(
            " email ".parse::<SourceKey>().unwrap(),
            SourceKey::Name("email".into())
        );
        assert_eq!(
            "-1".parse::<SourceKey>().unwrap(),
            SourceKey::Name("-1".into())
        );
    }

    #[test]
    fn get_by_index_and_name() {
        let mut rec = ContactRecord::from_columns(
            RecordPosition::Line(2),
            vec!["a@x.com".into(), "Jo".into()],
        );
        rec.named.insert("email".into(), "a@x.com".into());

        assert_eq!(rec.get(&SourceKey::Index(1)), Some("Jo"));
        assert_eq!(rec.get(&SourceKey::Index(5)), None);
        assert_eq!(rec.get(&SourceKey::Name("email".into())), Some("a@x.com"));
        assert_eq!(rec.get(&SourceKey::Name("city".into())), None);
    }

    #[test]
    fn index_does_not_reach_named_fields() {
        let mut named = IndexMap::new();
        named.insert("email".to_string(), "b@x.com".to_string());
        named.insert("name".to_string(), "Sam".to_string());
        let rec = ContactRecord::from_named(RecordPosition::Index(0), named);

        assert_eq!(rec.get(&SourceKey::Index(0)), None);
        assert_eq!(rec.get(&SourceKey::Index(1)), None);
        assert_eq!(rec.get(&SourceKey::Name("name".into())), Some("Sam"));
    }

    #[test]
    fn position_display() {
        assert_eq!(RecordPosition::Line(4).to_string(), "line 4");
        assert_eq!(RecordPosition::Index(0).to_string(), "record #0");
    }
}
