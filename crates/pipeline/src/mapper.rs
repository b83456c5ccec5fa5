//! Record to contact mapping.

use mailsync_core::config::FieldMap;
use mailsync_core::{AttributeValue, ContactRecord, MappedContact, ValidationError};

/// Map one record into the email service's contact shape.
///
/// Pure: the same record and field map always give the same result.
pub fn map(
    record: &ContactRecord,
    field_map: &FieldMap,
    default_subscribed: bool,
) -> Result<MappedContact, ValidationError> {
    let email = record
        .get(&field_map.email)
        .map(str::trim)
        .ok_or_else(|| {
            ValidationError::invalid_email(record.position, format!("no value at {}", field_map.email))
        })?;
    if email.is_empty() {
        return Err(ValidationError::invalid_email(record.position, "email is empty"));
    }
    if !email.contains('@') {
        return Err(ValidationError::invalid_email(
            record.position,
            format!("'{email}' has no @"),
        ));
    }

    let subscribed = field_map
        .subscribed
        .as_ref()
        .and_then(|key| record.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or(default_subscribed, parse_subscribed);

    let mut contact = MappedContact::new(email, subscribed);
    for field in &field_map.attributes {
        let Some(raw) = record.get(&field.source).map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = if field.flag {
            match parse_flag(raw) {
                Some(b) => AttributeValue::Flag(b),
                None => {
                    tracing::debug!(position = %record.position, field = %field.name, raw, "ignoring unparseable flag");
                    continue;
                }
            }
        } else {
            AttributeValue::Text(raw.to_string())
        };
        contact = contact.with_attribute(field.name.as_str(), value);
    }
    Ok(contact)
}

/// `false`, `0` and `no` (any case) unsubscribe; any other value subscribes.
pub fn parse_subscribed(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

/// Strict boolean parse for flag attributes.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailsync_core::{RecordPosition, SourceKey, ValidationErrorKind};

    fn row(cells: &[&str]) -> ContactRecord {
        ContactRecord::from_columns(
            RecordPosition::Line(4),
            cells.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn name_map() -> FieldMap {
        FieldMap::default().with_attribute("name", SourceKey::Index(1))
    }

    #[test]
    fn maps_email_and_attributes() {
        let contact = map(&row(&["  a@x.com ", "Jo"]), &name_map(), true).unwrap();
        assert_eq!(contact.email, "a@x.com");
        assert!(contact.subscribed);
        assert_eq!(contact.attributes.get("name"), Some(&AttributeValue::Text("Jo".into())));
    }

    #[test]
    fn rejects_email_without_at() {
        let err = map(&row(&["not-an-email", "Al"]), &name_map(), true).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidEmail);
        assert_eq!(err.position, RecordPosition::Line(4));
    }

    #[test]
    fn rejects_blank_and_missing_email() {
        assert!(map(&row(&["   ", "Al"]), &name_map(), true).is_err());
        let by_name = FieldMap {
            email: SourceKey::Name("email".into()),
            ..FieldMap::default()
        };
        assert!(map(&row(&["a@x.com"]), &by_name, true).is_err());
    }

    #[test]
    fn empty_attributes_are_omitted() {
        let map_all = name_map().with_attribute("city", SourceKey::Index(2));
        let contact = map(&row(&["a@x.com", "", "   "]), &map_all, true).unwrap();
        assert!(contact.attributes.is_empty());
    }

    #[test]
    fn subscribed_parsing() {
        let fm = FieldMap {
            subscribed: Some(SourceKey::Index(1)),
            ..FieldMap::default()
        };
        for (raw, expected) in [("FALSE", false), ("0", false), ("No", false), ("yes", true), ("", true)] {
            let contact = map(&row(&["a@x.com", raw]), &fm, true).unwrap();
            assert_eq!(contact.subscribed, expected, "value {raw:?}");
        }
        // absent value falls back to the default
        let contact = map(&row(&["a@x.com"]), &fm, false).unwrap();
        assert!(!contact.subscribed);
    }

    #[test]
    fn flags_parse_or_drop() {
        let fm = FieldMap::default()
            .with_flag("verified", SourceKey::Index(1))
            .with_flag("admin", SourceKey::Index(2));
        let contact = map(&row(&["a@x.com", "Y", "maybe"]), &fm, true).unwrap();
        assert_eq!(contact.attributes.get("verified"), Some(&AttributeValue::Flag(true)));
        assert!(!contact.attributes.contains_key("admin"));
    }

    #[test]
    fn named_fields_from_json_records() {
        let record = ContactRecord::from_named(
            RecordPosition::Index(0),
            [("email", "b@x.com"), ("first_name", "Sam")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let fm = FieldMap {
            email: SourceKey::Name("email".into()),
            ..FieldMap::default()
        }
        .with_attribute("name", SourceKey::Name("first_name".into()));
        let contact = map(&record, &fm, true).unwrap();
        assert_eq!(contact.email, "b@x.com");
        assert_eq!(contact.attributes.get("name"), Some(&AttributeValue::Text("Sam".into())));
    }

    #[test]
    fn null_leading_field_does_not_shift_json_values() {
        use mailsync_source::json_value::row_to_record;
        use serde_json::json;

        let first = row_to_record(&json!({"name": null, "email": "a@x.com"}), 0).unwrap();
        let second = row_to_record(&json!({"name": "Jo", "email": "b@x.com"}), 1).unwrap();

        let by_name = FieldMap {
            email: SourceKey::Name("email".into()),
            ..FieldMap::default()
        }
        .with_attribute("name", SourceKey::Name("name".into()));
        let a = map(&first, &by_name, true).unwrap();
        assert_eq!(a.email, "a@x.com");
        assert!(a.attributes.is_empty());
        let b = map(&second, &by_name, true).unwrap();
        assert_eq!(b.email, "b@x.com");
        assert_eq!(b.attributes.get("name"), Some(&AttributeValue::Text("Jo".into())));

        // positions never address named fields, so no value lands in the wrong slot
        let by_index = FieldMap {
            email: SourceKey::Index(1),
            ..FieldMap::default()
        }
        .with_attribute("name", SourceKey::Index(0));
        assert!(map(&first, &by_index, true).is_err());
        assert!(map(&second, &by_index, true).is_err());
    }
}
