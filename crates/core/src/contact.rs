use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Custom contact attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Flag(b)
    }
}

/// A contact in the email service's shape, produced by the mapper.
///
/// `email` has been trimmed and checked for `@` before this value exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedContact {
    pub email: String,
    pub subscribed: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl MappedContact {
    pub fn new(email: impl Into<String>, subscribed: bool) -> Self {
        Self {
            email: email.into(),
            subscribed,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Request body with attributes alongside `email` and `subscribed`.
    pub fn flat_payload(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        for (key, value) in &self.attributes {
            body.insert(key.clone(), attribute_json(value));
        }
        // Fixed fields win over attributes of the same name.
        body.insert("email".into(), serde_json::Value::String(self.email.clone()));
        body.insert("subscribed".into(), serde_json::Value::Bool(self.subscribed));
        serde_json::Value::Object(body)
    }

    /// Request body with attributes nested under `data`.
    pub fn nested_payload(&self) -> serde_json::Value {
        let data: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), attribute_json(v)))
            .collect();
        serde_json::json!({
            "email": self.email,
            "subscribed": self.subscribed,
            "data": data,
        })
    }
}

fn attribute_json(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
        AttributeValue::Flag(b) => serde_json::Value::Bool(*b),
    }
}
