//! Node and relationship records as produced per source document.
//!
//! Batches are deserialized loosely (`serde_json::Value` per record) so that a
//! single malformed record never makes the whole document unreadable. Records
//! are validated one by one into [`NodeRecord`] / [`RelationshipRecord`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::data::errors::RecordRejection;

/// One document's worth of graph records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphBatch {
    #[serde(default)]
    pub nodes: Vec<Value>,

    #[serde(default)]
    pub relationships: Vec<Value>,
}

impl GraphBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

/// A scalar (or list of strings) attribute value that every backend can store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    /// Writing `Null` removes the property from the node.
    Null,
}

impl PropertyValue {
    /// Maps a JSON attribute onto a storable value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => n.as_f64().map_or(PropertyValue::Null, PropertyValue::Float),
            },
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Array(items) => {
                if items.iter().any(|v| v.is_array() || v.is_object()) {
                    return PropertyValue::String(value.to_string());
                }
                let strings = items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                PropertyValue::StringList(strings)
            },
            // Nested objects are kept as their JSON text
            Value::Object(_) => PropertyValue::String(value.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

/// A validated node record: `(label, id)` plus every other attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: String,
    pub id: String,
    /// Attributes other than `label` and `id`, sorted by key. `Null` entries
    /// clear the property.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl NodeRecord {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Validates a loosely-typed JSON record.
    pub fn from_value(value: &Value) -> Result<Self, RecordRejection> {
        let obj = value.as_object().ok_or(RecordRejection::NotAnObject)?;

        let label = required_str(obj, "label")?;
        let id = required_str(obj, "id")?;

        let properties = obj
            .iter()
            .filter(|(key, _)| key.as_str() != "label" && key.as_str() != "id")
            .map(|(key, v)| (key.clone(), PropertyValue::from_json(v)))
            .collect();

        Ok(Self {
            label: label.to_string(),
            id: id.to_string(),
            properties,
        })
    }
}

/// A validated relationship record. Attributes beyond the type are not modeled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl RelationshipRecord {
    pub fn new(
        from: impl Into<String>,
        rel_type: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rel_type: rel_type.into(),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, RecordRejection> {
        let obj = value.as_object().ok_or(RecordRejection::NotAnObject)?;

        Ok(Self {
            from: required_str(obj, "from")?.to_string(),
            to: required_str(obj, "to")?.to_string(),
            rel_type: required_str(obj, "type")?.to_string(),
        })
    }
}

fn required_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, RecordRejection> {
    match obj.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(RecordRejection::MissingField(field)),
    }
}
