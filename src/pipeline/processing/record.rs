use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::Result;

/// A record flowing between pipeline stages. Keys iterate in sorted order,
/// which keeps serialized output and structural signatures deterministic.
pub type Record = BTreeMap<String, FieldValue>;

/// The closed set of value kinds a normalized field can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FieldValue>),
    Object(Record),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Null, empty string, empty list and empty object count as empty.
    /// Numeric zero does not.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Object(fields) => fields.is_empty(),
            FieldValue::Int(_) | FieldValue::Float(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            FieldValue::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<Record> for FieldValue {
    fn from(fields: Record) -> Self {
        FieldValue::Object(fields)
    }
}

impl From<&serde_json::Value> for FieldValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            // Booleans have no kind of their own in the record schema
            serde_json::Value::Bool(b) => FieldValue::Str(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => FieldValue::Str(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Remove null and empty leaves from a record.
///
/// Covers top-level fields and one level of nested objects. Null elements
/// and empty elements inside lists are dropped, and a container left empty
/// is removed too.
pub fn sweep_record(record: Record) -> Record {
    record
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                FieldValue::Object(inner) => FieldValue::Object(
                    inner
                        .into_iter()
                        .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                        .collect(),
                ),
                other => other,
            };
            prune(value).map(|v| (key, v))
        })
        .collect()
}

fn prune(value: FieldValue) -> Option<FieldValue> {
    match value {
        FieldValue::List(items) => {
            let items: Vec<FieldValue> = items.into_iter().filter(|i| !i.is_empty()).collect();
            if items.is_empty() {
                None
            } else {
                Some(FieldValue::List(items))
            }
        }
        v if v.is_empty() => None,
        v => Some(v),
    }
}

/// Hex SHA-256 of the key-sorted JSON serialization of a record.
/// Two records share a signature exactly when they are structurally equal.
pub fn structural_signature(record: &Record) -> Result<String> {
    let canonical = serde_json::to_vec(record)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
