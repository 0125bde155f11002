// src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A stored document: an integer `_id` plus a flat field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocumentId,

    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// Document identity. `_id` is always a 64-bit integer, assigned by the
/// engine at insert time if the caller didn't supply one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl DocumentId {
    /// Next id following a per-collection counter. The counter never
    /// decreases; skips are permitted.
    pub fn new_auto(last_id: u64) -> Self {
        DocumentId((last_id + 1) as i64)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DocumentId {
    fn from(v: i64) -> Self {
        DocumentId(v)
    }
}

impl Document {
    pub fn new(id: DocumentId, fields: HashMap<String, Value>) -> Self {
        Document { id, fields }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut doc: Self = serde_json::from_str(json)?;
        // serde(rename = "_id") + serde(flatten) consumes _id; the matcher
        // looks fields up through `get`, so put it back.
        doc.fields
            .insert("_id".to_string(), serde_json::to_value(doc.id.0)?);
        Ok(doc)
    }

    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        let mut doc: Self = serde_json::from_value(value.clone())?;
        doc.fields
            .insert("_id".to_string(), serde_json::to_value(doc.id.0)?);
        Ok(doc)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Top-level field access only; nested paths are not part of the
    /// document model.
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field.is_empty() {
            return None;
        }
        self.fields.get(field)
    }

    /// The `_id` value as JSON, for matcher/index use.
    pub fn get_id_value(&self) -> Value {
        Value::from(self.id.0)
    }

    pub fn set(&mut self, field: String, value: Value) {
        self.fields.insert(field, value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        let mut map = serde_json::Map::new();
        for (k, v) in doc.fields {
            map.insert(k, v);
        }
        if !map.contains_key("_id") {
            map.insert("_id".to_string(), Value::from(doc.id.0));
        }
        Value::Object(map)
    }
}
