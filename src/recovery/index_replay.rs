// recovery/index_replay.rs
// Parse and replay index changes from WAL

use crate::document::DocumentId;
use crate::error::{MongoLiteError, Result};
use crate::wal::{WALEntry, WALEntryType};

/// Type of index operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOperation {
    Insert,
    Delete,
}

/// A recovered index change from WAL
#[derive(Debug, Clone)]
pub struct RecoveredIndexChange {
    pub collection: String,
    pub index_name: String,
    pub operation: IndexOperation,
    pub key: serde_json::Value,
    pub doc_id: DocumentId,
}

/// Parses index change entries from WAL
pub struct IndexReplay;

impl IndexReplay {
    /// Parse WAL entries into recovered index changes
    pub fn parse_entries(entries: &[WALEntry]) -> Result<Vec<RecoveredIndexChange>> {
        entries
            .iter()
            .filter(|e| e.entry_type == WALEntryType::IndexChange)
            .map(|e| Self::parse_index_change(&e.data))
            .collect()
    }

    /// Parse a single index change entry
    fn parse_index_change(data: &[u8]) -> Result<RecoveredIndexChange> {
        let json: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

        let collection = json
            .get("collection")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                MongoLiteError::Serialization("Missing collection in index change".into())
            })?
            .to_string();

        let index_name = json
            .get("index_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                MongoLiteError::Serialization("Missing index_name in index change".into())
            })?
            .to_string();

        let operation = match json.get("operation").and_then(|v| v.as_str()) {
            Some("Insert") => IndexOperation::Insert,
            Some("Delete") => IndexOperation::Delete,
            _ => {
                return Err(MongoLiteError::Serialization(
                    "Invalid operation in index change".into(),
                ))
            }
        };

        let key = json
            .get("key")
            .cloned()
            .ok_or_else(|| MongoLiteError::Serialization("Missing key in index change".into()))?;

        let doc_id = Self::parse_doc_id(&json)?;

        Ok(RecoveredIndexChange {
            collection,
            index_name,
            operation,
            key,
            doc_id,
        })
    }

    /// Parse document ID from JSON
    fn parse_doc_id(json: &serde_json::Value) -> Result<DocumentId> {
        let doc_id_value = json.get("doc_id").ok_or_else(|| {
            MongoLiteError::Serialization("Missing doc_id in index change".into())
        })?;

        match doc_id_value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(DocumentId(i))
                } else {
                    Err(MongoLiteError::Serialization(
                        "Invalid doc_id number type".into(),
                    ))
                }
            }
            serde_json::Value::Object(obj) => {
                // Handle a doc_id serialized as a legacy tagged enum, e.g. {"Int": 99}
                if let Some(i) = obj.get("Int").and_then(|v| v.as_i64()) {
                    Ok(DocumentId(i))
                } else {
                    Err(MongoLiteError::Serialization(
                        "Invalid doc_id object format".into(),
                    ))
                }
            }
            _ => Err(MongoLiteError::Serialization("Invalid doc_id type".into())),
        }
    }
}

/// Statistics from index replay
#[derive(Debug, Default, Clone)]
pub struct IndexReplayStats {
    pub changes_parsed: usize,
    pub inserts: usize,
    pub deletes: usize,
}

impl IndexReplayStats {
    pub fn from_changes(changes: &[RecoveredIndexChange]) -> Self {
        let mut stats = Self::default();
        stats.changes_parsed = changes.len();
        for change in changes {
            match change.operation {
                IndexOperation::Insert => stats.inserts += 1,
                IndexOperation::Delete => stats.deletes += 1,
            }
        }
        stats
    }
}
