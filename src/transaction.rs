// src/transaction.rs
// Transaction bookkeeping for the single-writer transaction manager.
//
// A `Transaction` accumulates the operations and index changes that make up
// one unit of work. It does not talk to storage directly — `DatabaseCore`
// and `StorageEngine` apply a transaction's operations to the WAL and to the
// on-disk catalog when it commits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::Result;

/// Unique identifier for a transaction, allocated from a monotonically
/// increasing counter on `DatabaseCore`.
pub type TransactionId = u64;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A single mutation recorded against a collection.
///
/// Operations are serialized into the WAL verbatim (via `serde_json`) so
/// that recovery can replay them without needing the rest of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    Insert {
        collection: String,
        doc_id: DocumentId,
        doc: serde_json::Value,
    },
    Update {
        collection: String,
        doc_id: DocumentId,
        old_doc: serde_json::Value,
        new_doc: serde_json::Value,
    },
    Delete {
        collection: String,
        doc_id: DocumentId,
        old_doc: serde_json::Value,
    },
}

impl Operation {
    /// Name of the collection this operation targets.
    pub fn collection(&self) -> &str {
        match self {
            Operation::Insert { collection, .. } => collection,
            Operation::Update { collection, .. } => collection,
            Operation::Delete { collection, .. } => collection,
        }
    }

    /// Id of the document this operation targets.
    pub fn doc_id(&self) -> &DocumentId {
        match self {
            Operation::Insert { doc_id, .. } => doc_id,
            Operation::Update { doc_id, .. } => doc_id,
            Operation::Delete { doc_id, .. } => doc_id,
        }
    }
}

/// Key type for a secondary index entry touched by a transaction.
///
/// This mirrors `crate::index::IndexKey` but stays decoupled from it: a
/// transaction should be serializable without depending on B+Tree internals,
/// and `database.rs` converts between the two when applying recovered or
/// in-flight index changes to an actual `BPlusTree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat),
    String(String),
}

/// `f64` wrapper that carries the raw value across the WAL boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl OrderedFloat {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for OrderedFloat {
    fn from(v: f64) -> Self {
        OrderedFloat(v)
    }
}

impl From<&serde_json::Value> for IndexKey {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => IndexKey::Null,
            serde_json::Value::Bool(b) => IndexKey::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    IndexKey::Int(i)
                } else if let Some(f) = n.as_f64() {
                    IndexKey::Float(OrderedFloat(f))
                } else {
                    IndexKey::Null
                }
            }
            serde_json::Value::String(s) => IndexKey::String(s.clone()),
            _ => IndexKey::Null,
        }
    }
}

/// Kind of mutation applied to a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOperation {
    Insert,
    Delete,
}

/// A single index mutation recorded alongside a document operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexChange {
    pub operation: IndexOperation,
    pub key: IndexKey,
    pub doc_id: DocumentId,
}

/// A unit of work spanning one or more document operations.
///
/// Transactions in this engine are short-lived: either a single user-facing
/// write wrapped automatically (`DatabaseCore::insert_one_safe` and friends)
/// or an explicit `begin_transaction`/`commit_transaction` pair. There is no
/// support for nested or concurrent transactions — the engine is
/// single-writer, enforced by `DatabaseCore`'s active-transaction map.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub state: TransactionState,
    operations: Vec<Operation>,
    index_changes: HashMap<String, Vec<IndexChange>>,
    /// Set once the transaction's operations have been applied to the
    /// in-memory collection state, so that commit only needs to persist
    /// the WAL record rather than re-apply document mutations.
    pub operations_applied: bool,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Transaction {
            id,
            state: TransactionState::Active,
            operations: Vec::new(),
            index_changes: HashMap::new(),
            operations_applied: false,
        }
    }

    /// Record an operation against this transaction.
    pub fn add_operation(&mut self, operation: Operation) -> Result<()> {
        self.operations.push(operation);
        Ok(())
    }

    /// Record an index mutation for `index_name`, to be applied when the
    /// transaction commits.
    pub fn add_index_change(&mut self, index_name: String, change: IndexChange) -> Result<()> {
        self.index_changes.entry(index_name).or_default().push(change);
        Ok(())
    }

    /// Operations recorded so far, in the order they were added.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Index changes recorded so far, grouped by index name.
    pub fn index_changes(&self) -> &HashMap<String, Vec<IndexChange>> {
        &self.index_changes
    }

    /// Mark that this transaction's operations have already been applied to
    /// in-memory collection state (used by the auto-commit path, which
    /// mutates the collection eagerly and only needs the transaction object
    /// to produce the WAL record).
    pub fn mark_operations_applied(&mut self) {
        self.operations_applied = true;
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }
}
