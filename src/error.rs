//! Crate-wide error taxonomy.
//!
//! One `thiserror`-derived enum covers every failure surface named in the
//! design: storage faults, index/catalog inconsistency, malformed queries,
//! updates and projections, planner hints, and transaction misuse. Call
//! sites throughout the crate propagate `crate::error::Result<T>` with `?`;
//! nothing here recovers silently.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MongoLiteError>;

#[derive(Error, Debug)]
pub enum MongoLiteError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("collection already exists: {0}")]
    CollectionExists(String),

    #[error("document not found")]
    DocumentNotFound,

    #[error("index error: {0}")]
    IndexError(String),

    #[error("duplicate key for unique index {index}: {key}")]
    DuplicateKey { index: String, key: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("invalid projection: {0}")]
    InvalidProjection(String),

    #[error("hint refers to an index that does not exist: {0}")]
    InvalidHint(String),

    #[error("hinted index {0} does not cover the queried field")]
    UnusableHint(String),

    #[error("unknown or inactive transaction: {0}")]
    UnknownTransaction(String),

    #[error("database is already open by another engine instance")]
    DatabaseBusy,

    #[error("aggregation error: {0}")]
    AggregationError(String),

    #[error("storage is corrupt: {0}")]
    CorruptFormat(String),

    #[error("unsupported format version: {0}")]
    VersionMismatch(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io failure: {0}")]
    IoFailure(#[from] io::Error),
}

impl From<serde_json::Error> for MongoLiteError {
    fn from(err: serde_json::Error) -> Self {
        MongoLiteError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for MongoLiteError {
    fn from(err: bincode::Error) -> Self {
        MongoLiteError::Serialization(err.to_string())
    }
}

impl MongoLiteError {
    /// `true` for storage-layer faults that, inside a transaction, force a
    /// rollback rather than surfacing as an ordinary operation failure.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            MongoLiteError::IoFailure(_)
                | MongoLiteError::CorruptFormat(_)
                | MongoLiteError::VersionMismatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: MongoLiteError = io_err.into();
        assert!(matches!(err, MongoLiteError::IoFailure(_)));
    }

    #[test]
    fn json_error_converts_to_serialization() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: MongoLiteError = parsed.unwrap_err().into();
        assert!(matches!(err, MongoLiteError::Serialization(_)));
    }

    #[test]
    fn storage_fault_classification() {
        assert!(MongoLiteError::CorruptFormat("bad page".into()).is_storage_fault());
        assert!(MongoLiteError::VersionMismatch("v2".into()).is_storage_fault());
        assert!(!MongoLiteError::DocumentNotFound.is_storage_fault());
        assert!(!MongoLiteError::InvalidQuery("bad op".into()).is_storage_fault());
    }
}
