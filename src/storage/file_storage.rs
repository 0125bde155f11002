// storage/file_storage.rs
//! File-based storage implementation wrapping StorageEngine
//!
//! This module provides a production-ready file storage backend that implements
//! the Storage trait by delegating to the existing StorageEngine.
//!
//! # Architecture
//!
//! ```text
//! FileStorage (Storage trait implementation)
//!      ↓
//! StorageEngine (existing implementation)
//!      ↓
//! .mlite file (append-only with dynamic metadata)
//! ```

use std::path::Path;
use serde_json::Value;
use crate::error::{Result, MongoLiteError};
use crate::document::{Document, DocumentId};
use crate::storage::{CollectionMeta, Storage};
use super::StorageEngine;

/// File-based storage backend (production)
///
/// Wraps the existing StorageEngine to implement the Storage trait.
/// This provides zero behavior change from the current implementation,
/// just adds the trait abstraction layer.
///
/// # Examples
///
/// ```ignore
/// use ironbase_core::storage::FileStorage;
///
/// let storage = FileStorage::open("data.mlite")?;
/// ```
pub struct FileStorage {
    inner: StorageEngine,
}

impl FileStorage {
    /// Open existing database or create new one
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(FileStorage {
            inner: StorageEngine::open(path)?,
        })
    }

    /// Get reference to inner StorageEngine (for advanced use cases)
    pub fn inner(&self) -> &StorageEngine {
        &self.inner
    }

    /// Get mutable reference to inner StorageEngine (for advanced use cases)
    pub fn inner_mut(&mut self) -> &mut StorageEngine {
        &mut self.inner
    }
}

impl Storage for FileStorage {
    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    fn write_document(&mut self, collection: &str, doc: &Value) -> Result<u64> {
        // Parse document to extract/generate ID
        let mut doc_obj = doc.as_object()
            .ok_or_else(|| MongoLiteError::Serialization("Document must be an object".to_string()))?
            .clone();

        // Get or generate document ID
        let doc_id = if let Some(id_value) = doc_obj.get("_id") {
            // Parse existing _id from JSON value
            serde_json::from_value::<DocumentId>(id_value.clone())
                .map_err(|e| MongoLiteError::Serialization(format!("Invalid _id: {}", e)))?
        } else {
            // Need to generate new auto-incrementing ID
            // First get current last_id
            let last_id = {
                let meta = self.inner.get_collection_meta(collection)
                    .ok_or_else(|| MongoLiteError::CollectionNotFound(collection.to_string()))?;
                meta.last_id
            };

            // Generate new ID
            let new_id = DocumentId((last_id + 1) as i64);

            // Add _id to document
            let id_value = serde_json::to_value(&new_id)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;
            doc_obj.insert("_id".to_string(), id_value);

            new_id
        };

        // Serialize document
        let doc_json = serde_json::to_string(&doc_obj)
            .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

        // Write document using StorageEngine's write_document method
        // This automatically updates catalog and document_count
        let offset = self.inner.write_document(
            collection,
            &doc_id,
            doc_json.as_bytes()
        )?;

        // Update last_id if we generated a new auto-increment ID
        if let DocumentId(id) = &doc_id {
            if let Some(meta) = self.inner.get_collection_meta_mut(collection) {
                if *id > meta.last_id as i64 {
                    meta.last_id = *id as u64;
                }
            }
        }

        Ok(offset)
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        // Get collection metadata to access catalog
        let meta = match self.inner.get_collection_meta(collection) {
            Some(m) => m,
            None => return Ok(None), // Collection doesn't exist
        };

        // Look up document offset in catalog
        let offset = match meta.document_catalog.get(id) {
            Some(&off) => off,
            None => return Ok(None), // Document not found
        };

        // Read document data from file
        // SAFETY: We need mutable access to StorageEngine for I/O, but we're not mutating state
        // This is safe because read_data only seeks/reads the file
        let storage_mut = unsafe {
            let const_ptr = &self.inner as *const StorageEngine;
            let mut_ptr = const_ptr as *mut StorageEngine;
            &mut *mut_ptr
        };

        let data = storage_mut.read_document_at(collection, offset)?;

        // Deserialize JSON
        let doc_value: Value = serde_json::from_slice(&data)
            .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

        Ok(Some(doc_value))
    }

    fn scan_documents(&mut self, collection: &str) -> Result<Vec<Document>> {
        // Get collection metadata to access catalog
        // Need to clone the catalog to avoid borrow conflicts
        let catalog = match self.inner.get_collection_meta(collection) {
            Some(m) => m.document_catalog.clone(),
            None => return Ok(Vec::new()), // Collection doesn't exist or empty
        };

        let mut documents = Vec::new();

        // Iterate over all documents in catalog
        for (_doc_id, &offset) in &catalog {
            // Read document data
            let data = self.inner.read_document_at(collection, offset)?;

            // Deserialize to JSON
            let doc_value: Value = serde_json::from_slice(&data)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

            // Convert to Document struct
            let document = Document::from_json(&serde_json::to_string(&doc_value)?)?;

            // Skip tombstones (deleted documents)
            if doc_value.get("_tombstone").and_then(|v| v.as_bool()).unwrap_or(false) {
                continue;
            }

            documents.push(document);
        }

        Ok(documents)
    }

    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    fn create_collection(&mut self, name: &str) -> Result<()> {
        self.inner.create_collection(name)
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.inner.drop_collection(name)
    }

    fn list_collections(&self) -> Vec<String> {
        self.inner.list_collections()
    }

    // ========================================================================
    // METADATA ACCESS
    // ========================================================================

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.inner.get_collection_meta(name)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.inner.get_collection_meta_mut(name)
    }

    // ========================================================================
    // PERSISTENCE & FLUSHING
    // ========================================================================

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.inner.checkpoint()
    }

    fn adjust_live_count(&mut self, collection: &str, delta: i64) {
        if let Some(meta) = self.inner.get_collection_meta_mut(collection) {
            if delta >= 0 {
                meta.live_document_count = meta.live_document_count.saturating_add(delta as u64);
            } else {
                let dec = (-delta) as u64;
                meta.live_document_count = meta.live_document_count.saturating_sub(dec);
            }
        }
    }

    fn get_live_count(&self, collection: &str) -> Option<u64> {
        self.inner
            .get_collection_meta(collection)
            .map(|m| m.live_document_count)
    }

    fn get_file_path(&self) -> &str {
        self.inner.file_path()
    }
}

// ============================================================================
// OPTIONAL TRAIT IMPLEMENTATIONS
// ============================================================================

use crate::storage::traits::CompactableStorage;
use crate::storage::compaction::CompactionStats;

impl CompactableStorage for FileStorage {
    fn compact(&mut self) -> Result<CompactionStats> {
        // Delegate to StorageEngine's compact method
        self.inner.compact()
    }
}

// Note: IndexableStorage will be implemented when Collection layer is refactored
// to use the Storage trait, as index operations are higher-level

// ============================================================================
// TESTS
// ============================================================================
