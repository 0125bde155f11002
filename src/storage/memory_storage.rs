// storage/memory_storage.rs
//! Pure in-memory storage implementation for fast testing
//!
//! This module provides a memory-only storage backend that implements
//! the Storage trait using HashMap. It's 10-100x faster than file-based
//! storage, perfect for unit tests.
//!
//! # Architecture
//!
//! ```text
//! MemoryStorage (Storage trait implementation)
//!      ↓
//! HashMap<String, Vec<Document>> (collections -> documents)
//! ```

use crate::document::{Document, DocumentId};
use crate::error::{MongoLiteError, Result};
use crate::storage::{CollectionMeta, RawStorage, Storage};
use serde_json::Value;
use std::collections::HashMap;

/// In-memory storage backend (testing)
///
/// Provides a fast, ephemeral storage implementation that stores
/// all data in memory using HashMaps. Perfect for unit tests where
/// persistence is not needed.
///
/// # Performance
///
/// - **10-100x faster** than FileStorage
/// - No file I/O overhead
/// - No persistence (data lost when dropped)
///
/// # Examples
///
/// ```ignore
/// use ironbase_core::storage::MemoryStorage;
///
/// let storage = MemoryStorage::new();
/// ```
pub struct MemoryStorage {
    /// Collection name -> documents
    collections: HashMap<String, Vec<Document>>,

    /// Collection name -> metadata
    metadata: HashMap<String, CollectionMeta>,

    /// Auto-incrementing offset counter (synthetic for compatibility)
    next_offset: u64,

    /// Raw byte buffer for RawStorage trait (simulates file storage)
    raw_data: Vec<u8>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        // Pre-allocate header space (256 bytes) to match file-based storage
        let mut raw_data = vec![0u8; 256];
        // Write magic header for consistency
        raw_data[0..8].copy_from_slice(b"MONGOLTE");

        MemoryStorage {
            collections: HashMap::new(),
            metadata: HashMap::new(),
            next_offset: 256, // Start after header size for consistency
            raw_data,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    fn write_document(&mut self, collection: &str, doc: &Value) -> Result<u64> {
        // Parse document to extract/generate ID
        let mut doc_obj = doc
            .as_object()
            .ok_or_else(|| MongoLiteError::Serialization("Document must be an object".to_string()))?
            .clone();

        // Get or generate document ID
        let doc_id = if let Some(id_value) = doc_obj.get("_id") {
            // Parse existing _id
            serde_json::from_value::<DocumentId>(id_value.clone())
                .map_err(|e| MongoLiteError::Serialization(format!("Invalid _id: {}", e)))?
        } else {
            // Generate new auto-incrementing ID
            let meta = self
                .metadata
                .get_mut(collection)
                .ok_or_else(|| MongoLiteError::CollectionNotFound(collection.to_string()))?;

            meta.last_id += 1;
            let new_id = DocumentId(meta.last_id as i64);

            // Add _id to document
            let id_value = serde_json::to_value(&new_id)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;
            doc_obj.insert("_id".to_string(), id_value);

            new_id
        };

        // Convert to Document struct
        let doc_json = serde_json::to_string(&doc_obj)?;
        let document = Document::from_json(&doc_json)?;

        // Add to collection
        let docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| MongoLiteError::CollectionNotFound(collection.to_string()))?;

        docs.push(document);

        // Update metadata
        let meta = self.metadata.get_mut(collection).unwrap(); // Safe: we just checked above
        meta.document_count += 1;

        // Update last_id if this is an Int ID
        if let DocumentId(id) = &doc_id {
            if *id > meta.last_id as i64 {
                meta.last_id = *id as u64;
            }
        }

        // Return synthetic offset
        let offset = self.next_offset;
        self.next_offset += 1;

        // Store in catalog for compatibility
        meta.document_catalog.insert(doc_id, offset);

        Ok(offset)
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        // Get documents for collection
        let docs = match self.collections.get(collection) {
            Some(d) => d,
            None => return Ok(None),
        };

        // Find document by ID
        for doc in docs {
            if &doc.id == id {
                // Convert Document to Value
                let doc_json = doc.to_json()?;
                let value: Value = serde_json::from_str(&doc_json)?;
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    fn scan_documents(&mut self, collection: &str) -> Result<Vec<Document>> {
        // Get documents for collection
        match self.collections.get(collection) {
            Some(docs) => {
                // Filter out tombstones
                let result = docs
                    .iter()
                    .filter(|doc| {
                        // Check if document is a tombstone
                        doc.get("_tombstone")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false)
                            == false
                    })
                    .cloned()
                    .collect();
                Ok(result)
            }
            None => Ok(Vec::new()),
        }
    }

    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    fn create_collection(&mut self, name: &str) -> Result<()> {
        if self.collections.contains_key(name) {
            return Err(MongoLiteError::CollectionExists(name.to_string()));
        }

        // Create empty collection
        self.collections.insert(name.to_string(), Vec::new());

        // Create metadata
        let meta = CollectionMeta {
            name: name.to_string(),
            document_count: 0,
            live_document_count: 0,
            data_offset: 256,  // Synthetic
            index_offset: 256, // Synthetic
            last_id: 0,
            document_catalog: HashMap::new(),
            indexes: Vec::new(),
            schema: None,
        };

        self.metadata.insert(name.to_string(), meta);

        Ok(())
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        if !self.collections.contains_key(name) {
            return Err(MongoLiteError::CollectionNotFound(name.to_string()));
        }

        self.collections.remove(name);
        self.metadata.remove(name);

        Ok(())
    }

    fn list_collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    // ========================================================================
    // METADATA ACCESS
    // ========================================================================

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.metadata.get(name)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.metadata.get_mut(name)
    }

    // ========================================================================
    // PERSISTENCE & FLUSHING
    // ========================================================================

    fn flush(&mut self) -> Result<()> {
        // No-op for memory storage (nothing to flush)
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        // No-op for memory storage (no WAL)
        Ok(())
    }

    fn adjust_live_count(&mut self, collection: &str, delta: i64) {
        if let Some(meta) = self.metadata.get_mut(collection) {
            if delta >= 0 {
                meta.live_document_count = meta.live_document_count.saturating_add(delta as u64);
            } else {
                let dec = (-delta) as u64;
                meta.live_document_count = meta.live_document_count.saturating_sub(dec);
            }
        }
    }

    fn get_live_count(&self, collection: &str) -> Option<u64> {
        self.metadata.get(collection).map(|m| m.live_document_count)
    }

    fn get_file_path(&self) -> &str {
        ""
    }
}

// ============================================================================
// RAW STORAGE IMPLEMENTATION
// ============================================================================

impl RawStorage for MemoryStorage {
    /// Write raw document bytes with catalog tracking
    ///
    /// Format: [u32 length][raw bytes]
    fn write_document_raw(
        &mut self,
        collection: &str,
        doc_id: &DocumentId,
        data: &[u8],
    ) -> Result<u64> {
        let offset = self.raw_data.len() as u64;

        // Write length prefix (4 bytes, little-endian)
        let len = data.len() as u32;
        self.raw_data.extend_from_slice(&len.to_le_bytes());

        // Write raw document bytes
        self.raw_data.extend_from_slice(data);

        // Update catalog in metadata
        if let Some(meta) = self.metadata.get_mut(collection) {
            meta.document_catalog.insert(doc_id.clone(), offset);
        }

        // Update next_offset for consistency
        self.next_offset = self.raw_data.len() as u64;

        Ok(offset)
    }

    /// Read document bytes at specific offset
    fn read_document_at(&mut self, _collection: &str, offset: u64) -> Result<Vec<u8>> {
        let start = offset as usize;

        // Check bounds
        if start + 4 > self.raw_data.len() {
            return Err(MongoLiteError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("Offset {} out of bounds (len={})", offset, self.raw_data.len()),
            )));
        }

        // Read length prefix
        let len_bytes: [u8; 4] = self.raw_data[start..start + 4]
            .try_into()
            .map_err(|_| MongoLiteError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Failed to read length prefix",
            )))?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        // Check data bounds
        if start + 4 + len > self.raw_data.len() {
            return Err(MongoLiteError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("Data extends beyond buffer: offset={}, len={}", offset, len),
            )));
        }

        // Return raw bytes (without length prefix)
        Ok(self.raw_data[start + 4..start + 4 + len].to_vec())
    }

    /// Write raw data without catalog tracking (for tombstones)
    fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.raw_data.len() as u64;

        // Write length prefix (4 bytes, little-endian)
        let len = data.len() as u32;
        self.raw_data.extend_from_slice(&len.to_le_bytes());

        // Write raw bytes
        self.raw_data.extend_from_slice(data);

        // Update next_offset
        self.next_offset = self.raw_data.len() as u64;

        Ok(offset)
    }

    /// Read raw data at offset
    fn read_data(&mut self, offset: u64) -> Result<Vec<u8>> {
        // Same implementation as read_document_at (no collection context needed)
        self.read_document_at("", offset)
    }

    /// Get current "file" length (raw_data buffer size)
    fn file_len(&self) -> Result<u64> {
        Ok(self.raw_data.len() as u64)
    }
}

// ============================================================================
// TESTS
// ============================================================================
