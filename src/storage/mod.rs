// src/storage/mod.rs
// File-backed storage engine: header, collection metadata, and the
// StorageEngine type that ties I/O, metadata, compaction and WAL recovery
// together.
//
// File layout:
//   [Header: HEADER_SIZE bytes][reserved metadata region up to DATA_START_OFFSET]
//   [document region: length-prefixed JSON blobs]
//   [version 2+ only: metadata written at end of file after compaction,
//    located via header.metadata_offset/metadata_size]
//
// On open, metadata is always read from the front of the file (the reserved
// region written by `flush_metadata`); `header.metadata_offset` is only used
// by `compact` to know where document data ends once it has rewritten the
// file in the dynamic-metadata layout.

mod compaction;
mod file_storage;
mod io;
mod memory_storage;
mod metadata;
mod traits;

pub use compaction::{CompactionConfig, CompactionStats};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use traits::{CompactableStorage, IndexableStorage, Storage, StorageConfig};

pub use crate::recovery::RecoveredIndexChange;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::DocumentId;
use crate::error::{MongoLiteError, Result};
use crate::index::IndexMetadata;
use crate::recovery::RecoveryCoordinator;
use crate::transaction::{Transaction, TransactionState};
use crate::wal::{WALEntry, WALEntryType, WriteAheadLog};

/// Magic bytes identifying a docpile data file.
pub const MAGIC: &[u8; 8] = b"MONGOLTE";

/// Current on-disk format version written by `StorageEngine::open` for new
/// files. Version 1 keeps a fixed reserved region for metadata at the front
/// of the file; `compact` upgrades a file to version 2, which relocates
/// metadata to the end of the file so the reserved region no longer caps how
/// large collection metadata can grow.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the bincode-serialized `Header`, in bytes.
///
/// magic(8) + version(4) + page_size(4) + collection_count(4)
/// + free_list_head(8) + index_section_offset(8)
/// + metadata_offset(8) + metadata_size(8) = 52
pub const HEADER_SIZE: u64 = 52;

/// Fixed offset where document data starts for version 1 files. Everything
/// between `HEADER_SIZE` and `DATA_START_OFFSET` is reserved for the
/// front-of-file metadata block so that a growing catalog never collides
/// with document data; `flush_metadata` errors rather than overrunning it.
pub const DATA_START_OFFSET: u64 = 65536;

/// Fixed-size file header, written at offset 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub magic: [u8; 8],
    pub version: u32,
    pub page_size: u32,
    pub collection_count: u32,
    pub free_list_head: u64,
    pub index_section_offset: u64,
    /// Version 2+: absolute offset where relocated metadata lives.
    /// Zero means metadata is still at the fixed front-of-file location.
    pub metadata_offset: u64,
    /// Version 2+: length in bytes of the relocated metadata block.
    pub metadata_size: u64,
}

impl Header {
    fn new() -> Self {
        Header {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            page_size: NODE_PAGE_SIZE as u32,
            collection_count: 0,
            free_list_head: 0,
            index_section_offset: 0,
            metadata_offset: 0,
            metadata_size: 0,
        }
    }
}

use crate::index::NODE_PAGE_SIZE;

/// Per-collection metadata persisted alongside the header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub document_count: u64,
    /// Document count excluding tombstones; maintained incrementally by
    /// `Storage::adjust_live_count` rather than recomputed on every read.
    pub live_document_count: u64,
    pub data_offset: u64,
    pub index_offset: u64,
    pub last_id: u64,
    #[serde(with = "crate::catalog_serde")]
    pub document_catalog: HashMap<DocumentId, u64>,
    pub indexes: Vec<IndexMetadata>,
}

impl CollectionMeta {
    fn new(name: &str, offset: u64) -> Self {
        CollectionMeta {
            name: name.to_string(),
            document_count: 0,
            live_document_count: 0,
            data_offset: offset,
            index_offset: offset,
            last_id: 0,
            document_catalog: HashMap::new(),
            indexes: Vec::new(),
        }
    }
}

/// Low-level raw byte access, bypassing the JSON document conveniences of
/// `Storage`. Used by WAL replay, which already has a fully-formed document
/// (or tombstone) byte string and an explicit `DocumentId` to file under.
pub trait RawStorage: Send + Sync {
    fn write_document_raw(&mut self, collection: &str, doc_id: &DocumentId, data: &[u8]) -> Result<u64>;
    fn read_document_at(&mut self, collection: &str, offset: u64) -> Result<Vec<u8>>;
    fn write_data(&mut self, data: &[u8]) -> Result<u64>;
    fn read_data(&mut self, offset: u64) -> Result<Vec<u8>>;
    fn file_len(&self) -> Result<u64>;
}

/// Production file-backed storage engine.
///
/// Owns the open file handle, the parsed header, and the in-memory
/// collection catalog. Document bytes are appended to the file directly;
/// `io.rs` implements the length-prefixed read/write primitives, `metadata.rs`
/// the header/catalog (de)serialization, and `compaction.rs` the
/// tombstone-reclaiming rewrite.
pub struct StorageEngine {
    file: std::fs::File,
    file_path: String,
    header: Header,
    collections: HashMap<String, CollectionMeta>,
    mmap: Option<memmap2::Mmap>,
}

impl StorageEngine {
    /// Open an existing database file, or create a new one if it doesn't
    /// exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let is_new = !path.as_ref().exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let (header, collections) = if is_new {
            let header = Header::new();
            Self::write_metadata(&mut file, &header, &HashMap::new())?;
            let current_size = file.metadata()?.len();
            if current_size < DATA_START_OFFSET {
                file.set_len(DATA_START_OFFSET)?;
            }
            file.sync_all()?;
            (header, HashMap::new())
        } else {
            Self::load_metadata(&mut file)?
        };

        Ok(StorageEngine {
            file,
            file_path: path_str,
            header,
            collections,
            mmap: None,
        })
    }

    /// Path to the underlying data file.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Path to this engine's write-ahead log, derived from the data file
    /// path by appending `.wal`.
    fn wal_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("{}.wal", self.file_path))
    }

    pub fn create_collection(&mut self, name: &str) -> Result<()> {
        if self.collections.contains_key(name) {
            return Err(MongoLiteError::CollectionExists(name.to_string()));
        }

        let meta = CollectionMeta::new(name, DATA_START_OFFSET);
        self.collections.insert(name.to_string(), meta);
        self.header.collection_count = self.collections.len() as u32;
        self.flush_metadata()?;
        Ok(())
    }

    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        if self.collections.remove(name).is_none() {
            return Err(MongoLiteError::CollectionNotFound(name.to_string()));
        }
        self.header.collection_count = self.collections.len() as u32;
        self.flush_metadata()?;
        Ok(())
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections.get(name)
    }

    pub fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.collections.get_mut(name)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.flush_metadata()
    }

    /// Fold any pending WAL entries into the data file and truncate the log.
    /// Used by Unsafe-mode databases, which skip auto-commit and require an
    /// explicit checkpoint to become durable.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.flush_metadata()
    }

    pub fn adjust_live_count(&mut self, collection: &str, delta: i64) {
        if let Some(meta) = self.collections.get_mut(collection) {
            if delta >= 0 {
                meta.live_document_count = meta.live_document_count.saturating_add(delta as u64);
            } else {
                let dec = (-delta) as u64;
                meta.live_document_count = meta.live_document_count.saturating_sub(dec);
            }
        }
    }

    pub fn get_live_count(&self, collection: &str) -> Option<u64> {
        self.collections.get(collection).map(|m| m.live_document_count)
    }

    /// Database-wide statistics, as consumed by `DatabaseCore::stats`.
    pub fn stats(&self) -> Value {
        let collections: Vec<Value> = self
            .collections
            .values()
            .map(|meta| {
                serde_json::json!({
                    "name": meta.name,
                    "document_count": meta.document_count,
                    "live_document_count": meta.live_document_count,
                    "last_id": meta.last_id,
                    "index_count": meta.indexes.len(),
                })
            })
            .collect();

        serde_json::json!({
            "collection_count": self.collections.len(),
            "collections": collections,
            "format_version": self.header.version,
            "file_size": self.file.metadata().map(|m| m.len()).unwrap_or(0),
        })
    }

    /// Replay the write-ahead log into this engine's document store, then
    /// clear the log. Returns aggregate stats plus the index changes the
    /// caller (`DatabaseCore::open`) still needs to apply to in-memory
    /// B+Tree indexes.
    pub fn recover_from_wal(
        &mut self,
    ) -> Result<(crate::recovery::RecoveryStats, Vec<RecoveredIndexChange>)> {
        let wal_path = self.wal_path();
        RecoveryCoordinator::recover_and_clear(&wal_path, self)
    }

    /// Rebuild every collection's document catalog by scanning the data
    /// region of the file directly. Used after WAL recovery, since replay
    /// writes documents via `write_document_raw` without necessarily
    /// touching every collection's in-memory metadata consistently (e.g. a
    /// collection created only by a replayed operation).
    pub fn rebuild_catalog_from_file(&mut self) -> Result<()> {
        let file_len = self.file_len()?;
        let mut offset = DATA_START_OFFSET;

        let mut rebuilt: HashMap<String, HashMap<DocumentId, u64>> = self
            .collections
            .keys()
            .map(|name| (name.clone(), HashMap::new()))
            .collect();
        let mut counts: HashMap<String, u64> = HashMap::new();

        while offset < file_len {
            let doc_bytes = match self.read_data(offset) {
                Ok(bytes) => bytes,
                Err(_) => break,
            };
            let consumed = 4 + doc_bytes.len() as u64;

            if let Ok(doc) = serde_json::from_slice::<Value>(&doc_bytes) {
                let collection = doc
                    .get("_collection")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();

                if let Some(id_value) = doc.get("_id") {
                    if let Ok(doc_id) = serde_json::from_value::<DocumentId>(id_value.clone()) {
                        if !collection.is_empty() {
                            self.collections
                                .entry(collection.clone())
                                .or_insert_with(|| CollectionMeta::new(&collection, DATA_START_OFFSET));

                            let catalog = rebuilt.entry(collection.clone()).or_default();
                            catalog.insert(doc_id, offset);
                            *counts.entry(collection).or_default() += 1;
                        }
                    }
                }
            }

            offset += consumed;
        }

        for (name, catalog) in rebuilt {
            if let Some(meta) = self.collections.get_mut(&name) {
                let count = catalog.len() as u64;
                meta.document_catalog = catalog;
                meta.document_count = count;
            }
        }

        self.header.collection_count = self.collections.len() as u32;
        self.flush_metadata()?;

        Ok(())
    }

    /// Commit a transaction: write Begin/Operation/IndexChange/Commit
    /// records to the WAL, fsync, apply operations to the document store
    /// (unless the caller already applied them eagerly), and flush metadata.
    pub fn commit_transaction(&mut self, transaction: &mut Transaction) -> Result<()> {
        if transaction.state != TransactionState::Active {
            return Err(MongoLiteError::UnknownTransaction(format!(
                "transaction {} is not active",
                transaction.id
            )));
        }

        let collection_name = transaction
            .operations()
            .first()
            .map(|op| op.collection().to_string())
            .unwrap_or_default();

        {
            let wal_path = self.wal_path();
            let mut wal = WriteAheadLog::open(&wal_path)?;

            wal.append(&WALEntry::new(transaction.id, WALEntryType::Begin, Vec::new()))?;

            for op in transaction.operations() {
                let data = serde_json::to_vec(op)?;
                wal.append(&WALEntry::new(transaction.id, WALEntryType::Operation, data))?;
            }

            for (index_name, changes) in transaction.index_changes() {
                for change in changes {
                    let payload = serde_json::json!({
                        "collection": collection_name,
                        "index_name": index_name,
                        "operation": match change.operation {
                            crate::transaction::IndexOperation::Insert => "Insert",
                            crate::transaction::IndexOperation::Delete => "Delete",
                        },
                        "key": serde_json::to_value(&change.key)?,
                        "doc_id": change.doc_id.value(),
                    });
                    let data = serde_json::to_vec(&payload)?;
                    wal.append(&WALEntry::new(transaction.id, WALEntryType::IndexChange, data))?;
                }
            }

            wal.append(&WALEntry::new(transaction.id, WALEntryType::Commit, Vec::new()))?;
            wal.flush()?;
        }

        if !transaction.operations_applied {
            for op in transaction.operations().to_vec() {
                crate::recovery::OperationReplay::replay(
                    self,
                    &[WALEntry::new(
                        transaction.id,
                        WALEntryType::Operation,
                        serde_json::to_vec(&op)?,
                    )],
                )?;
            }
        }

        self.flush_metadata()?;
        transaction.state = TransactionState::Committed;
        Ok(())
    }

    /// Roll back a transaction: write an Abort record to the WAL so that
    /// recovery discards it, and drop any in-memory buffered operations.
    /// Operations already applied eagerly to the document store (batch mode)
    /// are never rolled back here; an aborted Batch-mode transaction should
    /// not occur in practice, since batch operations are only abandoned if
    /// the process crashes before commit.
    pub fn rollback_transaction(&mut self, transaction: &mut Transaction) -> Result<()> {
        if transaction.state != TransactionState::Active {
            return Err(MongoLiteError::UnknownTransaction(format!(
                "transaction {} is not active",
                transaction.id
            )));
        }

        let wal_path = self.wal_path();
        let mut wal = WriteAheadLog::open(&wal_path)?;
        wal.append(&WALEntry::new(transaction.id, WALEntryType::Abort, Vec::new()))?;
        wal.flush()?;

        transaction.state = TransactionState::RolledBack;
        Ok(())
    }
}

impl Storage for StorageEngine {
    fn write_document(&mut self, collection: &str, doc: &Value) -> Result<u64> {
        let mut doc_obj = doc
            .as_object()
            .ok_or_else(|| MongoLiteError::Serialization("Document must be an object".to_string()))?
            .clone();

        let doc_id = if let Some(id_value) = doc_obj.get("_id") {
            serde_json::from_value::<DocumentId>(id_value.clone())
                .map_err(|e| MongoLiteError::Serialization(format!("Invalid _id: {}", e)))?
        } else {
            let meta = self
                .get_collection_meta(collection)
                .ok_or_else(|| MongoLiteError::CollectionNotFound(collection.to_string()))?;
            let new_id = DocumentId::new_auto(meta.last_id);
            let id_value = serde_json::to_value(&new_id)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;
            doc_obj.insert("_id".to_string(), id_value);
            new_id
        };

        let doc_json = serde_json::to_string(&doc_obj)
            .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

        let offset = self.write_document(collection, &doc_id, doc_json.as_bytes())?;

        if let Some(meta) = self.get_collection_meta_mut(collection) {
            if doc_id.value() > meta.last_id as i64 {
                meta.last_id = doc_id.value() as u64;
            }
            meta.document_count += 1;
        }

        Ok(offset)
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        let meta = match self.get_collection_meta(collection) {
            Some(m) => m,
            None => return Ok(None),
        };

        let offset = match meta.document_catalog.get(id) {
            Some(&off) => off,
            None => return Ok(None),
        };

        // SAFETY: read_data only seeks and reads the already-open file; it
        // does not mutate any field other than the file cursor, so treating
        // this as non-mutating access from an `&self` method is sound.
        let storage_mut = unsafe {
            let const_ptr = self as *const StorageEngine;
            let mut_ptr = const_ptr as *mut StorageEngine;
            &mut *mut_ptr
        };

        let data = storage_mut.read_data(offset)?;
        let value: Value = serde_json::from_slice(&data)
            .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

        Ok(Some(value))
    }

    fn scan_documents(&mut self, collection: &str) -> Result<Vec<crate::document::Document>> {
        let catalog = match self.get_collection_meta(collection) {
            Some(m) => m.document_catalog.clone(),
            None => return Ok(Vec::new()),
        };

        let mut documents = Vec::new();
        for (_doc_id, &offset) in &catalog {
            let data = self.read_data(offset)?;
            let value: Value = serde_json::from_slice(&data)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;

            if value.get("_tombstone").and_then(|v| v.as_bool()).unwrap_or(false) {
                continue;
            }

            let document = crate::document::Document::from_value(&value)
                .map_err(|e| MongoLiteError::Serialization(e.to_string()))?;
            documents.push(document);
        }

        Ok(documents)
    }

    fn create_collection(&mut self, name: &str) -> Result<()> {
        StorageEngine::create_collection(self, name)
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        StorageEngine::drop_collection(self, name)
    }

    fn list_collections(&self) -> Vec<String> {
        StorageEngine::list_collections(self)
    }

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        StorageEngine::get_collection_meta(self, name)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        StorageEngine::get_collection_meta_mut(self, name)
    }

    fn flush(&mut self) -> Result<()> {
        StorageEngine::flush(self)
    }

    fn checkpoint(&mut self) -> Result<()> {
        StorageEngine::checkpoint(self)
    }

    fn adjust_live_count(&mut self, collection: &str, delta: i64) {
        StorageEngine::adjust_live_count(self, collection, delta)
    }

    fn get_live_count(&self, collection: &str) -> Option<u64> {
        StorageEngine::get_live_count(self, collection)
    }

    fn get_file_path(&self) -> &str {
        &self.file_path
    }
}

impl RawStorage for StorageEngine {
    fn write_document_raw(&mut self, collection: &str, doc_id: &DocumentId, data: &[u8]) -> Result<u64> {
        self.write_document(collection, doc_id, data)
    }

    fn read_document_at(&mut self, collection: &str, offset: u64) -> Result<Vec<u8>> {
        StorageEngine::read_document_at(self, collection, offset)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        StorageEngine::write_data(self, data)
    }

    fn read_data(&mut self, offset: u64) -> Result<Vec<u8>> {
        StorageEngine::read_data(self, offset)
    }

    fn file_len(&self) -> Result<u64> {
        StorageEngine::file_len(self)
    }
}
