// src/index.rs
// B+ Tree Index Implementation

use crate::document::DocumentId;
use crate::error::{MongoLiteError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Page size used by the storage header when sizing its own pages. Index
/// persistence itself writes a single length-prefixed blob per tree, not
/// fixed-size pages, but the constant is shared so the two layers agree on
/// a unit when reasoning about file layout.
pub const NODE_PAGE_SIZE: usize = 4096;

/// Index key - supported types for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat),
    String(String),
}

/// OrderedFloat wrapper for f64 to enable Ord
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => self
                .0
                .partial_cmp(&other.0)
                .unwrap_or(std::cmp::Ordering::Equal),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordering for index keys: `null < bool < number < string`, matching the
/// canonical value order used by the query matcher
/// (`value_utils::compare_values`). `Int` and `Float` share the number tier
/// and compare by numeric value rather than by variant, so
/// `Int(10) < Float(10.5)` and `Float(5.5) < Int(10)` both hold.
impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        use IndexKey::*;

        fn tier(key: &IndexKey) -> u8 {
            match key {
                Null => 0,
                Bool(_) => 1,
                Int(_) | Float(_) => 2,
                String(_) => 3,
            }
        }

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.cmp(b),
            (Int(a), Float(b)) => OrderedFloat(*a as f64).cmp(b),
            (Float(a), Int(b)) => a.cmp(&OrderedFloat(*b as f64)),
            (String(a), String(b)) => a.cmp(b),
            _ => tier(self).cmp(&tier(other)),
        }
    }
}

/// Convert serde_json::Value to IndexKey
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
            _ => IndexKey::Null, // Arrays and objects aren't indexable keys
        }
    }
}

/// A secondary index: a sorted map from key to the document ids that carry
/// it. Keys need not be unique unless `metadata.unique` is set; `insert`
/// enforces uniqueness when it is.
#[derive(Debug, Clone)]
pub struct BPlusTree {
    entries: BTreeMap<IndexKey, Vec<DocumentId>>,
    pub metadata: IndexMetadata,
}

/// Index metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    pub field: String,
    pub unique: bool,
    pub sparse: bool,
    pub num_keys: u64,
    #[serde(default)]
    pub root_offset: u64, // File offset where this tree's serialized blob starts (0 = in-memory only)
}

impl BPlusTree {
    /// Create a new index over a single top-level field
    pub fn new(name: String, field: String, unique: bool) -> Self {
        BPlusTree {
            entries: BTreeMap::new(),
            metadata: IndexMetadata {
                name,
                field,
                unique,
                sparse: false,
                num_keys: 0,
                root_offset: 0,
            },
        }
    }

    /// Extract the index key for a document. Field access is top-level only.
    pub fn extract_key(&self, doc: &serde_json::Value) -> IndexKey {
        doc.get(&self.metadata.field)
            .map(IndexKey::from)
            .unwrap_or(IndexKey::Null)
    }

    /// Search for a key, returning one matching document id if present.
    pub fn search(&self, key: &IndexKey) -> Option<DocumentId> {
        self.entries.get(key).and_then(|ids| ids.first()).copied()
    }

    /// Insert a key-document pair into the index
    pub fn insert(&mut self, key: IndexKey, doc_id: DocumentId) -> Result<()> {
        if self.metadata.unique {
            if let Some(existing) = self.entries.get(&key) {
                if !existing.is_empty() {
                    return Err(MongoLiteError::DuplicateKey {
                        index: self.metadata.name.clone(),
                        key: format!("{:?}", key),
                    });
                }
            }
        }

        self.entries.entry(key).or_default().push(doc_id);
        self.metadata.num_keys += 1;

        Ok(())
    }

    /// Bulk-load the index from pre-sorted entries in O(n), replacing any
    /// existing contents.
    ///
    /// # Arguments
    /// * `entries` - MUST be sorted by key in ascending order
    /// * `check_unique` - If true, checks for adjacent duplicate keys
    pub fn build_from_sorted(
        &mut self,
        entries: Vec<(IndexKey, DocumentId)>,
        check_unique: bool,
    ) -> Result<()> {
        if check_unique && entries.len() > 1 {
            for i in 0..entries.len() - 1 {
                if entries[i].0 == entries[i + 1].0 {
                    return Err(MongoLiteError::IndexError(format!(
                        "Duplicate key: {:?} (unique index)",
                        entries[i].0
                    )));
                }
            }
        }

        let mut map: BTreeMap<IndexKey, Vec<DocumentId>> = BTreeMap::new();
        for (key, doc_id) in &entries {
            map.entry(key.clone()).or_default().push(*doc_id);
        }

        self.metadata.num_keys = entries.len() as u64;
        self.entries = map;

        Ok(())
    }

    /// Delete a key-document pair from the index
    pub fn delete(&mut self, key: &IndexKey, doc_id: &DocumentId) -> Result<()> {
        if let Some(ids) = self.entries.get_mut(key) {
            let before = ids.len();
            ids.retain(|id| id != doc_id);
            if ids.len() < before {
                self.metadata.num_keys -= 1;
            }
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }

        Ok(())
    }

    /// Flatten the index into (key, document id) pairs, in key order.
    pub fn get_all_entries(&self) -> Vec<(IndexKey, DocumentId)> {
        self.entries
            .iter()
            .flat_map(|(key, ids)| ids.iter().map(move |id| (key.clone(), *id)))
            .collect()
    }

    /// Same as `get_all_entries`; kept for callers that hold a file handle
    /// open from loading the tree and want entries without a second borrow.
    pub fn get_all_entries_with_file(
        &self,
        _file: &mut File,
    ) -> Result<Vec<(IndexKey, DocumentId)>> {
        Ok(self.get_all_entries())
    }

    /// Apply a batch of (old_key, old_doc_id, new_key, new_doc_id) updates.
    pub fn apply_batch_updates(
        &mut self,
        updates: Vec<(IndexKey, DocumentId, IndexKey, DocumentId)>,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        for (old_key, old_doc_id, new_key, new_doc_id) in updates {
            if let Some(ids) = self.entries.get_mut(&old_key) {
                ids.retain(|id| id != &old_doc_id);
                if ids.is_empty() {
                    self.entries.remove(&old_key);
                }
            }
            self.entries.entry(new_key).or_default().push(new_doc_id);
        }

        self.metadata.num_keys = self.entries.values().map(|v| v.len() as u64).sum();

        Ok(())
    }

    /// Range scan: all document ids whose key falls within [start, end]
    /// (inclusivity controlled by the two bool flags).
    pub fn range_scan(
        &self,
        start: &IndexKey,
        end: &IndexKey,
        inclusive_start: bool,
        inclusive_end: bool,
    ) -> Vec<DocumentId> {
        use std::ops::Bound;

        let lower = if inclusive_start {
            Bound::Included(start.clone())
        } else {
            Bound::Excluded(start.clone())
        };
        let upper = if inclusive_end {
            Bound::Included(end.clone())
        } else {
            Bound::Excluded(end.clone())
        };

        self.entries
            .range((lower, upper))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Number of (key, document) entries in the index.
    pub fn size(&self) -> u64 {
        self.metadata.num_keys
    }

    // ===== FILE-BASED PERSISTENCE =====

    /// Serialize the tree's entries and append them to `file`, returning the
    /// offset the blob starts at.
    pub fn save_to_file(&mut self, file: &mut File) -> Result<u64> {
        let offset = file.seek(SeekFrom::End(0))?;

        let entries: Vec<(IndexKey, DocumentId)> = self.get_all_entries();
        let bytes = bincode::serialize(&entries)?;

        file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        file.write_all(&bytes)?;
        file.flush()?;

        self.metadata.root_offset = offset;
        Ok(offset)
    }

    /// Load a tree previously written by `save_to_file`.
    pub fn load_from_file(file: &mut File, metadata: IndexMetadata) -> Result<Self> {
        file.seek(SeekFrom::Start(metadata.root_offset))?;

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;

        let entries: Vec<(IndexKey, DocumentId)> = bincode::deserialize(&bytes).map_err(|e| {
            MongoLiteError::CorruptFormat(format!("failed to decode index entries: {}", e))
        })?;

        let mut tree = BPlusTree {
            entries: BTreeMap::new(),
            metadata,
        };
        for (key, doc_id) in entries {
            tree.entries.entry(key).or_default().push(doc_id);
        }

        Ok(tree)
    }

    /// Two-Phase Commit: Phase 1 - Prepare changes to a temporary file
    /// Creates a .tmp file with the current index state
    /// Returns the path to the temporary file
    pub fn prepare_changes(&mut self, base_path: &PathBuf) -> Result<PathBuf> {
        use std::fs::OpenOptions;

        // Create temp file path: {base_path}.tmp
        let temp_path = base_path.with_extension("idx.tmp");

        // Open/create temp file (truncate if exists)
        let mut temp_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(MongoLiteError::IoFailure)?;

        // Save current tree state to temp file
        self.save_to_file(&mut temp_file)?;

        // Ensure data is written to disk
        temp_file.sync_all().map_err(MongoLiteError::IoFailure)?;

        Ok(temp_path)
    }

    /// Two-Phase Commit: Phase 2 - Commit prepared changes atomically
    /// Performs atomic rename from temp file to final file
    /// If final_path doesn't exist yet, creates parent directories
    pub fn commit_prepared_changes(temp_path: &PathBuf, final_path: &PathBuf) -> Result<()> {
        use std::fs;

        // Ensure parent directory exists
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(MongoLiteError::IoFailure)?;
        }

        // Atomic rename: temp → final
        fs::rename(temp_path, final_path).map_err(MongoLiteError::IoFailure)?;

        Ok(())
    }

    /// Rollback prepared changes by deleting the temp file
    pub fn rollback_prepared_changes(temp_path: &PathBuf) -> Result<()> {
        use std::fs;

        if temp_path.exists() {
            fs::remove_file(temp_path).map_err(MongoLiteError::IoFailure)?;
        }

        Ok(())
    }
}

/// Index Manager - manages all secondary indexes for a collection
pub struct IndexManager {
    btree_indexes: HashMap<String, BPlusTree>,
    /// File paths for persistent indexes (for two-phase commit)
    index_file_paths: HashMap<String, PathBuf>,
}

impl IndexManager {
    pub fn new() -> Self {
        IndexManager {
            btree_indexes: HashMap::new(),
            index_file_paths: HashMap::new(),
        }
    }

    /// Set file path for an index (required for two-phase commit)
    pub fn set_index_path(&mut self, index_name: &str, path: PathBuf) {
        self.index_file_paths.insert(index_name.to_string(), path);
    }

    /// Get file path for an index
    pub fn get_index_path(&self, index_name: &str) -> Option<&PathBuf> {
        self.index_file_paths.get(index_name)
    }

    /// Create an index over a single field
    pub fn create_btree_index(&mut self, name: String, field: String, unique: bool) -> Result<()> {
        if self.btree_indexes.contains_key(&name) {
            return Err(MongoLiteError::IndexError(format!(
                "Index already exists: {}",
                name
            )));
        }

        let tree = BPlusTree::new(name.clone(), field, unique);
        self.btree_indexes.insert(name, tree);
        Ok(())
    }

    /// Drop index by name
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        if self.btree_indexes.remove(name).is_none() {
            return Err(MongoLiteError::IndexError(format!(
                "Index not found: {}",
                name
            )));
        }
        // Also remove file path if it exists
        self.index_file_paths.remove(name);
        Ok(())
    }

    /// Get index
    pub fn get_btree_index(&self, name: &str) -> Option<&BPlusTree> {
        self.btree_indexes.get(name)
    }

    /// Get index (mutable)
    pub fn get_btree_index_mut(&mut self, name: &str) -> Option<&mut BPlusTree> {
        self.btree_indexes.get_mut(name)
    }

    /// Add a pre-loaded BPlusTree index (from .idx file)
    pub fn add_loaded_index(&mut self, tree: BPlusTree) {
        let name = tree.metadata.name.clone();
        self.btree_indexes.insert(name, tree);
    }

    /// List all index names
    pub fn list_indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.btree_indexes.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_key_ordering() {
        assert!(IndexKey::Null < IndexKey::Bool(false));
        assert!(IndexKey::Bool(false) < IndexKey::Bool(true));
        assert!(IndexKey::Bool(true) < IndexKey::Int(0));
        assert!(IndexKey::Int(5) < IndexKey::Int(10));
        assert!(IndexKey::Int(10) < IndexKey::Float(OrderedFloat(10.5)));
        // Numbers compare by value regardless of Int/Float representation.
        assert!(IndexKey::Float(OrderedFloat(5.5)) < IndexKey::Int(10));
        assert!(IndexKey::Float(OrderedFloat(20.0)) > IndexKey::Int(10));
        assert!(IndexKey::Int(10) < IndexKey::String("a".to_string()));
        assert!(IndexKey::String("a".to_string()) < IndexKey::String("b".to_string()));
    }

    #[test]
    fn test_btree_insert_search() {
        let mut tree = BPlusTree::new("test_idx".to_string(), "age".to_string(), false);

        tree.insert(IndexKey::Int(25), DocumentId(1)).unwrap();
        tree.insert(IndexKey::Int(30), DocumentId(2)).unwrap();
        tree.insert(IndexKey::Int(20), DocumentId(3)).unwrap();

        assert_eq!(tree.search(&IndexKey::Int(25)), Some(DocumentId(1)));
        assert_eq!(tree.search(&IndexKey::Int(30)), Some(DocumentId(2)));
        assert_eq!(tree.search(&IndexKey::Int(20)), Some(DocumentId(3)));
        assert_eq!(tree.search(&IndexKey::Int(99)), None);
    }

    #[test]
    fn test_btree_unique_constraint() {
        let mut tree = BPlusTree::new("email_idx".to_string(), "email".to_string(), true);

        tree.insert(
            IndexKey::String("test@example.com".to_string()),
            DocumentId(1),
        )
        .unwrap();

        let result = tree.insert(
            IndexKey::String("test@example.com".to_string()),
            DocumentId(2),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_btree_delete() {
        let mut tree = BPlusTree::new("age_idx".to_string(), "age".to_string(), false);

        tree.insert(IndexKey::Int(25), DocumentId(1)).unwrap();
        tree.insert(IndexKey::Int(25), DocumentId(2)).unwrap();
        assert_eq!(tree.size(), 2);

        tree.delete(&IndexKey::Int(25), &DocumentId(1)).unwrap();
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.search(&IndexKey::Int(25)), Some(DocumentId(2)));
    }

    #[test]
    fn test_btree_range_scan() {
        let mut tree = BPlusTree::new("age_idx".to_string(), "age".to_string(), false);

        for i in 0..100 {
            tree.insert(IndexKey::Int(i), DocumentId(i)).unwrap();
        }

        let results = tree.range_scan(
            &IndexKey::Int(10),
            &IndexKey::Int(20),
            true,  // inclusive start
            false, // exclusive end
        );

        assert_eq!(results.len(), 10); // 10..19
    }

    #[test]
    fn test_build_from_sorted_rejects_duplicates_when_unique() {
        let mut tree = BPlusTree::new("email_idx".to_string(), "email".to_string(), true);
        let entries = vec![
            (IndexKey::Int(1), DocumentId(1)),
            (IndexKey::Int(1), DocumentId(2)),
        ];

        assert!(tree.build_from_sorted(entries, true).is_err());
    }

    #[test]
    fn test_apply_batch_updates() {
        let mut tree = BPlusTree::new("age_idx".to_string(), "age".to_string(), false);
        tree.insert(IndexKey::Int(25), DocumentId(1)).unwrap();

        tree.apply_batch_updates(vec![(
            IndexKey::Int(25),
            DocumentId(1),
            IndexKey::Int(30),
            DocumentId(1),
        )])
        .unwrap();

        assert_eq!(tree.search(&IndexKey::Int(25)), None);
        assert_eq!(tree.search(&IndexKey::Int(30)), Some(DocumentId(1)));
    }

    #[test]
    fn test_tree_persistence() {
        use std::fs::OpenOptions;

        let temp_path = "test_tree_persist.tmp";

        // Create and populate tree
        let mut tree = BPlusTree::new("test_idx".to_string(), "age".to_string(), false);

        for i in 0..10 {
            tree.insert(IndexKey::Int(i * 10), DocumentId(i)).unwrap();
        }

        // Save tree to file
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .unwrap();

        let root_offset = tree.save_to_file(&mut file).unwrap();
        assert_eq!(tree.metadata.root_offset, root_offset);

        // Load tree from file
        let metadata_clone = tree.metadata.clone();
        let loaded_tree = BPlusTree::load_from_file(&mut file, metadata_clone).unwrap();

        // Verify search still works
        assert_eq!(loaded_tree.search(&IndexKey::Int(0)), Some(DocumentId(0)));
        assert_eq!(loaded_tree.search(&IndexKey::Int(50)), Some(DocumentId(5)));
        assert_eq!(loaded_tree.search(&IndexKey::Int(90)), Some(DocumentId(9)));
        assert_eq!(loaded_tree.search(&IndexKey::Int(99)), None);

        // Cleanup
        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_index_manager_lifecycle() {
        let mut manager = IndexManager::new();

        manager
            .create_btree_index("age_idx".to_string(), "age".to_string(), false)
            .unwrap();

        assert_eq!(manager.list_indexes(), vec!["age_idx".to_string()]);
        assert!(manager.get_btree_index("age_idx").is_some());

        let duplicate = manager.create_btree_index("age_idx".to_string(), "age".to_string(), false);
        assert!(duplicate.is_err());

        manager.drop_index("age_idx").unwrap();
        assert!(manager.get_btree_index("age_idx").is_none());
        assert!(manager.drop_index("age_idx").is_err());
    }
}
