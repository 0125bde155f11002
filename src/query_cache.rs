// ironbase-core/src/query_cache.rs
// Query result caching with LRU eviction policy

use crate::document::DocumentId;
use lru::LruCache;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

/// Hash of a query (collection + query JSON)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHash(u64);

impl QueryHash {
    /// Create a hash from collection name and query JSON
    pub fn new(collection: &str, query: &Value) -> Self {
        let mut hasher = DefaultHasher::new();
        collection.hash(&mut hasher);

        // Hash the query JSON in a deterministic way
        // serde_json guarantees stable serialization
        let query_str = serde_json::to_string(query).unwrap_or_default();
        query_str.hash(&mut hasher);

        QueryHash(hasher.finish())
    }
}

/// Query cache with LRU eviction and collection-level invalidation
///
/// Caches query results (DocumentIds) to avoid repeated scans.
/// Thread-safe with RwLock for concurrent access.
///
/// Uses a reverse index (collection → query hashes) to enable
/// selective invalidation: only queries for the modified collection
/// are invalidated, not the entire cache.
pub struct QueryCache {
    cache: RwLock<LruCache<QueryHash, Vec<DocumentId>>>,
    /// Reverse index: collection name → set of query hashes for that collection
    collection_index: RwLock<HashMap<String, HashSet<QueryHash>>>,
    capacity: usize,
}

impl QueryCache {
    /// Create a new query cache with specified capacity
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of cached queries (recommended: 1000)
    pub fn new(capacity: usize) -> Self {
        let non_zero_capacity =
            NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1000).unwrap());
        QueryCache {
            cache: RwLock::new(LruCache::new(non_zero_capacity)),
            collection_index: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Get cached result for a query (returns None if not cached)
    ///
    /// Uses peek() to avoid updating LRU order on read
    pub fn get(&self, query_hash: &QueryHash) -> Option<Vec<DocumentId>> {
        let cache = self.cache.read();
        cache.peek(query_hash).cloned()
    }

    /// Insert query result into cache
    ///
    /// # Arguments
    /// * `collection` - The collection name this query belongs to
    /// * `query_hash` - The hash of the query
    /// * `doc_ids` - The document IDs returned by the query
    ///
    /// Automatically evicts LRU entry if cache is full and maintains
    /// the reverse index for collection-level invalidation.
    pub fn insert(&self, collection: &str, query_hash: QueryHash, doc_ids: Vec<DocumentId>) {
        let mut cache = self.cache.write();

        // Handle LRU eviction: if at capacity and inserting new key, clean up reverse index
        if cache.len() >= self.capacity && !cache.contains(&query_hash) {
            if let Some((evicted_hash, _)) = cache.peek_lru() {
                let evicted_hash = *evicted_hash;
                // Remove from all collection indexes (we don't track which collection it belonged to)
                // This is O(collections * entries_per_collection) but happens rarely
                drop(cache); // Release cache lock before acquiring collection_index lock
                let mut coll_index = self.collection_index.write();
                for hashes in coll_index.values_mut() {
                    hashes.remove(&evicted_hash);
                }
                drop(coll_index);
                cache = self.cache.write(); // Re-acquire cache lock
            }
        }

        cache.put(query_hash, doc_ids);
        drop(cache);

        // Update reverse index
        let mut coll_index = self.collection_index.write();
        coll_index
            .entry(collection.to_string())
            .or_default()
            .insert(query_hash);
    }

    /// Invalidate all cached queries for a specific collection
    ///
    /// Called on insert/update/delete operations to maintain consistency.
    /// Only invalidates queries belonging to the specified collection,
    /// leaving other collections' cached queries intact.
    pub fn invalidate_collection(&self, collection: &str) {
        // Get query hashes for this collection
        let mut coll_index = self.collection_index.write();
        let hashes_to_remove = coll_index.remove(collection);
        drop(coll_index);

        // Remove from LRU cache
        if let Some(hashes) = hashes_to_remove {
            let mut cache = self.cache.write();
            for hash in hashes {
                cache.pop(&hash);
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.read();
        CacheStats {
            capacity: self.capacity,
            size: cache.len(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
}
