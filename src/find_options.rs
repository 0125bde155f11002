// ironbase-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use crate::value_utils::compare_values_with_none;
use serde_json::Value;
use std::collections::HashMap;

/// Options for find queries
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude)
    /// Special case: _id can be excluded in include mode
    pub projection: Option<HashMap<String, i32>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    pub sort: Option<Vec<(String, i32)>>,

    /// Limit: maximum number of documents to return
    pub limit: Option<usize>,

    /// Skip: number of documents to skip (for pagination)
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: HashMap<String, i32>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Vec<(String, i32)>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Apply projection to a document. Field names are matched at the top level only.
pub fn apply_projection(doc: &Value, projection: &HashMap<String, i32>) -> Value {
    if projection.is_empty() {
        return doc.clone();
    }

    // Detect mode
    let has_inclusions = projection.values().any(|&v| v == 1);
    let has_non_id_exclusions = projection
        .iter()
        .any(|(field, &action)| action == 0 && field != "_id");

    let include_mode = has_inclusions && !has_non_id_exclusions;

    if let Value::Object(obj) = doc {
        let mut result = serde_json::Map::new();

        if include_mode {
            // Include specified fields
            for (field, &action) in projection {
                if action == 1 {
                    if let Some(value) = obj.get(field) {
                        result.insert(field.clone(), value.clone());
                    }
                }
            }

            // Include _id unless explicitly excluded
            if projection.get("_id") != Some(&0) {
                if let Some(id) = obj.get("_id") {
                    result.insert("_id".to_string(), id.clone());
                }
            }
        } else {
            // Exclude mode: copy all except excluded
            for (key, value) in obj {
                if projection.get(key) != Some(&0) {
                    result.insert(key.clone(), value.clone());
                }
            }
        }

        Value::Object(result)
    } else {
        doc.clone()
    }
}

/// Apply sort to documents. Field names are matched at the top level only.
pub fn apply_sort(docs: &mut [Value], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let val_a = a.get(field);
            let val_b = b.get(field);

            let cmp = compare_values_with_none(val_a, val_b);

            if cmp != std::cmp::Ordering::Equal {
                return if *direction == 1 { cmp } else { cmp.reverse() };
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Apply limit and skip to documents
pub fn apply_limit_skip(docs: Vec<Value>, limit: Option<usize>, skip: Option<usize>) -> Vec<Value> {
    let skip_count = skip.unwrap_or(0);

    if skip_count >= docs.len() {
        return Vec::new();
    }

    let start = skip_count;
    let end = if let Some(limit_count) = limit {
        (start + limit_count).min(docs.len())
    } else {
        docs.len()
    };

    docs[start..end].to_vec()
}
