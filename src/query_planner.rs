// src/query_planner.rs
// Picks an index-backed execution strategy for a parsed query, or falls
// back to a full collection scan.
//
// The planner only looks at the top level of a query document: compound
// `$and`/`$or` queries and nested paths always fall back to a collection
// scan, since `collect_doc_ids_from_plan` can only narrow by a single
// indexed field and then re-checks every candidate against the full
// matcher anyway.

use serde_json::Value;

use crate::index::IndexKey;

/// An execution strategy for a single-field query, chosen by `QueryPlanner`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Equality lookup against a B+Tree index: `range_scan(key, key, true, true)`.
    IndexScan {
        index_name: String,
        field: String,
        key: IndexKey,
    },
    /// Range lookup against a B+Tree index. `start`/`end` of `None` mean
    /// unbounded on that side.
    IndexRangeScan {
        index_name: String,
        field: String,
        start: Option<IndexKey>,
        end: Option<IndexKey>,
        inclusive_start: bool,
        inclusive_end: bool,
    },
    /// No usable index; scan every document in the collection.
    CollectionScan,
}

pub struct QueryPlanner;

impl QueryPlanner {
    /// Pick the best plan for `query_json` given the index names currently
    /// defined on the collection. Returns `None` (meaning: fall back to a
    /// collection scan) when no top-level field has a matching index, or
    /// the query shape isn't a simple field/operator match.
    pub fn analyze_query(query_json: &Value, available_indexes: &[String]) -> Option<(String, QueryPlan)> {
        let map = query_json.as_object()?;

        // Queries combining multiple top-level fields, or using $and/$or,
        // can't be narrowed to a single index scan without risking missed
        // matches, so they always fall back to a collection scan.
        let mut candidate_field = None;
        for key in map.keys() {
            if key.starts_with('$') {
                return None;
            }
            if candidate_field.is_some() {
                return None;
            }
            candidate_field = Some(key.as_str());
        }
        let field = candidate_field?;

        let index_name = available_indexes
            .iter()
            .find(|idx| Self::index_covers_field(idx, field))?;

        let value = map.get(field)?;
        let plan = Self::plan_for_field(index_name, field, value)?;

        Some((index_name.clone(), plan))
    }

    /// Produce a human-readable explain document describing the plan that
    /// `analyze_query` would choose, without executing the query.
    pub fn explain_query(query_json: &Value, available_indexes: &[String]) -> Value {
        match Self::analyze_query(query_json, available_indexes) {
            Some((index_name, plan)) => serde_json::json!({
                "query": query_json,
                "index_used": index_name,
                "plan": Self::describe_plan(&plan),
            }),
            None => serde_json::json!({
                "query": query_json,
                "index_used": Value::Null,
                "plan": "CollectionScan",
            }),
        }
    }

    fn index_covers_field(index_name: &str, field: &str) -> bool {
        index_name == field
            || index_name
                .strip_suffix(field)
                .map(|prefix| prefix.ends_with('_'))
                .unwrap_or(false)
    }

    fn plan_for_field(index_name: &str, field: &str, value: &Value) -> Option<QueryPlan> {
        if let Value::Object(ops) = value {
            let has_gt = ops.contains_key("$gt");
            let has_gte = ops.contains_key("$gte");
            let has_lt = ops.contains_key("$lt");
            let has_lte = ops.contains_key("$lte");

            if has_gt || has_gte || has_lt || has_lte {
                let start = if has_gte {
                    ops.get("$gte").map(IndexKey::from)
                } else if has_gt {
                    ops.get("$gt").map(IndexKey::from)
                } else {
                    None
                };

                let end = if has_lte {
                    ops.get("$lte").map(IndexKey::from)
                } else if has_lt {
                    ops.get("$lt").map(IndexKey::from)
                } else {
                    None
                };

                return Some(QueryPlan::IndexRangeScan {
                    index_name: index_name.to_string(),
                    field: field.to_string(),
                    start,
                    end,
                    inclusive_start: has_gte || (!has_gt && !has_gte),
                    inclusive_end: has_lte || (!has_lt && !has_lte),
                });
            }

            // An object value with no recognized range operator (e.g. `$in`,
            // `$ne`, or a literal nested-document match) isn't something a
            // single-key B+Tree scan can serve.
            if !ops.is_empty() {
                return None;
            }
        }

        Some(QueryPlan::IndexScan {
            index_name: index_name.to_string(),
            field: field.to_string(),
            key: IndexKey::from(value),
        })
    }

    fn describe_plan(plan: &QueryPlan) -> Value {
        match plan {
            QueryPlan::IndexScan { index_name, field, .. } => serde_json::json!({
                "type": "IndexScan",
                "index": index_name,
                "field": field,
            }),
            QueryPlan::IndexRangeScan { index_name, field, inclusive_start, inclusive_end, .. } => serde_json::json!({
                "type": "IndexRangeScan",
                "index": index_name,
                "field": field,
                "inclusive_start": inclusive_start,
                "inclusive_end": inclusive_end,
            }),
            QueryPlan::CollectionScan => serde_json::json!({ "type": "CollectionScan" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_uses_index() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"age": 30});

        let (index_name, plan) = QueryPlanner::analyze_query(&query, &indexes).unwrap();
        assert_eq!(index_name, "users_age");
        assert!(matches!(plan, QueryPlan::IndexScan { .. }));
    }

    #[test]
    fn test_range_uses_index_range_scan() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"age": {"$gte": 18, "$lt": 65}});

        let (_, plan) = QueryPlanner::analyze_query(&query, &indexes).unwrap();
        match plan {
            QueryPlan::IndexRangeScan { inclusive_start, inclusive_end, .. } => {
                assert!(inclusive_start);
                assert!(!inclusive_end);
            }
            _ => panic!("expected IndexRangeScan"),
        }
    }

    #[test]
    fn test_no_matching_index_falls_back() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"name": "Alice"});

        assert!(QueryPlanner::analyze_query(&query, &indexes).is_none());
    }

    #[test]
    fn test_multi_field_query_falls_back() {
        let indexes = vec!["users_age".to_string(), "users_name".to_string()];
        let query = json!({"age": 30, "name": "Alice"});

        assert!(QueryPlanner::analyze_query(&query, &indexes).is_none());
    }

    #[test]
    fn test_logical_operator_falls_back() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"$or": [{"age": 30}, {"age": 40}]});

        assert!(QueryPlanner::analyze_query(&query, &indexes).is_none());
    }

    #[test]
    fn test_unsupported_operator_falls_back() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"age": {"$in": [1, 2, 3]}});

        assert!(QueryPlanner::analyze_query(&query, &indexes).is_none());
    }

    #[test]
    fn test_explain_query_reports_plan() {
        let indexes = vec!["users_age".to_string()];
        let query = json!({"age": 30});

        let explain = QueryPlanner::explain_query(&query, &indexes);
        assert_eq!(explain["index_used"], "users_age");
        assert_eq!(explain["plan"]["type"], "IndexScan");
    }

    #[test]
    fn test_explain_query_collection_scan() {
        let indexes: Vec<String> = vec![];
        let query = json!({"name": "Alice"});

        let explain = QueryPlanner::explain_query(&query, &indexes);
        assert_eq!(explain["index_used"], Value::Null);
        assert_eq!(explain["plan"], "CollectionScan");
    }
}
