// src/query/operators.rs
//! Query operator trait definitions and implementations
//!
//! This module implements the Strategy pattern for MongoDB query operators.
//! Each operator is implemented as a separate type that implements the `OperatorMatcher` trait.
//!
//! # Architecture
//!
//! ```text
//! OperatorMatcher trait
//!     ↓
//! ┌────────────────┬────────────────┐
//! │ Comparison     │ Logical        │
//! │ ($eq, $gt...)  │ ($and, $or...) │
//! └────────────────┴────────────────┘
//! ```
//!
//! # Benefits
//!
//! - **Extensibility**: Add new operators without modifying existing code
//! - **Testability**: Each operator can be tested independently
//! - **Type Safety**: Compile-time guarantees for operator implementations

use crate::document::Document;
use crate::error::{MongoLiteError, Result};
use crate::value_utils::compare_values;
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// TRAIT DEFINITION
// ============================================================================

/// Trait for all query operators
///
/// Each MongoDB query operator ($eq, $gt, $and, etc.) implements this trait.
/// The trait provides a uniform interface for matching documents against filter criteria.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use ironbase_core::query::operators::EqOperator;
/// use ironbase_core::query::operators::OperatorMatcher;
///
/// let eq_op = EqOperator;
/// let matches = eq_op.matches(Some(&json!("Alice")), &json!("Alice"), None).unwrap();
/// assert!(matches);
/// ```
pub trait OperatorMatcher: Send + Sync {
    /// Returns the operator name (e.g., "$eq", "$gt", "$and")
    fn name(&self) -> &'static str;

    /// Checks if a document value matches the filter criteria
    ///
    /// # Arguments
    ///
    /// - `doc_value`: The value from the document field (None if field doesn't exist)
    /// - `filter_value`: The expected value from the query filter
    /// - `document`: Optional reference to the full document (for logical operators that recurse)
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the document matches
    /// - `Ok(false)` if the document doesn't match
    /// - `Err(...)` if there's a validation error (e.g., wrong type for operator)
    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// $eq operator: Matches values that are equal to a specified value
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $eq: value } }
/// // Shorthand: { field: value }
/// ```
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        match doc_value {
            None => Ok(false),
            Some(v) => {
                // Direct equality check
                if v == filter_value {
                    return Ok(true);
                }
                // MongoDB array element matching: if doc_value is an array,
                // check if any element equals filter_value
                if let Value::Array(arr) = v {
                    Ok(arr.iter().any(|elem| elem == filter_value))
                } else {
                    Ok(false)
                }
            }
        }
    }
}

/// $ne operator: Matches values that are not equal to a specified value
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $ne: value } }
/// ```
///
/// **Note**: Returns true if field doesn't exist
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        match doc_value {
            None => Ok(true), // Field doesn't exist - not equal
            Some(v) => {
                // Direct inequality check
                if v == filter_value {
                    return Ok(false);
                }
                // MongoDB array element matching: if doc_value is an array,
                // return false if ANY element equals filter_value
                if let Value::Array(arr) = v {
                    Ok(!arr.iter().any(|elem| elem == filter_value))
                } else {
                    Ok(true)
                }
            }
        }
    }
}

/// $gt operator: Matches values that are greater than a specified value
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $gt: value } }
/// ```
pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| {
            ord == std::cmp::Ordering::Greater
        })
    }
}

/// $gte operator: Matches values that are greater than or equal to a specified value
pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| {
            matches!(ord, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        })
    }
}

/// $lt operator: Matches values that are less than a specified value
pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| {
            ord == std::cmp::Ordering::Less
        })
    }
}

/// $lte operator: Matches values that are less than or equal to a specified value
pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| {
            matches!(ord, std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        })
    }
}

// ============================================================================
// ARRAY OPERATORS
// ============================================================================

/// $in operator: Matches any of the values specified in an array
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $in: [value1, value2, ...] } }
/// ```
pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        match doc_value {
            None => Ok(false),
            Some(v) => {
                if let Value::Array(filter_arr) = filter_value {
                    // Direct check: is doc_value in the filter array?
                    if filter_arr.contains(v) {
                        return Ok(true);
                    }
                    // MongoDB array element matching: if doc_value is an array,
                    // check if ANY element of doc_value matches ANY value in filter_arr
                    if let Value::Array(doc_arr) = v {
                        Ok(doc_arr.iter().any(|elem| filter_arr.contains(elem)))
                    } else {
                        Ok(false)
                    }
                } else {
                    Err(MongoLiteError::InvalidQuery(
                        "$in operator requires an array".to_string(),
                    ))
                }
            }
        }
    }
}

/// $nin operator: Matches none of the values specified in an array
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $nin: [value1, value2, ...] } }
/// ```
///
/// **Note**: Returns true if field doesn't exist
pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        if let Value::Array(filter_arr) = filter_value {
            match doc_value {
                None => Ok(true), // Field doesn't exist - not in
                Some(v) => {
                    // Direct check: is doc_value in the filter array?
                    if filter_arr.contains(v) {
                        return Ok(false);
                    }
                    // MongoDB array element matching: if doc_value is an array,
                    // return false if ANY element of doc_value matches ANY value in filter_arr
                    if let Value::Array(doc_arr) = v {
                        Ok(!doc_arr.iter().any(|elem| filter_arr.contains(elem)))
                    } else {
                        Ok(true)
                    }
                }
            }
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$nin operator requires an array".to_string(),
            ))
        }
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

/// $exists operator: Matches documents that have the specified field
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $exists: true } }  // field must exist
/// { field: { $exists: false } } // field must NOT exist
/// ```
pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        if let Value::Bool(should_exist) = filter_value {
            Ok(doc_value.is_some() == *should_exist)
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$exists operator requires a boolean".to_string(),
            ))
        }
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

/// $and operator: Joins query clauses with a logical AND
///
/// # MongoDB Spec
///
/// ```json
/// { $and: [ { condition1 }, { condition2 }, ... ] }
/// ```
pub struct AndOperator;

impl OperatorMatcher for AndOperator {
    fn name(&self) -> &'static str {
        "$and"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        let doc = document.ok_or_else(|| {
            MongoLiteError::InvalidQuery("$and operator requires document context".to_string())
        })?;

        if let Value::Array(conditions) = filter_value {
            for condition in conditions {
                // Recursively evaluate each condition
                if !matches_filter(doc, condition)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$and operator requires an array".to_string(),
            ))
        }
    }
}

/// $or operator: Joins query clauses with a logical OR
///
/// # MongoDB Spec
///
/// ```json
/// { $or: [ { condition1 }, { condition2 }, ... ] }
/// ```
pub struct OrOperator;

impl OperatorMatcher for OrOperator {
    fn name(&self) -> &'static str {
        "$or"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        let doc = document.ok_or_else(|| {
            MongoLiteError::InvalidQuery("$or operator requires document context".to_string())
        })?;

        if let Value::Array(conditions) = filter_value {
            for condition in conditions {
                // If any condition matches, return true
                if matches_filter(doc, condition)? {
                    return Ok(true);
                }
            }
            Ok(false)
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$or operator requires an array".to_string(),
            ))
        }
    }
}

/// $nor operator: Joins query clauses with a logical NOR
///
/// # MongoDB Spec
///
/// ```json
/// { $nor: [ { condition1 }, { condition2 }, ... ] }
/// ```
///
/// Returns true only if ALL conditions are false
pub struct NorOperator;

impl OperatorMatcher for NorOperator {
    fn name(&self) -> &'static str {
        "$nor"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        let doc = document.ok_or_else(|| {
            MongoLiteError::InvalidQuery("$nor operator requires document context".to_string())
        })?;

        if let Value::Array(conditions) = filter_value {
            for condition in conditions {
                // If any condition matches, return false
                if matches_filter(doc, condition)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$nor operator requires an array".to_string(),
            ))
        }
    }
}

/// $not operator: Inverts the effect of a query expression
///
/// # MongoDB Spec
///
/// ```json
/// { field: { $not: { $gt: 5 } } }
/// ```
pub struct NotOperator;

impl OperatorMatcher for NotOperator {
    fn name(&self) -> &'static str {
        "$not"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        // $not wraps another operator object like { $not: { $gt: 5 } }
        // We need to evaluate the inner operator and negate the result
        if document.is_some() {
            let result = matches_filter_value(doc_value, filter_value, document)?;
            Ok(!result)
        } else {
            Err(MongoLiteError::InvalidQuery(
                "$not operator requires document context".to_string(),
            ))
        }
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Global registry of all query operators
    ///
    /// This registry allows dynamic dispatch to the appropriate operator implementation
    /// based on the operator name string (e.g., "$eq", "$gt").
    ///
    /// # Thread Safety
    ///
    /// The registry is initialized once at program startup and is immutable thereafter.
    /// All operator implementations are required to be `Send + Sync`.
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let mut registry: HashMap<&'static str, Box<dyn OperatorMatcher>> = HashMap::new();

        // Comparison operators
        registry.insert("$eq", Box::new(EqOperator));
        registry.insert("$ne", Box::new(NeOperator));
        registry.insert("$gt", Box::new(GtOperator));
        registry.insert("$gte", Box::new(GteOperator));
        registry.insert("$lt", Box::new(LtOperator));
        registry.insert("$lte", Box::new(LteOperator));

        // Array operators
        registry.insert("$in", Box::new(InOperator));
        registry.insert("$nin", Box::new(NinOperator));

        // Element operators
        registry.insert("$exists", Box::new(ExistsOperator));

        // Logical operators
        registry.insert("$and", Box::new(AndOperator));
        registry.insert("$or", Box::new(OrOperator));
        registry.insert("$nor", Box::new(NorOperator));
        registry.insert("$not", Box::new(NotOperator));

        registry
    };
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Generic comparison helper for $gt, $gte, $lt, $lte operators
///
/// Handles both direct comparison and MongoDB array element matching.
/// The predicate function determines which orderings are considered a match.
fn compare_with_predicate<F>(
    doc_value: Option<&Value>,
    filter_value: &Value,
    predicate: F,
) -> Result<bool>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    match doc_value {
        None => Ok(false),
        Some(v) => {
            // Direct comparison
            if predicate(compare_values(v, filter_value)) {
                return Ok(true);
            }
            // MongoDB array element matching
            if let Value::Array(arr) = v {
                Ok(arr
                    .iter()
                    .any(|elem| predicate(compare_values(elem, filter_value))))
            } else {
                Ok(false)
            }
        }
    }
}

/// Matches a single filter value against a document value
///
/// This is used by $not and other operators that need to recursively evaluate conditions
fn matches_filter_value(
    doc_value: Option<&Value>,
    filter_value: &Value,
    document: Option<&Document>,
) -> Result<bool> {
    // If filter is an object with operators, evaluate them
    if let Value::Object(filter_obj) = filter_value {
        for (op_name, op_value) in filter_obj {
            if op_name.starts_with('$') {
                // Look up operator in registry
                if let Some(operator) = OPERATOR_REGISTRY.get(op_name.as_str()) {
                    if !operator.matches(doc_value, op_value, document)? {
                        return Ok(false);
                    }
                } else {
                    return Err(MongoLiteError::InvalidQuery(format!(
                        "Unknown operator: {}",
                        op_name
                    )));
                }
            } else {
                // Field-level condition (shouldn't happen in this context)
                return Err(MongoLiteError::InvalidQuery(
                    "Unexpected field in filter value".to_string(),
                ));
            }
        }
        Ok(true)
    } else {
        // Direct value comparison (implicit $eq)
        Ok(doc_value == Some(filter_value))
    }
}

/// Main entry point for filter matching
///
/// # Arguments
///
/// - `document`: The document to match against
/// - `filter`: The query filter (MongoDB JSON format)
///
/// # Returns
///
/// - `Ok(true)` if document matches filter
/// - `Ok(false)` if document doesn't match
/// - `Err(...)` if filter is malformed
pub fn matches_filter(document: &Document, filter: &Value) -> Result<bool> {
    // Empty filter matches all documents
    if filter.as_object().map(|o| o.is_empty()).unwrap_or(false) {
        return Ok(true);
    }

    let filter_obj = filter
        .as_object()
        .ok_or_else(|| MongoLiteError::InvalidQuery("Filter must be an object".to_string()))?;

    for (key, value) in filter_obj {
        if key.starts_with('$') {
            // Top-level logical operator
            if let Some(operator) = OPERATOR_REGISTRY.get(key.as_str()) {
                if !operator.matches(None, value, Some(document))? {
                    return Ok(false);
                }
            } else {
                return Err(MongoLiteError::InvalidQuery(format!(
                    "Unknown operator: {}",
                    key
                )));
            }
        } else {
            // Field-level condition
            let doc_value = document.get(key);

            if let Value::Object(condition_obj) = value {
                // Field has operators like { age: { $gt: 18 } }
                for (op_name, op_value) in condition_obj {
                    if op_name.starts_with('$') {
                        if let Some(operator) = OPERATOR_REGISTRY.get(op_name.as_str()) {
                            if !operator.matches(doc_value, op_value, Some(document))? {
                                return Ok(false);
                            }
                        } else {
                            return Err(MongoLiteError::InvalidQuery(format!(
                                "Unknown operator: {}",
                                op_name
                            )));
                        }
                    }
                }
            } else {
                // Direct equality check like { name: "Alice" }
                // Use EqOperator for array element matching support
                if !EqOperator.matches(doc_value, value, Some(document))? {
                    return Ok(false);
                }
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn create_test_document(id: i64, fields: Vec<(&str, Value)>) -> Document {
        let mut field_map = StdHashMap::new();
        for (k, v) in fields {
            field_map.insert(k.to_string(), v);
        }
        Document::new(DocumentId(id), field_map)
    }

    // ========== Additional comparison operator tests ==========

    #[test]
    fn test_gte_operator() {
        let op = GteOperator;
        assert!(op.matches(Some(&json!(10)), &json!(5), None).unwrap());
        assert!(op.matches(Some(&json!(5)), &json!(5), None).unwrap()); // Equal
        assert!(!op.matches(Some(&json!(3)), &json!(5), None).unwrap());
        assert!(!op.matches(None, &json!(5), None).unwrap()); // Missing field
    }

    #[test]
    fn test_lt_operator() {
        let op = LtOperator;
        assert!(op.matches(Some(&json!(3)), &json!(5), None).unwrap());
        assert!(!op.matches(Some(&json!(5)), &json!(5), None).unwrap()); // Equal
        assert!(!op.matches(Some(&json!(10)), &json!(5), None).unwrap());
        assert!(!op.matches(None, &json!(5), None).unwrap()); // Missing field
    }

    #[test]
    fn test_lte_operator() {
        let op = LteOperator;
        assert!(op.matches(Some(&json!(3)), &json!(5), None).unwrap());
        assert!(op.matches(Some(&json!(5)), &json!(5), None).unwrap()); // Equal
        assert!(!op.matches(Some(&json!(10)), &json!(5), None).unwrap());
        assert!(!op.matches(None, &json!(5), None).unwrap()); // Missing field
    }

    #[test]
    fn test_gt_missing_field() {
        let op = GtOperator;
        assert!(!op.matches(None, &json!(5), None).unwrap());
    }

    #[test]
    fn test_comparison_strings() {
        let op = GtOperator;
        assert!(op.matches(Some(&json!("b")), &json!("a"), None).unwrap());
        assert!(!op.matches(Some(&json!("a")), &json!("b"), None).unwrap());
    }

    #[test]
    fn test_comparison_booleans() {
        let op = GtOperator;
        assert!(op.matches(Some(&json!(true)), &json!(false), None).unwrap());
        assert!(!op.matches(Some(&json!(false)), &json!(true), None).unwrap());
    }

    #[test]
    fn test_comparison_incompatible_types() {
        let op = GtOperator;
        // A string is always greater than any number under the canonical tier order.
        assert!(op.matches(Some(&json!("10")), &json!(5), None).unwrap());
        assert!(!op.matches(Some(&json!(5)), &json!("10"), None).unwrap());
    }

    // ========== Array operator tests ==========

    #[test]
    fn test_nin_operator() {
        let op = NinOperator;
        let array = json!(["NYC", "LA", "SF"]);
        assert!(op.matches(Some(&json!("Chicago")), &array, None).unwrap());
        assert!(!op.matches(Some(&json!("NYC")), &array, None).unwrap());
        assert!(op.matches(None, &array, None).unwrap()); // Missing field returns true
    }

    #[test]
    fn test_in_missing_field() {
        let op = InOperator;
        let array = json!(["NYC", "LA"]);
        assert!(!op.matches(None, &array, None).unwrap());
    }

    #[test]
    fn test_in_not_array_error() {
        let op = InOperator;
        let result = op.matches(Some(&json!("NYC")), &json!("not an array"), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires an array"));
    }

    #[test]
    fn test_nin_not_array_error() {
        let op = NinOperator;
        let result = op.matches(Some(&json!("NYC")), &json!("not an array"), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires an array"));
    }

    // ========== Element operator tests ==========

    #[test]
    fn test_exists_not_boolean_error() {
        let op = ExistsOperator;
        let result = op.matches(Some(&json!("value")), &json!("not a boolean"), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires a boolean"));
    }

    // ========== Logical operator tests ==========

    #[test]
    fn test_nor_operator() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        // age is not < 18 AND age is not > 65, so $nor should return true
        let filter = json!([{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]);
        let op = NorOperator;
        assert!(op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_nor_operator_fails() {
        let doc = create_test_document(1, vec![("age", json!(15))]);
        // age < 18 is TRUE, so $nor should return false
        let filter = json!([{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]);
        let op = NorOperator;
        assert!(!op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_nor_not_array_error() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let op = NorOperator;
        let result = op.matches(None, &json!({"age": 25}), Some(&doc));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires an array"));
    }

    #[test]
    fn test_nor_no_document_error() {
        let op = NorOperator;
        let result = op.matches(None, &json!([{"age": 25}]), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires document context"));
    }

    #[test]
    fn test_and_not_array_error() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let op = AndOperator;
        let result = op.matches(None, &json!({"age": 25}), Some(&doc));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires an array"));
    }

    #[test]
    fn test_and_no_document_error() {
        let op = AndOperator;
        let result = op.matches(None, &json!([{"age": 25}]), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires document context"));
    }

    #[test]
    fn test_or_not_array_error() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let op = OrOperator;
        let result = op.matches(None, &json!({"age": 25}), Some(&doc));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires an array"));
    }

    #[test]
    fn test_or_no_document_error() {
        let op = OrOperator;
        let result = op.matches(None, &json!([{"age": 25}]), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires document context"));
    }

    #[test]
    fn test_or_no_match() {
        let doc = create_test_document(1, vec![("age", json!(30))]);
        let filter = json!([{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]);
        let op = OrOperator;
        assert!(!op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_and_fails() {
        let doc = create_test_document(1, vec![("age", json!(25)), ("city", json!("LA"))]);
        let filter = json!([{"age": {"$gt": 18}}, {"city": "NYC"}]); // city doesn't match
        let op = AndOperator;
        assert!(!op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_not_operator() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let op = NotOperator;
        // $not: { $gt: 30 } should return true for age=25
        let filter = json!({"$gt": 30});
        assert!(op.matches(Some(&json!(25)), &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_not_no_document_error() {
        let op = NotOperator;
        let result = op.matches(Some(&json!(25)), &json!({"$gt": 30}), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("requires document context"));
    }

    // ========== matches_filter tests ==========

    #[test]
    fn test_matches_filter_empty() {
        let doc = create_test_document(1, vec![("name", json!("Alice"))]);
        let filter = json!({});
        assert!(matches_filter(&doc, &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_unknown_operator() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let filter = json!({"age": {"$unknown": 25}});
        let result = matches_filter(&doc, &filter);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown operator"));
    }

    #[test]
    fn test_matches_filter_top_level_unknown_operator() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let filter = json!({"$unknown": [{"age": 25}]});
        let result = matches_filter(&doc, &filter);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown operator"));
    }

    #[test]
    fn test_matches_filter_not_object_error() {
        let doc = create_test_document(1, vec![("name", json!("Alice"))]);
        let filter = json!("not an object");
        let result = matches_filter(&doc, &filter);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Filter must be an object"));
    }

    #[test]
    fn test_matches_filter_direct_mismatch() {
        let doc = create_test_document(1, vec![("name", json!("Alice"))]);
        let filter = json!({"name": "Bob"});
        assert!(!matches_filter(&doc, &filter).unwrap());
    }

    // ========== matches_filter_value tests ==========

    #[test]
    fn test_matches_filter_value_unknown_operator() {
        let result = matches_filter_value(Some(&json!(25)), &json!({"$unknown": 25}), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown operator"));
    }

    #[test]
    fn test_matches_filter_value_direct() {
        assert!(matches_filter_value(Some(&json!(25)), &json!(25), None).unwrap());
        assert!(!matches_filter_value(Some(&json!(25)), &json!(30), None).unwrap());
        assert!(!matches_filter_value(None, &json!(25), None).unwrap());
    }

    // ========== Existing tests ==========

    #[test]
    fn test_eq_operator() {
        let op = EqOperator;
        assert!(op
            .matches(Some(&json!("Alice")), &json!("Alice"), None)
            .unwrap());
        assert!(!op
            .matches(Some(&json!("Bob")), &json!("Alice"), None)
            .unwrap());
        assert!(!op.matches(None, &json!("Alice"), None).unwrap());
    }

    #[test]
    fn test_ne_operator() {
        let op = NeOperator;
        assert!(op
            .matches(Some(&json!("Bob")), &json!("Alice"), None)
            .unwrap());
        assert!(!op
            .matches(Some(&json!("Alice")), &json!("Alice"), None)
            .unwrap());
        assert!(op.matches(None, &json!("Alice"), None).unwrap()); // Missing field != value
    }

    #[test]
    fn test_gt_operator() {
        let op = GtOperator;
        assert!(op.matches(Some(&json!(10)), &json!(5), None).unwrap());
        assert!(!op.matches(Some(&json!(5)), &json!(10), None).unwrap());
        assert!(!op.matches(Some(&json!(5)), &json!(5), None).unwrap());
    }

    #[test]
    fn test_in_operator() {
        let op = InOperator;
        let array = json!(["NYC", "LA", "SF"]);
        assert!(op.matches(Some(&json!("NYC")), &array, None).unwrap());
        assert!(!op.matches(Some(&json!("Chicago")), &array, None).unwrap());
    }

    #[test]
    fn test_exists_operator() {
        let op = ExistsOperator;
        assert!(op
            .matches(Some(&json!("value")), &json!(true), None)
            .unwrap());
        assert!(!op.matches(None, &json!(true), None).unwrap());
        assert!(op.matches(None, &json!(false), None).unwrap());
    }

    #[test]
    fn test_and_operator() {
        let doc = create_test_document(1, vec![("age", json!(25)), ("city", json!("NYC"))]);
        let filter = json!([{"age": {"$gt": 18}}, {"city": "NYC"}]);

        let op = AndOperator;
        assert!(op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_or_operator() {
        let doc = create_test_document(1, vec![("age", json!(15))]);
        let filter = json!([{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]);

        let op = OrOperator;
        assert!(op.matches(None, &filter, Some(&doc)).unwrap());
    }

    #[test]
    fn test_matches_filter_simple() {
        let doc = create_test_document(1, vec![("name", json!("Alice"))]);
        let filter = json!({"name": "Alice"});
        assert!(matches_filter(&doc, &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_with_operators() {
        let doc = create_test_document(1, vec![("age", json!(25))]);
        let filter = json!({"age": {"$gte": 18, "$lt": 30}});
        assert!(matches_filter(&doc, &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_logical_and() {
        let doc = create_test_document(1, vec![("age", json!(25)), ("city", json!("NYC"))]);
        let filter = json!({"$and": [{"age": {"$gte": 18}}, {"city": "NYC"}]});
        assert!(matches_filter(&doc, &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_top_level_fields_only() {
        // Field access is top-level only: "address.city" is a literal key, not a path.
        let doc = create_test_document(
            1,
            vec![
                ("address", json!({"city": "Budapest", "zip": 1111})),
                ("stats", json!({"login_count": 42})),
            ],
        );
        let filter = json!({"stats": {"login_count": 42}});
        assert!(matches_filter(&doc, &filter).unwrap());

        let dotted_filter = json!({"address.city": "Budapest"});
        assert!(!matches_filter(&doc, &dotted_filter).unwrap());
    }

    #[test]
    fn test_operator_registry() {
        assert!(OPERATOR_REGISTRY.contains_key("$eq"));
        assert!(OPERATOR_REGISTRY.contains_key("$ne"));
        assert!(OPERATOR_REGISTRY.contains_key("$gt"));
        assert!(OPERATOR_REGISTRY.contains_key("$gte"));
        assert!(OPERATOR_REGISTRY.contains_key("$lt"));
        assert!(OPERATOR_REGISTRY.contains_key("$lte"));
        assert!(OPERATOR_REGISTRY.contains_key("$in"));
        assert!(OPERATOR_REGISTRY.contains_key("$nin"));
        assert!(OPERATOR_REGISTRY.contains_key("$exists"));
        assert!(OPERATOR_REGISTRY.contains_key("$and"));
        assert!(OPERATOR_REGISTRY.contains_key("$or"));
        assert!(OPERATOR_REGISTRY.contains_key("$nor"));
        assert!(OPERATOR_REGISTRY.contains_key("$not"));
        assert!(!OPERATOR_REGISTRY.contains_key("$all"));
        assert!(!OPERATOR_REGISTRY.contains_key("$elemMatch"));
        assert!(!OPERATOR_REGISTRY.contains_key("$size"));
        assert!(!OPERATOR_REGISTRY.contains_key("$regex"));
        assert!(!OPERATOR_REGISTRY.contains_key("$type"));
        assert!(!OPERATOR_REGISTRY.contains_key("$expr"));
        assert_eq!(OPERATOR_REGISTRY.len(), 13);
    }
}
