//! Value comparison shared across modules
//!
//! This module provides the one canonical ordering used everywhere values of
//! possibly-differing types need to be compared: `$sort`, `$gt`/`$gte`/`$lt`/`$lte`,
//! and secondary index key ordering all go through `compare_values`.

use serde_json::Value;
use std::cmp::Ordering;

/// Canonical type tier used to order values across types.
///
/// `null < bool < number < string < sequence < mapping`, matching the
/// ordering used by index keys and the query matcher's relational operators.
fn type_tier(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compare two JSON values under the canonical cross-type total order.
///
/// Values of the same type compare by their natural ordering (numeric value,
/// lexicographic string order, `false < true`, element-wise for arrays,
/// sorted-key element-wise for objects). Values of different types compare
/// by their type tier: `null < bool < number < string < sequence < mapping`.
/// This is a total order: it never returns an "incomparable" result.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use ironbase_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Ordering::Greater);
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
/// assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
/// assert_eq!(compare_values(&json!(true), &json!(1)), Ordering::Less);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(b1), Value::Bool(b2)) => b1.cmp(b2),
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64().unwrap_or(0.0);
            let f2 = n2.as_f64().unwrap_or(0.0);
            f1.partial_cmp(&f2).unwrap_or(Ordering::Equal)
        }
        (Value::String(s1), Value::String(s2)) => s1.cmp(s2),
        (Value::Array(a1), Value::Array(a2)) => {
            for (x, y) in a1.iter().zip(a2.iter()) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a1.len().cmp(&a2.len())
        }
        (Value::Object(o1), Value::Object(o2)) => {
            let mut keys1: Vec<&String> = o1.keys().collect();
            let mut keys2: Vec<&String> = o2.keys().collect();
            keys1.sort();
            keys2.sort();

            for (k1, k2) in keys1.iter().zip(keys2.iter()) {
                let key_ord = k1.cmp(k2);
                if key_ord != Ordering::Equal {
                    return key_ord;
                }
                let ord = compare_values(&o1[*k1], &o2[*k2]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            keys1.len().cmp(&keys2.len())
        }
        _ => type_tier(a).cmp(&type_tier(b)),
    }
}

/// Compare two optional JSON values, treating a missing value as less than
/// any present value. Used for sorting where a field may be absent.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use ironbase_core::value_utils::compare_values_with_none;
///
/// assert_eq!(compare_values_with_none(None, Some(&json!(5))), Ordering::Less);
/// assert_eq!(compare_values_with_none(Some(&json!(10)), None), Ordering::Greater);
/// ```
pub fn compare_values_with_none(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values(av, bv),
    }
}
