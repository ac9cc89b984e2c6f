//! Structural parity between two backend responses.
//!
//! Two payloads are compared by shape, not by value: every object key and
//! array element position becomes a path (`$.user.teams[]`), each path is
//! tagged with its JSON type, and the similarity is the share of paths
//! present in both payloads with the same type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default similarity at or above which two payloads are compatible.
pub const DEFAULT_PARITY_THRESHOLD: f64 = 0.8;

/// A path present in both payloads with different JSON types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMismatch {
    /// Path of the value.
    pub path: String,
    /// Type on the reference side.
    pub expected: String,
    /// Type on the candidate side.
    pub actual: String,
}

/// Outcome of a parity comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    /// `matched / union` of typed paths, in `[0, 1]`.
    pub similarity: f64,
    /// `similarity >= threshold`.
    pub is_compatible: bool,
    /// Threshold the report was judged against.
    pub threshold: f64,
    /// The two payloads are equal value-for-value.
    pub identical: bool,
    /// Paths only in the reference payload.
    pub missing: Vec<String>,
    /// Paths only in the candidate payload.
    pub extra: Vec<String>,
    /// Paths whose type differs.
    pub type_mismatches: Vec<TypeMismatch>,
}

/// Compare `candidate` against `reference` with the default threshold.
pub fn compare_payloads(reference: &Value, candidate: &Value) -> ParityReport {
    compare_with_threshold(reference, candidate, DEFAULT_PARITY_THRESHOLD)
}

/// Compare `candidate` against `reference`.
///
/// # Panics
///
/// This function never panics.
pub fn compare_with_threshold(reference: &Value, candidate: &Value, threshold: f64) -> ParityReport {
    let expected = shape(reference);
    let actual = shape(candidate);

    let mut matched = 0usize;
    let mut missing = Vec::new();
    let mut type_mismatches = Vec::new();
    for (path, kind) in &expected {
        match actual.get(path) {
            Some(other) if other == kind => matched += 1,
            Some(other) => type_mismatches.push(TypeMismatch {
                path: path.clone(),
                expected: (*kind).to_string(),
                actual: (*other).to_string(),
            }),
            None => missing.push(path.clone()),
        }
    }
    let extra: Vec<String> = actual
        .keys()
        .filter(|p| !expected.contains_key(*p))
        .cloned()
        .collect();

    let union = expected.len() + extra.len();
    let similarity = if union == 0 {
        1.0
    } else {
        matched as f64 / union as f64
    };

    ParityReport {
        similarity,
        is_compatible: similarity >= threshold,
        threshold,
        identical: reference == candidate,
        missing,
        extra,
        type_mismatches,
    }
}

fn shape(value: &Value) -> BTreeMap<String, &'static str> {
    let mut paths = BTreeMap::new();
    walk(value, "$".to_string(), &mut paths);
    paths
}

fn walk(value: &Value, path: String, out: &mut BTreeMap<String, &'static str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, format!("{path}.{key}"), out);
            }
            out.insert(path, "object");
        }
        // Arrays are judged by their first element's shape.
        Value::Array(items) => {
            if let Some(first) = items.first() {
                walk(first, format!("{path}[]"), out);
            }
            out.insert(path, "array");
        }
        other => {
            out.insert(path, type_name(other));
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_shape_different_values_is_full_match() {
        let report = compare_payloads(
            &json!({"id": 1, "name": "a", "tags": ["x"]}),
            &json!({"id": 2, "name": "b", "tags": ["y", "z"]}),
        );
        assert_eq!(report.similarity, 1.0);
        assert!(report.is_compatible);
        assert!(!report.identical);
    }

    #[test]
    fn test_missing_extra_and_mismatch_reported() {
        let report = compare_payloads(
            &json!({"id": 1, "name": "a", "email": "e"}),
            &json!({"id": "1", "name": "a", "avatar": null}),
        );
        assert_eq!(report.missing, vec!["$.email".to_string()]);
        assert_eq!(report.extra, vec!["$.avatar".to_string()]);
        assert_eq!(report.type_mismatches.len(), 1);
        assert_eq!(report.type_mismatches[0].path, "$.id");
        // matched: $ and $.name; union: $, $.id, $.name, $.email, $.avatar
        assert!((report.similarity - 0.4).abs() < 1e-9);
        assert!(!report.is_compatible);
    }

    #[test]
    fn test_nested_arrays_compare_first_element() {
        let report = compare_payloads(
            &json!([{"id": 1, "owner": {"name": "n"}}]),
            &json!([{"id": 9, "owner": {"name": "m"}}, {"other": true}]),
        );
        assert!(report.type_mismatches.is_empty());
        assert_eq!(report.similarity, 1.0);
    }

    #[test]
    fn test_empty_arrays_match() {
        let report = compare_payloads(&json!([]), &json!([]));
        assert!(report.identical);
        assert_eq!(report.similarity, 1.0);
    }

    #[test]
    fn test_custom_threshold() {
        let report = compare_with_threshold(
            &json!({"a": 1, "b": 2, "c": 3, "d": 4}),
            &json!({"a": 1, "b": 2, "c": 3}),
            0.75,
        );
        assert!((report.similarity - 0.8).abs() < 1e-9);
        assert!(report.is_compatible);
    }
}
