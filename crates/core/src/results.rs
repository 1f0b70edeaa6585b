//! Bulk-job result file parsing.
//!
//! The remote side delivers one JSON object per line, each line being
//! one mutation's response, with a `__parentId` linking record-scoped
//! lines back to the originating record. Lines parse independently: a
//! malformed line becomes one generic error entry and affects neither
//! counter, so `successful + failed` always equals the number of
//! well-formed lines.

use serde::{Deserialize, Serialize};

/// Aggregate outcome of a completed bulk job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub successful: u32,
    pub failed: u32,
    pub errors: Vec<ResultError>,
}

/// One per-record (or per-line) failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Parse a line-delimited result file into success/failure counts.
pub fn parse_result_file(body: &str) -> ResultSummary {
    let mut summary = ResultSummary::default();

    for (index, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                summary.errors.push(ResultError {
                    record_id: None,
                    field: None,
                    message: format!("line {}: not valid JSON", index + 1),
                });
                continue;
            }
        };

        let record_id = parent_id(&value);
        let user_errors = find_user_errors(&value);

        if user_errors.is_empty() {
            summary.successful += 1;
        } else {
            summary.failed += 1;
            for err in user_errors {
                summary.errors.push(ResultError {
                    record_id: record_id.clone(),
                    field: error_field(&err),
                    message: err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }
        }
    }

    summary
}

/// The record id a line belongs to, if the mutation was record-scoped.
fn parent_id(value: &serde_json::Value) -> Option<String> {
    value
        .get("__parentId")
        .or_else(|| value.get("parentId"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Collect user errors from the top level or nested one object level
/// under the mutation's response field.
fn find_user_errors(value: &serde_json::Value) -> Vec<serde_json::Value> {
    if let Some(errors) = value.get("userErrors").and_then(|e| e.as_array()) {
        return errors.clone();
    }

    if let Some(object) = value.as_object() {
        for field_value in object.values() {
            if let Some(errors) = field_value.get("userErrors").and_then(|e| e.as_array()) {
                if !errors.is_empty() {
                    return errors.clone();
                }
            }
        }
    }

    Vec::new()
}

/// Join an error's field path (`["variants", "0", "price"]`) into a
/// dotted string, if present.
fn error_field(err: &serde_json::Value) -> Option<String> {
    match err.get("field") {
        Some(serde_json::Value::Array(parts)) => {
            let joined: Vec<&str> = parts.iter().filter_map(|p| p.as_str()).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join("."))
            }
        }
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}
