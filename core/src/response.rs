//! Response envelope unwrapping and failure classification.
//!
//! The service wraps most payloads in one of a few envelope objects and
//! reports its own failures inside them, usually with a 200 status. This
//! module turns an `HttpResponse` into either the payload or exactly one
//! `RallyError`.

use serde_json::Value;
use tracing::warn;

use crate::config::WarningPolicy;
use crate::error::{RallyError, Result};
use crate::http::HttpResponse;

/// Top-level keys the service wraps payloads in.
pub const ENVELOPES: [&str; 3] = ["OperationResult", "CreateResult", "QueryResult"];

/// Replace a single-key envelope object with its inner value.
///
/// Returns the unwrapped value and whether an envelope was found.
pub fn unwrap_envelope(value: Value) -> (Value, bool) {
    match value {
        Value::Object(mut map) if map.len() == 1 => {
            let key = map.keys().next().cloned().unwrap_or_default();
            if ENVELOPES.contains(&key.as_str()) {
                let inner = map.remove(&key).unwrap_or(Value::Null);
                (inner, true)
            } else {
                (Value::Object(map), false)
            }
        }
        other => (other, false),
    }
}

/// Classify a raw response.
///
/// Order of checks: status code, JSON decoding, `Errors`, then `Warnings`.
/// `Errors` always win over `Warnings`.
pub fn classify(response: &HttpResponse, policy: WarningPolicy) -> Result<Value> {
    if !(200..300).contains(&response.status) {
        return Err(RallyError::Http {
            status: response.status,
            body: response.body.clone(),
        });
    }

    let decoded: Value = serde_json::from_str(&response.body)
        .map_err(|e| RallyError::Deserialization(e.to_string()))?;

    let (object, wrapped) = unwrap_envelope(decoded);
    if !wrapped {
        return Ok(object);
    }

    let errors = messages(&object, "Errors");
    if !errors.is_empty() {
        return Err(RallyError::Service { messages: errors });
    }

    let warnings = messages(&object, "Warnings");
    if !warnings.is_empty() {
        match policy {
            WarningPolicy::Raise => return Err(RallyError::Warning { messages: warnings }),
            WarningPolicy::Log => warn!(warnings = ?warnings, "Rally reported warnings"),
        }
    }

    Ok(object)
}

/// String entries of the array under `key`; non-string entries are rendered as JSON.
fn messages(object: &Value, key: &str) -> Vec<String> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
