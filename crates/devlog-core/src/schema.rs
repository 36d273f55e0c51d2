//! Closed signal schema.
//!
//! A signal carries a tool name, a small parameter map, and a timestamp.
//! Anything else at the top level is rejected by name rather than dropped,
//! which is what keeps author identity, commit messages and file lists out
//! of the signal directory.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::signal::{is_commit_ref, parse_created_at, Tool, COMMIT_HASH_KEY};

/// The only top-level keys a signal may carry.
pub const ALLOWED_FIELDS: [&str; 3] = ["tool", "params", "created_at"];

/// Parameter keys that would leak repository metadata already held by the
/// version-control object store.
pub const PRIVATE_PARAM_KEYS: &[&str] = &[
    "author",
    "author_name",
    "author_email",
    "email",
    "message",
    "commit_message",
    "files",
    "changed_files",
    "file_list",
    "diff",
];

/// Check a candidate signal object against the closed schema.
///
/// Forbidden fields are reported before missing ones, and every offending
/// key is listed (sorted).
pub fn validate_value(value: &Value) -> Result<(), ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let mut extra: Vec<String> = obj
        .keys()
        .filter(|k| !ALLOWED_FIELDS.contains(&k.as_str()))
        .cloned()
        .collect();
    if !extra.is_empty() {
        extra.sort();
        return Err(ValidationError::ForbiddenFields { keys: extra });
    }

    for field in ALLOWED_FIELDS {
        if !obj.contains_key(field) {
            return Err(ValidationError::MissingField(field.to_string()));
        }
    }

    let tool = obj["tool"]
        .as_str()
        .ok_or_else(|| ValidationError::invalid("tool", "expected a string"))?;
    let tool = Tool::new(tool)?;

    let params = obj["params"]
        .as_object()
        .ok_or_else(|| ValidationError::invalid("params", "expected an object"))?;
    validate_params(&tool, params)?;

    let created_at = obj["created_at"]
        .as_str()
        .ok_or_else(|| ValidationError::invalid("created_at", "expected a string"))?;
    parse_created_at(created_at)?;

    Ok(())
}

/// Check `params` for a given tool: no private keys, and a well-formed
/// `commit_hash` for commit-scoped tools.
pub fn validate_params(tool: &Tool, params: &Map<String, Value>) -> Result<(), ValidationError> {
    let mut private: Vec<String> = params
        .keys()
        .filter(|k| PRIVATE_PARAM_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    if !private.is_empty() {
        private.sort();
        return Err(ValidationError::ForbiddenParams { keys: private });
    }

    if tool.is_commit_scoped() {
        match params.get(COMMIT_HASH_KEY) {
            None => {
                return Err(ValidationError::MissingField(format!(
                    "params.{COMMIT_HASH_KEY}"
                )))
            }
            Some(Value::String(s)) if is_commit_ref(s) => {}
            Some(other) => {
                return Err(ValidationError::invalid(
                    "params.commit_hash",
                    format!("expected a hex commit reference, got {other}"),
                ))
            }
        }
    }
    Ok(())
}
