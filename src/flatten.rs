//! Record flattening
//!
//! Walks a nested JSON value and produces a single-level record keyed by
//! dotted paths. Sequences are stored as their compact JSON text and are
//! never expanded into indexed keys.

use serde_json::Value;

use crate::types::{FieldValue, FlatRecord};

/// Key separator between nesting levels
pub const SEPARATOR: char = '.';

/// Flatten a nested value into a dotted-key record
pub fn flatten(value: &Value) -> FlatRecord {
    flatten_with_prefix(value, "")
}

/// Flatten a value with every key placed under `prefix`
///
/// A non-empty prefix should end with [`SEPARATOR`] (e.g. `"sleep."`).
pub fn flatten_with_prefix(value: &Value, prefix: &str) -> FlatRecord {
    let mut out = FlatRecord::new();

    // Empty containers at the top contribute nothing
    match value {
        Value::Object(map) if map.is_empty() => return out,
        Value::Array(items) if items.is_empty() => return out,
        _ => {}
    }

    flatten_into(value, prefix, &mut out);
    out
}

/// Flatten `value` into an existing record
pub fn flatten_into(value: &Value, prefix: &str, out: &mut FlatRecord) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_prefix = format!("{prefix}{key}{SEPARATOR}");
                flatten_into(child, &child_prefix, out);
            }
        }
        Value::Array(_) => {
            out.insert(leaf_key(prefix), FieldValue::Text(value.to_string()));
        }
        scalar => {
            if let Some(field) = FieldValue::from_scalar(scalar) {
                out.insert(leaf_key(prefix), field);
            }
        }
    }
}

fn leaf_key(prefix: &str) -> String {
    prefix.strip_suffix(SEPARATOR).unwrap_or(prefix).to_string()
}
