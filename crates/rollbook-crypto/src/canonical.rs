use serde::Serialize;
use serde_json::{Map, Value};

use crate::hasher::HasherError;

/// Convert a serializable value into canonical form: object keys sorted at
/// every depth.
///
/// Keys are sorted here, not by `serde_json::Map`, whose ordering depends on
/// the `preserve_order` feature.
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, HasherError> {
    let raw = serde_json::to_value(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
    Ok(sort_keys(raw))
}

/// Canonical compact JSON text of a value.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HasherError> {
    let canonical = to_canonical_value(value)?;
    serde_json::to_string(&canonical).map_err(|e| HasherError::Serialization(e.to_string()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
