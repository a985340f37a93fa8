//! Dotted-path access and loose coercion over [`serde_json::Value`].
//!
//! Payloads in Weft are untyped JSON trees. Handlers navigate them with
//! dotted paths (`"user.address.city"`, `"items.0.id"`) and compare them
//! with loose, string-biased coercion: `42 == "42"` holds, because node
//! configs arrive as text while upstream data arrives typed.

use serde_json::{Map, Value};

/// Resolve a dotted path inside a value.
///
/// Path segments index into objects by key; segments that parse as an
/// integer index into arrays. An empty path returns the value itself.
/// Returns `None` when any segment is missing — never panics.
#[must_use]
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Set a dotted path inside a value, creating intermediate objects.
///
/// Existing non-object values along the path are replaced by objects.
/// Array indexing is not supported on the write path; numeric segments
/// become object keys.
pub fn set_path(value: &mut Value, path: &str, new_value: Value) {
    if path.is_empty() {
        *value = new_value;
        return;
    }
    let mut current = value;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().unwrap_or_else(|| unreachable!());
        if i == segments.len() - 1 {
            map.insert((*segment).to_owned(), new_value);
            return;
        }
        current = map
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Coerce a value to `f64` for numeric comparison.
///
/// Numbers pass through; strings are parsed; booleans map to 1/0.
/// Returns `None` when the value has no numeric reading.
#[must_use]
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Coerce a value to a boolean.
///
/// `true`/`false`, the strings `"true"`/`"false"` (case-insensitive),
/// and numbers (non-zero is true) all coerce. Everything else is `None`.
#[must_use]
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

/// Render a value as the string used in loose comparisons.
///
/// Strings pass through unquoted; null renders empty; integral floats
/// render without a trailing `.0`; structured values render as JSON.
#[must_use]
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 1e15 && n.as_i64().is_none() && n.as_u64().is_none()
                {
                    return format!("{}", f as i64);
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}

/// Returns `true` when a value is "empty": null, `""`, `[]`, or `{}`.
#[must_use]
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Short human-readable name of a value's kind, for diagnostics.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Merge `overlay` into `base`, recursively for objects.
///
/// Non-object overlay values replace the base value. Object keys merge
/// depth-first; overlay wins on scalar conflicts.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}
