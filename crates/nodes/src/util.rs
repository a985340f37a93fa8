//! Small helpers shared by the built-in handlers.

use serde_json::{Map, Value};
use weft_handler::NodeExecutionContext;

/// The input as an object map, or an empty map for null/non-object input.
///
/// Backs the passthrough law: handlers that echo their input produce `{}`
/// when the input is not a mapping.
pub(crate) fn input_object(ctx: &NodeExecutionContext) -> Map<String, Value> {
    match ctx.input() {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

/// Extend the input object with extra fields and wrap it back into a value.
pub(crate) fn passthrough_with(
    ctx: &NodeExecutionContext,
    extra: impl IntoIterator<Item = (String, Value)>,
) -> Value {
    let mut map = input_object(ctx);
    for (key, value) in extra {
        map.insert(key, value);
    }
    Value::Object(map)
}

/// Read the list a handler should operate on.
///
/// Resolves `field` inside the input when given; otherwise takes the
/// whole input. Non-list scalars wrap into a single-element list; null
/// and a missing path yield an empty list.
pub(crate) fn items_from_input(ctx: &NodeExecutionContext, field: Option<&str>) -> Vec<Value> {
    let source = match field {
        Some(path) if !path.is_empty() => {
            weft_core::value::get_path(ctx.input(), path).cloned()
        }
        _ => Some(ctx.input().clone()),
    };
    match source {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}
