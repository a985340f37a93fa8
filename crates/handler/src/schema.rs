//! Validation of node configs against the JSON-schema subset handlers
//! declare.
//!
//! The supported subset is deliberately small: `type: "object"` at the
//! root, per-property `type` and `enum`, and a `required` list. The marker
//! `x-multi-operation: true` is carried through untouched for the UI.

use serde_json::Value;
use weft_core::value::value_kind;

/// Validate `config` against a handler's declared schema.
///
/// Returns one message per problem; an empty vector means the config is
/// acceptable. Unknown config keys are allowed — handlers ignore what they
/// do not understand.
#[must_use]
pub fn validate_config(config: &Value, schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(config_map) = config.as_object() else {
        errors.push(format!(
            "config must be an object, got {}",
            value_kind(config)
        ));
        return errors;
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !config_map.contains_key(key) {
                errors.push(format!("missing required field `{key}`"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return errors;
    };

    for (key, spec) in properties {
        let Some(value) = config_map.get(key) else {
            continue;
        };
        if let Some(expected) = spec.get("type").and_then(Value::as_str) {
            if !type_matches(value, expected) {
                errors.push(format!(
                    "field `{key}` must be {expected}, got {}",
                    value_kind(value)
                ));
                continue;
            }
        }
        if let Some(allowed) = spec.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                errors.push(format!(
                    "field `{key}` must be one of {}",
                    render_enum(allowed)
                ));
            }
        }
    }

    errors
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn render_enum(allowed: &[Value]) -> String {
    let rendered: Vec<String> = allowed.iter().map(ToString::to_string).collect();
    rendered.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "method": {"type": "string", "enum": ["GET", "POST"]},
                "timeout": {"type": "number"},
                "headers": {"type": "object"},
            },
            "required": ["url"],
        })
    }

    #[test]
    fn valid_config_passes() {
        let config = json!({"url": "https://x", "method": "GET", "timeout": 30});
        assert!(validate_config(&config, &schema()).is_empty());
    }

    #[test]
    fn missing_required_field() {
        let errors = validate_config(&json!({"method": "GET"}), &schema());
        assert_eq!(errors, vec!["missing required field `url`"]);
    }

    #[test]
    fn wrong_type_reported() {
        let errors = validate_config(&json!({"url": 42}), &schema());
        assert_eq!(errors, vec!["field `url` must be string, got number"]);
    }

    #[test]
    fn enum_membership() {
        let errors = validate_config(&json!({"url": "x", "method": "DELETE"}), &schema());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must be one of"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = json!({"url": "x", "somethingElse": true});
        assert!(validate_config(&config, &schema()).is_empty());
    }

    #[test]
    fn non_object_config_rejected() {
        let errors = validate_config(&json!([1, 2]), &schema());
        assert_eq!(errors, vec!["config must be an object, got array"]);
    }

    #[test]
    fn empty_schema_accepts_anything() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(validate_config(&json!({"anything": 1}), &schema).is_empty());
    }

    #[test]
    fn integer_vs_number() {
        let schema = json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}},
        });
        assert!(validate_config(&json!({"n": 3}), &schema).is_empty());
        let errors = validate_config(&json!({"n": 3.5}), &schema);
        assert_eq!(errors.len(), 1);
    }
}
