//! JSON parsing and stringification.

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Parses JSON text and renders values back to text.
///
/// `parse` emits the decoded value under `parsed`; `stringify` renders
/// the value at `field` (default: the whole input) under `json`.
pub struct Json {
    meta: HandlerMetadata,
}

impl Json {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["parse", "stringify"], "default": "parse"},
                "field": {"type": "string", "description": "Source path inside the input"},
                "pretty": {"type": "boolean", "default": false},
            },
        });
        Self {
            meta: HandlerMetadata::new("json", "JSON", "Parse and stringify JSON")
                .with_category("transform")
                .with_icon("braces")
                .with_config_schema(schema),
        }
    }

    fn source(ctx: &NodeExecutionContext) -> Value {
        match ctx.config_str("field") {
            Some(path) if !path.is_empty() => {
                get_path(ctx.input(), path).cloned().unwrap_or(Value::Null)
            }
            _ => ctx.input().clone(),
        }
    }
}

impl Default for Json {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Json {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let source = Self::source(ctx);
        let output = match ctx.config_str("operation").unwrap_or("parse") {
            "stringify" => {
                let rendered = if ctx.config_bool("pretty", false) {
                    serde_json::to_string_pretty(&source)
                } else {
                    serde_json::to_string(&source)
                }
                .map_err(|err| HandlerError::internal(err.to_string()))?;
                json!({"json": rendered})
            }
            _ => {
                let text = coerce_string(&source);
                let parsed: Value = serde_json::from_str(&text)
                    .map_err(|err| HandlerError::validation(format!("invalid JSON: {err}")))?;
                json!({"parsed": parsed})
            }
        };
        Ok(NodeExecutionResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    async fn run(config: Value, input: Value) -> Result<Value, HandlerError> {
        let c = ctx("json", config, input);
        Ok(Json::new().execute(&c).await?.output().unwrap().clone())
    }

    #[tokio::test]
    async fn parse_decodes_text() {
        let output = run(
            json!({"operation": "parse", "field": "raw"}),
            json!({"raw": r#"{"a": [1, 2]}"#}),
        )
        .await
        .unwrap();
        assert_eq!(output["parsed"], json!({"a": [1, 2]}));
    }

    #[tokio::test]
    async fn parse_invalid_is_validation_error() {
        let err = run(
            json!({"operation": "parse", "field": "raw"}),
            json!({"raw": "{nope"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, weft_handler::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn stringify_renders_value() {
        let output = run(
            json!({"operation": "stringify", "field": "obj"}),
            json!({"obj": {"b": 2}}),
        )
        .await
        .unwrap();
        assert_eq!(output["json"], r#"{"b":2}"#);
    }

    #[tokio::test]
    async fn stringify_pretty() {
        let output = run(
            json!({"operation": "stringify", "field": "obj", "pretty": true}),
            json!({"obj": {"b": 2}}),
        )
        .await
        .unwrap();
        assert!(output["json"].as_str().unwrap().contains("\n"));
    }

    #[tokio::test]
    async fn stringify_then_parse_roundtrips() {
        let original = json!({"nested": {"list": [1, "two", null, true]}});
        let stringified = run(json!({"operation": "stringify"}), original.clone())
            .await
            .unwrap();
        let parsed = run(
            json!({"operation": "parse", "field": "raw"}),
            json!({"raw": stringified["json"]}),
        )
        .await
        .unwrap();
        assert_eq!(parsed["parsed"], original);
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_scalars(n in any::<i64>(), s in "[a-zA-Z0-9 ]{0,20}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let original = json!({"n": n, "s": s});
                let stringified = run(json!({"operation": "stringify"}), original.clone())
                    .await
                    .unwrap();
                let parsed = run(
                    json!({"operation": "parse", "field": "raw"}),
                    json!({"raw": stringified["json"]}),
                )
                .await
                .unwrap();
                assert_eq!(parsed["parsed"], original);
            });
        }
    }
}
