//! Regular expression matching, replacement, and splitting.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Regex operations: `test`, `match`, `replace`, `split`.
///
/// An invalid pattern is a validation failure; the operator variant used
/// inside condition/filter deliberately swallows it instead, because
/// routing must never throw.
pub struct RegexNode {
    meta: HandlerMetadata,
}

impl RegexNode {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["test", "match", "replace", "split"],
                    "default": "match",
                },
                "pattern": {"type": "string"},
                "field": {"type": "string", "description": "Source text path; defaults to input.text"},
                "replacement": {"type": "string", "default": ""},
            },
            "required": ["pattern"],
        });
        Self {
            meta: HandlerMetadata::new("regex", "Regex", "Match, replace, and split text")
                .with_category("transform")
                .with_icon("asterisk")
                .with_config_schema(schema),
        }
    }

    fn source_text(ctx: &NodeExecutionContext) -> String {
        let path = ctx.config_str("field").unwrap_or("text");
        get_path(ctx.input(), path)
            .map(coerce_string)
            .unwrap_or_default()
    }
}

impl Default for RegexNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for RegexNode {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let pattern = ctx
            .config_str("pattern")
            .ok_or_else(|| HandlerError::validation("missing required field `pattern`"))?;
        let regex = Regex::new(pattern)
            .map_err(|err| HandlerError::validation(format!("invalid pattern: {err}")))?;
        let text = Self::source_text(ctx);

        let output = match ctx.config_str("operation").unwrap_or("match") {
            "test" => json!({"matched": regex.is_match(&text)}),
            "replace" => {
                let replacement = ctx.config_str("replacement").unwrap_or_default();
                json!({"result": regex.replace_all(&text, replacement).into_owned()})
            }
            "split" => {
                let parts: Vec<&str> = regex.split(&text).collect();
                json!({"parts": parts, "count": parts.len()})
            }
            _ => {
                let matches: Vec<Value> = regex
                    .captures_iter(&text)
                    .map(|captures| {
                        let full = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
                        let groups: Vec<Value> = captures
                            .iter()
                            .skip(1)
                            .map(|group| {
                                group.map_or(Value::Null, |m| Value::String(m.as_str().to_owned()))
                            })
                            .collect();
                        json!({"match": full, "groups": groups})
                    })
                    .collect();
                let count = matches.len();
                json!({"matches": matches, "count": count})
            }
        };

        Ok(NodeExecutionResult::success(output))
    }
}
