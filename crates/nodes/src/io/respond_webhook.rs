//! Webhook response assembly.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use weft_core::value::coerce_string;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Builds the HTTP response a webhook-triggered flow sends back.
///
/// The assembled response is the node's output and is echoed in the
/// result metadata for the HTTP layer to emit. Body assembly by
/// `bodyMode`:
///
/// - `json` — the configured `body` value as JSON
/// - `text` — the configured `body` rendered as text
/// - `input` — the node's input payload
/// - `auto` — configured body when present, else the input
pub struct RespondWebhook {
    meta: HandlerMetadata,
}

impl RespondWebhook {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "statusCode": {"type": "integer", "default": 200},
                "headers": {"type": "object"},
                "bodyMode": {
                    "type": "string",
                    "enum": ["json", "text", "input", "auto"],
                    "default": "auto",
                },
                "body": {"description": "Response body for json/text modes"},
            },
        });
        Self {
            meta: HandlerMetadata::new("respondWebhook", "Respond to Webhook", "Shape the HTTP response")
                .with_category("io")
                .with_icon("reply")
                .with_config_schema(schema),
        }
    }
}

impl Default for RespondWebhook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for RespondWebhook {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let status_code = ctx.config_u64("statusCode", 200);
        if !(100..=599).contains(&status_code) {
            return Err(HandlerError::validation(format!(
                "invalid status code {status_code}"
            )));
        }

        let mut headers = ctx
            .config_value("headers")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);

        let configured_body = ctx.config_value("body").cloned();
        let (body, default_content_type) = match ctx.config_str("bodyMode").unwrap_or("auto") {
            "json" => (configured_body.unwrap_or(Value::Null), "application/json"),
            "text" => (
                Value::String(
                    configured_body
                        .map(|value| coerce_string(&value))
                        .unwrap_or_default(),
                ),
                "text/plain",
            ),
            "input" => (ctx.input().clone(), "application/json"),
            _ => match configured_body {
                Some(body) if !body.is_null() => (body, "application/json"),
                _ => (ctx.input().clone(), "application/json"),
            },
        };

        if !headers.keys().any(|key| key.eq_ignore_ascii_case("content-type")) {
            headers.insert(
                "Content-Type".to_owned(),
                Value::String(default_content_type.to_owned()),
            );
        }

        let response = json!({
            "statusCode": status_code,
            "headers": headers,
            "body": body,
        });

        Ok(NodeExecutionResult::success(response.clone())
            .with_metadata(json!({"_webhookResponse": response})))
    }
}
