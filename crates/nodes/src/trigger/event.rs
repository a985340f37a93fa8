//! Event-seeded triggers: webhook, form submission, inbound email.

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

fn event_or_sample(ctx: &NodeExecutionContext, sample: Value) -> Value {
    match ctx.input() {
        Value::Object(map) if !map.is_empty() => ctx.input().clone(),
        _ => sample,
    }
}

/// Started by an inbound HTTP request on the flow's webhook URL.
pub struct WebhookTrigger {
    meta: HandlerMetadata,
}

impl WebhookTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Webhook path suffix"},
                "method": {"type": "string", "enum": ["GET", "POST", "PUT"], "default": "POST"},
            },
        });
        Self {
            meta: HandlerMetadata::new("webhookTrigger", "Webhook Trigger", "Start on an HTTP call")
                .with_category("trigger")
                .with_icon("webhook")
                .with_config_schema(schema)
                .trigger(),
        }
    }
}

impl Default for WebhookTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for WebhookTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        Ok(NodeExecutionResult::success(event_or_sample(
            ctx,
            json!({
                "method": "POST",
                "headers": {"content-type": "application/json"},
                "query": {},
                "body": {"sample": true},
            }),
        )))
    }
}

/// Started by a hosted form submission.
pub struct FormTrigger {
    meta: HandlerMetadata,
}

impl FormTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "fields": {"type": "array", "description": "Field definitions for the hosted form"},
            },
        });
        Self {
            meta: HandlerMetadata::new("formTrigger", "Form Trigger", "Start on a form submission")
                .with_category("trigger")
                .with_icon("clipboard-list")
                .with_config_schema(schema)
                .trigger(),
        }
    }
}

impl Default for FormTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for FormTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        Ok(NodeExecutionResult::success(event_or_sample(
            ctx,
            json!({"formData": {"name": "Sample", "email": "sample@example.com"}}),
        )))
    }
}

/// Started by an inbound email.
pub struct EmailTrigger {
    meta: HandlerMetadata,
}

impl EmailTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: HandlerMetadata::new("emailTrigger", "Email Trigger", "Start on an inbound email")
                .with_category("trigger")
                .with_icon("mail")
                .trigger(),
        }
    }
}

impl Default for EmailTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for EmailTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        Ok(NodeExecutionResult::success(event_or_sample(
            ctx,
            json!({
                "from": "sender@example.com",
                "subject": "Sample subject",
                "body": "Sample body",
            }),
        )))
    }
}
