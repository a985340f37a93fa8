//! Failure-catching trigger.

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Catches failures propagating through the execution.
///
/// The engine seeds this trigger with `{_error: {nodeId, kind, message}}`
/// when a node's failure reaches it; the subgraph behind it becomes the
/// flow's error path.
pub struct ErrorTrigger {
    meta: HandlerMetadata,
}

impl ErrorTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: HandlerMetadata::new("errorTrigger", "Error Trigger", "Run a path when a node fails")
                .with_category("trigger")
                .with_icon("alert-triangle")
                .trigger(),
        }
    }
}

impl Default for ErrorTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ErrorTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let output = match ctx.input().get("_error") {
            Some(error) => json!({
                "error": error.clone(),
                "caughtAt": chrono::Utc::now().to_rfc3339(),
            }),
            None => match ctx.input() {
                Value::Object(map) if !map.is_empty() => ctx.input().clone(),
                _ => json!({
                    "error": {
                        "nodeId": null,
                        "kind": "internal",
                        "message": "Sample error",
                    },
                }),
            },
        };
        Ok(NodeExecutionResult::success(output))
    }
}
