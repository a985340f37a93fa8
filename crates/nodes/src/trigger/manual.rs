//! Manual run trigger.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Started by a user clicking "run".
///
/// Emits the run request's payload when one was provided, else a stamped
/// sample.
pub struct ManualTrigger {
    meta: HandlerMetadata,
}

impl ManualTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: HandlerMetadata::new("manualTrigger", "Manual Trigger", "Start a flow by hand")
                .with_category("trigger")
                .with_icon("play")
                .trigger(),
        }
    }
}

impl Default for ManualTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ManualTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let output = match ctx.input() {
            Value::Object(map) if !map.is_empty() => ctx.input().clone(),
            _ => json!({
                "triggeredBy": "manual",
                "triggeredAt": Utc::now().to_rfc3339(),
            }),
        };
        Ok(NodeExecutionResult::success(output))
    }
}
