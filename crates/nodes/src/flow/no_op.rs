//! Identity passthrough.

use async_trait::async_trait;
use serde_json::Value;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Passes its input through untouched.
///
/// Useful as a wiring point in the editor and as the reference for the
/// passthrough law: mapping input comes back unchanged, anything else
/// becomes an empty mapping.
pub struct NoOp {
    meta: HandlerMetadata,
}

impl NoOp {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: HandlerMetadata::new("noOp", "No Operation", "Pass input through unchanged")
                .with_category("flow")
                .with_icon("circle"),
        }
    }
}

impl Default for NoOp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for NoOp {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let output = match ctx.input() {
            Value::Object(_) => ctx.input().clone(),
            _ => Value::Object(serde_json::Map::new()),
        };
        Ok(NodeExecutionResult::success(output))
    }
}
