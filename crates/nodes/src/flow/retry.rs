//! Retry gate fed by upstream failures.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};
use weft_resilience::Backoff;

use crate::util::passthrough_with;

/// Drives re-entry of a failing predecessor with back-off.
///
/// On first entry (no `_error` in the input) the node is a passthrough
/// that advertises its policy under `_retryConfig`. When the engine loops
/// a failure back in (input carries `_error`), the handler increments
/// `_retryAttempt` and emits `{_retryAttempt, _retryDelay}` for the
/// engine to honour. Once the attempt count reaches `maxRetries` the
/// handler fails for good.
pub struct Retry {
    meta: HandlerMetadata,
}

impl Retry {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "maxRetries": {"type": "integer", "default": 3},
                "strategy": {
                    "type": "string",
                    "enum": ["fixed", "linear", "exponential", "jitter"],
                    "default": "exponential",
                },
                "initialDelayMs": {"type": "integer", "default": 1000},
                "multiplier": {"type": "number", "default": 2},
            },
        });
        Self {
            meta: HandlerMetadata::new("retry", "Retry", "Re-enter a failing node with back-off")
                .with_category("flow")
                .with_icon("rotate-ccw")
                .with_config_schema(schema),
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Retry {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let max_retries = ctx.config_u64("maxRetries", 3);
        let strategy = ctx.config_str("strategy").unwrap_or("exponential");
        let initial = Duration::from_millis(ctx.config_u64("initialDelayMs", 1000));
        let multiplier = ctx.config_f64("multiplier", 2.0);

        let Some(error) = ctx.input().get("_error").cloned() else {
            // First pass: nothing failed yet, advertise the policy.
            return Ok(NodeExecutionResult::success(passthrough_with(
                ctx,
                [(
                    "_retryConfig".to_owned(),
                    json!({
                        "maxRetries": max_retries,
                        "strategy": strategy,
                        "initialDelayMs": initial.as_millis() as u64,
                        "multiplier": multiplier,
                    }),
                )],
            )));
        };

        let previous_attempts = ctx
            .input()
            .get("_retryAttempt")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        if previous_attempts >= max_retries {
            return Err(HandlerError::internal(format!(
                "Max retries ({max_retries}) exceeded"
            ))
            .with_partial_output(error));
        }

        let attempt = previous_attempts + 1;
        let backoff = Backoff::from_config(strategy, initial, multiplier);
        let delay = backoff.delay_for(attempt as u32);

        Ok(NodeExecutionResult::success(passthrough_with(
            ctx,
            [
                ("_retryAttempt".to_owned(), json!(attempt)),
                ("_retryDelay".to_owned(), json!(delay.as_millis() as u64)),
            ],
        )))
    }
}
