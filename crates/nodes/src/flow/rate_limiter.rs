//! Admission control over the shared rate-limit store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};
use weft_resilience::{Admission, RateLimiterStore};

use crate::util::passthrough_with;

/// Gates throughput through a fixed-window counter.
///
/// The window key defaults to the node id, so every instance gets its own
/// bucket unless configured to share one. Overflow behaviour by `mode`:
///
/// - `delay` — passthrough plus `{_rateLimiter: {waitMs}}`; the engine
///   sleeps before dispatching downstream
/// - `drop` — passthrough with `dropped: true`
/// - `error` — failure `"Rate limit exceeded"`
pub struct RateLimiter {
    meta: HandlerMetadata,
    store: Arc<RateLimiterStore>,
}

impl RateLimiter {
    /// Create the handler over the process-wide store.
    #[must_use]
    pub fn new(store: Arc<RateLimiterStore>) -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Bucket key; defaults to the node id"},
                "windowMs": {"type": "integer", "default": 60000},
                "maxRequests": {"type": "integer", "default": 10},
                "mode": {
                    "type": "string",
                    "enum": ["delay", "drop", "error"],
                    "default": "delay",
                },
            },
        });
        Self {
            meta: HandlerMetadata::new("rateLimiter", "Rate Limiter", "Bound throughput per window")
                .with_category("flow")
                .with_icon("gauge")
                .with_config_schema(schema),
            store,
        }
    }
}

#[async_trait]
impl NodeHandler for RateLimiter {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let node_key = ctx.node_id.to_string();
        let key = ctx.config_str("key").unwrap_or(&node_key);
        let window = Duration::from_millis(ctx.config_u64("windowMs", 60_000));
        let max_requests = ctx.config_u64("maxRequests", 10);

        match self.store.try_acquire(key, window, max_requests) {
            Admission::Allowed { remaining } => Ok(NodeExecutionResult::success(
                passthrough_with(ctx, [("_rateLimitRemaining".to_owned(), json!(remaining))]),
            )),
            Admission::Limited { retry_after } => match ctx.config_str("mode").unwrap_or("delay") {
                "drop" => Ok(NodeExecutionResult::success(passthrough_with(
                    ctx,
                    [("dropped".to_owned(), json!(true))],
                ))),
                "error" => Err(HandlerError::rate_limited("Rate limit exceeded")),
                _ => {
                    let wait_ms = retry_after.as_millis() as u64;
                    Ok(NodeExecutionResult::success(passthrough_with(
                        ctx,
                        [(
                            "_rateLimiter".to_owned(),
                            json!({"waitMs": wait_ms}),
                        )],
                    ))
                    .with_metadata(json!({"_rateLimiter": {"waitMs": wait_ms}})))
                }
            },
        }
    }
}
