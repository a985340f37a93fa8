//! Timed suspension.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
    PauseRequest,
};

use crate::util::passthrough_with;

/// Pauses the execution for a configured span of time.
///
/// First invocation emits a timer pause with `scheduledResumeAt`; the
/// resumed invocation passes the input through plus
/// `_waitInfo{waitedMs, resumedAt}`.
pub struct Wait {
    meta: HandlerMetadata,
}

impl Wait {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "amount": {"type": "number", "default": 1},
                "unit": {
                    "type": "string",
                    "enum": ["milliseconds", "seconds", "minutes", "hours", "days"],
                    "default": "seconds",
                },
            },
        });
        Self {
            meta: HandlerMetadata::new("wait", "Wait", "Suspend for a span of time")
                .with_category("flow")
                .with_icon("clock")
                .with_config_schema(schema),
        }
    }

    fn wait_millis(ctx: &NodeExecutionContext) -> i64 {
        let amount = ctx.config_f64("amount", 1.0).max(0.0);
        let per_unit = match ctx.config_str("unit").unwrap_or("seconds") {
            "milliseconds" => 1.0,
            "minutes" => 60_000.0,
            "hours" => 3_600_000.0,
            "days" => 86_400_000.0,
            _ => 1_000.0,
        };
        (amount * per_unit) as i64
    }
}

impl Default for Wait {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Wait {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let wait_ms = Self::wait_millis(ctx);

        if let Some(resume_data) = ctx.resume_data() {
            let resumed_at = Utc::now();
            let waited_ms = resume_data
                .get("pausedAt")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
                .map_or(wait_ms, |paused_at| {
                    (resumed_at - paused_at).num_milliseconds()
                });

            return Ok(NodeExecutionResult::success(passthrough_with(
                ctx,
                [(
                    "_waitInfo".to_owned(),
                    json!({
                        "waitedMs": waited_ms,
                        "resumedAt": resumed_at.to_rfc3339(),
                    }),
                )],
            )));
        }

        let paused_at = Utc::now();
        let resume_at = paused_at + ChronoDuration::milliseconds(wait_ms);
        Ok(NodeExecutionResult::pause(PauseRequest::timer(
            resume_at,
            json!({
                "pausedAt": paused_at.to_rfc3339(),
                "waitMs": wait_ms,
            }),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;
    use weft_handler::ResumeKind;

    #[tokio::test]
    async fn first_invocation_pauses_with_schedule() {
        let c = ctx(
            "wait",
            json!({"amount": 5, "unit": "minutes"}),
            json!({"x": 1}),
        );
        let result = Wait::new().execute(&c).await.unwrap();

        match result {
            NodeExecutionResult::Pause(request) => {
                assert_eq!(request.resume_kind, ResumeKind::Timer);
                assert_eq!(request.payload["waitMs"], 300_000);
                let resume_at = request.scheduled_resume_at.unwrap();
                assert!(resume_at > Utc::now());
            }
            other => panic!("expected Pause, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unit_conversions() {
        for (unit, expected_ms) in [
            ("milliseconds", 2),
            ("seconds", 2_000),
            ("minutes", 120_000),
            ("hours", 7_200_000),
            ("days", 172_800_000),
        ] {
            let c = ctx("wait", json!({"amount": 2, "unit": unit}), json!({}));
            let result = Wait::new().execute(&c).await.unwrap();
            match result {
                NodeExecutionResult::Pause(request) => {
                    assert_eq!(request.payload["waitMs"], expected_ms, "unit {unit}");
                }
                other => panic!("expected Pause, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn resumed_invocation_passes_through_with_wait_info() {
        let c = ctx(
            "wait",
            json!({"amount": 50, "unit": "milliseconds"}),
            json!({"x": 1}),
        );
        let paused_at = (Utc::now() - ChronoDuration::milliseconds(80)).to_rfc3339();
        c.set_global("_resumeData", json!({"pausedAt": paused_at}));

        let result = Wait::new().execute(&c).await.unwrap();
        let output = result.output().unwrap();
        assert_eq!(output["x"], 1);
        assert!(output["_waitInfo"]["waitedMs"].as_i64().unwrap() >= 80);
        assert!(output["_waitInfo"]["resumedAt"].is_string());
    }

    #[tokio::test]
    async fn resume_without_paused_at_uses_configured_wait() {
        let c = ctx(
            "wait",
            json!({"amount": 1, "unit": "seconds"}),
            json!({}),
        );
        c.set_global("_resumeData", json!({}));

        let result = Wait::new().execute(&c).await.unwrap();
        assert_eq!(result.output().unwrap()["_waitInfo"]["waitedMs"], 1000);
    }
}
