//! Date and time arithmetic and formatting.

use async_trait::async_trait;
use chrono::{DateTime as ChronoDateTime, Duration, Utc};
use serde_json::{json, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Date/time operations: `now`, `format`, `parse`, `add`, `subtract`,
/// `diff`.
///
/// Timestamps travel as RFC 3339 strings in UTC; `format` accepts a
/// strftime pattern.
pub struct DateTime {
    meta: HandlerMetadata,
}

impl DateTime {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "x-multi-operation": true,
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["now", "format", "parse", "add", "subtract", "diff"],
                    "default": "now",
                },
                "field": {"type": "string", "description": "Source path; defaults to input.date"},
                "otherField": {"type": "string", "description": "Second timestamp path for diff"},
                "format": {"type": "string", "default": "%Y-%m-%dT%H:%M:%S%z"},
                "amount": {"type": "number", "default": 0},
                "unit": {
                    "type": "string",
                    "enum": ["milliseconds", "seconds", "minutes", "hours", "days"],
                    "default": "seconds",
                },
            },
        });
        Self {
            meta: HandlerMetadata::new("dateTime", "Date & Time", "Format and shift timestamps")
                .with_category("transform")
                .with_icon("calendar")
                .with_config_schema(schema),
        }
    }

    fn read_timestamp(
        ctx: &NodeExecutionContext,
        path: &str,
    ) -> Result<ChronoDateTime<Utc>, HandlerError> {
        let raw = get_path(ctx.input(), path)
            .map(coerce_string)
            .unwrap_or_default();
        raw.parse::<ChronoDateTime<Utc>>()
            .or_else(|_| {
                ChronoDateTime::parse_from_rfc3339(&raw).map(|parsed| parsed.with_timezone(&Utc))
            })
            .map_err(|_| HandlerError::validation(format!("invalid timestamp `{raw}`")))
    }

    fn shift_duration(ctx: &NodeExecutionContext) -> Duration {
        let amount = ctx.config_f64("amount", 0.0);
        let millis = match ctx.config_str("unit").unwrap_or("seconds") {
            "milliseconds" => amount,
            "minutes" => amount * 60_000.0,
            "hours" => amount * 3_600_000.0,
            "days" => amount * 86_400_000.0,
            _ => amount * 1_000.0,
        };
        Duration::milliseconds(millis as i64)
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for DateTime {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let field = ctx.config_str("field").unwrap_or("date");
        let output = match ctx.config_str("operation").unwrap_or("now") {
            "format" => {
                let timestamp = Self::read_timestamp(ctx, field)?;
                let pattern = ctx.config_str("format").unwrap_or("%Y-%m-%dT%H:%M:%S%z");
                json!({"formatted": timestamp.format(pattern).to_string()})
            }
            "parse" => {
                let timestamp = Self::read_timestamp(ctx, field)?;
                json!({
                    "date": timestamp.to_rfc3339(),
                    "epochMs": timestamp.timestamp_millis(),
                })
            }
            "add" => {
                let timestamp = Self::read_timestamp(ctx, field)? + Self::shift_duration(ctx);
                json!({"date": timestamp.to_rfc3339()})
            }
            "subtract" => {
                let timestamp = Self::read_timestamp(ctx, field)? - Self::shift_duration(ctx);
                json!({"date": timestamp.to_rfc3339()})
            }
            "diff" => {
                let left = Self::read_timestamp(ctx, field)?;
                let other_field = ctx.config_str("otherField").unwrap_or("other");
                let right = Self::read_timestamp(ctx, other_field)?;
                let diff = right - left;
                json!({
                    "diffMs": diff.num_milliseconds(),
                    "diffSeconds": diff.num_seconds(),
                    "diffDays": diff.num_days(),
                })
            }
            _ => {
                let now = Utc::now();
                json!({"date": now.to_rfc3339(), "epochMs": now.timestamp_millis()})
            }
        };
        Ok(NodeExecutionResult::success(output))
    }
}
