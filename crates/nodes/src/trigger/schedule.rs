//! Cron schedule trigger.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use serde_json::{json, Value};
use weft_handler::{
    ConfigValidation, HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult,
    NodeHandler,
};

/// Fired by the scheduler on a cron expression.
///
/// Validates the expression and timezone and reports `nextExecution`.
/// Five-field expressions are accepted by prepending a seconds field.
pub struct ScheduleTrigger {
    meta: HandlerMetadata,
}

impl ScheduleTrigger {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "cron": {"type": "string", "description": "Cron expression (5 or 6 fields)"},
                "timezone": {"type": "string", "default": "UTC"},
            },
            "required": ["cron"],
        });
        Self {
            meta: HandlerMetadata::new("scheduleTrigger", "Schedule Trigger", "Start on a cron schedule")
                .with_category("trigger")
                .with_icon("calendar-clock")
                .with_config_schema(schema)
                .trigger(),
        }
    }

    fn parse_schedule(expression: &str) -> Result<Schedule, HandlerError> {
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.to_owned()
        };
        Schedule::from_str(&normalized)
            .map_err(|err| HandlerError::validation(format!("invalid cron expression: {err}")))
    }

    fn parse_timezone(name: &str) -> Result<Tz, HandlerError> {
        name.parse::<Tz>()
            .map_err(|_| HandlerError::validation(format!("invalid timezone `{name}`")))
    }
}

impl Default for ScheduleTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ScheduleTrigger {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    fn validate_config(&self, config: &Value) -> ConfigValidation {
        let mut errors = weft_handler::schema::validate_config(config, &self.metadata().config_schema);
        if let Some(expression) = config.get("cron").and_then(Value::as_str) {
            if let Err(err) = Self::parse_schedule(expression) {
                errors.push(err.message);
            }
        }
        if let Some(timezone) = config.get("timezone").and_then(Value::as_str) {
            if let Err(err) = Self::parse_timezone(timezone) {
                errors.push(err.message);
            }
        }
        ConfigValidation::with_errors(errors)
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let expression = ctx
            .config_str("cron")
            .ok_or_else(|| HandlerError::validation("missing required field `cron`"))?;
        let schedule = Self::parse_schedule(expression)?;
        let timezone = Self::parse_timezone(ctx.config_str("timezone").unwrap_or("UTC"))?;

        let next_execution = schedule
            .upcoming(timezone)
            .next()
            .map(|at| at.to_rfc3339());

        let mut output = match ctx.input() {
            Value::Object(map) if !map.is_empty() => ctx.input().clone(),
            _ => json!({
                "triggeredBy": "schedule",
                "firedAt": Utc::now().to_rfc3339(),
            }),
        };
        output["nextExecution"] = next_execution.map_or(Value::Null, Value::String);

        Ok(NodeExecutionResult::success(output))
    }
}
