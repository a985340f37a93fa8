//! Multi-way routing over an ordered rule list.

use async_trait::async_trait;
use serde_json::Value;
use weft_core::value::get_path;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Routes to `rule_i` for the first matching rule, else to `fallback`.
///
/// Each rule reuses the condition operator set. Rules are evaluated in
/// config order; evaluation stops at the first match.
pub struct Switch {
    meta: HandlerMetadata,
}

impl Switch {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "rules": {
                    "type": "array",
                    "description": "Ordered rules of {field, operator, value}",
                },
                "fallbackBranch": {
                    "type": "string",
                    "default": "fallback",
                    "description": "Branch taken when no rule matches",
                },
            },
            "required": ["rules"],
        });
        Self {
            meta: HandlerMetadata::new("switch", "Switch", "Route by the first matching rule")
                .with_category("flow")
                .with_icon("shuffle")
                .with_config_schema(schema),
        }
    }
}

impl Default for Switch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Switch {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let rules = ctx
            .config_value("rules")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (index, rule) in rules.iter().enumerate() {
            let field = rule.get("field").and_then(Value::as_str).unwrap_or_default();
            let operator = rule
                .get("operator")
                .and_then(Value::as_str)
                .unwrap_or("equals");
            let expected = rule.get("value").cloned().unwrap_or(Value::Null);
            let actual = get_path(ctx.input(), field);

            if crate::operators::evaluate(actual, operator, &expected).unwrap_or(false) {
                return Ok(NodeExecutionResult::with_branches(
                    ctx.input().clone(),
                    vec![format!("rule_{index}")],
                ));
            }
        }

        let fallback = ctx.config_str("fallbackBranch").unwrap_or("fallback");
        Ok(NodeExecutionResult::with_branches(
            ctx.input().clone(),
            vec![fallback.to_owned()],
        ))
    }
}
