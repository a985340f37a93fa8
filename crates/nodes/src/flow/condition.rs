//! Two-way branch on a field comparison.

use async_trait::async_trait;
use weft_core::value::get_path;
use weft_handler::{
    HandlerError, HandlerMetadata, InterfaceDefinition, NodeExecutionContext, NodeExecutionResult,
    NodeHandler,
};

/// Routes to the `true` or `false` branch based on one comparison.
///
/// Output is a passthrough of the input; the routing decision travels in
/// `branches`. Exactly one of the two branches is always followed — an
/// unknown operator takes `false`.
pub struct Condition {
    meta: HandlerMetadata,
}

impl Condition {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "field": {"type": "string", "description": "Dotted path into the input"},
                "operator": {
                    "type": "string",
                    "enum": [
                        "equals", "notEquals", "contains", "notContains",
                        "startsWith", "endsWith", "greaterThan", "lessThan",
                        "greaterOrEqual", "lessOrEqual", "isEmpty", "isNotEmpty",
                        "isTrue", "isFalse", "regex", "exists", "notExists",
                    ],
                    "default": "equals",
                },
                "value": {"description": "Comparison value"},
            },
            "required": ["field"],
        });
        Self {
            meta: HandlerMetadata::new("condition", "Condition", "Route by comparing a field")
                .with_category("flow")
                .with_icon("git-branch")
                .with_config_schema(schema)
                .with_ports(InterfaceDefinition::branching(&["true", "false"])),
        }
    }

    fn decide(&self, ctx: &NodeExecutionContext) -> bool {
        let field = ctx.config_str("field").unwrap_or_default();
        let operator = ctx.config_str("operator").unwrap_or("equals");
        let expected = ctx
            .config_value("value")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let actual = get_path(ctx.input(), field);
        crate::operators::evaluate(actual, operator, &expected).unwrap_or(false)
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Condition {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let branch = if self.decide(ctx) { "true" } else { "false" };
        Ok(NodeExecutionResult::with_branches(
            ctx.input().clone(),
            vec![branch.to_owned()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use weft_core::{ExecutionId, FlowId, NodeId, UserId};

    async fn run(config: Value, input: Value) -> NodeExecutionResult {
        let ctx = NodeExecutionContext::new(
            ExecutionId::new(),
            FlowId::new(),
            UserId::new(),
            NodeId::new(),
            "condition",
        )
        .with_config(config)
        .with_input(input);
        Condition::new().execute(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn equals_routes_true() {
        let result = run(
            json!({"field": "status", "operator": "equals", "value": "active"}),
            json!({"status": "active"}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["true".to_owned()][..]));
        assert_eq!(result.output(), Some(&json!({"status": "active"})));
    }

    #[tokio::test]
    async fn equals_routes_false() {
        let result = run(
            json!({"field": "status", "operator": "equals", "value": "inactive"}),
            json!({"status": "active"}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["false".to_owned()][..]));
    }

    #[tokio::test]
    async fn numeric_coercion_in_equals() {
        let result = run(
            json!({"field": "count", "operator": "equals", "value": "42"}),
            json!({"count": 42}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["true".to_owned()][..]));
    }

    #[tokio::test]
    async fn unknown_operator_routes_false() {
        let result = run(
            json!({"field": "x", "operator": "wibble", "value": 1}),
            json!({"x": 1}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["false".to_owned()][..]));
    }

    #[tokio::test]
    async fn missing_field_with_exists() {
        let result = run(
            json!({"field": "missing", "operator": "exists"}),
            json!({"present": 1}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["false".to_owned()][..]));

        let result = run(
            json!({"field": "missing", "operator": "notExists"}),
            json!({"present": 1}),
        )
        .await;
        assert_eq!(result.branches(), Some(&["true".to_owned()][..]));
    }

    #[tokio::test]
    async fn exactly_one_branch_always() {
        for operator in ["equals", "greaterThan", "regex", "nonsense", "isEmpty"] {
            let result = run(
                json!({"field": "a", "operator": operator, "value": "x"}),
                json!({"a": "y"}),
            )
            .await;
            let branches = result.branches().unwrap();
            assert_eq!(branches.len(), 1, "operator {operator}");
            assert!(branches[0] == "true" || branches[0] == "false");
        }
    }

    #[test]
    fn config_schema_validates_operator_enum() {
        let handler = Condition::new();
        let bad = handler.validate_config(&json!({"field": "x", "operator": "bogus"}));
        assert!(!bad.valid);

        let good = handler.validate_config(&json!({"field": "x", "operator": "regex"}));
        assert!(good.valid);
    }
}
