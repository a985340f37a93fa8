//! Per-item filtering over a list.

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::value::get_path;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

use crate::util::items_from_input;

/// Applies the condition operator set to every item of a list.
///
/// Emits `{filtered, rejected, count, rejectedCount}`. An unknown
/// operator lets all items through.
pub struct Filter {
    meta: HandlerMetadata,
}

impl Filter {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "arrayField": {"type": "string", "description": "Path to the list; omit to use the whole input"},
                "field": {"type": "string", "description": "Path inside each item"},
                "operator": {"type": "string", "default": "equals"},
                "value": {"description": "Comparison value"},
            },
        });
        Self {
            meta: HandlerMetadata::new("filter", "Filter", "Keep items matching a comparison")
                .with_category("flow")
                .with_icon("funnel")
                .with_config_schema(schema),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Filter {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let items = items_from_input(ctx, ctx.config_str("arrayField"));
        let field = ctx.config_str("field").unwrap_or_default();
        let operator = ctx.config_str("operator").unwrap_or("equals");
        let expected = ctx.config_value("value").cloned().unwrap_or(Value::Null);

        let mut filtered = Vec::new();
        let mut rejected = Vec::new();
        for item in items {
            let actual = get_path(&item, field);
            // Unknown operator keeps the item.
            let keep = crate::operators::evaluate(actual, operator, &expected).unwrap_or(true);
            if keep {
                filtered.push(item);
            } else {
                rejected.push(item);
            }
        }

        Ok(NodeExecutionResult::success(json!({
            "filtered": filtered,
            "rejected": rejected,
            "count": filtered.len(),
            "rejectedCount": rejected.len(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;

    async fn run(config: Value, input: Value) -> Value {
        let ctx = ctx("filter", config, input);
        Filter::new()
            .execute(&ctx)
            .await
            .unwrap()
            .output()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn splits_matching_and_rejected() {
        let output = run(
            json!({"arrayField": "users", "field": "age", "operator": "greaterThan", "value": 18}),
            json!({"users": [
                {"name": "a", "age": 25},
                {"name": "b", "age": 12},
                {"name": "c", "age": 30},
            ]}),
        )
        .await;

        assert_eq!(output["count"], 2);
        assert_eq!(output["rejectedCount"], 1);
        assert_eq!(output["filtered"][0]["name"], "a");
        assert_eq!(output["rejected"][0]["name"], "b");
    }

    #[tokio::test]
    async fn unknown_operator_keeps_everything() {
        let output = run(
            json!({"field": "x", "operator": "mystery", "value": 1}),
            json!([{"x": 1}, {"x": 2}]),
        )
        .await;
        assert_eq!(output["count"], 2);
        assert_eq!(output["rejectedCount"], 0);
    }

    #[tokio::test]
    async fn idempotent_for_same_predicate() {
        let config = json!({"field": "v", "operator": "lessThan", "value": 10});
        let first = run(config.clone(), json!([{"v": 5}, {"v": 50}, {"v": 7}])).await;
        let second = run(config, first["filtered"].clone()).await;
        assert_eq!(second["filtered"], first["filtered"]);
        assert_eq!(second["rejectedCount"], 0);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_lists() {
        let output = run(json!({"field": "x", "operator": "equals", "value": 1}), json!([])).await;
        assert_eq!(output["count"], 0);
        assert_eq!(output["filtered"], json!([]));
    }

    #[tokio::test]
    async fn scalar_input_wraps_to_single_item() {
        let output = run(
            json!({"field": "", "operator": "equals", "value": "x"}),
            json!("x"),
        )
        .await;
        assert_eq!(output["count"], 1);
    }
}
