//! List utilities: limit, aggregate, summarize, reverse.

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::value::{coerce_f64, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

use crate::util::items_from_input;

/// List housekeeping operations behind one type key.
///
/// The schema varies by `operation`, so the handler carries the
/// `x-multi-operation` marker for the config editor.
pub struct ItemLists {
    meta: HandlerMetadata,
}

impl ItemLists {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "x-multi-operation": true,
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["limit", "aggregate", "summarize", "reverse"],
                    "default": "limit",
                },
                "arrayField": {"type": "string"},
                "maxItems": {"type": "integer", "default": 10},
                "keep": {"type": "string", "enum": ["first", "last"], "default": "first"},
                "field": {"type": "string", "description": "Field used by aggregate/summarize"},
                "aggregation": {
                    "type": "string",
                    "enum": ["count", "sum", "min", "max", "average"],
                    "default": "count",
                },
            },
            "required": ["operation"],
        });
        Self {
            meta: HandlerMetadata::new("itemLists", "Item Lists", "Limit, aggregate, and reshape lists")
                .with_category("transform")
                .with_icon("list")
                .with_config_schema(schema),
        }
    }

    fn summarize(values: &[f64], aggregation: &str) -> Value {
        match aggregation {
            "sum" => json!(values.iter().sum::<f64>()),
            "min" => json!(values.iter().copied().fold(f64::INFINITY, f64::min)),
            "max" => json!(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            "average" => {
                if values.is_empty() {
                    Value::Null
                } else {
                    json!(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            _ => json!(values.len()),
        }
    }
}

impl Default for ItemLists {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ItemLists {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let items = items_from_input(ctx, ctx.config_str("arrayField"));
        let field = ctx.config_str("field").unwrap_or_default();

        let output = match ctx.config_str("operation").unwrap_or("limit") {
            "aggregate" => {
                let collected: Vec<Value> = items
                    .iter()
                    .filter_map(|item| get_path(item, field))
                    .cloned()
                    .collect();
                let count = collected.len();
                json!({"aggregated": collected, "count": count})
            }
            "summarize" => {
                let aggregation = ctx.config_str("aggregation").unwrap_or("count");
                let values: Vec<f64> = if aggregation == "count" {
                    Vec::new()
                } else {
                    items
                        .iter()
                        .filter_map(|item| get_path(item, field).and_then(coerce_f64))
                        .collect()
                };
                let result = if aggregation == "count" {
                    json!(items.len())
                } else if values.is_empty() {
                    Value::Null
                } else {
                    Self::summarize(&values, aggregation)
                };
                json!({"result": result, "aggregation": aggregation, "count": items.len()})
            }
            "reverse" => {
                let reversed: Vec<Value> = items.into_iter().rev().collect();
                let count = reversed.len();
                json!({"items": reversed, "count": count})
            }
            _ => {
                let max_items = ctx.config_u64("maxItems", 10) as usize;
                let total = items.len();
                let kept: Vec<Value> = if ctx.config_str("keep") == Some("last") {
                    items.into_iter().skip(total.saturating_sub(max_items)).collect()
                } else {
                    items.into_iter().take(max_items).collect()
                };
                let count = kept.len();
                json!({"items": kept, "count": count, "totalItems": total})
            }
        };

        Ok(NodeExecutionResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;

    async fn run(config: Value, input: Value) -> Value {
        let ctx = ctx("itemLists", config, input);
        ItemLists::new()
            .execute(&ctx)
            .await
            .unwrap()
            .output()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn limit_keeps_first() {
        let output = run(
            json!({"operation": "limit", "maxItems": 2}),
            json!([1, 2, 3, 4]),
        )
        .await;
        assert_eq!(output["items"], json!([1, 2]));
        assert_eq!(output["totalItems"], 4);
    }

    #[tokio::test]
    async fn limit_keeps_last() {
        let output = run(
            json!({"operation": "limit", "maxItems": 2, "keep": "last"}),
            json!([1, 2, 3, 4]),
        )
        .await;
        assert_eq!(output["items"], json!([3, 4]));
    }

    #[tokio::test]
    async fn aggregate_collects_field() {
        let output = run(
            json!({"operation": "aggregate", "field": "name"}),
            json!([{"name": "a"}, {"name": "b"}, {"other": 1}]),
        )
        .await;
        assert_eq!(output["aggregated"], json!(["a", "b"]));
        assert_eq!(output["count"], 2);
    }

    #[tokio::test]
    async fn summarize_operations() {
        let input = json!([{"v": 2}, {"v": 4}, {"v": 6}]);
        for (aggregation, expected) in [
            ("count", json!(3)),
            ("sum", json!(12.0)),
            ("min", json!(2.0)),
            ("max", json!(6.0)),
            ("average", json!(4.0)),
        ] {
            let output = run(
                json!({"operation": "summarize", "field": "v", "aggregation": aggregation}),
                input.clone(),
            )
            .await;
            assert_eq!(output["result"], expected, "aggregation {aggregation}");
        }
    }

    #[tokio::test]
    async fn summarize_no_numeric_values_is_null() {
        let output = run(
            json!({"operation": "summarize", "field": "v", "aggregation": "sum"}),
            json!([{"v": "abc"}]),
        )
        .await;
        assert_eq!(output["result"], Value::Null);
    }

    #[tokio::test]
    async fn reverse_inverts_order() {
        let output = run(json!({"operation": "reverse"}), json!([1, 2, 3])).await;
        assert_eq!(output["items"], json!([3, 2, 1]));
    }

    #[test]
    fn schema_carries_multi_operation_marker() {
        let handler = ItemLists::new();
        assert_eq!(
            handler.metadata().config_schema["x-multi-operation"],
            json!(true)
        );
    }
}
