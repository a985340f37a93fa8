//! Loop and split-out: fan a collection into downstream passes.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Resolve the items a split-style handler iterates.
///
/// Lists pass through; maps split into `{key, value}` entries; strings
/// split on `delimiter` with trimming and empty segments dropped; other
/// scalars wrap into a single-element list.
fn split_source(ctx: &NodeExecutionContext, field: Option<&str>, delimiter: &str) -> Vec<Value> {
    let source = match field {
        Some(path) if !path.is_empty() => weft_core::value::get_path(ctx.input(), path).cloned(),
        _ => Some(ctx.input().clone()),
    };
    match source {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| json!({"key": key, "value": value}))
            .collect(),
        Some(Value::String(text)) => text
            .split(delimiter)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| Value::String(segment.to_owned()))
            .collect(),
        Some(other) => vec![other],
    }
}

/// Annotate each item with `{index, total, isFirst, isLast}`.
///
/// Object items get the keys merged in; anything else wraps under `value`.
fn annotate_items(items: Vec<Value>) -> Vec<Value> {
    let total = items.len();
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut map = match item {
                Value::Object(map) => map,
                other => Map::from_iter([("value".to_owned(), other)]),
            };
            map.insert("index".to_owned(), json!(index));
            map.insert("total".to_owned(), json!(total));
            map.insert("isFirst".to_owned(), json!(index == 0));
            map.insert("isLast".to_owned(), json!(index == total - 1));
            Value::Object(map)
        })
        .collect()
}

/// Partition items into contiguous batches and build the batch envelopes.
fn make_batches(items: Vec<Value>, batch_size: usize) -> Vec<Value> {
    let batch_size = batch_size.max(1);
    let total_items = items.len();
    let total_batches = total_items.div_ceil(batch_size);

    items
        .chunks(batch_size)
        .enumerate()
        .map(|(batch_index, chunk)| {
            json!({
                "batchIndex": batch_index,
                "itemsInBatch": chunk.len(),
                "totalBatches": total_batches,
                "totalItems": total_items,
                "items": chunk,
            })
        })
        .collect()
}

/// Batch a collection and fan each batch into the downstream subgraph.
///
/// An empty collection emits nothing and succeeds.
pub struct Loop {
    meta: HandlerMetadata,
}

impl Loop {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "arrayField": {"type": "string", "description": "Path to the collection"},
                "batchSize": {"type": "integer", "default": 1},
                "includeIndex": {"type": "boolean", "default": false},
                "delimiter": {"type": "string", "default": ","},
            },
        });
        Self {
            meta: HandlerMetadata::new("loop", "Loop Over Items", "Fan batches into the downstream graph")
                .with_category("flow")
                .with_icon("repeat")
                .with_config_schema(schema),
        }
    }
}

impl Default for Loop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Loop {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let delimiter = ctx.config_str("delimiter").unwrap_or(",").to_owned();
        let mut items = split_source(ctx, ctx.config_str("arrayField"), &delimiter);
        if ctx.config_bool("includeIndex", false) {
            items = annotate_items(items);
        }
        let batch_size = ctx.config_u64("batchSize", 1).max(1) as usize;
        Ok(NodeExecutionResult::fan_out(make_batches(items, batch_size)))
    }
}

/// Split one field into per-item downstream passes.
///
/// The single-item cousin of [`Loop`]: every emission carries exactly one
/// item.
pub struct SplitOut {
    meta: HandlerMetadata,
}

impl SplitOut {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "fieldPath": {"type": "string", "description": "Path to the value to split"},
                "includeIndex": {"type": "boolean", "default": false},
                "delimiter": {"type": "string", "default": ","},
            },
        });
        Self {
            meta: HandlerMetadata::new("splitOut", "Split Out", "One downstream pass per item")
                .with_category("flow")
                .with_icon("scissors")
                .with_config_schema(schema),
        }
    }
}

impl Default for SplitOut {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for SplitOut {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let delimiter = ctx.config_str("delimiter").unwrap_or(",").to_owned();
        let mut items = split_source(ctx, ctx.config_str("fieldPath"), &delimiter);
        if ctx.config_bool("includeIndex", false) {
            items = annotate_items(items);
        }
        Ok(NodeExecutionResult::fan_out(make_batches(items, 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;

    async fn run_loop(config: Value, input: Value) -> Vec<Value> {
        let ctx = ctx("loop", config, input);
        match Loop::new().execute(&ctx).await.unwrap() {
            NodeExecutionResult::FanOut { emissions } => emissions,
            other => panic!("expected FanOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batches_partition_contiguously() {
        let emissions = run_loop(
            json!({"arrayField": "items", "batchSize": 2}),
            json!({"items": [1, 2, 3, 4, 5]}),
        )
        .await;

        assert_eq!(emissions.len(), 3);
        assert_eq!(emissions[0]["totalItems"], 5);
        assert_eq!(emissions[0]["totalBatches"], 3);
        assert_eq!(emissions[0]["items"], json!([1, 2]));
        assert_eq!(emissions[1]["items"], json!([3, 4]));
        // The last batch may be short.
        assert_eq!(emissions[2]["itemsInBatch"], 1);
        assert_eq!(emissions[2]["items"], json!([5]));
    }

    #[tokio::test]
    async fn batch_totals_law() {
        let emissions = run_loop(
            json!({"arrayField": "xs", "batchSize": 3}),
            json!({"xs": (0..10).collect::<Vec<_>>()}),
        )
        .await;

        let sum: u64 = emissions
            .iter()
            .map(|batch| batch["itemsInBatch"].as_u64().unwrap())
            .sum();
        assert_eq!(sum, 10);
        assert_eq!(emissions.len(), 10usize.div_ceil(3));
    }

    #[tokio::test]
    async fn empty_array_emits_nothing() {
        let emissions = run_loop(json!({"arrayField": "xs"}), json!({"xs": []})).await;
        assert!(emissions.is_empty());
    }

    #[tokio::test]
    async fn scalar_wraps_to_single_item() {
        let emissions = run_loop(json!({"arrayField": "x"}), json!({"x": 42})).await;
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0]["items"], json!([42]));
    }

    #[tokio::test]
    async fn map_splits_to_key_value_entries() {
        let emissions = run_loop(
            json!({"arrayField": "obj", "batchSize": 10}),
            json!({"obj": {"a": 1, "b": 2}}),
        )
        .await;
        assert_eq!(emissions.len(), 1);
        assert_eq!(
            emissions[0]["items"],
            json!([{"key": "a", "value": 1}, {"key": "b", "value": 2}])
        );
    }

    #[tokio::test]
    async fn string_splits_on_delimiter() {
        let emissions = run_loop(
            json!({"arrayField": "csv", "batchSize": 10, "delimiter": ","}),
            json!({"csv": " a , b ,, c "}),
        )
        .await;
        assert_eq!(emissions[0]["items"], json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn include_index_annotates_items() {
        let emissions = run_loop(
            json!({"arrayField": "xs", "includeIndex": true, "batchSize": 10}),
            json!({"xs": [{"v": 1}, {"v": 2}, {"v": 3}]}),
        )
        .await;

        let items = emissions[0]["items"].as_array().unwrap();
        assert_eq!(items[0]["index"], 0);
        assert_eq!(items[0]["isFirst"], true);
        assert_eq!(items[0]["isLast"], false);
        assert_eq!(items[2]["isLast"], true);
        assert_eq!(items[1]["total"], 3);
        assert_eq!(items[1]["v"], 2);
    }

    #[tokio::test]
    async fn include_index_wraps_scalars() {
        let emissions = run_loop(
            json!({"arrayField": "xs", "includeIndex": true, "batchSize": 10}),
            json!({"xs": [7, 8]}),
        )
        .await;
        let items = emissions[0]["items"].as_array().unwrap();
        assert_eq!(items[0]["value"], 7);
        assert_eq!(items[0]["index"], 0);
    }

    #[tokio::test]
    async fn batch_size_zero_clamps_to_one() {
        let emissions = run_loop(
            json!({"arrayField": "xs", "batchSize": 0}),
            json!({"xs": [1, 2]}),
        )
        .await;
        assert_eq!(emissions.len(), 2);
    }

    #[tokio::test]
    async fn split_out_is_one_item_per_emission() {
        let ctx = ctx(
            "splitOut",
            json!({"fieldPath": "tags"}),
            json!({"tags": ["a", "b", "c"]}),
        );
        let result = SplitOut::new().execute(&ctx).await.unwrap();
        match result {
            NodeExecutionResult::FanOut { emissions } => {
                assert_eq!(emissions.len(), 3);
                assert_eq!(emissions[1]["items"], json!(["b"]));
                assert_eq!(emissions[1]["itemsInBatch"], 1);
            }
            other => panic!("expected FanOut, got {other:?}"),
        }
    }
}
