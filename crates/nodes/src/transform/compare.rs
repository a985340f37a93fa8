//! Keyed dataset comparison.

use std::collections::BTreeSet;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Diffs two datasets joined on a key field.
///
/// Emits `{matched, changed, added, removed}`: `added` items exist only
/// in B, `removed` only in A, `changed` carries per-field differences.
/// `mode=all` keeps every bucket; `changedOnly` drops `matched`.
pub struct CompareDatasets {
    meta: HandlerMetadata,
}

impl CompareDatasets {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "fieldA": {"type": "string", "default": "datasetA"},
                "fieldB": {"type": "string", "default": "datasetB"},
                "key": {"type": "string", "description": "Join key inside each item"},
                "mode": {"type": "string", "enum": ["all", "changedOnly"], "default": "all"},
            },
            "required": ["key"],
        });
        Self {
            meta: HandlerMetadata::new("compareDatasets", "Compare Datasets", "Diff two keyed datasets")
                .with_category("transform")
                .with_icon("diff")
                .with_config_schema(schema),
        }
    }

    fn index_by_key<'a>(items: &'a [Value], key: &str) -> IndexMap<String, &'a Value> {
        let mut indexed = IndexMap::new();
        for item in items {
            if let Some(value) = get_path(item, key) {
                // First occurrence wins on key collision.
                indexed.entry(coerce_string(value)).or_insert(item);
            }
        }
        indexed
    }

    fn field_differences(a: &Value, b: &Value) -> Vec<Value> {
        let mut fields = BTreeSet::new();
        if let Some(map) = a.as_object() {
            fields.extend(map.keys().cloned());
        }
        if let Some(map) = b.as_object() {
            fields.extend(map.keys().cloned());
        }

        let mut differences = Vec::new();
        for field in fields {
            let old_value = a.get(&field).cloned().unwrap_or(Value::Null);
            let new_value = b.get(&field).cloned().unwrap_or(Value::Null);
            if old_value != new_value {
                differences.push(json!({
                    "field": field,
                    "oldValue": old_value,
                    "newValue": new_value,
                }));
            }
        }
        differences
    }
}

impl Default for CompareDatasets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for CompareDatasets {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let key = ctx
            .config_str("key")
            .ok_or_else(|| HandlerError::validation("missing required field `key`"))?
            .to_owned();

        let field_a = ctx.config_str("fieldA").unwrap_or("datasetA");
        let field_b = ctx.config_str("fieldB").unwrap_or("datasetB");
        let dataset_a = get_path(ctx.input(), field_a)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let dataset_b = get_path(ctx.input(), field_b)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let index_a = Self::index_by_key(&dataset_a, &key);
        let index_b = Self::index_by_key(&dataset_b, &key);

        let mut matched = Vec::new();
        let mut changed = Vec::new();
        let mut removed = Vec::new();

        for (item_key, item_a) in &index_a {
            match index_b.get(item_key) {
                Some(item_b) => {
                    let differences = Self::field_differences(item_a, item_b);
                    if differences.is_empty() {
                        matched.push((*item_a).clone());
                    } else {
                        changed.push(json!({
                            "key": item_key,
                            "differences": differences,
                        }));
                    }
                }
                None => removed.push((*item_a).clone()),
            }
        }

        let added: Vec<Value> = index_b
            .iter()
            .filter(|(item_key, _)| !index_a.contains_key(*item_key))
            .map(|(_, item)| (*item).clone())
            .collect();

        let mut output = json!({
            "changed": changed,
            "added": added,
            "removed": removed,
        });
        if ctx.config_str("mode").unwrap_or("all") != "changedOnly" {
            output["matched"] = json!(matched);
        }

        Ok(NodeExecutionResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;

    async fn run(config: Value, input: Value) -> Value {
        let ctx = ctx("compareDatasets", config, input);
        CompareDatasets::new()
            .execute(&ctx)
            .await
            .unwrap()
            .output()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn changed_detection_scenario() {
        // A = [{id:1,name:Alice,age:25}], B = same but age 30.
        let output = run(
            json!({"key": "id", "mode": "all"}),
            json!({
                "datasetA": [{"id": "1", "name": "Alice", "age": 25}],
                "datasetB": [{"id": "1", "name": "Alice", "age": 30}],
            }),
        )
        .await;

        assert_eq!(
            output["changed"],
            json!([{
                "key": "1",
                "differences": [{"field": "age", "oldValue": 25, "newValue": 30}],
            }])
        );
        assert_eq!(output["matched"], json!([]));
        assert_eq!(output["added"], json!([]));
        assert_eq!(output["removed"], json!([]));
    }

    #[tokio::test]
    async fn added_and_removed() {
        let output = run(
            json!({"key": "id"}),
            json!({
                "datasetA": [{"id": 1}, {"id": 2}],
                "datasetB": [{"id": 2}, {"id": 3}],
            }),
        )
        .await;

        assert_eq!(output["removed"], json!([{"id": 1}]));
        assert_eq!(output["added"], json!([{"id": 3}]));
        assert_eq!(output["matched"], json!([{"id": 2}]));
        assert_eq!(output["changed"], json!([]));
    }

    #[tokio::test]
    async fn changed_only_mode_drops_matched() {
        let output = run(
            json!({"key": "id", "mode": "changedOnly"}),
            json!({
                "datasetA": [{"id": 1}],
                "datasetB": [{"id": 1}],
            }),
        )
        .await;
        assert!(output.get("matched").is_none());
    }

    #[tokio::test]
    async fn key_compare_is_coerced() {
        // id 1 (number) joins id "1" (string).
        let output = run(
            json!({"key": "id"}),
            json!({
                "datasetA": [{"id": 1, "v": "x"}],
                "datasetB": [{"id": "1", "v": "x"}],
            }),
        )
        .await;
        // The id fields themselves differ as values, so this lands in changed.
        assert_eq!(output["changed"].as_array().unwrap().len(), 1);
        assert_eq!(output["added"], json!([]));
        assert_eq!(output["removed"], json!([]));
    }

    #[tokio::test]
    async fn missing_key_config_is_validation_error() {
        let c = ctx("compareDatasets", json!({}), json!({}));
        let err = CompareDatasets::new().execute(&c).await.unwrap_err();
        assert_eq!(err.kind, weft_handler::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn items_without_key_are_ignored() {
        let output = run(
            json!({"key": "id"}),
            json!({
                "datasetA": [{"noKey": true}],
                "datasetB": [],
            }),
        )
        .await;
        assert_eq!(output["removed"], json!([]));
    }
}
