//! Combining predecessor branches into one payload.

use async_trait::async_trait;
use serde_json::{Map, Value};
use weft_core::value::deep_merge;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Merges the branch-keyed inputs the engine assembles for it.
///
/// Modes:
///
/// - `append` — flatten lists, append scalars, skip nulls
/// - `combine` — deep-merge maps; non-map values land under their input key
/// - `multiplex` — echo all inputs as a map
/// - `chooseBranch` — first non-null input in insertion order
///
/// Output lands under `merged` unless `outputKey` overrides. The handler
/// declares `multi_port_input`, so its input arrives keyed by inbound
/// branch rather than pre-merged.
pub struct Merge {
    meta: HandlerMetadata,
}

impl Merge {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["append", "combine", "multiplex", "chooseBranch"],
                    "default": "append",
                },
                "outputKey": {"type": "string", "default": "merged"},
            },
        });
        Self {
            meta: HandlerMetadata::new("merge", "Merge", "Combine inputs from several branches")
                .with_category("flow")
                .with_icon("git-merge")
                .with_config_schema(schema)
                .multi_port(),
        }
    }

    fn merge_append(inputs: &Map<String, Value>) -> Value {
        let mut merged = Vec::new();
        for value in inputs.values() {
            match value {
                Value::Null => {}
                Value::Array(items) => merged.extend(items.iter().cloned()),
                other => merged.push(other.clone()),
            }
        }
        Value::Array(merged)
    }

    fn merge_combine(inputs: &Map<String, Value>) -> Value {
        let mut combined = Value::Object(Map::new());
        for (key, value) in inputs {
            match value {
                Value::Null => {}
                Value::Object(_) => deep_merge(&mut combined, value.clone()),
                other => {
                    // Non-map values keep their input key.
                    deep_merge(
                        &mut combined,
                        Value::Object(Map::from_iter([(key.clone(), other.clone())])),
                    );
                }
            }
        }
        combined
    }

    fn choose_branch(inputs: &Map<String, Value>) -> Value {
        inputs
            .values()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl Default for Merge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Merge {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let inputs = match ctx.input() {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => Map::from_iter([("in".to_owned(), other.clone())]),
        };

        let mode = ctx.config_str("mode").unwrap_or("append");
        let merged = match mode {
            "combine" => Self::merge_combine(&inputs),
            "multiplex" => Value::Object(inputs.clone()),
            "chooseBranch" => Self::choose_branch(&inputs),
            _ => Self::merge_append(&inputs),
        };

        let output_key = ctx.config_str("outputKey").unwrap_or("merged");
        Ok(NodeExecutionResult::success(Value::Object(Map::from_iter(
            [(output_key.to_owned(), merged)],
        ))))
    }
}
