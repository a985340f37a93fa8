//! Field assignment and removal.

use async_trait::async_trait;
use serde_json::Value;
use weft_core::value::set_path;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Sets and removes fields on the passing payload.
///
/// `fields` is a map of dotted path → value (values were already
/// expression-resolved by the engine); `remove` lists top-level keys to
/// drop. `keepOnlySet` discards everything except the assigned fields.
pub struct SetFields {
    meta: HandlerMetadata,
}

impl SetFields {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "fields": {"type": "object", "description": "Dotted path → value"},
                "remove": {"type": "array", "description": "Top-level keys to drop"},
                "keepOnlySet": {"type": "boolean", "default": false},
            },
        });
        Self {
            meta: HandlerMetadata::new("setFields", "Set Fields", "Assign or remove payload fields")
                .with_category("transform")
                .with_icon("edit")
                .with_config_schema(schema),
        }
    }
}

impl Default for SetFields {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for SetFields {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let keep_only_set = ctx.config_bool("keepOnlySet", false);
        let mut output = if keep_only_set || !ctx.input().is_object() {
            Value::Object(serde_json::Map::new())
        } else {
            ctx.input().clone()
        };

        if let Some(fields) = ctx.config_value("fields").and_then(Value::as_object) {
            for (path, value) in fields {
                set_path(&mut output, path, value.clone());
            }
        }

        if let Some(remove) = ctx.config_value("remove").and_then(Value::as_array) {
            if let Some(map) = output.as_object_mut() {
                for key in remove.iter().filter_map(Value::as_str) {
                    map.remove(key);
                }
            }
        }

        Ok(NodeExecutionResult::success(output))
    }
}
