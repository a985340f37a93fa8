//! Duplicate removal.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

use crate::util::items_from_input;

/// Removes duplicate items, keeping first occurrences.
///
/// With `compareKey` set, items are considered equal when the key's
/// string rendering matches; otherwise the whole item's canonical JSON is
/// the identity. Composing the handler with itself is the identity.
pub struct RemoveDuplicates {
    meta: HandlerMetadata,
}

impl RemoveDuplicates {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "arrayField": {"type": "string"},
                "compareKey": {"type": "string", "description": "Path inside each item; empty compares whole items"},
            },
        });
        Self {
            meta: HandlerMetadata::new("removeDuplicates", "Remove Duplicates", "Drop repeated items")
                .with_category("transform")
                .with_icon("copy-x")
                .with_config_schema(schema),
        }
    }
}

impl Default for RemoveDuplicates {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for RemoveDuplicates {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let items = items_from_input(ctx, ctx.config_str("arrayField"));
        let compare_key = ctx.config_str("compareKey").unwrap_or_default();

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut removed = 0usize;
        for item in items {
            let identity = if compare_key.is_empty() {
                item.to_string()
            } else {
                get_path(&item, compare_key)
                    .map(coerce_string)
                    .unwrap_or_default()
            };
            if seen.insert(identity) {
                unique.push(item);
            } else {
                removed += 1;
            }
        }

        let count = unique.len();
        Ok(NodeExecutionResult::success(json!({
            "unique": unique,
            "count": count,
            "removedCount": removed,
        })))
    }
}
