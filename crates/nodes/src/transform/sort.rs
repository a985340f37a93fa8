//! List sorting by key.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::value::{coerce_f64, coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

use crate::util::items_from_input;

/// Sorts a list by a dotted key, numerically where both sides parse.
///
/// The sort is stable, so sorting twice with the same key and direction
/// equals sorting once.
pub struct Sort {
    meta: HandlerMetadata,
}

impl Sort {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "arrayField": {"type": "string"},
                "sortKey": {"type": "string", "description": "Path inside each item; empty sorts scalars"},
                "direction": {"type": "string", "enum": ["asc", "desc"], "default": "asc"},
            },
        });
        Self {
            meta: HandlerMetadata::new("sort", "Sort", "Order a list by key")
                .with_category("transform")
                .with_icon("arrow-up-down")
                .with_config_schema(schema),
        }
    }

    fn compare(left: &Value, right: &Value, key: &str) -> Ordering {
        let lhs = get_path(left, key);
        let rhs = get_path(right, key);
        match (lhs.and_then(coerce_f64), rhs.and_then(coerce_f64)) {
            (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            _ => {
                let l = lhs.map(coerce_string).unwrap_or_default();
                let r = rhs.map(coerce_string).unwrap_or_default();
                l.cmp(&r)
            }
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Sort {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let mut items = items_from_input(ctx, ctx.config_str("arrayField"));
        let key = ctx.config_str("sortKey").unwrap_or_default().to_owned();
        let descending = ctx.config_str("direction") == Some("desc");

        items.sort_by(|left, right| {
            let ordering = Self::compare(left, right, &key);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let count = items.len();
        Ok(NodeExecutionResult::success(json!({
            "sorted": items,
            "count": count,
        })))
    }
}
