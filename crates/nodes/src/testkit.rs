//! Shared helpers for handler unit tests.

use serde_json::Value;
use weft_core::{ExecutionId, FlowId, NodeId, UserId};
use weft_handler::NodeExecutionContext;

/// A context with fresh ids, the given config, and the given input.
pub(crate) fn ctx(node_key: &str, config: Value, input: Value) -> NodeExecutionContext {
    NodeExecutionContext::new(
        ExecutionId::new(),
        FlowId::new(),
        UserId::new(),
        NodeId::new(),
        node_key,
    )
    .with_config(config)
    .with_input(input)
}
