//! The per-invocation input envelope handed to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use weft_core::{value, ExecutionId, FlowId, NodeId, UserId};

use crate::error::HandlerError;

/// Key under which resume data is surfaced in the global context.
pub const RESUME_DATA_KEY: &str = "_resumeData";

/// Everything a handler sees for one invocation.
///
/// Constructed by the engine before dispatch: the node's config has already
/// been expression-resolved, and `input` is the merged predecessor output
/// described by the input-assembly rules. Handlers **must** call
/// [`check_cancelled`](Self::check_cancelled) in long-running loops.
#[derive(Clone)]
pub struct NodeExecutionContext {
    /// Unique execution run identifier.
    pub execution_id: ExecutionId,
    /// Flow this execution belongs to.
    pub flow_id: FlowId,
    /// User who owns the execution.
    pub user_id: UserId,
    /// Node in the flow graph being executed.
    pub node_id: NodeId,
    /// The node's type key (e.g. `"condition"`).
    pub node_key: String,
    /// Expression-resolved node configuration.
    config: Value,
    /// Merged predecessor output.
    input: Value,
    /// Raw predecessor outputs keyed by node id.
    previous_outputs: HashMap<NodeId, Value>,
    /// Shared execution-scoped variables (carries `_resumeData`).
    globals: Arc<RwLock<Map<String, Value>>>,
    /// Cancellation signal, checked cooperatively.
    cancellation: CancellationToken,
    /// Wall-clock deadline for the whole execution.
    deadline: Option<DateTime<Utc>>,
}

impl NodeExecutionContext {
    /// Create a context for the given node invocation.
    pub fn new(
        execution_id: ExecutionId,
        flow_id: FlowId,
        user_id: UserId,
        node_id: NodeId,
        node_key: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            flow_id,
            user_id,
            node_id,
            node_key: node_key.into(),
            config: Value::Object(Map::new()),
            input: Value::Object(Map::new()),
            previous_outputs: HashMap::new(),
            globals: Arc::new(RwLock::new(Map::new())),
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Attach the resolved node config.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Attach the merged input.
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Attach the raw predecessor outputs.
    #[must_use]
    pub fn with_previous_outputs(mut self, outputs: HashMap<NodeId, Value>) -> Self {
        self.previous_outputs = outputs;
        self
    }

    /// Share an existing globals map.
    #[must_use]
    pub fn with_globals(mut self, globals: Arc<RwLock<Map<String, Value>>>) -> Self {
        self.globals = globals;
        self
    }

    /// Attach a pre-existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Set the execution deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The resolved node configuration.
    #[must_use]
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// The merged predecessor output.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Raw predecessor outputs keyed by node id.
    #[must_use]
    pub fn previous_outputs(&self) -> &HashMap<NodeId, Value> {
        &self.previous_outputs
    }

    /// The execution deadline, if one is set.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// The cancellation token for this execution.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // ── Config accessors ────────────────────────────────────────────────────

    /// A string config field, if present and a string.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// A config field coerced to boolean, or the given default.
    #[must_use]
    pub fn config_bool(&self, key: &str, default: bool) -> bool {
        self.config
            .get(key)
            .and_then(value::coerce_bool)
            .unwrap_or(default)
    }

    /// A config field coerced to `u64`, or the given default.
    #[must_use]
    pub fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get(key)
            .and_then(value::coerce_f64)
            .filter(|f| *f >= 0.0)
            .map_or(default, |f| f as u64)
    }

    /// A config field coerced to `f64`, or the given default.
    #[must_use]
    pub fn config_f64(&self, key: &str, default: f64) -> f64 {
        self.config
            .get(key)
            .and_then(value::coerce_f64)
            .unwrap_or(default)
    }

    /// An arbitrary config field.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    // ── Globals ─────────────────────────────────────────────────────────────

    /// Read a global variable.
    #[must_use]
    pub fn global(&self, key: &str) -> Option<Value> {
        self.globals.read().get(key).cloned()
    }

    /// Write a global variable, overwriting any existing value.
    pub fn set_global(&self, key: &str, value: Value) {
        self.globals.write().insert(key.to_owned(), value);
    }

    /// The resume payload, when the engine is re-entering a paused node.
    #[must_use]
    pub fn resume_data(&self) -> Option<Value> {
        self.global(RESUME_DATA_KEY)
    }

    // ── Cancellation ────────────────────────────────────────────────────────

    /// Check whether execution has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::cancelled`] once the token has triggered.
    pub fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.cancellation.is_cancelled() {
            Err(HandlerError::cancelled())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for NodeExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("flow_id", &self.flow_id)
            .field("node_id", &self.node_id)
            .field("node_key", &self.node_key)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
