//! Engine-level errors.

use weft_core::{ExecutionId, NodeId};

use crate::graph::GraphError;

/// Errors from driving an execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The flow graph failed validation.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A node references a handler key the registry does not know.
    #[error("unknown handler `{key}` for node {node_id}")]
    UnknownHandler {
        /// The unresolvable key.
        key: String,
        /// The node carrying it.
        node_id: NodeId,
    },

    /// The execution id is not tracked by this engine.
    #[error("unknown execution {0}")]
    UnknownExecution(ExecutionId),

    /// Resume was called for a node that is not paused.
    #[error("node {node_id} of execution {execution_id} is not paused")]
    NotPaused {
        /// The execution.
        execution_id: ExecutionId,
        /// The node.
        node_id: NodeId,
    },

    /// The execution is already in a terminal state.
    #[error("execution {0} already finished")]
    AlreadyFinished(ExecutionId),

    /// A handler paused inside a loop fan-out pass.
    #[error("node {0} paused inside a fan-out pass; pauses are only supported outside loops")]
    PauseInFanOut(NodeId),

    /// State bookkeeping failed.
    #[error(transparent)]
    Execution(#[from] weft_execution::ExecutionError),
}
