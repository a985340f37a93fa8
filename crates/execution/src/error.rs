//! Errors from execution state tracking and the pause journal.

/// Errors from execution state operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A state machine transition that the tables forbid.
    #[error("invalid transition from `{from}` to `{to}`")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The rejected target state.
        to: String,
    },

    /// A node id that is not part of this execution.
    #[error("unknown node `{0}` in execution")]
    UnknownNode(String),

    /// No pause record exists for the given execution/node pair.
    #[error("no pause record for execution `{execution_id}` node `{node_id}`")]
    PauseNotFound {
        /// The execution searched.
        execution_id: String,
        /// The node searched.
        node_id: String,
    },

    /// The journal backend failed.
    #[error("journal error: {0}")]
    Journal(String),

    /// A stored record failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The journal backend hit an I/O failure.
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
}
