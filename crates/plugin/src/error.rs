//! Orchestrator and install errors.

use weft_core::TaskId;

/// Errors from container orchestration and install jobs.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No supported runtime answered the availability probe.
    #[error("no container runtime available")]
    NoRuntime,

    /// The image's registry is not on the allow-list.
    #[error("image `{0}` is not from a trusted registry")]
    UntrustedImage(String),

    /// The underlying CLI invocation failed.
    #[error("{command} failed: {detail}")]
    CommandFailed {
        /// The command that failed (`docker pull`, `kubectl run`, …).
        command: String,
        /// First line of the runtime's error output.
        detail: String,
    },

    /// The container never became healthy inside the budget.
    #[error("container `{0}` failed its health check")]
    Unhealthy(String),

    /// Spawning the runtime binary failed.
    #[error("failed to spawn runtime: {0}")]
    Spawn(#[from] std::io::Error),

    /// The runtime's output could not be interpreted.
    #[error("unexpected runtime output: {0}")]
    UnexpectedOutput(String),

    /// The install task does not exist.
    #[error("unknown install task {0}")]
    UnknownTask(TaskId),

    /// The caller does not own the task.
    #[error("task {0} belongs to another user")]
    NotAuthorized(TaskId),

    /// A state machine transition that the tables forbid.
    #[error("invalid install transition from `{from}` to `{to}`")]
    InvalidTransition {
        /// The current status.
        from: String,
        /// The rejected target status.
        to: String,
    },
}
