//! The execution-level and node-level state machines.

use serde::{Deserialize, Serialize};

/// The overall status of a flow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not yet started.
    Pending,
    /// Actively running nodes.
    Running,
    /// Suspended on one or more pause gates.
    Paused,
    /// All reachable nodes finished successfully.
    Completed,
    /// A failure propagated to the end of the graph.
    Failed,
    /// Cancelled by request.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` once the execution has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The state of one node within a running execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting for predecessors.
    Pending,
    /// All required predecessors succeeded; queued for a worker.
    Ready,
    /// A worker is executing the handler.
    Running,
    /// The handler returned success.
    Succeeded,
    /// The handler failed (possibly awaiting a retry re-entry).
    Failed,
    /// Durably suspended on a pause gate.
    Paused,
    /// Every live inbound branch bypassed this node.
    Skipped,
    /// The execution was cancelled before or during this node.
    Cancelled,
}

impl NodeState {
    /// Returns `true` once the node can no longer run in this execution.
    ///
    /// `Failed` is not terminal: a retry successor may re-enter the node.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped | Self::Cancelled)
    }

    /// Returns `true` while the node occupies a worker.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
