//! Execution state tracking for flows and individual nodes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use weft_core::{ExecutionId, FlowId, NodeId, UserId};
use weft_handler::ErrorKind;

use crate::error::ExecutionError;
use crate::status::{ExecutionStatus, NodeState};
use crate::transition::{validate_execution_transition, validate_node_transition};

/// The recorded failure of a node attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    /// Which class of failure this was.
    pub kind: ErrorKind,
    /// The handler's message (full detail; the summary cap applies only
    /// to user-visible surfaces).
    pub message: String,
}

/// The execution record of a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Current state of the node.
    pub state: NodeState,
    /// Number of times a worker has entered this node.
    pub attempts: u32,
    /// The most recent failure, if any.
    #[serde(default)]
    pub last_error: Option<NodeFailure>,
    /// When the first attempt started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node reached a settled state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// The current output, if any.
    #[serde(default)]
    pub output: Option<Value>,
    /// Handler-provided metadata from the last success.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NodeRecord {
    /// A fresh record in the `Pending` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: NodeState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            completed_at: None,
            output: None,
            metadata: None,
        }
    }

    /// Transition to a new state, validating against the transition table.
    ///
    /// Timestamps update as side effects: first `Running` stamps
    /// `started_at` and bumps `attempts`; settled states stamp
    /// `completed_at`.
    pub fn transition_to(&mut self, new_state: NodeState) -> Result<(), ExecutionError> {
        validate_node_transition(self.state, new_state)?;
        self.state = new_state;

        match new_state {
            NodeState::Running => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
                self.attempts += 1;
            }
            NodeState::Succeeded
            | NodeState::Failed
            | NodeState::Skipped
            | NodeState::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete state of one flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Unique identifier for this execution.
    pub execution_id: ExecutionId,
    /// The flow being executed.
    pub flow_id: FlowId,
    /// The owning user.
    pub user_id: UserId,
    /// Current execution status.
    pub status: ExecutionStatus,
    /// Per-node execution records.
    pub node_records: HashMap<NodeId, NodeRecord>,
    /// Execution-scoped variables shared across nodes.
    #[serde(default)]
    pub global_context: Map<String, Value>,
    /// Optimistic concurrency version, bumped on each status change.
    pub version: u64,
    /// When the execution was created.
    pub created_at: DateTime<Utc>,
    /// When the execution started running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the execution reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    /// Create a new execution over the given node set.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        flow_id: FlowId,
        user_id: UserId,
        node_ids: &[NodeId],
    ) -> Self {
        let node_records = node_ids.iter().map(|&id| (id, NodeRecord::new())).collect();
        Self {
            execution_id,
            flow_id,
            user_id,
            status: ExecutionStatus::Pending,
            node_records,
            global_context: Map::new(),
            version: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// A node's record.
    #[must_use]
    pub fn node_record(&self, node_id: NodeId) -> Option<&NodeRecord> {
        self.node_records.get(&node_id)
    }

    /// A node's record, mutably, or an error when the node is unknown.
    pub fn node_record_mut(&mut self, node_id: NodeId) -> Result<&mut NodeRecord, ExecutionError> {
        self.node_records
            .get_mut(&node_id)
            .ok_or_else(|| ExecutionError::UnknownNode(node_id.to_string()))
    }

    /// Replace a node's record wholesale.
    ///
    /// Loop fan-out resets scope records between passes; the transition
    /// table deliberately has no settled-to-pending edge, so replacement
    /// is the supported path.
    pub fn set_node_record(&mut self, node_id: NodeId, record: NodeRecord) {
        self.node_records.insert(node_id, record);
    }

    /// Returns `true` once no node can make further progress.
    #[must_use]
    pub fn all_nodes_settled(&self) -> bool {
        self.node_records.values().all(|record| {
            record.state.is_terminal()
                || record.state == NodeState::Failed
                || record.state == NodeState::Paused
        })
    }

    /// Node ids currently paused.
    #[must_use]
    pub fn paused_node_ids(&self) -> Vec<NodeId> {
        self.node_records
            .iter()
            .filter(|(_, record)| record.state == NodeState::Paused)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Node ids that failed.
    #[must_use]
    pub fn failed_node_ids(&self) -> Vec<NodeId> {
        self.node_records
            .iter()
            .filter(|(_, record)| record.state == NodeState::Failed)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Transition the execution status, bumping the version.
    pub fn transition_status(&mut self, new_status: ExecutionStatus) -> Result<(), ExecutionError> {
        validate_execution_transition(self.status, new_status)?;
        self.status = new_status;
        self.version += 1;

        if new_status == ExecutionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_state() -> (ExecutionState, NodeId, NodeId) {
        let n1 = NodeId::new();
        let n2 = NodeId::new();
        let state = ExecutionState::new(ExecutionId::new(), FlowId::new(), UserId::new(), &[n1, n2]);
        (state, n1, n2)
    }

    #[test]
    fn new_execution_state() {
        let (state, n1, _) = make_state();
        assert_eq!(state.status, ExecutionStatus::Pending);
        assert_eq!(state.version, 0);
        assert_eq!(state.node_records.len(), 2);
        assert_eq!(state.node_record(n1).unwrap().state, NodeState::Pending);
    }

    #[test]
    fn node_lifecycle_stamps_timestamps() {
        let mut record = NodeRecord::new();
        record.transition_to(NodeState::Ready).unwrap();
        assert!(record.started_at.is_none());

        record.transition_to(NodeState::Running).unwrap();
        assert!(record.started_at.is_some());
        assert_eq!(record.attempts, 1);

        record.transition_to(NodeState::Succeeded).unwrap();
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn retry_reentry_counts_attempts() {
        let mut record = NodeRecord::new();
        record.transition_to(NodeState::Ready).unwrap();
        record.transition_to(NodeState::Running).unwrap();
        record.transition_to(NodeState::Failed).unwrap();
        record.transition_to(NodeState::Ready).unwrap();
        record.transition_to(NodeState::Running).unwrap();
        assert_eq!(record.attempts, 2);
    }

    #[test]
    fn invalid_node_transition_is_rejected() {
        let mut record = NodeRecord::new();
        let err = record.transition_to(NodeState::Succeeded).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
        assert_eq!(record.state, NodeState::Pending);
    }

    #[test]
    fn unknown_node_record() {
        let (mut state, _, _) = make_state();
        let missing = NodeId::new();
        assert!(state.node_record_mut(missing).is_err());
    }

    #[test]
    fn settled_detection() {
        let (mut state, n1, n2) = make_state();
        assert!(!state.all_nodes_settled());

        state.node_records.get_mut(&n1).unwrap().state = NodeState::Succeeded;
        state.node_records.get_mut(&n2).unwrap().state = NodeState::Paused;
        assert!(state.all_nodes_settled());
        assert_eq!(state.paused_node_ids(), vec![n2]);
    }

    #[test]
    fn failed_node_ids() {
        let (mut state, n1, _) = make_state();
        state.node_records.get_mut(&n1).unwrap().state = NodeState::Failed;
        assert_eq!(state.failed_node_ids(), vec![n1]);
    }

    #[test]
    fn status_transition_bumps_version() {
        let (mut state, _, _) = make_state();
        state.transition_status(ExecutionStatus::Running).unwrap();
        assert_eq!(state.version, 1);
        assert!(state.started_at.is_some());

        state.transition_status(ExecutionStatus::Completed).unwrap();
        assert_eq!(state.version, 2);
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn invalid_status_transition_leaves_version() {
        let (mut state, _, _) = make_state();
        assert!(state
            .transition_status(ExecutionStatus::Completed)
            .is_err());
        assert_eq!(state.version, 0);
    }

    #[test]
    fn serde_roundtrip() {
        let (mut state, n1, _) = make_state();
        state.global_context.insert("k".into(), json!(1));
        state.node_records.get_mut(&n1).unwrap().output = Some(json!({"a": 1}));

        let json = serde_json::to_string(&state).unwrap();
        let back: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, state.execution_id);
        assert_eq!(back.node_records.len(), 2);
        assert_eq!(back.global_context["k"], json!(1));
    }
}
