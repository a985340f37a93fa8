//! State machine transition validation.

use crate::error::ExecutionError;
use crate::status::{ExecutionStatus, NodeState};

/// Returns `true` if the execution-level transition is valid.
#[must_use]
pub fn can_transition_execution(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    matches!(
        (from, to),
        (ExecutionStatus::Pending, ExecutionStatus::Running)
            | (ExecutionStatus::Pending, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Running, ExecutionStatus::Paused)
            | (ExecutionStatus::Running, ExecutionStatus::Completed)
            | (ExecutionStatus::Running, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Paused, ExecutionStatus::Running)
            | (ExecutionStatus::Paused, ExecutionStatus::Cancelled)
    )
}

/// Validate an execution-level transition.
pub fn validate_execution_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), ExecutionError> {
    if can_transition_execution(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Returns `true` if the node-level transition is valid.
///
/// `Failed → Ready` is the retry re-entry edge; `Paused → Running` is
/// resume.
#[must_use]
pub fn can_transition_node(from: NodeState, to: NodeState) -> bool {
    matches!(
        (from, to),
        (NodeState::Pending, NodeState::Ready)
            | (NodeState::Pending, NodeState::Skipped)
            | (NodeState::Pending, NodeState::Cancelled)
            | (NodeState::Ready, NodeState::Running)
            | (NodeState::Ready, NodeState::Skipped)
            | (NodeState::Ready, NodeState::Cancelled)
            | (NodeState::Running, NodeState::Succeeded)
            | (NodeState::Running, NodeState::Failed)
            | (NodeState::Running, NodeState::Paused)
            | (NodeState::Running, NodeState::Cancelled)
            | (NodeState::Paused, NodeState::Running)
            | (NodeState::Paused, NodeState::Cancelled)
            | (NodeState::Failed, NodeState::Ready)
            | (NodeState::Failed, NodeState::Cancelled)
    )
}

/// Validate a node-level transition.
pub fn validate_node_transition(from: NodeState, to: NodeState) -> Result<(), ExecutionError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_execution_transitions() {
        assert!(can_transition_execution(
            ExecutionStatus::Pending,
            ExecutionStatus::Running
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Paused
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Paused,
            ExecutionStatus::Running
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Completed
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Failed
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Paused,
            ExecutionStatus::Cancelled
        ));
    }

    #[test]
    fn invalid_execution_transitions() {
        assert!(!can_transition_execution(
            ExecutionStatus::Pending,
            ExecutionStatus::Completed
        ));
        assert!(!can_transition_execution(
            ExecutionStatus::Completed,
            ExecutionStatus::Running
        ));
        assert!(!can_transition_execution(
            ExecutionStatus::Cancelled,
            ExecutionStatus::Running
        ));
    }

    #[test]
    fn valid_node_transitions() {
        assert!(can_transition_node(NodeState::Pending, NodeState::Ready));
        assert!(can_transition_node(NodeState::Ready, NodeState::Running));
        assert!(can_transition_node(
            NodeState::Running,
            NodeState::Succeeded
        ));
        assert!(can_transition_node(NodeState::Running, NodeState::Paused));
        assert!(can_transition_node(NodeState::Paused, NodeState::Running));
        assert!(can_transition_node(NodeState::Failed, NodeState::Ready));
        assert!(can_transition_node(NodeState::Pending, NodeState::Skipped));
    }

    #[test]
    fn invalid_node_transitions() {
        assert!(!can_transition_node(NodeState::Pending, NodeState::Running));
        assert!(!can_transition_node(
            NodeState::Succeeded,
            NodeState::Running
        ));
        assert!(!can_transition_node(NodeState::Skipped, NodeState::Ready));
        assert!(!can_transition_node(
            NodeState::Cancelled,
            NodeState::Running
        ));
    }

    #[test]
    fn validate_wraps_errors() {
        let err = validate_node_transition(NodeState::Succeeded, NodeState::Running).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));

        assert!(validate_execution_transition(
            ExecutionStatus::Pending,
            ExecutionStatus::Running
        )
        .is_ok());
    }
}
