//! Execution results carrying data and flow-control intent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type alias for branch labels (`"out"`, `"true"`, `"approved"`, …).
pub type BranchKey = String;

/// The branch the engine follows when a handler names none.
pub const DEFAULT_BRANCH: &str = "out";

/// What kind of external input a paused node is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeKind {
    /// A scheduled point in time.
    Timer,
    /// A human approval decision.
    Approval,
    /// A submitted form payload.
    Form,
    /// An explicit resume call with arbitrary data.
    Manual,
}

impl std::fmt::Display for ResumeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer => write!(f, "timer"),
            Self::Approval => write!(f, "approval"),
            Self::Form => write!(f, "form"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A handler's request to durably suspend its node.
///
/// The engine turns this into a pause record in the journal; the payload
/// travels verbatim and comes back on resume for whoever services the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseRequest {
    /// What the node is waiting for.
    pub resume_kind: ResumeKind,
    /// Token an external system must present to resume (approval links,
    /// form ids, webhook callbacks).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token: Option<String>,
    /// Arbitrary state the handler wants back on resume.
    pub payload: Value,
    /// When the engine should resume on its own (timers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_resume_at: Option<DateTime<Utc>>,
}

impl PauseRequest {
    /// A pause waiting for a point in time.
    pub fn timer(resume_at: DateTime<Utc>, payload: Value) -> Self {
        Self {
            resume_kind: ResumeKind::Timer,
            external_token: None,
            payload,
            scheduled_resume_at: Some(resume_at),
        }
    }

    /// A pause waiting for a human decision.
    pub fn approval(token: impl Into<String>, payload: Value) -> Self {
        Self {
            resume_kind: ResumeKind::Approval,
            external_token: Some(token.into()),
            payload,
            scheduled_resume_at: None,
        }
    }

    /// A pause waiting for a submitted form.
    pub fn form(token: impl Into<String>, payload: Value) -> Self {
        Self {
            resume_kind: ResumeKind::Form,
            external_token: Some(token.into()),
            payload,
            scheduled_resume_at: None,
        }
    }

    /// A pause waiting for an explicit resume call.
    pub fn manual(payload: Value) -> Self {
        Self {
            resume_kind: ResumeKind::Manual,
            external_token: None,
            payload,
            scheduled_resume_at: None,
        }
    }
}

/// Result of a node execution.
///
/// The engine matches on this to decide what happens next:
///
/// - `Success` → record the output, follow the named branches (or the
///   default branch when none are named)
/// - `FanOut` → run the downstream subgraph once per emission (loops,
///   split-out batches)
/// - `Pause` → write a pause record and freeze the subgraph
///
/// Failures are not a variant; handlers return
/// [`Err(HandlerError)`](crate::HandlerError) and the engine records the
/// failure on the node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeExecutionResult {
    /// Successful completion.
    Success {
        /// The produced output mapping.
        output: Value,
        /// Branch labels to follow; `None` means the default branch.
        branches: Option<Vec<BranchKey>>,
        /// Side-channel data for the engine (rate-limit waits, retry
        /// delays, webhook response shapes).
        metadata: Option<Value>,
    },
    /// One output per downstream pass — loop and split-out batches.
    FanOut {
        /// The batch outputs, in emission order.
        emissions: Vec<Value>,
    },
    /// Durable suspension pending external input.
    Pause(PauseRequest),
}

impl NodeExecutionResult {
    /// Successful completion following the default branch.
    pub fn success(output: Value) -> Self {
        Self::Success {
            output,
            branches: None,
            metadata: None,
        }
    }

    /// Successful completion following the named branches.
    pub fn with_branches(output: Value, branches: Vec<BranchKey>) -> Self {
        Self::Success {
            output,
            branches: Some(branches),
            metadata: None,
        }
    }

    /// Attach engine-facing metadata to a success.
    #[must_use]
    pub fn with_metadata(self, metadata: Value) -> Self {
        match self {
            Self::Success {
                output, branches, ..
            } => Self::Success {
                output,
                branches,
                metadata: Some(metadata),
            },
            other => other,
        }
    }

    /// One output per downstream pass.
    pub fn fan_out(emissions: Vec<Value>) -> Self {
        Self::FanOut { emissions }
    }

    /// Durable suspension.
    pub fn pause(request: PauseRequest) -> Self {
        Self::Pause(request)
    }

    /// Returns `true` for the `Success` variant.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` for the `Pause` variant.
    #[must_use]
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Pause(_))
    }

    /// The output of a `Success`, if that is what this is.
    #[must_use]
    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    /// The branch labels the engine should follow.
    ///
    /// `None` means the handler did not choose, i.e. follow the default.
    #[must_use]
    pub fn branches(&self) -> Option<&[BranchKey]> {
        match self {
            Self::Success { branches, .. } => branches.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn success_defaults() {
        let result = NodeExecutionResult::success(json!({"a": 1}));
        assert!(result.is_success());
        assert!(!result.is_pause());
        assert_eq!(result.output(), Some(&json!({"a": 1})));
        assert_eq!(result.branches(), None);
    }

    #[test]
    fn branches_are_carried() {
        let result = NodeExecutionResult::with_branches(json!({}), vec!["true".into()]);
        assert_eq!(result.branches(), Some(&["true".to_owned()][..]));
    }

    #[test]
    fn metadata_attaches_to_success_only() {
        let result =
            NodeExecutionResult::success(json!({})).with_metadata(json!({"_rateLimiter": {"waitMs": 100}}));
        match result {
            NodeExecutionResult::Success { metadata, .. } => {
                assert_eq!(metadata, Some(json!({"_rateLimiter": {"waitMs": 100}})));
            }
            _ => panic!("expected Success"),
        }

        let pause = NodeExecutionResult::pause(PauseRequest::manual(json!({})))
            .with_metadata(json!({"ignored": true}));
        assert!(pause.is_pause());
    }

    #[test]
    fn fan_out_preserves_order() {
        let result = NodeExecutionResult::fan_out(vec![json!(1), json!(2), json!(3)]);
        match result {
            NodeExecutionResult::FanOut { emissions } => {
                assert_eq!(emissions, vec![json!(1), json!(2), json!(3)]);
            }
            _ => panic!("expected FanOut"),
        }
    }

    #[test]
    fn pause_request_constructors() {
        let at = Utc::now();
        let timer = PauseRequest::timer(at, json!({"waitMs": 50}));
        assert_eq!(timer.resume_kind, ResumeKind::Timer);
        assert_eq!(timer.scheduled_resume_at, Some(at));
        assert!(timer.external_token.is_none());

        let approval = PauseRequest::approval("tok-1", json!({}));
        assert_eq!(approval.resume_kind, ResumeKind::Approval);
        assert_eq!(approval.external_token.as_deref(), Some("tok-1"));

        let manual = PauseRequest::manual(json!(null));
        assert_eq!(manual.resume_kind, ResumeKind::Manual);
    }

    #[test]
    fn pause_record_layout_is_stable() {
        // The serialized shape is an external interface.
        let request = PauseRequest::approval("abc", json!({"message": "approve?"}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["resume_kind"], "approval");
        assert_eq!(value["external_token"], "abc");
        assert_eq!(value["payload"]["message"], "approve?");
        assert!(value.get("scheduled_resume_at").is_none());
    }

    #[test]
    fn resume_kind_display() {
        assert_eq!(ResumeKind::Timer.to_string(), "timer");
        assert_eq!(ResumeKind::Approval.to_string(), "approval");
        assert_eq!(ResumeKind::Form.to_string(), "form");
        assert_eq!(ResumeKind::Manual.to_string(), "manual");
    }

    #[test]
    fn serde_roundtrip() {
        let results = [
            NodeExecutionResult::success(json!({"x": 1})),
            NodeExecutionResult::with_branches(json!({}), vec!["false".into()]),
            NodeExecutionResult::fan_out(vec![json!({"batchIndex": 0})]),
            NodeExecutionResult::pause(PauseRequest::manual(json!({"state": 1}))),
        ];
        for result in &results {
            let json = serde_json::to_string(result).unwrap();
            let back: NodeExecutionResult = serde_json::from_str(&json).unwrap();
            assert_eq!(&back, result);
        }
    }
}
