//! The durable pause record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_core::{ExecutionId, NodeId};
use weft_handler::{PauseRequest, ResumeKind};

/// Durable suspension state for one paused node.
///
/// Created when a handler returns a pause, held by the journal until the
/// node resumes, destroyed on resume or cancellation. The serialized
/// (camelCase) layout is a **stable external interface** — approval UIs
/// and webhook services consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRecord {
    /// The suspended execution.
    pub execution_id: ExecutionId,
    /// The suspended node.
    pub node_id: NodeId,
    /// When the pause was recorded.
    pub created_at: DateTime<Utc>,
    /// What the node is waiting for.
    pub resume_kind: ResumeKind,
    /// Token an external system must present to resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token: Option<String>,
    /// Handler state to hand back on resume.
    pub payload: Value,
    /// When the engine should resume on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_resume_at: Option<DateTime<Utc>>,
}

impl PauseRecord {
    /// Build a record from a handler's pause request.
    #[must_use]
    pub fn from_request(
        execution_id: ExecutionId,
        node_id: NodeId,
        request: PauseRequest,
    ) -> Self {
        Self {
            execution_id,
            node_id,
            created_at: Utc::now(),
            resume_kind: request.resume_kind,
            external_token: request.external_token,
            payload: request.payload,
            scheduled_resume_at: request.scheduled_resume_at,
        }
    }

    /// The journal key for this record.
    #[must_use]
    pub fn key(&self) -> String {
        record_key(self.execution_id, self.node_id)
    }
}

/// The journal key for an execution/node pair.
#[must_use]
pub fn record_key(execution_id: ExecutionId, node_id: NodeId) -> String {
    format!("{execution_id}:{node_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn from_request_copies_fields() {
        let execution_id = ExecutionId::new();
        let node_id = NodeId::new();
        let request = PauseRequest::approval("tok-9", json!({"message": "ok?"}));

        let record = PauseRecord::from_request(execution_id, node_id, request);
        assert_eq!(record.execution_id, execution_id);
        assert_eq!(record.node_id, node_id);
        assert_eq!(record.resume_kind, ResumeKind::Approval);
        assert_eq!(record.external_token.as_deref(), Some("tok-9"));
        assert_eq!(record.payload, json!({"message": "ok?"}));
        assert!(record.scheduled_resume_at.is_none());
    }

    #[test]
    fn stable_camel_case_layout() {
        let record = PauseRecord::from_request(
            ExecutionId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            NodeId::parse("550e8400-e29b-41d4-a716-446655440001").unwrap(),
            PauseRequest::form("form-3", json!({"fields": ["name"]})),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["executionId"], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(value["nodeId"], "550e8400-e29b-41d4-a716-446655440001");
        assert_eq!(value["resumeKind"], "form");
        assert_eq!(value["externalToken"], "form-3");
        assert_eq!(value["payload"]["fields"][0], "name");
        assert!(value.get("scheduledResumeAt").is_none());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn key_is_execution_colon_node() {
        let execution_id = ExecutionId::new();
        let node_id = NodeId::new();
        let record =
            PauseRecord::from_request(execution_id, node_id, PauseRequest::manual(json!({})));
        assert_eq!(record.key(), format!("{execution_id}:{node_id}"));
    }

    #[test]
    fn serde_roundtrip() {
        let record = PauseRecord::from_request(
            ExecutionId::new(),
            NodeId::new(),
            PauseRequest::timer(Utc::now(), json!({"waitMs": 100})),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: PauseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
