//! Human-in-the-loop gates: approval decisions and form submissions.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
    PauseRequest,
};

use crate::util::passthrough_with;

/// Suspends until a human approves or rejects.
///
/// First invocation emits an approval pause carrying a fresh external
/// token; the collaborator service surfaces it to the approver. The
/// resumed invocation reads `approvalStatus` from the resume data and
/// routes to the configured approved/rejected branch.
pub struct Approval {
    meta: HandlerMetadata,
}

impl Approval {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "default": "Approval required"},
                "approvers": {"type": "array"},
                "approvedBranch": {"type": "string", "default": "approved"},
                "rejectedBranch": {"type": "string", "default": "rejected"},
            },
        });
        Self {
            meta: HandlerMetadata::new("approval", "Approval", "Gate on a human decision")
                .with_category("flow")
                .with_icon("user-check")
                .with_config_schema(schema),
        }
    }
}

impl Default for Approval {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Approval {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let approved_branch = ctx.config_str("approvedBranch").unwrap_or("approved");
        let rejected_branch = ctx.config_str("rejectedBranch").unwrap_or("rejected");

        if let Some(resume_data) = ctx.resume_data() {
            let status = resume_data
                .get("approvalStatus")
                .and_then(Value::as_str)
                .unwrap_or("rejected")
                .to_owned();
            let branch = if status == "approved" {
                approved_branch
            } else {
                rejected_branch
            };

            let mut output = passthrough_with(
                ctx,
                [
                    ("status".to_owned(), json!(status)),
                    ("branch".to_owned(), json!(branch)),
                ],
            );
            if let Some(comment) = resume_data.get("comment") {
                output["comment"] = comment.clone();
            }
            return Ok(NodeExecutionResult::Success {
                output,
                branches: Some(vec![branch.to_owned()]),
                metadata: None,
            });
        }

        let token = Uuid::new_v4().to_string();
        Ok(NodeExecutionResult::pause(PauseRequest::approval(
            token,
            json!({
                "message": ctx.config_str("message").unwrap_or("Approval required"),
                "approvers": ctx.config_value("approvers").cloned().unwrap_or(json!([])),
                "input": ctx.input().clone(),
            }),
        )))
    }
}

/// Suspends until a form is submitted.
///
/// The pause payload carries the field definitions for the collaborator
/// to render; the resumed invocation emits the submitted values under
/// `formData`.
pub struct Form {
    meta: HandlerMetadata,
}

impl Form {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "default": "Form"},
                "fields": {"type": "array", "description": "Field definitions to render"},
            },
        });
        Self {
            meta: HandlerMetadata::new("form", "Form", "Gate on a form submission")
                .with_category("flow")
                .with_icon("clipboard")
                .with_config_schema(schema),
        }
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Form {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        if let Some(resume_data) = ctx.resume_data() {
            return Ok(NodeExecutionResult::success(passthrough_with(
                ctx,
                [("formData".to_owned(), resume_data)],
            )));
        }

        let token = Uuid::new_v4().to_string();
        Ok(NodeExecutionResult::pause(PauseRequest::form(
            token,
            json!({
                "title": ctx.config_str("title").unwrap_or("Form"),
                "fields": ctx.config_value("fields").cloned().unwrap_or(json!([])),
            }),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;
    use weft_handler::ResumeKind;

    #[tokio::test]
    async fn approval_first_call_pauses() {
        let c = ctx(
            "approval",
            json!({"message": "Deploy to prod?"}),
            json!({"build": 42}),
        );
        let result = Approval::new().execute(&c).await.unwrap();

        match result {
            NodeExecutionResult::Pause(request) => {
                assert_eq!(request.resume_kind, ResumeKind::Approval);
                assert!(request.external_token.is_some());
                assert_eq!(request.payload["message"], "Deploy to prod?");
                assert_eq!(request.payload["input"]["build"], 42);
            }
            other => panic!("expected Pause, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn approval_resume_routes_approved_branch() {
        // Scenario: resume with approved status and approvedBranch "yes".
        let c = ctx(
            "approval",
            json!({"approvedBranch": "yes", "rejectedBranch": "no"}),
            json!({}),
        );
        c.set_global("_resumeData", json!({"approvalStatus": "approved"}));

        let result = Approval::new().execute(&c).await.unwrap();
        let output = result.output().unwrap();
        assert_eq!(output["status"], "approved");
        assert_eq!(output["branch"], "yes");
        assert_eq!(result.branches(), Some(&["yes".to_owned()][..]));
    }

    #[tokio::test]
    async fn approval_resume_routes_rejected_branch() {
        let c = ctx("approval", json!({}), json!({}));
        c.set_global(
            "_resumeData",
            json!({"approvalStatus": "rejected", "comment": "not yet"}),
        );

        let result = Approval::new().execute(&c).await.unwrap();
        assert_eq!(result.branches(), Some(&["rejected".to_owned()][..]));
        assert_eq!(result.output().unwrap()["comment"], "not yet");
    }

    #[tokio::test]
    async fn approval_missing_status_rejects() {
        let c = ctx("approval", json!({}), json!({}));
        c.set_global("_resumeData", json!({}));

        let result = Approval::new().execute(&c).await.unwrap();
        assert_eq!(result.branches(), Some(&["rejected".to_owned()][..]));
    }

    #[tokio::test]
    async fn form_first_call_pauses_with_fields() {
        let fields = json!([{"name": "email", "type": "text"}]);
        let c = ctx(
            "form",
            json!({"title": "Contact", "fields": fields}),
            json!({}),
        );
        let result = Form::new().execute(&c).await.unwrap();

        match result {
            NodeExecutionResult::Pause(request) => {
                assert_eq!(request.resume_kind, ResumeKind::Form);
                assert_eq!(request.payload["title"], "Contact");
                assert_eq!(request.payload["fields"][0]["name"], "email");
            }
            other => panic!("expected Pause, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn form_resume_emits_submission() {
        let c = ctx("form", json!({}), json!({"ticket": 7}));
        c.set_global("_resumeData", json!({"email": "a@b.c"}));

        let result = Form::new().execute(&c).await.unwrap();
        let output = result.output().unwrap();
        assert_eq!(output["formData"]["email"], "a@b.c");
        assert_eq!(output["ticket"], 7);
    }
}
