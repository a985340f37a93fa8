//! Asynchronous plugin install jobs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weft_core::{TaskId, UserId};

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;

/// Where a plugin comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallSource {
    /// The curated marketplace.
    Marketplace,
    /// A git repository.
    Git,
    /// A container image reference.
    OciImage,
    /// A local archive.
    Local,
}

/// Status of an install job.
///
/// `queued → pulling → starting → healthChecking → completed`, with
/// failure edges from any non-terminal state and cancellation reachable
/// from any non-terminal state. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStatus {
    /// Waiting for a worker.
    Queued,
    /// Image pull in progress.
    Pulling,
    /// Container being created and started.
    Starting,
    /// Waiting for the health probe.
    HealthChecking,
    /// The plugin is running and registered.
    Completed,
    /// The install failed; see `error_message`.
    Failed,
    /// The install was cancelled.
    Cancelled,
}

impl InstallStatus {
    /// Returns `true` once no further transition is allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed | Self::Cancelled => true,
            Self::Pulling => *self == Self::Queued,
            Self::Starting => *self == Self::Pulling,
            Self::HealthChecking => *self == Self::Starting,
            Self::Completed => *self == Self::HealthChecking,
            Self::Queued => false,
        }
    }
}

impl std::fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Pulling => "pulling",
            Self::Starting => "starting",
            Self::HealthChecking => "healthChecking",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One asynchronous install job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallTask {
    /// Unique task id.
    pub id: TaskId,
    /// The requesting user; only they may observe or cancel the task.
    pub user_id: UserId,
    /// Marketplace plugin id, when sourced there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    /// The node type key the plugin will register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Where the plugin comes from.
    pub source: InstallSource,
    /// Image reference, git URL, or path — per `source`.
    pub source_reference: String,
    /// Current status.
    pub status: InstallStatus,
    /// Monotone progress in `0..=100`.
    pub progress_percent: u8,
    /// Human-readable description of the current stage.
    pub current_stage: String,
    /// The started container, once one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// The started container's host port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When a worker picked the task up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail, when the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl InstallTask {
    /// A freshly queued task.
    #[must_use]
    pub fn new(user_id: UserId, source: InstallSource, source_reference: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            user_id,
            plugin_id: None,
            node_type: None,
            source,
            source_reference: source_reference.into(),
            status: InstallStatus::Queued,
            progress_percent: 0,
            current_stage: "queued".to_owned(),
            container_id: None,
            container_port: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Transition to a new status, stamping stage and timestamps.
    pub fn transition(&mut self, next: InstallStatus) -> Result<(), OrchestratorError> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.current_stage = next.to_string();
        if next == InstallStatus::Pulling && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
            if next == InstallStatus::Completed {
                self.progress_percent = 100;
            }
        }
        Ok(())
    }

    /// Raise progress; decreases are ignored, keeping it monotone.
    pub fn set_progress(&mut self, percent: u8) {
        let clamped = percent.min(100);
        if clamped > self.progress_percent {
            self.progress_percent = clamped;
        }
    }
}

/// Create / status / list / cancel over install tasks, with per-user
/// authorization.
#[derive(Default)]
pub struct InstallTaskManager {
    tasks: Arc<DashMap<TaskId, InstallTask>>,
    cancel_tokens: DashMap<TaskId, CancellationToken>,
}

impl InstallTaskManager {
    /// An empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new install task. Returns its id.
    pub fn create(
        &self,
        user_id: UserId,
        source: InstallSource,
        source_reference: impl Into<String>,
    ) -> TaskId {
        let task = InstallTask::new(user_id, source, source_reference);
        let task_id = task.id;
        self.tasks.insert(task_id, task);
        self.cancel_tokens.insert(task_id, CancellationToken::new());
        info!(task_id = %task_id, "install task queued");
        task_id
    }

    /// A snapshot of one task. Callers may only see their own tasks.
    pub fn status(&self, task_id: TaskId, user_id: UserId) -> Result<InstallTask, OrchestratorError> {
        let task = self
            .tasks
            .get(&task_id)
            .ok_or(OrchestratorError::UnknownTask(task_id))?;
        if task.user_id != user_id {
            return Err(OrchestratorError::NotAuthorized(task_id));
        }
        Ok(task.clone())
    }

    /// All of one user's tasks, optionally only the non-terminal ones.
    pub fn list(&self, user_id: UserId, active_only: bool) -> Vec<InstallTask> {
        let mut tasks: Vec<InstallTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| !active_only || !entry.status.is_terminal())
            .map(|entry| entry.clone())
            .collect();
        tasks.sort_by_key(|task| task.created_at);
        tasks
    }

    /// Request cancellation. The worker checks after each stage.
    pub fn cancel(&self, task_id: TaskId, user_id: UserId) -> Result<(), OrchestratorError> {
        {
            let task = self
                .tasks
                .get(&task_id)
                .ok_or(OrchestratorError::UnknownTask(task_id))?;
            if task.user_id != user_id {
                return Err(OrchestratorError::NotAuthorized(task_id));
            }
            if task.status.is_terminal() {
                return Ok(());
            }
        }
        if let Some(token) = self.cancel_tokens.get(&task_id) {
            token.cancel();
        }
        info!(task_id = %task_id, "install cancellation requested");
        Ok(())
    }

    fn with_task<R>(
        &self,
        task_id: TaskId,
        apply: impl FnOnce(&mut InstallTask) -> R,
    ) -> Result<R, OrchestratorError> {
        let mut task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(OrchestratorError::UnknownTask(task_id))?;
        Ok(apply(&mut task))
    }

    fn cancelled(&self, task_id: TaskId) -> bool {
        self.cancel_tokens
            .get(&task_id)
            .is_some_and(|token| token.is_cancelled())
    }

    fn check_cancelled(&self, task_id: TaskId) -> Result<bool, OrchestratorError> {
        if self.cancelled(task_id) {
            self.with_task(task_id, |task| task.transition(InstallStatus::Cancelled))??;
            info!(task_id = %task_id, "install cancelled");
            return Ok(true);
        }
        Ok(false)
    }

    fn fail(&self, task_id: TaskId, error: &OrchestratorError) -> Result<(), OrchestratorError> {
        warn!(task_id = %task_id, "install failed: {error}");
        self.with_task(task_id, |task| {
            task.error_message = Some(error.to_string());
            task.transition(InstallStatus::Failed)
        })?
    }

    /// Drive one queued task through its stages.
    ///
    /// Cooperative cancellation: the worker checks between stages, so a
    /// cancel lands at the next stage boundary.
    pub async fn run_install(
        &self,
        task_id: TaskId,
        orchestrator: &dyn Orchestrator,
        image: &str,
        tag: &str,
        env: &HashMap<String, String>,
    ) -> Result<(), OrchestratorError> {
        if !orchestrator.is_from_trusted_registry(image) {
            let error = OrchestratorError::UntrustedImage(image.to_owned());
            self.fail(task_id, &error)?;
            return Err(error);
        }

        // Pull: 0 → 60 percent.
        self.with_task(task_id, |task| task.transition(InstallStatus::Pulling))??;
        let manager_tasks = Arc::clone(&self.tasks);
        let progress_task = task_id;
        let pull_result = orchestrator
            .pull_image(
                image,
                tag,
                Arc::new(move |fraction, stage| {
                    if let Some(mut task) = manager_tasks.get_mut(&progress_task) {
                        task.set_progress((fraction * 60.0) as u8);
                        if !stage.is_empty() {
                            task.current_stage = stage.to_owned();
                        }
                    }
                }),
            )
            .await;
        if let Err(error) = pull_result {
            self.fail(task_id, &error)?;
            return Err(error);
        }
        if self.check_cancelled(task_id)? {
            return Ok(());
        }

        // Start: 60 → 80 percent.
        self.with_task(task_id, |task| {
            task.set_progress(60);
            task.transition(InstallStatus::Starting)
        })??;
        let name = format!("weft-plugin-{task_id}");
        let container = match orchestrator
            .create_and_start(&format!("{image}:{tag}"), &name, env)
            .await
        {
            Ok(container) => container,
            Err(error) => {
                self.fail(task_id, &error)?;
                return Err(error);
            }
        };
        self.with_task(task_id, |task| {
            task.container_id = Some(container.id.clone());
            task.container_port = Some(container.port);
            task.set_progress(80);
        })?;
        if self.check_cancelled(task_id)? {
            orchestrator.stop_and_remove(&container.id).await.ok();
            return Ok(());
        }

        // Health check: 80 → 100 percent.
        self.with_task(task_id, |task| task.transition(InstallStatus::HealthChecking))??;
        match orchestrator.wait_for_healthy(&container.id, 60).await {
            Ok(true) => {
                self.with_task(task_id, |task| task.transition(InstallStatus::Completed))??;
                info!(task_id = %task_id, container_id = %container.id, "install completed");
                Ok(())
            }
            Ok(false) => {
                let error = OrchestratorError::Unhealthy(container.id.clone());
                orchestrator.stop_and_remove(&container.id).await.ok();
                self.fail(task_id, &error)?;
                Err(error)
            }
            Err(error) => {
                orchestrator.stop_and_remove(&container.id).await.ok();
                self.fail(task_id, &error)?;
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for InstallTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallTaskManager")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
