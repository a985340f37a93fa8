//! The engine facade: run, resume, cancel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weft_core::{ExecutionId, FlowId, NodeId, UserId};
use weft_execution::{ExecutionState, ExecutionStatus, NodeState, PauseJournal};
use weft_handler::error::MESSAGE_SUMMARY_CAP;
use weft_handler::HandlerRegistry;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::FlowGraph;
use crate::runner::{ExecutionHandle, Runner};

/// What starts an execution.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The flow being run.
    pub flow_id: FlowId,
    /// The user owning the run.
    pub user_id: UserId,
    /// The trigger event payload, handed to every entry point.
    pub payload: Value,
}

impl RunRequest {
    /// A run request with an empty payload.
    #[must_use]
    pub fn new(flow_id: FlowId, user_id: UserId) -> Self {
        Self {
            flow_id,
            user_id,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach the trigger payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Where an execution settled after a drive.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The execution this describes.
    pub execution_id: ExecutionId,
    /// The status the drive settled into. `Paused` means the execution
    /// is waiting on [`resume`](FlowEngine::resume).
    pub status: ExecutionStatus,
    /// Every settled node's output.
    pub outputs: HashMap<NodeId, Value>,
    /// Nodes waiting on a pause gate.
    pub paused_nodes: Vec<NodeId>,
    /// The user-visible failure summary, when the run failed.
    pub error: Option<String>,
}

/// The node execution core.
///
/// Owns the handler registry (read-only after construction), the pause
/// journal, and the live execution table. One engine serves many
/// concurrent executions.
pub struct FlowEngine {
    runner: Runner,
    executions: DashMap<ExecutionId, Arc<tokio::sync::Mutex<ExecutionHandle>>>,
    cancellations: DashMap<ExecutionId, CancellationToken>,
}

impl FlowEngine {
    /// Build an engine over a populated registry.
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        journal: Arc<dyn PauseJournal>,
        config: EngineConfig,
    ) -> Self {
        Self {
            runner: Runner {
                registry,
                journal,
                config,
            },
            executions: DashMap::new(),
            cancellations: DashMap::new(),
        }
    }

    /// Run a flow to quiescence: terminal state or first pause.
    pub async fn run(
        &self,
        graph: FlowGraph,
        request: RunRequest,
    ) -> Result<RunOutcome, EngineError> {
        let execution_id = ExecutionId::new();
        let node_ids = graph.node_ids();
        let mut state =
            ExecutionState::new(execution_id, request.flow_id, request.user_id, &node_ids);
        state.transition_status(ExecutionStatus::Running)?;

        let deadline = Utc::now()
            + chrono::Duration::from_std(self.runner.config.execution_deadline)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut handle = ExecutionHandle::new(graph, state, request.payload, deadline);

        let token = CancellationToken::new();
        handle.cancellation = token.clone();
        self.cancellations.insert(execution_id, token);

        info!(execution_id = %execution_id, flow_id = %request.flow_id, "execution started");
        self.runner.seed(&mut handle)?;

        let deadline_budget = self.runner.config.execution_deadline;
        let driven = tokio::time::timeout(deadline_budget, self.runner.drive(&mut handle, None));
        match driven.await {
            Ok(result) => {
                result?;
                self.runner.finalize(&mut handle)?;
            }
            Err(_) => {
                self.runner.expire(&mut handle)?;
                for record in self.runner.journal.list_for_execution(execution_id).await? {
                    self.runner
                        .journal
                        .remove(record.execution_id, record.node_id)
                        .await?;
                }
            }
        }

        let outcome = Self::outcome(&handle);
        info!(
            execution_id = %execution_id,
            status = %outcome.status,
            "execution settled"
        );
        if outcome.status.is_terminal() {
            self.cancellations.remove(&execution_id);
        }
        self.executions
            .insert(execution_id, Arc::new(tokio::sync::Mutex::new(handle)));
        Ok(outcome)
    }

    /// Resume a paused node with external data.
    ///
    /// The node re-enters exactly once with `_resumeData` visible in its
    /// global context; downstream nodes observe the resumed output.
    pub async fn resume(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        resume_data: Value,
    ) -> Result<RunOutcome, EngineError> {
        let entry = self
            .executions
            .get(&execution_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::UnknownExecution(execution_id))?;
        let mut handle = entry.lock().await;

        if handle.state.status.is_terminal() {
            return Err(EngineError::AlreadyFinished(execution_id));
        }
        let paused = handle
            .state
            .node_record(node_id)
            .is_some_and(|record| record.state == NodeState::Paused);
        if !paused {
            return Err(EngineError::NotPaused {
                execution_id,
                node_id,
            });
        }

        if handle.state.status == ExecutionStatus::Paused {
            handle.state.transition_status(ExecutionStatus::Running)?;
        }
        self.runner
            .resume_node(&mut handle, node_id, resume_data)
            .await?;
        self.runner.finalize(&mut handle)?;

        let outcome = Self::outcome(&handle);
        if outcome.status.is_terminal() {
            self.cancellations.remove(&execution_id);
        }
        Ok(outcome)
    }

    /// Request cancellation of an execution.
    ///
    /// Running async handlers see their token trip; blocking handlers
    /// finish but their results are discarded by the cancelled drive.
    pub async fn cancel(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let token = self
            .cancellations
            .get(&execution_id)
            .map(|entry| entry.value().clone());
        let entry = self
            .executions
            .get(&execution_id)
            .map(|entry| Arc::clone(entry.value()));
        if token.is_none() && entry.is_none() {
            return Err(EngineError::UnknownExecution(execution_id));
        }
        if let Some(token) = token {
            token.cancel();
        }

        if let Some(entry) = entry {
            let mut handle = entry.lock().await;
            if !handle.state.status.is_terminal() {
                for record in self.runner.journal.list_for_execution(execution_id).await? {
                    self.runner
                        .journal
                        .remove(record.execution_id, record.node_id)
                        .await?;
                }
                self.runner.cancel_remaining(&mut handle)?;
                handle
                    .state
                    .transition_status(ExecutionStatus::Cancelled)?;
                info!(execution_id = %execution_id, "execution cancelled");
            }
        }
        self.cancellations.remove(&execution_id);
        Ok(())
    }

    /// A snapshot of an execution's state.
    pub async fn execution_state(&self, execution_id: ExecutionId) -> Option<ExecutionState> {
        let entry = self
            .executions
            .get(&execution_id)
            .map(|entry| Arc::clone(entry.value()))?;
        let handle = entry.lock().await;
        Some(handle.state.clone())
    }

    fn outcome(handle: &ExecutionHandle) -> RunOutcome {
        let error = handle.uncaught_failure.as_ref().map(|failure| {
            let first_line = failure.message.lines().next().unwrap_or_default();
            let mut summary: String = first_line.chars().take(MESSAGE_SUMMARY_CAP).collect();
            if first_line.chars().count() > MESSAGE_SUMMARY_CAP {
                summary.push('…');
            }
            format!("{}: {summary}", failure.kind)
        });
        RunOutcome {
            execution_id: handle.state.execution_id,
            status: handle.state.status,
            outputs: handle.outputs.clone(),
            paused_nodes: handle.state.paused_node_ids(),
            error,
        }
    }
}

impl std::fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngine")
            .field("live_executions", &self.executions.len())
            .finish_non_exhaustive()
    }
}
