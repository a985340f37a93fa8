//! The scheduler that drives executions over a flow graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_core::NodeId;
use weft_execution::{ExecutionState, NodeFailure, NodeRecord, NodeState, PauseJournal, PauseRecord};
use weft_expression::{resolve_config, ExpressionContext};
use weft_handler::{
    ErrorKind, HandlerError, HandlerRegistry, NodeExecutionContext, NodeExecutionResult,
    DEFAULT_BRANCH, RESUME_DATA_KEY,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::FlowGraph;
use crate::input;

/// Everything mutable about one live execution.
pub(crate) struct ExecutionHandle {
    pub graph: FlowGraph,
    pub state: ExecutionState,
    /// Node outputs, merge-ready.
    pub outputs: HashMap<NodeId, Value>,
    /// The input each node was dispatched with (kept for retry re-entry
    /// and pause resume).
    pub inputs: HashMap<NodeId, Value>,
    /// Per-edge resolution: `None` pending, `Some(true)` satisfied,
    /// `Some(false)` dead.
    pub edge_resolution: Vec<Option<bool>>,
    /// Inputs delivered out-of-band (fan-out joins, error triggers).
    pub input_overrides: HashMap<NodeId, Value>,
    /// Retry attempt counter per failing node.
    pub retry_attempts: HashMap<NodeId, u64>,
    pub ready_queue: VecDeque<NodeId>,
    pub globals: Arc<RwLock<Map<String, Value>>>,
    pub cancellation: CancellationToken,
    pub deadline: DateTime<Utc>,
    /// The failure that ended the run, when nothing caught it.
    pub uncaught_failure: Option<NodeFailure>,
    pub trigger_payload: Value,
}

impl ExecutionHandle {
    pub fn new(
        graph: FlowGraph,
        state: ExecutionState,
        trigger_payload: Value,
        deadline: DateTime<Utc>,
    ) -> Self {
        let edge_count = graph.edges().len();
        Self {
            graph,
            state,
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            edge_resolution: vec![None; edge_count],
            input_overrides: HashMap::new(),
            retry_attempts: HashMap::new(),
            ready_queue: VecDeque::new(),
            globals: Arc::new(RwLock::new(Map::new())),
            cancellation: CancellationToken::new(),
            deadline,
            uncaught_failure: None,
            trigger_payload,
        }
    }
}

type TaskDone = (NodeId, Result<NodeExecutionResult, HandlerError>);

/// The scheduling core shared by `run` and `resume`.
pub(crate) struct Runner {
    pub registry: Arc<HandlerRegistry>,
    pub journal: Arc<dyn PauseJournal>,
    pub config: EngineConfig,
}

impl Runner {
    // ── Seeding ────────────────────────────────────────────────────────────

    /// Mark every entry point ready with the trigger payload.
    ///
    /// Error triggers are entry points too, but they only fire when a
    /// failure reaches them.
    pub fn seed(&self, handle: &mut ExecutionHandle) -> Result<(), EngineError> {
        for node_id in handle.graph.entry_points() {
            let key = handle
                .graph
                .node(node_id)
                .map(|node| node.key.clone())
                .unwrap_or_default();
            if key == "errorTrigger" {
                continue;
            }
            handle
                .input_overrides
                .insert(node_id, handle.trigger_payload.clone());
            handle
                .state
                .node_record_mut(node_id)?
                .transition_to(NodeState::Ready)?;
            handle.ready_queue.push_back(node_id);
        }
        Ok(())
    }

    // ── Ready detection ────────────────────────────────────────────────────

    fn in_scope(scope: Option<&HashSet<NodeId>>, node_id: NodeId) -> bool {
        scope.is_none_or(|set| set.contains(&node_id))
    }

    /// Promote pending nodes whose inbound edges are all resolved, and
    /// skip-propagate the ones that lost every branch.
    fn scan_ready(
        &self,
        handle: &mut ExecutionHandle,
        scope: Option<&HashSet<NodeId>>,
    ) -> Result<(), EngineError> {
        loop {
            let mut changed = false;
            for node_id in handle.graph.node_ids() {
                if !Self::in_scope(scope, node_id) {
                    continue;
                }
                let record_state = handle
                    .state
                    .node_record(node_id)
                    .map(|record| record.state);
                if record_state != Some(NodeState::Pending) {
                    continue;
                }
                let inbound = handle.graph.inbound(node_id);
                if inbound.is_empty() {
                    continue;
                }
                let resolutions: Vec<Option<bool>> = inbound
                    .iter()
                    .map(|&edge| handle.edge_resolution[edge])
                    .collect();
                if resolutions.iter().any(Option::is_none) {
                    continue;
                }
                if resolutions.contains(&Some(true)) {
                    handle
                        .state
                        .node_record_mut(node_id)?
                        .transition_to(NodeState::Ready)?;
                    handle.ready_queue.push_back(node_id);
                } else {
                    debug!(node_id = %node_id, "skipping node, no live inbound branch");
                    handle
                        .state
                        .node_record_mut(node_id)?
                        .transition_to(NodeState::Skipped)?;
                    self.kill_outbound(handle, node_id);
                }
                changed = true;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn kill_outbound(&self, handle: &mut ExecutionHandle, node_id: NodeId) {
        for &edge in handle.graph.outbound(node_id) {
            handle.edge_resolution[edge] = Some(false);
        }
    }

    // ── Dispatch ───────────────────────────────────────────────────────────

    /// Build the execution future for a ready node.
    fn prepare(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
    ) -> Result<BoxFuture<'static, TaskDone>, EngineError> {
        let node = handle
            .graph
            .node(node_id)
            .ok_or_else(|| EngineError::Execution(
                weft_execution::ExecutionError::UnknownNode(node_id.to_string()),
            ))?
            .clone();
        let handler = self
            .registry
            .get(&node.key)
            .cloned()
            .ok_or_else(|| EngineError::UnknownHandler {
                key: node.key.clone(),
                node_id,
            })?;

        let satisfied: Vec<usize> = handle
            .graph
            .inbound(node_id)
            .iter()
            .copied()
            .filter(|&edge| handle.edge_resolution[edge] == Some(true))
            .collect();
        let node_input = handle.input_overrides.remove(&node_id).unwrap_or_else(|| {
            input::assemble(
                &handle.graph,
                &satisfied,
                &handle.outputs,
                handler.metadata().multi_port_input,
            )
        });
        handle.inputs.insert(node_id, node_input.clone());

        let expression_ctx =
            ExpressionContext::for_input(&node_input).with_node_outputs(&handle.outputs);
        let resolved_config = resolve_config(&node.config, &expression_ctx);

        let ctx = NodeExecutionContext::new(
            handle.state.execution_id,
            handle.state.flow_id,
            handle.state.user_id,
            node_id,
            node.key.clone(),
        )
        .with_config(resolved_config)
        .with_input(node_input)
        .with_previous_outputs(handle.outputs.clone())
        .with_globals(Arc::clone(&handle.globals))
        .with_cancellation(handle.cancellation.child_token())
        .with_deadline(handle.deadline);

        handle
            .state
            .node_record_mut(node_id)?
            .transition_to(NodeState::Running)?;
        debug!(node_id = %node_id, key = %node.key, "dispatching node");

        let node_timeout = self.config.node_timeout;
        Ok(Box::pin(async move {
            let outcome = match tokio::time::timeout(node_timeout, handler.execute(&ctx)).await {
                Ok(result) => result,
                Err(_) => Err(HandlerError::timeout(format!(
                    "node timed out after {}s",
                    node_timeout.as_secs()
                ))),
            };
            (node_id, outcome)
        }))
    }

    // ── The drive loop ─────────────────────────────────────────────────────

    /// Run every ready node in `scope` (or the whole graph) to quiescence.
    pub fn drive<'a>(
        &'a self,
        handle: &'a mut ExecutionHandle,
        scope: Option<Arc<HashSet<NodeId>>>,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.scan_ready(handle, scope.as_deref())?;
            let mut in_flight: FuturesUnordered<BoxFuture<'static, TaskDone>> =
                FuturesUnordered::new();

            loop {
                while in_flight.len() < self.config.max_parallelism.max(1) {
                    let Some(node_id) = handle.ready_queue.pop_front() else {
                        break;
                    };
                    if handle.cancellation.is_cancelled() {
                        handle
                            .state
                            .node_record_mut(node_id)?
                            .transition_to(NodeState::Cancelled)?;
                        continue;
                    }
                    in_flight.push(self.prepare(handle, node_id)?);
                }

                let Some((node_id, outcome)) = in_flight.next().await else {
                    break;
                };
                self.settle(handle, scope.clone(), node_id, outcome).await?;
                self.scan_ready(handle, scope.as_deref())?;
            }
            Ok(())
        })
    }

    // ── Outcome handling ───────────────────────────────────────────────────

    async fn settle(
        &self,
        handle: &mut ExecutionHandle,
        scope: Option<Arc<HashSet<NodeId>>>,
        node_id: NodeId,
        outcome: Result<NodeExecutionResult, HandlerError>,
    ) -> Result<(), EngineError> {
        if handle.cancellation.is_cancelled() {
            // Blocking handlers may finish after cancellation; their
            // results are discarded.
            let record = handle.state.node_record_mut(node_id)?;
            if record.state == NodeState::Running {
                record.transition_to(NodeState::Cancelled)?;
            }
            return Ok(());
        }
        match outcome {
            Ok(NodeExecutionResult::Success {
                output,
                branches,
                metadata,
            }) => {
                self.honour_delay(handle, metadata.as_ref()).await;
                self.settle_success(handle, node_id, output, branches, metadata)?;
            }
            Ok(NodeExecutionResult::FanOut { emissions }) => {
                if scope.is_some() {
                    // Nested fan-out inside a pass runs like a plain
                    // sequential batch over the same scope rules.
                    warn!(node_id = %node_id, "nested fan-out flattened to sequential passes");
                }
                self.settle_fan_out(handle, node_id, emissions).await?;
            }
            Ok(NodeExecutionResult::Pause(request)) => {
                if scope.is_some() {
                    return Err(EngineError::PauseInFanOut(node_id));
                }
                let record =
                    PauseRecord::from_request(handle.state.execution_id, node_id, request);
                self.journal.save(&record).await?;
                handle
                    .state
                    .node_record_mut(node_id)?
                    .transition_to(NodeState::Paused)?;
                info!(
                    execution_id = %handle.state.execution_id,
                    node_id = %node_id,
                    resume_kind = %record.resume_kind,
                    "node paused"
                );
            }
            Err(error) => {
                self.settle_failure(handle, node_id, error).await?;
            }
        }
        Ok(())
    }

    async fn honour_delay(&self, handle: &ExecutionHandle, metadata: Option<&Value>) {
        let wait_ms = metadata
            .and_then(|meta| meta.get("_rateLimiter"))
            .and_then(|limiter| limiter.get("waitMs"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if wait_ms > 0 {
            debug!(wait_ms, "honouring rate-limit delay");
            tokio::select! {
                () = handle.cancellation.cancelled() => {}
                () = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
            }
        }
    }

    fn settle_success(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
        output: Value,
        branches: Option<Vec<String>>,
        metadata: Option<Value>,
    ) -> Result<(), EngineError> {
        info!(
            execution_id = %handle.state.execution_id,
            node_id = %node_id,
            "node succeeded"
        );
        handle.outputs.insert(node_id, output.clone());
        {
            let record = handle.state.node_record_mut(node_id)?;
            record.transition_to(NodeState::Succeeded)?;
            record.output = Some(output);
            record.metadata = metadata;
            record.last_error = None;
        }

        let live: Vec<String> = match branches {
            Some(list) if !list.is_empty() => list,
            _ => vec![DEFAULT_BRANCH.to_owned()],
        };
        let outbound: Vec<usize> = handle.graph.outbound(node_id).to_vec();
        let matched: Vec<usize> = outbound
            .iter()
            .copied()
            .filter(|&edge| live.contains(&handle.graph.edges()[edge].branch))
            .collect();
        // Unknown branch names fall back to the default branch.
        let matched = if matched.is_empty() && !outbound.is_empty() {
            outbound
                .iter()
                .copied()
                .filter(|&edge| handle.graph.edges()[edge].branch == DEFAULT_BRANCH)
                .collect()
        } else {
            matched
        };

        for edge in outbound {
            handle.edge_resolution[edge] = Some(matched.contains(&edge));
        }
        Ok(())
    }

    // ── Failures, retries, and catches ─────────────────────────────────────

    async fn settle_failure(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
        error: HandlerError,
    ) -> Result<(), EngineError> {
        let failure = NodeFailure {
            kind: error.kind,
            message: error.message.clone(),
        };
        warn!(
            execution_id = %handle.state.execution_id,
            node_id = %node_id,
            kind = %failure.kind,
            "node failed: {}",
            error.summary()
        );

        {
            let record = handle.state.node_record_mut(node_id)?;
            let target_state = if error.kind == ErrorKind::Cancelled {
                NodeState::Cancelled
            } else {
                NodeState::Failed
            };
            record.transition_to(target_state)?;
            record.last_error = Some(failure.clone());
        }
        if error.kind == ErrorKind::Cancelled {
            self.kill_outbound(handle, node_id);
            return Ok(());
        }

        if self.try_retry(handle, node_id, &failure).await? {
            return Ok(());
        }

        self.kill_outbound(handle, node_id);
        if !self.catch_with_error_trigger(handle, node_id, &failure)? {
            handle.uncaught_failure.get_or_insert(failure);
        }
        Ok(())
    }

    /// Loop the failing input through a retry successor, if one is wired.
    ///
    /// Returns `true` when the failing node was re-queued.
    async fn try_retry(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
        failure: &NodeFailure,
    ) -> Result<bool, EngineError> {
        let retry_edge = handle
            .graph
            .outbound(node_id)
            .iter()
            .copied()
            .find(|&edge| {
                let target = handle.graph.edges()[edge].target;
                handle
                    .graph
                    .node(target)
                    .is_some_and(|node| node.key == "retry")
            });
        let Some(retry_edge) = retry_edge else {
            return Ok(false);
        };
        let retry_node_id = handle.graph.edges()[retry_edge].target;

        let attempts = handle.retry_attempts.get(&node_id).copied().unwrap_or(0);
        let mut retry_input = match handle.inputs.get(&node_id) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        retry_input.insert(
            "_error".to_owned(),
            json!({
                "nodeId": node_id.to_string(),
                "kind": failure.kind,
                "message": failure.message,
            }),
        );
        retry_input.insert("_retryAttempt".to_owned(), json!(attempts));

        let outcome = self
            .invoke_inline(handle, retry_node_id, Value::Object(retry_input))
            .await?;

        match outcome {
            Ok(NodeExecutionResult::Success { output, .. }) => {
                let next_attempt = output
                    .get("_retryAttempt")
                    .and_then(Value::as_u64)
                    .unwrap_or(attempts + 1);
                let delay_ms = output.get("_retryDelay").and_then(Value::as_u64).unwrap_or(0);
                handle.retry_attempts.insert(node_id, next_attempt);

                let record = handle.state.node_record_mut(retry_node_id)?;
                record.output = Some(output);
                info!(
                    node_id = %node_id,
                    attempt = next_attempt,
                    delay_ms,
                    "retrying node"
                );

                if delay_ms > 0 {
                    tokio::select! {
                        () = handle.cancellation.cancelled() => return Ok(false),
                        () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                    }
                }

                // Re-enter the failing node with its original input.
                let original_input = handle.inputs.get(&node_id).cloned().unwrap_or(Value::Null);
                handle.input_overrides.insert(node_id, original_input);
                handle
                    .state
                    .node_record_mut(node_id)?
                    .transition_to(NodeState::Ready)?;
                handle.ready_queue.push_back(node_id);
                Ok(true)
            }
            other => {
                // Retries exhausted (or the retry gate misbehaved); the
                // original failure propagates.
                let gate_failure = match other {
                    Err(error) => Some(NodeFailure {
                        kind: error.kind,
                        message: error.message,
                    }),
                    Ok(_) => None,
                };
                if let Ok(record) = handle.state.node_record_mut(retry_node_id) {
                    if record.state == NodeState::Running {
                        record.transition_to(NodeState::Failed)?;
                    }
                    if gate_failure.is_some() {
                        record.last_error = gate_failure;
                    }
                }
                Ok(false)
            }
        }
    }

    /// Run a node's handler outside the normal ready queue.
    async fn invoke_inline(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
        node_input: Value,
    ) -> Result<Result<NodeExecutionResult, HandlerError>, EngineError> {
        let node = handle
            .graph
            .node(node_id)
            .ok_or_else(|| EngineError::Execution(
                weft_execution::ExecutionError::UnknownNode(node_id.to_string()),
            ))?
            .clone();
        let handler = self
            .registry
            .get(&node.key)
            .cloned()
            .ok_or_else(|| EngineError::UnknownHandler {
                key: node.key.clone(),
                node_id,
            })?;

        {
            // Inline invocations may hit the same node repeatedly (one
            // retry round per upstream failure); start from a fresh record.
            let attempts = handle
                .state
                .node_record(node_id)
                .map_or(0, |record| record.attempts);
            let mut fresh = NodeRecord::new();
            fresh.attempts = attempts;
            handle.state.set_node_record(node_id, fresh);
            let record = handle.state.node_record_mut(node_id)?;
            record.transition_to(NodeState::Ready)?;
            record.transition_to(NodeState::Running)?;
        }

        let expression_ctx =
            ExpressionContext::for_input(&node_input).with_node_outputs(&handle.outputs);
        let resolved_config = resolve_config(&node.config, &expression_ctx);
        let ctx = NodeExecutionContext::new(
            handle.state.execution_id,
            handle.state.flow_id,
            handle.state.user_id,
            node_id,
            node.key,
        )
        .with_config(resolved_config)
        .with_input(node_input)
        .with_previous_outputs(handle.outputs.clone())
        .with_globals(Arc::clone(&handle.globals))
        .with_cancellation(handle.cancellation.child_token())
        .with_deadline(handle.deadline);

        let outcome = handler.execute(&ctx).await;
        if outcome.is_ok() {
            handle
                .state
                .node_record_mut(node_id)?
                .transition_to(NodeState::Succeeded)?;
        }
        Ok(outcome)
    }

    /// Seed error triggers with the failure. Returns `true` when caught.
    fn catch_with_error_trigger(
        &self,
        handle: &mut ExecutionHandle,
        failed_node: NodeId,
        failure: &NodeFailure,
    ) -> Result<bool, EngineError> {
        let catchers: Vec<NodeId> = handle
            .graph
            .nodes()
            .iter()
            .filter(|node| node.key == "errorTrigger")
            .map(|node| node.id)
            .filter(|&id| {
                handle
                    .state
                    .node_record(id)
                    .is_some_and(|record| record.state == NodeState::Pending)
            })
            .collect();
        if catchers.is_empty() {
            return Ok(false);
        }

        let payload = json!({
            "_error": {
                "nodeId": failed_node.to_string(),
                "kind": failure.kind,
                "message": failure.message,
            },
        });
        for catcher in catchers {
            handle.input_overrides.insert(catcher, payload.clone());
            handle
                .state
                .node_record_mut(catcher)?
                .transition_to(NodeState::Ready)?;
            handle.ready_queue.push_back(catcher);
            info!(node_id = %catcher, "failure caught by error trigger");
        }
        Ok(true)
    }

    // ── Fan-out ────────────────────────────────────────────────────────────

    async fn settle_fan_out(
        &self,
        handle: &mut ExecutionHandle,
        start: NodeId,
        emissions: Vec<Value>,
    ) -> Result<(), EngineError> {
        {
            let record = handle.state.node_record_mut(start)?;
            record.transition_to(NodeState::Succeeded)?;
            record.output = Some(json!({"emissions": emissions.len()}));
        }
        info!(
            node_id = %start,
            emissions = emissions.len(),
            "fan-out"
        );

        let (scope, join) = handle.graph.fan_out_scope(start);

        if emissions.is_empty() {
            self.kill_outbound(handle, start);
            return Ok(());
        }

        // Accumulated deliveries for the join node, keyed by inbound port.
        let mut join_deliveries: Map<String, Value> = Map::new();
        let mut sink_results: Vec<Value> = Vec::new();
        let scope_arc = Arc::new(scope.clone());

        for emission in &emissions {
            self.reset_pass(handle, start, &scope, emission)?;
            self.drive(handle, Some(Arc::clone(&scope_arc))).await?;
            if handle.uncaught_failure.is_some() || handle.cancellation.is_cancelled() {
                return Ok(());
            }
            self.collect_pass(handle, start, &scope, join, emission, &mut join_deliveries,
                &mut sink_results);
        }

        handle
            .outputs
            .insert(start, json!({"emissions": emissions.len()}));

        if let Some(join_id) = join {
            for &edge in handle.graph.inbound(join_id) {
                let source = handle.graph.edges()[edge].source;
                if source == start || scope.contains(&source) {
                    handle.edge_resolution[edge] = Some(true);
                }
            }
            handle
                .input_overrides
                .insert(join_id, Value::Object(join_deliveries));
        } else if !sink_results.is_empty() {
            let record = handle.state.node_record_mut(start)?;
            record.output = Some(json!({
                "emissions": emissions.len(),
                "results": sink_results,
            }));
        }
        Ok(())
    }

    /// Reset the fan-out scope for one pass and wire the emission in.
    fn reset_pass(
        &self,
        handle: &mut ExecutionHandle,
        start: NodeId,
        scope: &HashSet<NodeId>,
        emission: &Value,
    ) -> Result<(), EngineError> {
        handle.outputs.insert(start, emission.clone());

        for &node_id in scope {
            let attempts = handle
                .state
                .node_record(node_id)
                .map_or(0, |record| record.attempts);
            let mut fresh = NodeRecord::new();
            fresh.attempts = attempts;
            handle.state.set_node_record(node_id, fresh);
            handle.outputs.remove(&node_id);
        }

        for (index, edge) in handle.graph.edges().iter().enumerate() {
            if !scope.contains(&edge.target) {
                continue;
            }
            handle.edge_resolution[index] = if edge.source == start {
                Some(true)
            } else if scope.contains(&edge.source) {
                None
            } else {
                // Branches from outside the loop do not feed the passes.
                Some(false)
            };
        }
        Ok(())
    }

    /// Gather one pass's deliveries for the join (or the sinks).
    #[allow(clippy::too_many_arguments)]
    fn collect_pass(
        &self,
        handle: &ExecutionHandle,
        start: NodeId,
        scope: &HashSet<NodeId>,
        join: Option<NodeId>,
        emission: &Value,
        join_deliveries: &mut Map<String, Value>,
        sink_results: &mut Vec<Value>,
    ) {
        if let Some(join_id) = join {
            for &edge in handle.graph.inbound(join_id) {
                let edge_ref = &handle.graph.edges()[edge];
                let delivered = if edge_ref.source == start {
                    Some(emission.clone())
                } else if scope.contains(&edge_ref.source)
                    && handle.edge_resolution[edge] == Some(true)
                {
                    handle.outputs.get(&edge_ref.source).cloned()
                } else {
                    None
                };
                if let Some(value) = delivered {
                    let key = edge_ref
                        .target_port
                        .clone()
                        .unwrap_or_else(|| edge_ref.branch.clone());
                    match join_deliveries.get_mut(&key) {
                        Some(Value::Array(list)) => list.push(value),
                        _ => {
                            join_deliveries.insert(key, Value::Array(vec![value]));
                        }
                    }
                }
            }
            return;
        }

        for &node_id in scope {
            let is_sink = handle.graph.outbound(node_id).is_empty();
            if is_sink {
                if let Some(output) = handle.outputs.get(&node_id) {
                    sink_results.push(output.clone());
                }
            }
        }
    }

    // ── Finalisation ───────────────────────────────────────────────────────

    /// Settle the execution status once the drive loop goes quiet.
    pub fn finalize(&self, handle: &mut ExecutionHandle) -> Result<(), EngineError> {
        if handle.cancellation.is_cancelled() {
            self.cancel_remaining(handle)?;
            if !handle.state.status.is_terminal() {
                handle
                    .state
                    .transition_status(weft_execution::ExecutionStatus::Cancelled)?;
            }
            return Ok(());
        }

        if !handle.state.paused_node_ids().is_empty() {
            handle
                .state
                .transition_status(weft_execution::ExecutionStatus::Paused)?;
            return Ok(());
        }

        let status = if handle.uncaught_failure.is_some() {
            weft_execution::ExecutionStatus::Failed
        } else {
            weft_execution::ExecutionStatus::Completed
        };
        handle.state.transition_status(status)?;
        Ok(())
    }

    /// Mark nodes that never ran as cancelled.
    pub fn cancel_remaining(&self, handle: &mut ExecutionHandle) -> Result<(), EngineError> {
        for node_id in handle.graph.node_ids() {
            let state = handle
                .state
                .node_record(node_id)
                .map(|record| record.state);
            if matches!(
                state,
                Some(NodeState::Pending | NodeState::Ready | NodeState::Paused)
            ) {
                handle
                    .state
                    .node_record_mut(node_id)?
                    .transition_to(NodeState::Cancelled)?;
            }
        }
        Ok(())
    }

    /// Mark still-running work as timed out and the rest as cancelled.
    pub fn expire(&self, handle: &mut ExecutionHandle) -> Result<(), EngineError> {
        handle.cancellation.cancel();
        for node_id in handle.graph.node_ids() {
            let state = handle
                .state
                .node_record(node_id)
                .map(|record| record.state);
            if state == Some(NodeState::Running) {
                let record = handle.state.node_record_mut(node_id)?;
                record.transition_to(NodeState::Failed)?;
                record.last_error = Some(NodeFailure {
                    kind: ErrorKind::Timeout,
                    message: "execution deadline exceeded".to_owned(),
                });
            }
        }
        self.cancel_remaining(handle)?;
        handle.uncaught_failure.get_or_insert(NodeFailure {
            kind: ErrorKind::Timeout,
            message: "execution deadline exceeded".to_owned(),
        });
        if !handle.state.status.is_terminal() {
            handle
                .state
                .transition_status(weft_execution::ExecutionStatus::Failed)?;
        }
        Ok(())
    }

    // ── Resume ─────────────────────────────────────────────────────────────

    /// Re-enter a paused node with resume data attached.
    pub async fn resume_node(
        &self,
        handle: &mut ExecutionHandle,
        node_id: NodeId,
        resume_data: Value,
    ) -> Result<(), EngineError> {
        {
            let record = handle.state.node_record_mut(node_id)?;
            if record.state != NodeState::Paused {
                return Err(EngineError::NotPaused {
                    execution_id: handle.state.execution_id,
                    node_id,
                });
            }
            record.transition_to(NodeState::Running)?;
        }
        self.journal
            .remove(handle.state.execution_id, node_id)
            .await?;
        handle
            .globals
            .write()
            .insert(RESUME_DATA_KEY.to_owned(), resume_data);

        let node_input = handle.inputs.get(&node_id).cloned().unwrap_or(Value::Null);
        let node = handle
            .graph
            .node(node_id)
            .ok_or_else(|| EngineError::Execution(
                weft_execution::ExecutionError::UnknownNode(node_id.to_string()),
            ))?
            .clone();
        let handler = self
            .registry
            .get(&node.key)
            .cloned()
            .ok_or_else(|| EngineError::UnknownHandler {
                key: node.key.clone(),
                node_id,
            })?;

        let expression_ctx =
            ExpressionContext::for_input(&node_input).with_node_outputs(&handle.outputs);
        let resolved_config = resolve_config(&node.config, &expression_ctx);
        let ctx = NodeExecutionContext::new(
            handle.state.execution_id,
            handle.state.flow_id,
            handle.state.user_id,
            node_id,
            node.key,
        )
        .with_config(resolved_config)
        .with_input(node_input)
        .with_previous_outputs(handle.outputs.clone())
        .with_globals(Arc::clone(&handle.globals))
        .with_cancellation(handle.cancellation.child_token())
        .with_deadline(handle.deadline);

        info!(
            execution_id = %handle.state.execution_id,
            node_id = %node_id,
            "resuming node"
        );
        let outcome = handler.execute(&ctx).await;
        handle.globals.write().remove(RESUME_DATA_KEY);
        self.settle(handle, None, node_id, outcome).await?;
        self.drive(handle, None).await
    }
}
