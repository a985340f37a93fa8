//! End-to-end flows through the engine with the built-in handler set.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use weft_core::{FlowId, NodeId, UserId};
use weft_engine::{EngineConfig, FlowDefinition, FlowEdge, FlowEngine, FlowGraph, FlowNode, RunRequest};
use weft_execution::{ExecutionStatus, MemoryJournal, NodeState, PauseJournal};
use weft_handler::HandlerRegistry;
use weft_nodes::register_builtins;
use weft_resilience::RateLimiterStore;

fn engine() -> FlowEngine {
    engine_with_config(EngineConfig::default())
}

fn engine_with_config(config: EngineConfig) -> FlowEngine {
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));
    FlowEngine::new(Arc::new(registry), Arc::new(MemoryJournal::new()), config)
}

fn node(key: &str, config: Value) -> FlowNode {
    FlowNode {
        id: NodeId::new(),
        key: key.to_owned(),
        config,
        position: None,
    }
}

fn edge(source: NodeId, branch: &str, target: NodeId) -> FlowEdge {
    FlowEdge {
        source,
        branch: branch.to_owned(),
        target,
        target_port: None,
    }
}

fn graph(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> FlowGraph {
    FlowGraph::new(FlowDefinition { nodes, edges }).unwrap()
}

fn request(payload: Value) -> RunRequest {
    RunRequest::new(FlowId::new(), UserId::new()).with_payload(payload)
}

#[tokio::test]
async fn passthrough_chain() {
    let trigger = node("manualTrigger", json!({}));
    let no_op = node("noOp", json!({}));
    let (t, n) = (trigger.id, no_op.id);

    let engine = engine();
    let outcome = engine
        .run(
            graph(vec![trigger, no_op], vec![edge(t, "out", n)]),
            request(json!({"carried": 7})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.outputs[&n], json!({"carried": 7}));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn condition_routes_and_skips_the_dead_branch() {
    let trigger = node("manualTrigger", json!({}));
    let condition = node(
        "condition",
        json!({"field": "status", "operator": "equals", "value": "active"}),
    );
    let on_true = node("setFields", json!({"fields": {"path": "took-true"}}));
    let on_false = node("setFields", json!({"fields": {"path": "took-false"}}));
    let (t, c, yes, no) = (trigger.id, condition.id, on_true.id, on_false.id);

    let engine = engine();
    let outcome = engine
        .run(
            graph(
                vec![trigger, condition, on_true, on_false],
                vec![
                    edge(t, "out", c),
                    edge(c, "true", yes),
                    edge(c, "false", no),
                ],
            ),
            request(json!({"status": "active"})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.outputs[&yes]["path"], "took-true");
    assert!(!outcome.outputs.contains_key(&no));

    let state = engine.execution_state(outcome.execution_id).await.unwrap();
    assert_eq!(state.node_record(yes).unwrap().state, NodeState::Succeeded);
    assert_eq!(state.node_record(no).unwrap().state, NodeState::Skipped);
}

#[tokio::test]
async fn condition_inactive_takes_false_branch() {
    let trigger = node("manualTrigger", json!({}));
    let condition = node(
        "condition",
        json!({"field": "status", "operator": "equals", "value": "inactive"}),
    );
    let on_true = node("noOp", json!({}));
    let on_false = node("setFields", json!({"fields": {"branch": "false"}}));
    let (t, c, yes, no) = (trigger.id, condition.id, on_true.id, on_false.id);

    let outcome = engine()
        .run(
            graph(
                vec![trigger, condition, on_true, on_false],
                vec![
                    edge(t, "out", c),
                    edge(c, "true", yes),
                    edge(c, "false", no),
                ],
            ),
            request(json!({"status": "active"})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.outputs[&no]["branch"], "false");
    assert!(!outcome.outputs.contains_key(&yes));
}

#[tokio::test]
async fn expressions_resolve_config_from_input() {
    let trigger = node("manualTrigger", json!({}));
    let set = node(
        "setFields",
        json!({"fields": {"greeting": "Hello {{user.name}}", "age": "{{user.age}}"}}),
    );
    let (t, s) = (trigger.id, set.id);

    let outcome = engine()
        .run(
            graph(vec![trigger, set], vec![edge(t, "out", s)]),
            request(json!({"user": {"name": "Alice", "age": 30}})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.outputs[&s]["greeting"], "Hello Alice");
    // A whole-string expression keeps its type.
    assert_eq!(outcome.outputs[&s]["age"], 30);
}

#[tokio::test]
async fn loop_fan_out_joins_at_merge() {
    let trigger = node("manualTrigger", json!({}));
    let batches = node("loop", json!({"arrayField": "items", "batchSize": 2}));
    let pick = node("setFields", json!({"fields": {"picked": "{{items}}"}, "keepOnlySet": true}));
    let merge = node("merge", json!({"mode": "append", "outputKey": "merged"}));
    let (t, l, p, m) = (trigger.id, batches.id, pick.id, merge.id);

    let outcome = engine()
        .run(
            graph(
                vec![trigger, batches, pick, merge],
                vec![edge(t, "out", l), edge(l, "out", p), edge(p, "out", m)],
            ),
            request(json!({"items": [1, 2, 3, 4, 5]})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    // Three batches (2, 2, 1) delivered to the merge in order.
    let merged = outcome.outputs[&m]["merged"].as_array().unwrap();
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0]["picked"], json!([1, 2]));
    assert_eq!(merged[2]["picked"], json!([5]));
}

#[tokio::test]
async fn loop_batch_envelopes_carry_totals() {
    let trigger = node("manualTrigger", json!({}));
    let batches = node("loop", json!({"arrayField": "items", "batchSize": 2}));
    let keep = node("noOp", json!({}));
    let merge = node("merge", json!({"mode": "append"}));
    let (t, l, k, m) = (trigger.id, batches.id, keep.id, merge.id);

    let outcome = engine()
        .run(
            graph(
                vec![trigger, batches, keep, merge],
                vec![edge(t, "out", l), edge(l, "out", k), edge(k, "out", m)],
            ),
            request(json!({"items": [1, 2, 3, 4, 5]})),
        )
        .await
        .unwrap();

    let merged = outcome.outputs[&m]["merged"].as_array().unwrap();
    assert_eq!(merged[0]["totalItems"], 5);
    assert_eq!(merged[0]["totalBatches"], 3);
    assert_eq!(merged[0]["items"], json!([1, 2]));
    assert_eq!(merged[2]["itemsInBatch"], 1);

    let total: u64 = merged
        .iter()
        .map(|batch| batch["itemsInBatch"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 5);
}

#[tokio::test]
async fn empty_loop_skips_downstream_and_succeeds() {
    let trigger = node("manualTrigger", json!({}));
    let batches = node("loop", json!({"arrayField": "items"}));
    let downstream = node("noOp", json!({}));
    let (t, l, d) = (trigger.id, batches.id, downstream.id);

    let engine = engine();
    let outcome = engine
        .run(
            graph(
                vec![trigger, batches, downstream],
                vec![edge(t, "out", l), edge(l, "out", d)],
            ),
            request(json!({"items": []})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    let state = engine.execution_state(outcome.execution_id).await.unwrap();
    assert_eq!(state.node_record(d).unwrap().state, NodeState::Skipped);
}

#[tokio::test]
async fn retry_reenters_and_exhausts() {
    // The json node fails on unparseable text, every time.
    let trigger = node("manualTrigger", json!({}));
    let parse = node("json", json!({"operation": "parse", "field": "raw"}));
    let retry = node(
        "retry",
        json!({"maxRetries": 2, "strategy": "fixed", "initialDelayMs": 1}),
    );
    let (t, p, r) = (trigger.id, parse.id, retry.id);

    let engine = engine();
    let outcome = engine
        .run(
            graph(
                vec![trigger, parse, retry],
                vec![edge(t, "out", p), edge(p, "out", r)],
            ),
            request(json!({"raw": "{not json"})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert!(outcome.error.is_some());

    let state = engine.execution_state(outcome.execution_id).await.unwrap();
    // Initial attempt plus two retries.
    assert_eq!(state.node_record(p).unwrap().attempts, 3);
    assert_eq!(state.node_record(p).unwrap().state, NodeState::Failed);
    // The retry gate itself records the exhaustion failure.
    let retry_record = state.node_record(r).unwrap();
    assert_eq!(retry_record.state, NodeState::Failed);
    assert!(retry_record
        .last_error
        .as_ref()
        .unwrap()
        .message
        .contains("Max retries (2) exceeded"));
}

#[tokio::test]
async fn error_trigger_catches_failures() {
    let trigger = node("manualTrigger", json!({}));
    let parse = node("json", json!({"operation": "parse", "field": "raw"}));
    let catcher = node("errorTrigger", json!({}));
    let report = node("setFields", json!({"fields": {"handled": true}}));
    let (t, p, c, rp) = (trigger.id, parse.id, catcher.id, report.id);

    let outcome = engine()
        .run(
            graph(
                vec![trigger, parse, catcher, report],
                vec![edge(t, "out", p), edge(c, "out", rp)],
            ),
            request(json!({"raw": "{broken"})),
        )
        .await
        .unwrap();

    // Caught failures do not fail the execution.
    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.outputs[&rp]["handled"], true);
    assert_eq!(outcome.outputs[&c]["error"]["kind"], "validation");
}

#[tokio::test]
async fn approval_pauses_then_resumes_on_branch() {
    let trigger = node("manualTrigger", json!({}));
    let approval = node(
        "approval",
        json!({"approvedBranch": "yes", "rejectedBranch": "no"}),
    );
    let deploy = node("setFields", json!({"fields": {"deployed": true}}));
    let (t, a, d) = (trigger.id, approval.id, deploy.id);

    let journal = Arc::new(MemoryJournal::new());
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));
    let engine = FlowEngine::new(
        Arc::new(registry),
        Arc::clone(&journal) as Arc<dyn PauseJournal>,
        EngineConfig::default(),
    );

    let outcome = engine
        .run(
            graph(
                vec![trigger, approval, deploy],
                vec![edge(t, "out", a), edge(a, "yes", d)],
            ),
            request(json!({"build": 42})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Paused);
    assert_eq!(outcome.paused_nodes, vec![a]);
    assert_eq!(journal.len(), 1);

    let resumed = engine
        .resume(
            outcome.execution_id,
            a,
            json!({"approvalStatus": "approved"}),
        )
        .await
        .unwrap();

    assert_eq!(resumed.status, ExecutionStatus::Completed);
    assert_eq!(resumed.outputs[&a]["status"], "approved");
    assert_eq!(resumed.outputs[&a]["branch"], "yes");
    assert_eq!(resumed.outputs[&d]["deployed"], true);
    // Resume destroys the pause record.
    assert!(journal.is_empty());
}

#[tokio::test]
async fn resume_of_running_node_is_rejected() {
    let trigger = node("manualTrigger", json!({}));
    let no_op = node("noOp", json!({}));
    let (t, n) = (trigger.id, no_op.id);

    let engine = engine();
    let outcome = engine
        .run(
            graph(vec![trigger, no_op], vec![edge(t, "out", n)]),
            request(json!({})),
        )
        .await
        .unwrap();

    let err = engine
        .resume(outcome.execution_id, n, json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already finished"));
}

#[tokio::test]
async fn rate_limiter_delay_mode_stalls_then_passes() {
    let shared_key = "shared-delay-test";
    let make_flow = || {
        let trigger = node("manualTrigger", json!({}));
        let limiter = node(
            "rateLimiter",
            json!({
                "key": shared_key,
                "windowMs": 150,
                "maxRequests": 1,
                "mode": "delay",
            }),
        );
        let sink = node("noOp", json!({}));
        let (t, l, s) = (trigger.id, limiter.id, sink.id);
        (
            graph(
                vec![trigger, limiter, sink],
                vec![edge(t, "out", l), edge(l, "out", s)],
            ),
            s,
        )
    };

    let engine = engine();
    let (first_flow, _) = make_flow();
    engine.run(first_flow, request(json!({}))).await.unwrap();

    let started = std::time::Instant::now();
    let (second_flow, sink) = make_flow();
    let outcome = engine.run(second_flow, request(json!({}))).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    // The second admission waited out the remainder of the window.
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(outcome.outputs[&sink]["_rateLimiter"]["waitMs"].is_u64());
}

#[tokio::test]
async fn two_entry_points_merge_with_last_writer_wins() {
    let left_trigger = node("manualTrigger", json!({}));
    let right_trigger = node("manualTrigger", json!({}));
    let left = node(
        "setFields",
        json!({"fields": {"shared": "left", "only_left": 1}, "keepOnlySet": true}),
    );
    let right = node(
        "setFields",
        json!({"fields": {"shared": "right", "only_right": 2}, "keepOnlySet": true}),
    );
    let sink = node("noOp", json!({}));
    let (lt, rt, l, r, s) = (left_trigger.id, right_trigger.id, left.id, right.id, sink.id);

    let outcome = engine()
        .run(
            graph(
                vec![left_trigger, right_trigger, left, right, sink],
                vec![
                    edge(lt, "out", l),
                    edge(rt, "out", r),
                    edge(l, "out", s),
                    edge(r, "out", s),
                ],
            ),
            request(json!({})),
        )
        .await
        .unwrap();

    let merged = &outcome.outputs[&s];
    assert_eq!(merged["only_left"], 1);
    assert_eq!(merged["only_right"], 2);
    // One of the writers won deterministically.
    assert!(merged["shared"] == "left" || merged["shared"] == "right");
}

#[tokio::test]
async fn merge_multi_port_keys_by_branch() {
    let left_trigger = node("manualTrigger", json!({}));
    let right_trigger = node("manualTrigger", json!({}));
    let left = node("setFields", json!({"fields": {"v": "L"}, "keepOnlySet": true}));
    let right = node("setFields", json!({"fields": {"v": "R"}, "keepOnlySet": true}));
    let merge = node("merge", json!({"mode": "multiplex"}));
    let (lt, rt, l, r, m) = (left_trigger.id, right_trigger.id, left.id, right.id, merge.id);

    let mut left_edge = edge(l, "out", m);
    left_edge.target_port = Some("first".to_owned());
    let mut right_edge = edge(r, "out", m);
    right_edge.target_port = Some("second".to_owned());

    let outcome = engine()
        .run(
            graph(
                vec![left_trigger, right_trigger, left, right, merge],
                vec![edge(lt, "out", l), edge(rt, "out", r), left_edge, right_edge],
            ),
            request(json!({})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.outputs[&m]["merged"]["first"]["v"], "L");
    assert_eq!(outcome.outputs[&m]["merged"]["second"]["v"], "R");
}

#[tokio::test]
async fn cancelling_a_paused_execution_purges_the_journal() {
    let journal = Arc::new(MemoryJournal::new());
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));
    let engine = FlowEngine::new(
        Arc::new(registry),
        Arc::clone(&journal) as Arc<dyn PauseJournal>,
        EngineConfig::default(),
    );

    let trigger = node("manualTrigger", json!({}));
    let gate = node("approval", json!({}));
    let after = node("noOp", json!({}));
    let (t, g, af) = (trigger.id, gate.id, after.id);

    let outcome = engine
        .run(
            graph(
                vec![trigger, gate, after],
                vec![edge(t, "out", g), edge(g, "approved", af)],
            ),
            request(json!({})),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Paused);
    assert_eq!(journal.len(), 1);

    engine.cancel(outcome.execution_id).await.unwrap();

    let state = engine.execution_state(outcome.execution_id).await.unwrap();
    assert_eq!(state.status, ExecutionStatus::Cancelled);
    assert_eq!(state.node_record(g).unwrap().state, NodeState::Cancelled);
    assert_eq!(state.node_record(af).unwrap().state, NodeState::Cancelled);
    assert!(journal.is_empty());

    // A cancelled execution cannot resume.
    let err = engine
        .resume(outcome.execution_id, g, json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already finished"));
}

#[tokio::test]
async fn cancel_of_unknown_execution_errors() {
    let err = engine().cancel(weft_core::ExecutionId::new()).await.unwrap_err();
    assert!(err.to_string().contains("unknown execution"));
}

#[tokio::test]
async fn deadline_expires_long_runs() {
    let config = EngineConfig {
        max_parallelism: 2,
        execution_deadline: Duration::from_millis(300),
        node_timeout: Duration::from_secs(30),
    };
    let trigger = node("manualTrigger", json!({}));
    let slow = node(
        "executeCommand",
        json!({"enabled": true, "command": "sleep 10", "timeoutSec": 30}),
    );
    let (t, s) = (trigger.id, slow.id);

    let engine = engine_with_config(config);
    let outcome = engine
        .run(
            graph(vec![trigger, slow], vec![edge(t, "out", s)]),
            request(json!({})),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("deadline"));

    let state = engine.execution_state(outcome.execution_id).await.unwrap();
    assert_eq!(state.node_record(s).unwrap().state, NodeState::Failed);
}

#[tokio::test]
async fn unknown_handler_is_an_engine_error() {
    let trigger = node("manualTrigger", json!({}));
    let bogus = node("definitelyNotRegistered", json!({}));
    let (t, b) = (trigger.id, bogus.id);

    let err = engine()
        .run(
            graph(vec![trigger, bogus], vec![edge(t, "out", b)]),
            request(json!({})),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown handler"));
}

#[tokio::test]
async fn deterministic_reruns_produce_identical_outputs() {
    let build = || {
        let trigger = node("manualTrigger", json!({}));
        let sort = node("sort", json!({"arrayField": "xs", "sortKey": ""}));
        let fields = node(
            "setFields",
            json!({"fields": {"first": "{{sorted.0}}"}}),
        );
        let (t, s, f) = (trigger.id, sort.id, fields.id);
        (
            graph(
                vec![trigger, sort, fields],
                vec![edge(t, "out", s), edge(s, "out", f)],
            ),
            f,
        )
    };

    let engine = engine();
    let payload = json!({"xs": [3, 1, 2]});

    let (flow_a, f_a) = build();
    let (flow_b, f_b) = build();
    let first = engine.run(flow_a, request(payload.clone())).await.unwrap();
    let second = engine.run(flow_b, request(payload)).await.unwrap();

    assert_eq!(first.outputs[&f_a]["first"], 1);
    assert_eq!(first.outputs[&f_a]["first"], second.outputs[&f_b]["first"]);
    assert_eq!(first.outputs[&f_a]["sorted"], second.outputs[&f_b]["sorted"]);
}
