//! Input assembly from predecessor outputs.

use std::collections::HashMap;

use serde_json::{Map, Value};
use weft_core::NodeId;

use crate::graph::FlowGraph;

/// Assemble a node's input from its satisfied inbound edges.
///
/// - One satisfied predecessor: its output, verbatim.
/// - Several, plain handler: object outputs shallow-merge with
///   last-writer-wins in predecessor topological order; non-object
///   outputs are dropped from the merge.
/// - Several, `multi_port` handler: each output lands under its inbound
///   port key (the edge's target port, else the source branch label,
///   else the source node id on collision).
pub fn assemble(
    graph: &FlowGraph,
    satisfied_edges: &[usize],
    outputs: &HashMap<NodeId, Value>,
    multi_port: bool,
) -> Value {
    let mut edges: Vec<usize> = satisfied_edges.to_vec();
    // Predecessor topological order decides merge order.
    edges.sort_by_key(|&edge| graph.rank(graph.edges()[edge].source));

    if !multi_port {
        if let [only] = edges.as_slice() {
            let source = graph.edges()[*only].source;
            return outputs.get(&source).cloned().unwrap_or(Value::Null);
        }

        let mut merged = Map::new();
        for &edge in &edges {
            let source = graph.edges()[edge].source;
            if let Some(Value::Object(map)) = outputs.get(&source) {
                for (key, value) in map {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        return Value::Object(merged);
    }

    let mut keyed = Map::new();
    for &edge in &edges {
        let edge_ref = &graph.edges()[edge];
        let output = outputs.get(&edge_ref.source).cloned().unwrap_or(Value::Null);
        let mut key = edge_ref
            .target_port
            .clone()
            .unwrap_or_else(|| edge_ref.branch.clone());
        if keyed.contains_key(&key) {
            key = format!("{key}_{}", edge_ref.source);
        }
        keyed.insert(key, output);
    }
    Value::Object(keyed)
}
