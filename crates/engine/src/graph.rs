//! The flow graph model and its validation.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_core::NodeId;
use weft_handler::DEFAULT_BRANCH;

/// One node instance in a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    /// Unique id within the flow.
    #[serde(rename = "nodeId")]
    pub id: NodeId,
    /// The handler type key (e.g. `"condition"`).
    #[serde(rename = "nodeType")]
    pub key: String,
    /// Handler-interpreted configuration; opaque to the engine.
    #[serde(rename = "nodeConfig", default)]
    pub config: Value,
    /// Editor canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

/// A directed edge between two flow nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    /// The node the data leaves.
    #[serde(rename = "sourceNodeId")]
    pub source: NodeId,
    /// Branch label on the source (`"out"`, `"true"`, `"approved"`, …).
    #[serde(rename = "sourceBranch", default = "default_branch")]
    pub branch: String,
    /// The node the data enters.
    #[serde(rename = "targetNodeId")]
    pub target: NodeId,
    /// Optional named input port on the target.
    #[serde(rename = "targetPort", default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_owned()
}

/// The raw, unvalidated wire shape of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// All nodes.
    pub nodes: Vec<FlowNode>,
    /// All edges.
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// Errors found while validating a flow definition.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Two nodes share an id.
    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),

    /// An edge references a node that does not exist.
    #[error("edge references unknown node {0}")]
    UnknownNode(NodeId),

    /// Two edges leave the same node on the same branch label.
    #[error("node {node_id} has more than one edge on branch `{branch}`")]
    DuplicateBranch {
        /// The offending source node.
        node_id: NodeId,
        /// The duplicated branch label.
        branch: String,
    },

    /// The graph has a cycle.
    #[error("flow graph contains a cycle through node {0}")]
    Cycle(NodeId),

    /// The graph has no entry points.
    #[error("flow graph has no nodes without predecessors")]
    NoEntryPoint,
}

/// A validated flow graph with prebuilt adjacency and a topological rank.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    by_id: HashMap<NodeId, usize>,
    outbound: HashMap<NodeId, Vec<usize>>,
    inbound: HashMap<NodeId, Vec<usize>>,
    topo_rank: HashMap<NodeId, usize>,
}

impl FlowGraph {
    /// Validate a definition and build the graph.
    pub fn new(definition: FlowDefinition) -> Result<Self, GraphError> {
        let FlowDefinition { nodes, edges } = definition;

        let mut by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if by_id.insert(node.id, index).is_some() {
                return Err(GraphError::DuplicateNodeId(node.id));
            }
        }

        let mut outbound: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut inbound: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut seen_branches: HashSet<(NodeId, &str)> = HashSet::new();
        for (index, edge) in edges.iter().enumerate() {
            if !by_id.contains_key(&edge.source) {
                return Err(GraphError::UnknownNode(edge.source));
            }
            if !by_id.contains_key(&edge.target) {
                return Err(GraphError::UnknownNode(edge.target));
            }
            if !seen_branches.insert((edge.source, edge.branch.as_str())) {
                return Err(GraphError::DuplicateBranch {
                    node_id: edge.source,
                    branch: edge.branch.clone(),
                });
            }
            outbound.entry(edge.source).or_default().push(index);
            inbound.entry(edge.target).or_default().push(index);
        }

        // Cycle check and topological rank via petgraph.
        let mut petgraph = DiGraph::<NodeId, ()>::new();
        let mut petgraph_index = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            petgraph_index.insert(node.id, petgraph.add_node(node.id));
        }
        for edge in &edges {
            petgraph.add_edge(petgraph_index[&edge.source], petgraph_index[&edge.target], ());
        }
        let sorted =
            toposort(&petgraph, None).map_err(|cycle| GraphError::Cycle(petgraph[cycle.node_id()]))?;
        let topo_rank: HashMap<NodeId, usize> = sorted
            .into_iter()
            .enumerate()
            .map(|(rank, index)| (petgraph[index], rank))
            .collect();

        Ok(Self {
            nodes,
            edges,
            by_id,
            outbound,
            inbound,
            topo_rank,
        })
    }

    /// All nodes.
    #[must_use]
    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    /// All edges; indexes into this slice are the edge ids used below.
    #[must_use]
    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    /// A node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&FlowNode> {
        self.by_id.get(&id).map(|&index| &self.nodes[index])
    }

    /// Edge indexes leaving `id`.
    #[must_use]
    pub fn outbound(&self, id: NodeId) -> &[usize] {
        self.outbound.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Edge indexes entering `id`.
    #[must_use]
    pub fn inbound(&self, id: NodeId) -> &[usize] {
        self.inbound.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Topological rank of a node (entry points rank lowest).
    #[must_use]
    pub fn rank(&self, id: NodeId) -> usize {
        self.topo_rank.get(&id).copied().unwrap_or(usize::MAX)
    }

    /// Nodes with no inbound edges.
    #[must_use]
    pub fn entry_points(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|node| node.id)
            .filter(|id| self.inbound(*id).is_empty())
            .collect()
    }

    /// All node ids.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    /// The fan-out scope downstream of `start`: nodes reachable without
    /// traversing past a node whose key is `merge`, plus the join node
    /// itself when one is reached.
    ///
    /// Returns `(scope, join)`. The join (first `merge` reached) is not
    /// part of the scope.
    #[must_use]
    pub fn fan_out_scope(&self, start: NodeId) -> (HashSet<NodeId>, Option<NodeId>) {
        let mut scope = HashSet::new();
        let mut join = None;
        let mut queue: Vec<NodeId> = self
            .outbound(start)
            .iter()
            .map(|&edge| self.edges[edge].target)
            .collect();

        while let Some(id) = queue.pop() {
            let Some(node) = self.node(id) else { continue };
            if node.key == "merge" {
                join.get_or_insert(id);
                continue;
            }
            if scope.insert(id) {
                for &edge in self.outbound(id) {
                    queue.push(self.edges[edge].target);
                }
            }
        }
        (scope, join)
    }
}

impl TryFrom<FlowDefinition> for FlowGraph {
    type Error = GraphError;

    fn try_from(definition: FlowDefinition) -> Result<Self, Self::Error> {
        Self::new(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(key: &str) -> FlowNode {
        FlowNode {
            id: NodeId::new(),
            key: key.to_owned(),
            config: json!({}),
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

    #[test]
    fn builds_simple_chain() {
        let a = node("manualTrigger");
        let b = node("noOp");
        let (a_id, b_id) = (a.id, b.id);
        let graph = FlowGraph::new(FlowDefinition {
            nodes: vec![a, b],
            edges: vec![edge(a_id, "out", b_id)],
        })
        .unwrap();

        assert_eq!(graph.entry_points(), vec![a_id]);
        assert_eq!(graph.outbound(a_id).len(), 1);
        assert_eq!(graph.inbound(b_id).len(), 1);
        assert!(graph.rank(a_id) < graph.rank(b_id));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let a = node("noOp");
        let duplicate = FlowNode { ..a.clone() };
        let err = FlowGraph::new(FlowDefinition {
            nodes: vec![a, duplicate],
            edges: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNodeId(_)));
    }

    #[test]
    fn rejects_unknown_edge_targets() {
        let a = node("noOp");
        let a_id = a.id;
        let err = FlowGraph::new(FlowDefinition {
            nodes: vec![a],
            edges: vec![edge(a_id, "out", NodeId::new())],
        })
        .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }

    #[test]
    fn rejects_duplicate_branch_labels() {
        let a = node("condition");
        let b = node("noOp");
        let c = node("noOp");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        let err = FlowGraph::new(FlowDefinition {
            nodes: vec![a, b, c],
            edges: vec![edge(a_id, "true", b_id), edge(a_id, "true", c_id)],
        })
        .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateBranch { .. }));
    }

    #[test]
    fn rejects_cycles() {
        let a = node("noOp");
        let b = node("noOp");
        let (a_id, b_id) = (a.id, b.id);
        let err = FlowGraph::new(FlowDefinition {
            nodes: vec![a, b],
            edges: vec![edge(a_id, "out", b_id), edge(b_id, "out", a_id)],
        })
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn empty_graph_is_valid() {
        let graph = FlowGraph::new(FlowDefinition {
            nodes: vec![],
            edges: vec![],
        })
        .unwrap();
        assert!(graph.entry_points().is_empty());
    }

    #[test]
    fn fan_out_scope_stops_at_merge() {
        // loop → a → merge → tail
        let loop_node = node("loop");
        let a = node("noOp");
        let merge = node("merge");
        let tail = node("noOp");
        let (l_id, a_id, m_id, t_id) = (loop_node.id, a.id, merge.id, tail.id);

        let graph = FlowGraph::new(FlowDefinition {
            nodes: vec![loop_node, a, merge, tail],
            edges: vec![
                edge(l_id, "out", a_id),
                edge(a_id, "out", m_id),
                edge(m_id, "out", t_id),
            ],
        })
        .unwrap();

        let (scope, join) = graph.fan_out_scope(l_id);
        assert_eq!(scope, HashSet::from([a_id]));
        assert_eq!(join, Some(m_id));
    }

    #[test]
    fn fan_out_scope_without_merge_reaches_sinks() {
        let loop_node = node("loop");
        let a = node("noOp");
        let b = node("noOp");
        let (l_id, a_id, b_id) = (loop_node.id, a.id, b.id);

        let graph = FlowGraph::new(FlowDefinition {
            nodes: vec![loop_node, a, b],
            edges: vec![edge(l_id, "out", a_id), edge(a_id, "out", b_id)],
        })
        .unwrap();

        let (scope, join) = graph.fan_out_scope(l_id);
        assert_eq!(scope, HashSet::from([a_id, b_id]));
        assert_eq!(join, None);
    }

    #[test]
    fn wire_format_field_names() {
        let raw = json!({
            "nodes": [
                {
                    "nodeId": "550e8400-e29b-41d4-a716-446655440000",
                    "nodeType": "manualTrigger",
                    "nodeConfig": {},
                },
                {
                    "nodeId": "550e8400-e29b-41d4-a716-446655440001",
                    "nodeType": "noOp",
                },
            ],
            "edges": [
                {
                    "sourceNodeId": "550e8400-e29b-41d4-a716-446655440000",
                    "targetNodeId": "550e8400-e29b-41d4-a716-446655440001",
                },
            ],
        });
        let definition: FlowDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(definition.edges[0].branch, "out");
        assert!(FlowGraph::new(definition).is_ok());
    }
}
