use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEFAULT_MISSING_EDGE_WEIGHT;

use super::Graph;
use super::error::GraphError;
use super::types::{Edge, Node, NodeId, NodeType, Relation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Row of the external node table.
pub struct NodeRecord {
    pub node_id: NodeId,
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Row of the external edge table.
pub struct EdgeRecord {
    #[serde(alias = "id_1")]
    pub src: NodeId,
    #[serde(alias = "id_2")]
    pub tgt: NodeId,
    pub edge_type: String,
    /// Measured weight; missing or non-finite values become
    /// [`DEFAULT_MISSING_EDGE_WEIGHT`].
    #[serde(default)]
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Serialized form of the node and edge tables.
pub struct GraphData {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Accumulates node/edge records and produces an immutable [`Graph`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: GraphData) -> Self {
        Self {
            nodes: data.nodes,
            edges: data.edges,
        }
    }

    pub fn node(mut self, node_id: NodeId, node_type: NodeType, name: impl Into<String>) -> Self {
        self.nodes.push(NodeRecord {
            node_id,
            node_type,
            name: name.into(),
        });
        self
    }

    pub fn edge(
        mut self,
        src: NodeId,
        tgt: NodeId,
        edge_type: impl Into<String>,
        score: Option<f32>,
    ) -> Self {
        self.edges.push(EdgeRecord {
            src,
            tgt,
            edge_type: edge_type.into(),
            score,
        });
        self
    }

    pub fn add_node(&mut self, record: NodeRecord) {
        self.nodes.push(record);
    }

    pub fn add_edge(&mut self, record: EdgeRecord) {
        self.edges.push(record);
    }

    /// Assigns dense indices in record order and resolves every edge.
    pub fn build(self) -> Result<Graph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, record) in self.nodes.into_iter().enumerate() {
            if index.insert(record.node_id, idx).is_some() {
                return Err(GraphError::DuplicateNode { id: record.node_id });
            }
            let name = if record.name.is_empty() {
                format!("{} {}", record.node_type, record.node_id)
            } else {
                record.name
            };
            nodes.push(Node {
                id: record.node_id,
                node_type: record.node_type,
                name,
                idx,
            });
        }

        let resolve = |id: NodeId| -> Result<usize, GraphError> {
            index
                .get(&id)
                .copied()
                .ok_or(GraphError::UnknownEndpoint { id })
        };

        let mut edges = Vec::with_capacity(self.edges.len());
        let mut defaulted = 0usize;
        for record in self.edges {
            let src = resolve(record.src)?;
            let tgt = resolve(record.tgt)?;
            let relation =
                Relation::classify(&record.edge_type, nodes[src].node_type, nodes[tgt].node_type);
            let weight = match record.score.filter(|s| s.is_finite()) {
                Some(score) => score,
                None => {
                    defaulted += 1;
                    DEFAULT_MISSING_EDGE_WEIGHT
                }
            };
            edges.push(Edge {
                src,
                tgt,
                relation,
                weight,
            });
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            defaulted_weights = defaulted,
            "Graph built"
        );

        Ok(Graph::from_parts(nodes, edges))
    }
}
