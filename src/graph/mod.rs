//! Immutable liquor / ingredient / compound interaction graph.
//!
//! The graph is built once by [`GraphBuilder`] from external node and edge tables and
//! is read-only afterwards. Every other component (encoder, trainer, recommender,
//! service) borrows it; nothing besides the builder constructs or mutates one.
//!
//! # Index Invariant
//!
//! Node indices are dense (`0..num_nodes`) and assigned in node-record order at build
//! time. The embedding table of a trained model is sized from [`Graph::num_nodes`], so
//! a checkpoint is only valid for the graph it was trained against.

pub mod builder;
pub mod error;
pub mod types;


pub use builder::{EdgeRecord, GraphBuilder, GraphData, NodeRecord};
pub use error::GraphError;
pub use types::{Edge, Node, NodeId, NodeType, Relation};

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::constants::NUM_RELATIONS;

/// Read-only graph of typed nodes and weighted, relation-tagged edges.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
    liquors: Vec<usize>,
    ingredients: Vec<usize>,
    compounds: Vec<usize>,
}

impl Graph {
    pub(crate) fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let index = nodes.iter().map(|n| (n.id, n.idx)).collect();
        let of_type = |t: NodeType| {
            nodes
                .iter()
                .filter(|n| n.node_type == t)
                .map(|n| n.idx)
                .collect::<Vec<_>>()
        };
        let liquors = of_type(NodeType::Liquor);
        let ingredients = of_type(NodeType::Ingredient);
        let compounds = of_type(NodeType::Compound);

        Self {
            nodes,
            edges,
            index,
            liquors,
            ingredients,
            compounds,
        }
    }

    /// Reads a [`GraphData`] JSON document and builds the graph.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data: GraphData = serde_json::from_str(&raw)?;
        let graph = GraphBuilder::from_data(data).build()?;

        info!(
            path = %path.display(),
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            liquors = graph.liquors.len(),
            ingredients = graph.ingredients.len(),
            "Graph loaded"
        );

        Ok(graph)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    /// Looks up a node by its external id, regardless of type.
    pub fn lookup(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Resolves an external id to its dense index, requiring the given node type.
    pub fn index_of(&self, id: NodeId, node_type: NodeType) -> Option<usize> {
        self.lookup(id)
            .filter(|n| n.node_type == node_type)
            .map(|n| n.idx)
    }

    /// Indices of every node of `node_type`, ascending.
    pub fn indices_of(&self, node_type: NodeType) -> &[usize] {
        match node_type {
            NodeType::Liquor => &self.liquors,
            NodeType::Ingredient => &self.ingredients,
            NodeType::Compound => &self.compounds,
        }
    }

    /// Edges whose target is `idx` (incoming messages during convolution).
    pub fn incoming(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.tgt == idx)
    }

    pub fn edges_of(&self, relation: Relation) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.relation == relation)
    }

    /// Number of edges per relation code.
    pub fn relation_counts(&self) -> [usize; NUM_RELATIONS] {
        let mut counts = [0; NUM_RELATIONS];
        for edge in &self.edges {
            counts[edge.relation.code()] += 1;
        }
        counts
    }
}
