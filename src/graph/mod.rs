//! Semantic similarity graph over reasoning steps.
//!
//! The graph is a plain arena: nodes are stored in insertion order (node `n`
//! lives at index `n - 1`) and edges in a flat list. Chains are short, so
//! every insert compares the new embedding against all earlier nodes.

mod path;

pub use path::*;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::GraphConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::AppResult;
use crate::steps::StepRecord;

/// Node identifier, 1-based in insertion order.
pub type NodeId = u32;

/// One reasoning step in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// 1-based insertion index
    pub id: NodeId,
    /// `Step N` or `Final Answer`
    pub label: String,
    /// Vector of the step's title and content
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
}

/// Similarity link between an earlier node (`from`) and a later one (`to`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    /// Earlier node
    pub from: NodeId,
    /// Later node
    pub to: NodeId,
    /// Cosine similarity, above the threshold
    pub weight: f64,
}

/// Nodes and edges accumulated over one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReasoningGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl ReasoningGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges in creation order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by id
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.nodes.get(index)
    }

    /// Whether a node with this id exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Id of the most recently inserted node
    pub fn last_id(&self) -> Option<NodeId> {
        self.nodes.last().map(|n| n.id)
    }

    /// Edge between two nodes, in either direction
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&GraphEdge> {
        let (from, to) = if a < b { (a, b) } else { (b, a) };
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }

    /// Neighbors of a node with the connecting weights
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.edges.iter().filter_map(move |e| {
            if e.from == id {
                Some((e.to, e.weight))
            } else if e.to == id {
                Some((e.from, e.weight))
            } else {
                None
            }
        })
    }

    fn next_id(&self) -> NodeId {
        self.nodes.len() as NodeId + 1
    }
}

/// Embeds steps and links each one to similar earlier steps.
pub struct SimilarityGraphBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f64,
    graph: ReasoningGraph,
}

impl SimilarityGraphBuilder {
    /// Create a builder with an empty graph
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: &GraphConfig) -> Self {
        Self {
            embedder,
            threshold: config.similarity_threshold,
            graph: ReasoningGraph::new(),
        }
    }

    /// Similarity an edge must strictly exceed
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Graph built so far
    pub fn graph(&self) -> &ReasoningGraph {
        &self.graph
    }

    /// Take ownership of the graph
    pub fn into_graph(self) -> ReasoningGraph {
        self.graph
    }

    /// Embed a step, add it as the next node and link it to earlier nodes.
    ///
    /// The node id is the 1-based insertion index. An embedding failure
    /// leaves the graph unchanged.
    pub async fn insert(&mut self, step: &StepRecord) -> AppResult<&GraphNode> {
        let embedding = self.embedder.embed(&step.embedding_text()).await?;
        let id = self.graph.next_id();

        let mut linked = 0;
        for earlier in &self.graph.nodes {
            let similarity = cosine_similarity(&embedding, &earlier.embedding);
            trace!(from = earlier.id, to = id, similarity, "Compared step embeddings");
            if similarity > self.threshold {
                self.graph.edges.push(GraphEdge {
                    from: earlier.id,
                    to: id,
                    weight: similarity,
                });
                linked += 1;
            }
        }

        self.graph.nodes.push(GraphNode {
            id,
            label: step.label().to_string(),
            embedding,
        });

        debug!(node = id, label = %step.label(), edges = linked, "Inserted graph node");

        let index = self.graph.nodes.len() - 1;
        Ok(&self.graph.nodes[index])
    }
}
