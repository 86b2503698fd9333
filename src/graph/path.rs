use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use super::{NodeId, ReasoningGraph};

/// How an edge's similarity weight becomes a traversal cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCost {
    /// Cost is the weight itself. Paths with fewer hops win, since every
    /// edge costs more than the threshold.
    #[default]
    Weight,
    /// Cost is `1 - weight`, so strong individual links are cheap.
    Dissimilarity,
}

impl PathCost {
    fn edge_cost(self, weight: f64) -> f64 {
        let cost = match self {
            PathCost::Weight => weight,
            PathCost::Dissimilarity => 1.0 - weight,
        };
        cost.max(0.0)
    }
}

impl FromStr for PathCost {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weight" => Ok(PathCost::Weight),
            "dissimilarity" | "inverted" => Ok(PathCost::Dissimilarity),
            other => Err(format!(
                "Unknown path cost '{}', expected 'weight' or 'dissimilarity'",
                other
            )),
        }
    }
}

impl fmt::Display for PathCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCost::Weight => write!(f, "weight"),
            PathCost::Dissimilarity => write!(f, "dissimilarity"),
        }
    }
}

/// Outcome of a path search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathResult {
    /// Node ids from start to end with the summed cost.
    Found {
        /// Path from start to end, inclusive
        nodes: Vec<NodeId>,
        /// Sum of edge costs
        cost: f64,
    },
    /// The end node cannot be reached, or no search was attempted.
    NoPath,
}

impl PathResult {
    /// Node ids along the path, empty when there is none
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            PathResult::Found { nodes, .. } => nodes,
            PathResult::NoPath => &[],
        }
    }

    /// Whether a path was found
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found { .. })
    }

    /// Whether a node lies on the path
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes().contains(&id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    // Reversed so the max-heap pops the cheapest entry, lower id first on ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds the least-cost path between two nodes with Dijkstra's algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathScorer {
    cost: PathCost,
}

impl PathScorer {
    /// Create a scorer with the given cost policy
    pub fn new(cost: PathCost) -> Self {
        Self { cost }
    }

    /// Cost policy in use
    pub fn cost(&self) -> PathCost {
        self.cost
    }

    /// Least-cost path from `start` to `end`.
    ///
    /// A start equal to the end yields the single node. Unknown endpoints and
    /// disconnected nodes yield [`PathResult::NoPath`].
    pub fn strongest_path(
        &self,
        graph: &ReasoningGraph,
        start: NodeId,
        end: NodeId,
    ) -> PathResult {
        if !graph.contains(start) || !graph.contains(end) {
            return PathResult::NoPath;
        }
        if start == end {
            return PathResult::Found {
                nodes: vec![start],
                cost: 0.0,
            };
        }

        let n = graph.node_count();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<NodeId>> = vec![None; n];
        let slot = |id: NodeId| id as usize - 1;

        let mut heap = BinaryHeap::new();
        dist[slot(start)] = 0.0;
        heap.push(Frontier {
            cost: 0.0,
            node: start,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == end {
                break;
            }
            if cost > dist[slot(node)] {
                continue;
            }

            for (next, weight) in graph.neighbors(node) {
                let candidate = cost + self.cost.edge_cost(weight);
                if candidate < dist[slot(next)] {
                    dist[slot(next)] = candidate;
                    prev[slot(next)] = Some(node);
                    heap.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        if dist[slot(end)].is_infinite() {
            return PathResult::NoPath;
        }

        let mut nodes = vec![end];
        let mut current = end;
        while let Some(p) = prev[slot(current)] {
            nodes.push(p);
            current = p;
        }
        nodes.reverse();

        PathResult::Found {
            nodes,
            cost: dist[slot(end)],
        }
    }
}
