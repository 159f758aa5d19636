//! Multi-source shortest paths over the per-field gate-time graph.
//!
//! Transitions are undirected for planning: a gate usable upward is usable
//! downward at the same cost. All sources are seeded at time zero and a single
//! Dijkstra sweep assigns every node the smallest accumulated gate time from
//! whichever source reaches it first. Ties between sources are resolved by
//! heap order and are not part of the contract.

use std::{ cmp::Ordering, collections::BinaryHeap };
use ndarray as nd;
use petgraph::{
    graph::{ NodeIndex, UnGraph },
    visit::EdgeRef,
};
use thiserror::Error;
use crate::transitions::TransitionGraph;

/// Archive value of a predecessor entry for initial and unreachable nodes.
pub const NO_PREDECESSOR: i64 = -9999;

/// Undirected weighted graph of one field sample and one policy.
pub type GateGraph = UnGraph<(), f64>;

/// Reasons a weighted graph cannot be planned over.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PlanError {
    /// An edge weight is NaN or negative.
    #[error("invalid weight {weight} on edge {edge}")]
    BadWeight { edge: usize, weight: f64 },

    /// An initial node is not a node of the graph.
    #[error("initial node {0} out of range")]
    BadSource(usize),
}

/// Build the weighted graph of one field sample from per-edge gate times.
///
/// Edges with infinite weight are unusable and left out; NaN or negative
/// weights are rejected.
pub fn build_graph(graph: &TransitionGraph, weights: nd::ArrayView1<f64>)
    -> Result<GateGraph, PlanError>
{
    let mut g: GateGraph
        = UnGraph::with_capacity(graph.num_states(), graph.num_edges());
    (0..graph.num_states()).for_each(|_| { g.add_node(()); });
    for (e, (edge, w)) in graph.edges().iter().zip(weights.iter()).enumerate() {
        if w.is_nan() || *w < 0.0 {
            return Err(PlanError::BadWeight { edge: e, weight: *w });
        }
        if w.is_infinite() { continue; }
        g.add_edge(
            NodeIndex::new(edge.from_index),
            NodeIndex::new(edge.to_index),
            *w,
        );
    }
    Ok(g)
}

/// Result of a multi-source search.
#[derive(Clone, Debug, PartialEq)]
pub struct ShortestPaths {
    /// Minimum accumulated gate time per node; `+∞` if unreachable.
    pub cumulative: nd::Array1<f64>,
    /// Previous hop on an optimal path; `None` for sources and unreachable
    /// nodes.
    pub predecessor: Vec<Option<usize>>,
    /// Source each node was reached from.
    pub origin: Vec<Option<usize>>,
}

impl ShortestPaths {
    /// An all-unreachable result for `n` nodes.
    pub fn unreachable(n: usize) -> Self {
        Self {
            cumulative: nd::Array1::from_elem(n, f64::INFINITY),
            predecessor: vec![None; n],
            origin: vec![None; n],
        }
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        self.origin.get(node).is_some_and(|o| o.is_some())
    }

    /// Node sequence from the originating source to `node`, inclusive, or
    /// `None` if `node` is unreachable.
    pub fn path_to(&self, node: usize) -> Option<Vec<usize>> {
        self.is_reachable(node).then_some(())?;
        let mut path = vec![node];
        let mut cur = node;
        while let Some(prev) = self.predecessor[cur] {
            // cycle guard
            if path.len() > self.predecessor.len() { return None; }
            path.push(prev);
            cur = prev;
        }
        path.reverse();
        Some(path)
    }

    /// Predecessors in archive form, with [`NO_PREDECESSOR`] for `None`.
    pub fn predecessor_array(&self) -> nd::Array1<i64> {
        self.predecessor.iter()
            .map(|p| p.map(|k| k as i64).unwrap_or(NO_PREDECESSOR))
            .collect()
    }
}

#[derive(Copy, Clone, Debug)]
struct Visit {
    time: f64,
    node: usize,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Visit { }

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// reversed so that `BinaryHeap` pops the smallest time first
impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Shortest accumulated weight from the nearest of `sources` to every node.
pub fn shortest_paths(g: &GateGraph, sources: &[usize])
    -> Result<ShortestPaths, PlanError>
{
    let n = g.node_count();
    if let Some(bad) = sources.iter().find(|s| **s >= n) {
        return Err(PlanError::BadSource(*bad));
    }
    let mut paths = ShortestPaths::unreachable(n);
    let mut done: Vec<bool> = vec![false; n];
    let mut heap: BinaryHeap<Visit> = BinaryHeap::new();
    for &s in sources {
        paths.cumulative[s] = 0.0;
        paths.origin[s] = Some(s);
        heap.push(Visit { time: 0.0, node: s });
    }
    while let Some(Visit { time, node }) = heap.pop() {
        if done[node] { continue; }
        done[node] = true;
        for edge in g.edges(NodeIndex::new(node)) {
            let next = if edge.source().index() == node {
                edge.target().index()
            } else {
                edge.source().index()
            };
            if done[next] { continue; }
            let cand = time + *edge.weight();
            if cand < paths.cumulative[next] {
                paths.cumulative[next] = cand;
                paths.predecessor[next] = Some(node);
                paths.origin[next] = paths.origin[node];
                heap.push(Visit { time: cand, node: next });
            }
        }
    }
    Ok(paths)
}
