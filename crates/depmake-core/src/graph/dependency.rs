//! The include graph store.
//!
//! # Edge Direction
//!
//! An edge `A → B` means "A includes B": B is a prerequisite of A.
//!
//! # Invariants
//!
//! - At most one node per id; nodes are created lazily.
//! - No duplicate `(from, to)` edge and no self-edge.
//! - Nodes and edges are never removed, so insertion order is stable for the
//!   life of the graph.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Directed include graph keyed by file id.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node for `id` unless one exists. Returns its index.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_map.insert(id.to_string(), idx);
        idx
    }

    /// Record that `from` includes `to`, creating either node if needed.
    ///
    /// Self-edges and duplicates are dropped. Returns `true` when a new edge
    /// was added.
    pub fn connect(&mut self, from: &str, to: &str) -> bool {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);

        if from_idx == to_idx || self.graph.contains_edge(from_idx, to_idx) {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, ());
        true
    }

    /// Direct dependencies of `id`, in the order the edges were added.
    ///
    /// Unknown ids have no dependencies.
    #[must_use]
    pub fn out_edges(&self, id: &str) -> Vec<&str> {
        self.node_index(id)
            .map(|idx| {
                self.out_indices(idx)
                    .into_iter()
                    .map(|t| self.graph[t].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every node id, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx].as_str())
    }

    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    #[must_use]
    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.node_index(from), self.node_index(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of files that include `id`.
    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Incoming)
    }

    /// Number of files `id` includes directly.
    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    /// BLAKE3 hash over node ids and edges in insertion order.
    ///
    /// Two scans of an unchanged tree produce the same hash.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for id in self.nodes() {
            hasher.update(id.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\x01");
        for edge in self.graph.edge_references() {
            hasher.update(self.graph[edge.source()].as_bytes());
            hasher.update(b"\x00");
            hasher.update(self.graph[edge.target()].as_bytes());
            hasher.update(b"\x00");
        }
        format!("blake3:{}", hasher.finalize())
    }

    #[must_use]
    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    #[must_use]
    pub(crate) fn id(&self, idx: NodeIndex) -> &str {
        self.graph[idx].as_str()
    }

    /// Out-neighbours of `idx` in edge insertion order.
    ///
    /// petgraph iterates a node's edges newest-first; edge indices grow
    /// monotonically because edges are never removed, so sorting by index
    /// restores insertion order.
    #[must_use]
    pub(crate) fn out_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges(idx)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_unstable_by_key(|(edge_id, _)| *edge_id);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    pub(crate) const fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    fn degree(&self, id: &str, direction: Direction) -> usize {
        self.node_index(id)
            .map_or(0, |idx| self.graph.neighbors_directed(idx, direction).count())
    }
}
