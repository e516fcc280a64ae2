//! In-memory code graph for one query scope.
//!
//! A petgraph `DiGraph` of `Node`s with typed edges, plus an id index. Built
//! fresh from the projects of a scope and read-only afterwards.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::types::{Edge, Node, NodeKind, Relationship};

/// Edge weight stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub relationship: Relationship,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub by_relationship: BTreeMap<Relationship, usize>,
    pub by_node_kind: BTreeMap<NodeKind, usize>,
}

#[derive(Debug, Default)]
pub struct CodeGraph {
    graph: DiGraph<Node, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node whose id is already present is ignored and the
    /// existing index returned.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Add an edge between two known ids. Returns false if either endpoint is unknown.
    pub fn add_edge(&mut self, edge: &Edge) -> bool {
        let (Some(&src), Some(&tgt)) = (self.index.get(&edge.source), self.index.get(&edge.target))
        else {
            return false;
        };
        self.graph.add_edge(
            src,
            tgt,
            EdgeData {
                relationship: edge.relationship,
                count: edge.count,
            },
        );
        true
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_at(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Neighbours of `idx` in `direction` over edges whose relationship passes `accept`.
    pub fn neighbors_by<'a, F>(
        &'a self,
        idx: NodeIndex,
        direction: Direction,
        accept: F,
    ) -> impl Iterator<Item = NodeIndex> + 'a
    where
        F: Fn(Relationship) -> bool + 'a,
    {
        self.graph
            .edges_directed(idx, direction)
            .filter(move |e| accept(e.weight().relationship))
            .map(move |e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
    }

    /// The type declaring `idx`, via an incoming `Contains` edge.
    pub fn declaring_type(&self, idx: NodeIndex) -> Option<&Node> {
        self.neighbors_by(idx, Direction::Incoming, |r| r == Relationship::Contains)
            .map(|p| &self.graph[p])
            .find(|n| n.kind.is_type())
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            ..Default::default()
        };
        for node in self.graph.node_weights() {
            *stats.by_node_kind.entry(node.kind).or_default() += 1;
        }
        for edge in self.graph.edge_weights() {
            *stats.by_relationship.entry(edge.relationship).or_default() += 1;
        }
        stats
    }
}
