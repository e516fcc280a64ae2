//! Query request and response types.
//!
//! Separated for modularity - types can evolve independently of logic.
//! "Not found" is always a typed response (`found: false`), never an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{GraphStats, Node, NodeKind, Relationship};
use crate::versions::VersionStats;

// ─── Search ────────────────────────────────────────────────────────

/// Result cap when neither the request nor the configuration sets one.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub query: String,
    pub kind: Option<NodeKind>,
    pub project: Option<String>,
    pub namespace: Option<String>,
    /// `None` defers to the configured default.
    pub limit: Option<usize>,
    /// Order exact simple-name matches ahead of partial ones.
    pub exact_first: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            kind: None,
            project: None,
            namespace: None,
            limit: None,
            exact_first: true,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub found: bool,
    pub count: usize,
    pub results: Vec<Node>,
}

// ─── Node ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse {
    pub id: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node: Option<Node>,
}

// ─── Traversals ────────────────────────────────────────────────────

/// A node reached by a traversal, at the shallowest depth it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalHit {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub kind: NodeKind,
    pub depth: usize,
}

impl TraversalHit {
    pub fn from_node(node: &Node, depth: usize) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            full_name: node.full_name.clone(),
            kind: node.kind,
            depth,
        }
    }
}

/// Callers or callees of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphResponse {
    pub id: String,
    pub found: bool,
    /// Hop 1.
    pub direct: Vec<TraversalHit>,
    /// Hops 2..=max_depth.
    pub indirect: Vec<TraversalHit>,
    pub total: usize,
}

impl CallGraphResponse {
    pub fn not_found(id: &str) -> Self {
        Self {
            id: id.to_string(),
            found: false,
            direct: Vec::new(),
            indirect: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceResponse {
    pub id: String,
    pub found: bool,
    pub ancestors: Vec<TraversalHit>,
    pub descendants: Vec<TraversalHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationsResponse {
    pub id: String,
    pub found: bool,
    pub implementations: Vec<TraversalHit>,
    pub count: usize,
}

// ─── Statistics ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub version: String,
    pub nodes: usize,
    pub edges: usize,
    pub by_relationship: BTreeMap<Relationship, usize>,
    pub by_node_kind: BTreeMap<NodeKind, usize>,
    pub by_version: BTreeMap<String, VersionStats>,
}

impl Statistics {
    pub fn new(version: &str, graph: GraphStats, by_version: BTreeMap<String, VersionStats>) -> Self {
        Self {
            version: version.to_string(),
            nodes: graph.nodes,
            edges: graph.edges,
            by_relationship: graph.by_relationship,
            by_node_kind: graph.by_node_kind,
            by_version,
        }
    }
}
