//! Graph builder — assembles a `CodeGraph` from stored projects.
//!
//! Edges may cross project (and fragment) boundaries, so every node of the
//! scope is added before any edge.

use tracing::debug;

use super::engine::CodeGraph;
use crate::storage::Project;

/// Build a code graph from fully materialized projects.
pub fn build_from_projects(projects: &[Project]) -> CodeGraph {
    let mut graph = CodeGraph::new();

    // Phase 1: all nodes
    for project in projects {
        for node in &project.nodes {
            graph.add_node(node.clone());
        }
    }

    // Phase 2: edges between known nodes
    let mut dangling = 0usize;
    for project in projects {
        for edge in &project.edges {
            if !graph.add_edge(edge) {
                dangling += 1;
            }
        }
    }

    debug!(
        projects = projects.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dangling,
        "graph built"
    );

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind, Relationship};

    #[test]
    fn test_cross_project_edges_resolve() {
        let mut a = Project::new("a", "A");
        a.nodes.push(Node::new("m1", "Run", "A.Job.Run", NodeKind::Method));
        a.edges.push(Edge::new("m1", "m2", Relationship::Calls));

        let mut b = Project::new("b", "B");
        b.nodes.push(Node::new("m2", "Log", "B.Logger.Log", NodeKind::Method));
        b.edges.push(Edge::new("m2", "ghost", Relationship::Calls));

        let graph = build_from_projects(&[a, b]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
