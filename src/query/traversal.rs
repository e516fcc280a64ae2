//! Bounded-depth traversals: callers, callees, inheritance, implementations.
//!
//! All walks are iterative BFS with a visited set keyed by node, so every node
//! is reported once, at the depth it was first reached, and cyclic data
//! terminates. The root is never reported.

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{HashSet, VecDeque};

use super::types::{CallGraphResponse, ImplementationsResponse, InheritanceResponse, TraversalHit};
use crate::graph::{CodeGraph, Relationship};

/// Breadth-first walk from `root` following edges accepted by `accept` in
/// `direction`, up to `max_depth` hops. Returns `(node, depth)` in discovery order.
fn bfs<F>(
    graph: &CodeGraph,
    root: NodeIndex,
    max_depth: usize,
    direction: Direction,
    accept: F,
) -> Vec<(NodeIndex, usize)>
where
    F: Fn(Relationship) -> bool + Copy,
{
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
    let mut found = Vec::new();

    visited.insert(root);
    queue.push_back((root, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in graph.neighbors_by(current, direction, accept) {
            if visited.insert(next) {
                found.push((next, depth + 1));
                queue.push_back((next, depth + 1));
            }
        }
    }

    found
}

/// Hits sorted by depth, then full name, then id, for stable output.
fn to_hits(graph: &CodeGraph, found: Vec<(NodeIndex, usize)>) -> Vec<TraversalHit> {
    let mut hits: Vec<TraversalHit> = found
        .into_iter()
        .map(|(idx, depth)| TraversalHit::from_node(graph.node_at(idx), depth))
        .collect();
    hits.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.full_name.cmp(&b.full_name))
            .then_with(|| a.id.cmp(&b.id))
    });
    hits
}

fn call_graph(
    graph: &CodeGraph,
    id: &str,
    max_depth: usize,
    include_indirect_edges: bool,
    direction: Direction,
) -> CallGraphResponse {
    let Some(root) = graph.index_of(id) else {
        return CallGraphResponse::not_found(id);
    };

    let accept = move |r: Relationship| {
        r == Relationship::Calls || (include_indirect_edges && r == Relationship::CallsVia)
    };
    let hits = to_hits(graph, bfs(graph, root, max_depth, direction, accept));
    let (direct, indirect): (Vec<_>, Vec<_>) = hits.into_iter().partition(|h| h.depth == 1);

    CallGraphResponse {
        id: id.to_string(),
        found: true,
        total: direct.len() + indirect.len(),
        direct,
        indirect,
    }
}

/// Who calls `id`, up to `max_depth` hops back. `include_indirect` also
/// follows `CallsVia` (interface dispatch) edges.
pub fn callers(
    graph: &CodeGraph,
    id: &str,
    max_depth: usize,
    include_indirect: bool,
) -> CallGraphResponse {
    call_graph(graph, id, max_depth, include_indirect, Direction::Incoming)
}

/// What `id` calls, up to `max_depth` hops forward.
pub fn callees(
    graph: &CodeGraph,
    id: &str,
    max_depth: usize,
    include_via_interface: bool,
) -> CallGraphResponse {
    call_graph(graph, id, max_depth, include_via_interface, Direction::Outgoing)
}

/// Ancestors (following `Inherits` outward) and descendants (inward) of a type.
pub fn inheritance(graph: &CodeGraph, class_id: &str, max_depth: usize) -> InheritanceResponse {
    let Some(root) = graph.index_of(class_id) else {
        return InheritanceResponse {
            id: class_id.to_string(),
            found: false,
            ancestors: Vec::new(),
            descendants: Vec::new(),
        };
    };

    let inherits = |r: Relationship| r == Relationship::Inherits;
    let ancestors = bfs(graph, root, max_depth, Direction::Outgoing, inherits);
    let descendants = bfs(graph, root, max_depth, Direction::Incoming, inherits);

    InheritanceResponse {
        id: class_id.to_string(),
        found: true,
        ancestors: to_hits(graph, ancestors),
        descendants: to_hits(graph, descendants),
    }
}

/// Types directly implementing an interface. Not transitive.
pub fn implementations(graph: &CodeGraph, interface_id: &str) -> ImplementationsResponse {
    let Some(root) = graph.index_of(interface_id) else {
        return ImplementationsResponse {
            id: interface_id.to_string(),
            found: false,
            implementations: Vec::new(),
            count: 0,
        };
    };

    let found = bfs(graph, root, 1, Direction::Incoming, |r| {
        r == Relationship::Implements
    });
    let implementations = to_hits(graph, found);

    ImplementationsResponse {
        id: interface_id.to_string(),
        found: true,
        count: implementations.len(),
        implementations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind};

    fn graph(nodes: &[(&str, NodeKind)], edges: &[(&str, &str, Relationship)]) -> CodeGraph {
        let mut g = CodeGraph::new();
        for (id, kind) in nodes {
            g.add_node(Node::new(*id, id.to_uppercase(), format!("T.{}", id), *kind));
        }
        for (s, t, r) in edges {
            g.add_edge(&Edge::new(*s, *t, *r));
        }
        g
    }

    fn ids(hits: &[TraversalHit]) -> Vec<(&str, usize)> {
        hits.iter().map(|h| (h.id.as_str(), h.depth)).collect()
    }

    /// a -> b -> c -> d, plus a shortcut a -> c, and a cycle d -> a.
    fn chain() -> CodeGraph {
        use Relationship::Calls;
        let m = NodeKind::Method;
        graph(
            &[("a", m), ("b", m), ("c", m), ("d", m)],
            &[("a", "b", Calls), ("b", "c", Calls), ("c", "d", Calls), ("a", "c", Calls), ("d", "a", Calls)],
        )
    }

    #[test]
    fn test_callees_dedup_at_min_depth() {
        let r = callees(&chain(), "a", 5, false);
        assert!(r.found);
        assert_eq!(ids(&r.direct), vec![("b", 1), ("c", 1)]);
        assert_eq!(ids(&r.indirect), vec![("d", 2)]);
        assert_eq!(r.total, 3);
    }

    #[test]
    fn test_depth_bound() {
        let r = callers(&chain(), "d", 1, false);
        assert_eq!(ids(&r.direct), vec![("c", 1)]);
        assert!(r.indirect.is_empty());

        let r = callers(&chain(), "d", 2, false);
        assert_eq!(ids(&r.indirect), vec![("a", 2), ("b", 2)]);
        assert!(r.indirect.iter().chain(&r.direct).all(|h| h.depth <= 2));
    }

    #[test]
    fn test_zero_depth_returns_nothing() {
        let r = callers(&chain(), "d", 0, false);
        assert!(r.found);
        assert_eq!(r.total, 0);
    }

    #[test]
    fn test_calls_via_only_when_requested() {
        use Relationship::{Calls, CallsVia};
        let m = NodeKind::Method;
        let g = graph(
            &[("svc", m), ("iface", m), ("impl", m)],
            &[("svc", "iface", CallsVia), ("iface", "impl", Calls)],
        );
        assert_eq!(callees(&g, "svc", 3, false).total, 0);
        let r = callees(&g, "svc", 3, true);
        assert_eq!(ids(&r.direct), vec![("iface", 1)]);
        assert_eq!(ids(&r.indirect), vec![("impl", 2)]);
    }

    #[test]
    fn test_missing_root_not_found() {
        let r = callers(&chain(), "zzz", 3, true);
        assert!(!r.found);
        assert!(!inheritance(&chain(), "zzz", 3).found);
        assert!(!implementations(&chain(), "zzz").found);
    }

    #[test]
    fn test_no_edges_found_but_empty() {
        let g = graph(&[("lonely", NodeKind::Method)], &[]);
        let r = callers(&g, "lonely", 3, true);
        assert!(r.found);
        assert!(r.direct.is_empty() && r.indirect.is_empty());
    }

    #[test]
    fn test_inheritance_tolerates_cycles() {
        use Relationship::Inherits;
        let c = NodeKind::Class;
        let g = graph(
            &[("base", c), ("mid", c), ("leaf", c)],
            &[("leaf", "mid", Inherits), ("mid", "base", Inherits), ("base", "leaf", Inherits)],
        );
        let r = inheritance(&g, "mid", 10);
        assert_eq!(ids(&r.ancestors), vec![("base", 1), ("leaf", 2)]);
        assert_eq!(ids(&r.descendants), vec![("leaf", 1), ("base", 2)]);
    }

    #[test]
    fn test_implementations_not_transitive() {
        use Relationship::{Implements, Inherits};
        let c = NodeKind::Class;
        let g = graph(
            &[("iface", NodeKind::Interface), ("impl", c), ("sub", c)],
            &[("impl", "iface", Implements), ("sub", "impl", Inherits)],
        );
        let r = implementations(&g, "iface");
        assert_eq!(r.count, 1);
        assert_eq!(r.implementations[0].id, "impl");
    }
}
