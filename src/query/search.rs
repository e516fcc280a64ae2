//! Symbol search and node lookup.

use std::cmp::Ordering;

use super::types::{NodeResponse, SearchQuery, SearchResponse, DEFAULT_SEARCH_LIMIT};
use crate::graph::{CodeGraph, Node};

/// How well a node matched the query text. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchRank {
    ExactName,
    ExactNameIgnoreCase,
    ExactFullName,
    NamePrefix,
    Substring,
}

fn rank(node: &Node, query: &str, query_lower: &str) -> Option<MatchRank> {
    if query.is_empty() {
        return Some(MatchRank::Substring);
    }
    let name_lower = node.name.to_lowercase();
    let full_lower = node.full_name.to_lowercase();

    if node.name == query {
        Some(MatchRank::ExactName)
    } else if name_lower == query_lower {
        Some(MatchRank::ExactNameIgnoreCase)
    } else if full_lower == query_lower {
        Some(MatchRank::ExactFullName)
    } else if name_lower.starts_with(query_lower) {
        Some(MatchRank::NamePrefix)
    } else if full_lower.contains(query_lower) {
        Some(MatchRank::Substring)
    } else {
        None
    }
}

fn passes_filters(node: &Node, q: &SearchQuery) -> bool {
    if let Some(kind) = q.kind {
        if node.kind != kind {
            return false;
        }
    }
    if let Some(project) = &q.project {
        if !node
            .project
            .as_deref()
            .map_or(false, |p| p.eq_ignore_ascii_case(project))
        {
            return false;
        }
    }
    if let Some(namespace) = &q.namespace {
        if node.namespace.as_deref() != Some(namespace.as_str()) {
            return false;
        }
    }
    true
}

/// Case-insensitive search over simple and full names with kind / project /
/// namespace filters. Empty query text matches every node that passes the
/// filters. Ordering is deterministic: match rank (when `exact_first`), then
/// full name, then id.
pub fn search(graph: &CodeGraph, q: &SearchQuery) -> Vec<Node> {
    let query = q.query.trim();
    let query_lower = query.to_lowercase();

    let mut matches: Vec<(MatchRank, &Node)> = graph
        .nodes()
        .filter(|n| passes_filters(n, q))
        .filter_map(|n| rank(n, query, &query_lower).map(|r| (r, n)))
        .collect();

    matches.sort_by(|(ra, a), (rb, b)| {
        let by_rank = if q.exact_first { ra.cmp(rb) } else { Ordering::Equal };
        by_rank
            .then_with(|| a.full_name.cmp(&b.full_name))
            .then_with(|| a.id.cmp(&b.id))
    });

    matches
        .into_iter()
        .take(q.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
        .map(|(_, n)| n.clone())
        .collect()
}

pub fn search_response(graph: &CodeGraph, q: &SearchQuery) -> SearchResponse {
    let results = search(graph, q);
    SearchResponse {
        found: !results.is_empty(),
        count: results.len(),
        results,
    }
}

pub fn get_node(graph: &CodeGraph, id: &str) -> NodeResponse {
    let node = graph.node(id).cloned();
    NodeResponse {
        id: id.to_string(),
        found: node.is_some(),
        node,
    }
}
