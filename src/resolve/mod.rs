//! Symbol resolution — from a human-readable name to exactly one node.
//!
//! Raw facts admit overloads, namespace collisions and extended/base type
//! pairs, so resolution runs a fixed sequence of passes and returns the first
//! hit. Given the same graph and request the result is always the same, and
//! it always has the requested kind.

pub mod convention;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{CodeGraph, Node, NodeKind};
use crate::query::{search, SearchQuery};

pub use convention::{NamingConvention, NoConvention, SuffixConvention};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub containing_type: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ResolveRequest {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            containing_type: None,
            namespace: None,
        }
    }

    pub fn in_type(mut self, containing_type: impl Into<String>) -> Self {
        self.containing_type = Some(containing_type.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Which pass produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvePass {
    /// Member of the named containing type.
    ContainingType,
    /// Member of the base type derived through the naming convention.
    ConventionBase,
    /// Same-named member not declared on an interface.
    NonInterfaceMember,
    /// First same-named member.
    FirstMember,
    /// Exact name within the requested namespace.
    Namespace,
    /// Fully qualified query matched by full-name suffix.
    QualifiedName,
    /// First simple-name match.
    FirstMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pass: Option<ResolvePass>,
    /// Candidates considered.
    pub candidates: usize,
}

impl ResolveResponse {
    fn not_found(candidates: usize) -> Self {
        Self {
            found: false,
            node: None,
            pass: None,
            candidates,
        }
    }

    fn hit(node: &Node, pass: ResolvePass, candidates: usize) -> Self {
        Self {
            found: true,
            node: Some(node.clone()),
            pass: Some(pass),
            candidates,
        }
    }
}

pub struct SymbolResolver<'g> {
    graph: &'g CodeGraph,
    convention: &'g dyn NamingConvention,
    candidate_limit: usize,
}

/// Last `.`-separated segment.
fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn in_namespace(node: &Node, namespace: &str) -> bool {
    node.namespace.as_deref() == Some(namespace)
        || node
            .full_name
            .strip_prefix(namespace)
            .map_or(false, |rest| rest.starts_with('.'))
}

impl<'g> SymbolResolver<'g> {
    pub fn new(
        graph: &'g CodeGraph,
        convention: &'g dyn NamingConvention,
        candidate_limit: usize,
    ) -> Self {
        Self {
            graph,
            convention,
            candidate_limit: candidate_limit.max(1),
        }
    }

    pub fn resolve(&self, req: &ResolveRequest) -> ResolveResponse {
        let name = req.name.trim();
        let simple = simple_name(name);
        if simple.is_empty() {
            return ResolveResponse::not_found(0);
        }

        let query = SearchQuery {
            query: simple.to_string(),
            kind: Some(req.kind),
            limit: Some(self.candidate_limit),
            exact_first: true,
            ..Default::default()
        };
        let candidates = search(self.graph, &query);
        // `search` already filtered by kind; keep the guarantee explicit.
        let candidates: Vec<&Node> = candidates.iter().filter(|n| n.kind == req.kind).collect();
        let count = candidates.len();

        let hit = match (req.kind, req.containing_type.as_deref()) {
            (NodeKind::Method, Some(containing)) if !containing.is_empty() => {
                self.resolve_member(&candidates, simple, containing, req.namespace.as_deref())
            }
            _ => Self::resolve_named(&candidates, name, simple, req.namespace.as_deref()),
        };

        match hit {
            Some((node, pass)) => {
                debug!(name, kind = %req.kind, id = %node.id, ?pass, "symbol resolved");
                ResolveResponse::hit(node, pass, count)
            }
            None => {
                debug!(name, kind = %req.kind, candidates = count, "symbol not resolved");
                ResolveResponse::not_found(count)
            }
        }
    }

    fn resolve_member<'c>(
        &self,
        candidates: &[&'c Node],
        name: &str,
        containing: &str,
        namespace: Option<&str>,
    ) -> Option<(&'c Node, ResolvePass)> {
        // `type_name` may be qualified; every segment it carries must match.
        let member_of = |type_name: &str| {
            let exact = format!("{}.{}", type_name, name);
            let suffix = format!(".{}", exact);
            candidates
                .iter()
                .copied()
                .filter(|n| namespace.map_or(true, |ns| in_namespace(n, ns)))
                .find(|n| n.full_name == exact || n.full_name.ends_with(&suffix))
        };

        if let Some(node) = member_of(containing) {
            return Some((node, ResolvePass::ContainingType));
        }

        if let Some(base) = self.convention.base_name(simple_name(containing)) {
            if base != simple_name(containing) {
                if let Some(node) = member_of(&base) {
                    return Some((node, ResolvePass::ConventionBase));
                }
            }
        }

        let same_named = || candidates.iter().copied().filter(|n| n.name == name);

        if let Some(node) = same_named().find(|n| !self.declared_on_interface(n)) {
            return Some((node, ResolvePass::NonInterfaceMember));
        }

        same_named()
            .next()
            .map(|node| (node, ResolvePass::FirstMember))
    }

    fn resolve_named<'c>(
        candidates: &[&'c Node],
        name: &str,
        simple: &str,
        namespace: Option<&str>,
    ) -> Option<(&'c Node, ResolvePass)> {
        let same_named = || candidates.iter().copied().filter(|n| n.name == simple);

        if let Some(ns) = namespace {
            if let Some(node) = same_named().find(|n| n.namespace.as_deref() == Some(ns)) {
                return Some((node, ResolvePass::Namespace));
            }
        }

        if name.contains('.') {
            let dotted = format!(".{}", name);
            if let Some(node) = same_named()
                .find(|n| n.full_name == name || n.full_name.ends_with(&dotted))
            {
                return Some((node, ResolvePass::QualifiedName));
            }
        }

        same_named().next().map(|node| (node, ResolvePass::FirstMatch))
    }

    fn declared_on_interface(&self, node: &Node) -> bool {
        self.graph
            .index_of(&node.id)
            .and_then(|idx| self.graph.declaring_type(idx))
            .map_or(false, |parent| parent.kind == NodeKind::Interface)
    }
}
