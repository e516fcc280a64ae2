//! End-to-end scenarios over the public API: ingest, fragment, reassemble, query.

use cartograph::config::{BackendKind, StorageConfig};
use cartograph::query::{callees, callers, inheritance};
use cartograph::storage::fragment;
use cartograph::{
    build_from_projects, CodeGraph, Config, Edge, ExtractorBatch, GraphStore, KnowledgeBase,
    MemoryStore, Node, NodeKind, Project, Relationship, ResolveRequest, SearchQuery,
};
use std::collections::HashSet;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

fn scenario_a() -> CodeGraph {
    let mut p = Project::new("core", "Core");
    p.nodes = vec![
        Node::new("c1", "ClassA", "App.ClassA", NodeKind::Class),
        Node::new("c2", "ClassB", "App.ClassB", NodeKind::Class),
        Node::new("m1", "MethodM", "App.ClassB.MethodM", NodeKind::Method),
        Node::new("m2", "MethodN", "App.ClassA.MethodN", NodeKind::Method),
    ];
    p.edges = vec![
        Edge::new("c2", "c1", Relationship::Inherits),
        Edge::new("c2", "m1", Relationship::Contains),
        Edge::new("c1", "m2", Relationship::Contains),
        Edge::new("m1", "m2", Relationship::Calls),
    ];
    build_from_projects(&[p])
}

#[test]
fn scenario_a_inheritance_and_callers() {
    let g = scenario_a();

    let inh = inheritance(&g, "c2", 5);
    assert!(inh.found);
    let ancestors: Vec<_> = inh.ancestors.iter().map(|h| (h.id.as_str(), h.depth)).collect();
    assert_eq!(ancestors, vec![("c1", 1)]);
    assert!(inh.descendants.is_empty());

    let calls = callers(&g, "m2", 2, false);
    let direct: Vec<_> = calls.direct.iter().map(|h| (h.id.as_str(), h.depth)).collect();
    assert_eq!(direct, vec![("m1", 1)]);
    assert!(calls.indirect.is_empty());
    assert_eq!(calls.total, 1);
}

fn synthetic_project(id: &str, min_estimate: u64) -> Project {
    let mut p = Project::new(id, id);
    p.source_file = format!("{}.dll", id);
    let mut i = 0;
    while fragment::estimate_size(&p, 1.2).unwrap() <= min_estimate {
        let node = Node::new(
            format!("{}-m{}", id, i),
            format!("Method{}", i),
            format!("Big.Namespace.Service{}.Method{}", i / 10, i),
            NodeKind::Method,
        )
        .with_namespace("Big.Namespace");
        p.nodes.push(node);
        if i > 0 {
            p.edges.push(Edge::new(
                format!("{}-m{}", id, i),
                format!("{}-m{}", id, i - 1),
                Relationship::Calls,
            ));
        }
        i += 1;
    }
    p
}

#[test]
fn scenario_b_fragment_planner_at_full_size() {
    assert_eq!(fragment::fragment_count(40 * MIB, 10 * MIB), 4);
    assert_eq!(fragment::fragment_count(16 * MIB, 10 * MIB), 2);
}

/// Same ratios as a ~40 MB project against a 15 MB ceiling and 10 MB target,
/// scaled down by 1000.
#[tokio::test]
async fn scenario_b_scaled_fragmentation_is_lossless() {
    let config = StorageConfig {
        max_document_bytes: 15_000,
        target_fragment_bytes: 10_000,
        ..StorageConfig::default()
    };
    let store = GraphStore::new(Arc::new(MemoryStore::new()), config);

    let original = synthetic_project("big", 30_000);
    let outcome = store.save_project(original.clone()).await.unwrap();
    assert!(outcome.fragmented);
    assert!(outcome.estimated_bytes > 30_000 && outcome.estimated_bytes <= 40_000);
    assert_eq!(outcome.fragment_count, 4);

    let loaded = store.load_project("big").await.unwrap().unwrap();
    assert_eq!(loaded.nodes.len(), original.nodes.len());
    assert_eq!(loaded.edges.len(), original.edges.len());
    let a: HashSet<_> = original.nodes.iter().collect();
    let b: HashSet<_> = loaded.nodes.iter().collect();
    assert_eq!(a, b);
    let a: HashSet<_> = original.edges.iter().collect();
    let b: HashSet<_> = loaded.edges.iter().collect();
    assert_eq!(a, b);

    // Edges cross fragment boundaries; the reassembled graph is still whole.
    let g = build_from_projects(&[loaded]);
    assert_eq!(g.edge_count(), original.edges.len());
    let last = format!("big-m{}", original.nodes.len() - 1);
    let r = callees(&g, &last, usize::MAX, false);
    assert_eq!(r.total, original.nodes.len() - 1);
}

#[test]
fn bfs_depth_bound_and_dedup_on_diamond() {
    // a -> b -> d, a -> c -> d, d -> e
    let mut p = Project::new("p", "p");
    for id in ["a", "b", "c", "d", "e"] {
        p.nodes.push(Node::new(id, id, format!("X.{}", id), NodeKind::Method));
    }
    for (s, t) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")] {
        p.edges.push(Edge::new(s, t, Relationship::Calls));
    }
    let g = build_from_projects(&[p]);

    for k in 0..4 {
        let r = callees(&g, "a", k, false);
        let all: Vec<_> = r.direct.iter().chain(&r.indirect).collect();
        assert!(all.iter().all(|h| h.depth <= k));
        let ids: HashSet<_> = all.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids.len(), all.len(), "each node reported once");
    }
    let r = callees(&g, "a", 3, false);
    let d = r.indirect.iter().find(|h| h.id == "d").unwrap();
    assert_eq!(d.depth, 2);
}

fn memory_kb() -> KnowledgeBase {
    let mut config = Config::default();
    config.storage.backend = BackendKind::Memory;
    KnowledgeBase::in_memory(config)
}

const BATCH: &str = r#"{
    "schemaVersion": 1,
    "version": "v1",
    "projects": [{
        "projectId": "Shop",
        "projectName": "Shop",
        "layer": "app",
        "contentHash": "h1",
        "sourceFile": "Shop.dll",
        "nodes": [
            {"id": "i1", "name": "IOrderService", "fullName": "Shop.IOrderService", "kind": "interface"},
            {"id": "c1", "name": "OrderService", "fullName": "Shop.OrderService", "kind": "class"},
            {"id": "c2", "name": "OrderServiceExtended", "fullName": "Shop.Custom.OrderServiceExtended", "kind": "class"},
            {"id": "m1", "name": "Save", "fullName": "Shop.OrderService.Save", "kind": "method"},
            {"id": "m2", "name": "Submit", "fullName": "Shop.Cart.Submit", "kind": "method"}
        ],
        "edges": [
            {"source": "c1", "target": "i1", "relationship": "Implements"},
            {"source": "c2", "target": "c1", "relationship": "Inherits"},
            {"source": "c1", "target": "m1", "relationship": "Contains"},
            {"source": "m2", "target": "m1", "relationship": "Calls", "count": 3}
        ]
    }]
}"#;

#[tokio::test]
async fn resolver_falls_back_from_extended_type() {
    let kb = memory_kb();
    kb.ingest(&ExtractorBatch::from_json(BATCH).unwrap()).await.unwrap();

    let req = ResolveRequest::new("Save", NodeKind::Method).in_type("OrderServiceExtended");
    let r = kb.resolve(&req, Some("v1")).await.unwrap();
    assert!(r.found);
    assert_eq!(r.node.unwrap().id, "m1");
}

#[tokio::test]
async fn cache_idempotence_and_invalidation() {
    let kb = memory_kb();
    kb.ingest(&ExtractorBatch::from_json(BATCH).unwrap()).await.unwrap();

    let first = kb.implementations("i1", Some("v1")).await.unwrap();
    let second = kb.implementations("i1", Some("v1")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.count, 1);
    assert_eq!(kb.cache_stats().hits, 1);

    kb.invalidate_cache(None);
    kb.implementations("i1", Some("v1")).await.unwrap();
    let stats = kb.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn unknown_version_yields_empty_results() {
    let kb = memory_kb();
    kb.ingest(&ExtractorBatch::from_json(BATCH).unwrap()).await.unwrap();

    let s = kb.search(&SearchQuery::new("Order"), Some("v7")).await.unwrap();
    assert!(!s.found);
    let stats = kb.statistics(Some("v7")).await.unwrap();
    assert_eq!(stats.nodes, 0);

    let s = kb.search(&SearchQuery::new("Order"), None).await.unwrap();
    assert_eq!(s.count, 4);
}
