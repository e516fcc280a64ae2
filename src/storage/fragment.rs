//! Fragmentation: sizing, splitting and reassembling oversized projects.
//!
//! Nodes and edges are partitioned independently and by count, not by byte
//! size, so fragments are near-equal in element count only. A project must be
//! reassembled from all of its fragments before it is traversed.

use std::io::{self, Write};

use tracing::warn;

use super::documents::{Fragment, Project};
use crate::error::Result;
use crate::graph::{Edge, Node};

/// `io::Write` sink that only counts bytes.
#[derive(Default)]
struct ByteCounter(u64);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Estimated stored size: canonical JSON byte count times `inflation`.
pub fn estimate_size(project: &Project, inflation: f64) -> Result<u64> {
    let mut counter = ByteCounter::default();
    serde_json::to_writer(&mut counter, project)?;
    Ok((counter.0 as f64 * inflation).ceil() as u64)
}

/// Number of fragments for an estimated size: `ceil(estimated / target)`, at least 1.
pub fn fragment_count(estimated: u64, target: u64) -> usize {
    let target = target.max(1);
    (estimated.div_ceil(target)).max(1) as usize
}

/// Split `items` into exactly `parts` contiguous slices whose lengths differ by
/// at most one; the first `len % parts` slices carry the extra element.
pub fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut iter = items.into_iter();
    (0..parts)
        .map(|i| {
            let take = base + usize::from(i < extra);
            iter.by_ref().take(take).collect()
        })
        .collect()
}

pub fn fragment_id(project_id: &str, generation: u64, chunk_index: usize) -> String {
    format!("{}#g{}#{}", project_id, generation, chunk_index)
}

/// Build `count` fragments for one project generation.
pub fn split(
    project_id: &str,
    generation: u64,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    count: usize,
) -> Vec<Fragment> {
    let count = count.max(1);
    let node_parts = partition(nodes, count);
    let edge_parts = partition(edges, count);

    node_parts
        .into_iter()
        .zip(edge_parts)
        .enumerate()
        .map(|(chunk_index, (nodes, edges))| Fragment {
            fragment_id: fragment_id(project_id, generation, chunk_index),
            parent_project_id: project_id.to_string(),
            chunk_index,
            total_chunks: count,
            nodes,
            edges,
        })
        .collect()
}

/// Concatenate fragments (ordered by `chunk_index`) back into the metadata
/// document. A count different from the recorded one is logged, not fatal.
pub fn reassemble(mut meta: Project, mut fragments: Vec<Fragment>) -> Project {
    fragments.sort_by_key(|f| f.chunk_index);

    let expected = meta.fragment_count.unwrap_or(meta.fragment_ids.len());
    if fragments.len() != expected {
        warn!(
            project_id = %meta.project_id,
            expected,
            retrieved = fragments.len(),
            "fragment count mismatch, continuing with retrieved fragments"
        );
    }

    let node_total: usize = fragments.iter().map(|f| f.nodes.len()).sum();
    let edge_total: usize = fragments.iter().map(|f| f.edges.len()).sum();
    meta.nodes = Vec::with_capacity(node_total);
    meta.edges = Vec::with_capacity(edge_total);
    for fragment in fragments {
        meta.nodes.extend(fragment.nodes);
        meta.edges.extend(fragment.edges);
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Relationship};

    const MIB: u64 = 1024 * 1024;

    fn nodes(n: usize) -> Vec<Node> {
        (0..n)
            .map(|i| Node::new(format!("n{}", i), format!("N{}", i), format!("X.N{}", i), NodeKind::Class))
            .collect()
    }

    #[test]
    fn test_fragment_count_ceiling() {
        assert_eq!(fragment_count(40 * MIB, 10 * MIB), 4);
        assert_eq!(fragment_count(40 * MIB + 1, 10 * MIB), 5);
        assert_eq!(fragment_count(16 * MIB, 10 * MIB), 2);
        assert_eq!(fragment_count(0, 10 * MIB), 1);
    }

    #[test]
    fn test_partition_near_equal() {
        let parts = partition((0..10).collect::<Vec<_>>(), 4);
        let lens: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(parts.concat(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_partition_fewer_items_than_parts() {
        let parts = partition(vec!['a', 'b'], 4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.iter().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_split_conserves_counts() {
        let edges: Vec<Edge> = (0..7)
            .map(|i| Edge::new(format!("n{}", i), format!("n{}", i + 1), Relationship::Calls))
            .collect();
        let fragments = split("p1", 3, nodes(11), edges, 3);

        assert_eq!(fragments.len(), 3);
        let indices: Vec<usize> = fragments.iter().map(|f| f.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(fragments.iter().all(|f| f.total_chunks == 3));
        assert_eq!(fragments.iter().map(|f| f.nodes.len()).sum::<usize>(), 11);
        assert_eq!(fragments.iter().map(|f| f.edges.len()).sum::<usize>(), 7);
        assert_eq!(fragments[2].fragment_id, "p1#g3#2");
    }

    #[test]
    fn test_reassemble_orders_by_chunk_index() {
        let mut meta = Project::new("p1", "P");
        let mut fragments = split("p1", 0, nodes(6), Vec::new(), 3);
        meta.fragment_count = Some(3);
        fragments.reverse();

        let project = reassemble(meta, fragments);
        let ids: Vec<&str> = project.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n1", "n2", "n3", "n4", "n5"]);
    }

    #[test]
    fn test_reassemble_tolerates_missing_fragment() {
        let mut meta = Project::new("p1", "P");
        meta.fragment_count = Some(3);
        let mut fragments = split("p1", 0, nodes(6), Vec::new(), 3);
        fragments.remove(1);

        let project = reassemble(meta, fragments);
        assert_eq!(project.nodes.len(), 4);
    }

    #[test]
    fn test_estimate_applies_inflation() {
        let mut project = Project::new("p1", "P");
        project.nodes = nodes(50);
        let raw = estimate_size(&project, 1.0).unwrap();
        let inflated = estimate_size(&project, 1.5).unwrap();
        assert_eq!(raw, serde_json::to_vec(&project).unwrap().len() as u64);
        assert!(inflated >= raw + raw / 2);
    }
}
