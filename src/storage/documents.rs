//! Persisted document shapes: projects, fragments and processing states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Node};

/// One analyzed unit (an assembly / module / package) and its subgraph.
///
/// When `is_fragmented` is set the stored document carries metadata only and
/// its nodes and edges live in the fragments listed in `fragment_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub layer: String,
    pub content_hash: String,
    pub source_file: String,
    pub processing_state_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub is_fragmented: bool,
    pub fragment_count: Option<usize>,
    pub fragment_ids: Vec<String>,
    /// Bumped on every save; embedded in fragment ids.
    pub generation: u64,
}

impl Project {
    pub fn new(project_id: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            layer: String::new(),
            content_hash: String::new(),
            source_file: String::new(),
            processing_state_id: String::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            is_fragmented: false,
            fragment_count: None,
            fragment_ids: Vec::new(),
            generation: 0,
        }
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            project_id: self.project_id.clone(),
            project_name: self.project_name.clone(),
            layer: self.layer.clone(),
            source_file: self.source_file.clone(),
            processing_state_id: self.processing_state_id.clone(),
            is_fragmented: self.is_fragmented,
        }
    }
}

/// Metadata view of a project, without its subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: String,
    pub project_name: String,
    pub layer: String,
    pub source_file: String,
    pub processing_state_id: String,
    pub is_fragmented: bool,
}

/// A slice of an oversized project's nodes and, independently, its edges.
///
/// A fragment is not self-contained: an edge may reference nodes stored in
/// another fragment of the same project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub fragment_id: String,
    pub parent_project_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Last successful ingestion of one source input under one version tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub id: String,
    pub source_file: String,
    pub version: String,
    pub content_hash: String,
    pub last_processed: DateTime<Utc>,
}

impl ProcessingState {
    pub fn new(
        source_file: impl Into<String>,
        version: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        let source_file = source_file.into();
        let version = version.into();
        Self {
            id: state_id(&source_file, &version),
            source_file,
            version,
            content_hash: content_hash.into(),
            last_processed: Utc::now(),
        }
    }
}

/// Deterministic id for the (source file, version) pair.
pub fn state_id(source_file: &str, version: &str) -> String {
    format!("{}::{}", version, source_file)
}
