//! Extractor batches: the one strict deserialization boundary.
//!
//! The external extractor submits one JSON document per run:
//!
//! ```json
//! { "schemaVersion": 1, "version": "v1",
//!   "projects": [ { "projectId": "Shop.Core", "projectName": "Shop.Core",
//!                   "layer": "core", "contentHash": "9f2c...", "sourceFile": "Shop.Core.dll",
//!                   "nodes": [...], "edges": [...] } ] }
//! ```
//!
//! Unknown fields and unknown relationship kinds are rejected.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{CartographError, Result};
use crate::graph::{Edge, Node};
use crate::storage::{state_id, Project, SaveOutcome};

pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractorBatch {
    pub schema_version: u32,
    pub version: String,
    pub projects: Vec<ProjectSubmission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectSubmission {
    pub project_id: String,
    pub project_name: String,
    #[serde(default)]
    pub layer: String,
    pub content_hash: String,
    pub source_file: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Storage id of a project within one version snapshot.
pub fn scoped_project_id(version: &str, project_id: &str) -> String {
    format!("{}:{}", version, project_id)
}

impl ExtractorBatch {
    pub fn from_json(text: &str) -> Result<Self> {
        let batch: ExtractorBatch = serde_json::from_str(text)?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(CartographError::InvalidInput(format!(
                "unsupported schemaVersion {} (expected {})",
                self.schema_version, SUPPORTED_SCHEMA_VERSION
            )));
        }
        if self.version.trim().is_empty() {
            return Err(CartographError::InvalidInput("empty version tag".into()));
        }

        let mut seen = HashSet::new();
        let mut hashes: BTreeMap<&str, &str> = BTreeMap::new();
        for p in &self.projects {
            if p.project_id.trim().is_empty() {
                return Err(CartographError::InvalidInput("empty projectId".into()));
            }
            if p.source_file.trim().is_empty() {
                return Err(CartographError::InvalidInput(format!(
                    "project '{}' has no sourceFile",
                    p.project_id
                )));
            }
            if !seen.insert(p.project_id.as_str()) {
                return Err(CartographError::InvalidInput(format!(
                    "duplicate projectId '{}'",
                    p.project_id
                )));
            }
            let hash = hashes.entry(&p.source_file).or_insert(&p.content_hash);
            if *hash != p.content_hash {
                return Err(CartographError::InvalidInput(format!(
                    "conflicting contentHash for sourceFile '{}'",
                    p.source_file
                )));
            }
        }
        Ok(())
    }

    /// Submissions grouped by source file, in first-seen order within each group.
    pub fn by_source_file(&self) -> BTreeMap<&str, Vec<&ProjectSubmission>> {
        let mut groups: BTreeMap<&str, Vec<&ProjectSubmission>> = BTreeMap::new();
        for p in &self.projects {
            groups.entry(p.source_file.as_str()).or_default().push(p);
        }
        groups
    }
}

impl ProjectSubmission {
    /// Storage document for this submission under `version`. Nodes without a
    /// project label inherit the project name.
    pub fn to_project(&self, version: &str) -> Project {
        let mut project = Project::new(
            scoped_project_id(version, &self.project_id),
            self.project_name.clone(),
        );
        project.layer = self.layer.clone();
        project.content_hash = self.content_hash.clone();
        project.source_file = self.source_file.clone();
        project.processing_state_id = state_id(&self.source_file, version);
        project.nodes = self
            .nodes
            .iter()
            .cloned()
            .map(|mut n| {
                if n.project.is_none() {
                    n.project = Some(self.project_name.clone());
                }
                n
            })
            .collect();
        project.edges = self.edges.clone();
        project
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestStatus {
    Stored,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub project_id: String,
    pub source_file: String,
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub outcome: Option<SaveOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub version: String,
    pub stored: usize,
    pub unchanged: usize,
    pub projects: Vec<ProjectReport>,
}

impl IngestReport {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            stored: 0,
            unchanged: 0,
            projects: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ProjectReport) {
        match report.status {
            IngestStatus::Stored => self.stored += 1,
            IngestStatus::Unchanged => self.unchanged += 1,
        }
        self.projects.push(report);
    }
}
