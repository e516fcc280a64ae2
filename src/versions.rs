//! Version registry: which ingestion records make up which snapshot.
//!
//! A version tag is a caller-chosen label. Its snapshot is every project whose
//! `processing_state_id` belongs to the tag's batch of processing states.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::storage::{ProcessingState, ProjectSummary};

/// Query scope: one snapshot or all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionScope {
    All,
    Version(String),
}

impl VersionScope {
    /// Explicit tag wins, then the configured default, then all versions.
    pub fn resolve(requested: Option<&str>, default_version: Option<&str>) -> Self {
        match requested.or(default_version) {
            Some(tag) => VersionScope::Version(tag.to_string()),
            None => VersionScope::All,
        }
    }

    /// Tag used in cache keys; `*` stands for all versions.
    pub fn cache_tag(&self) -> &str {
        match self {
            VersionScope::All => "*",
            VersionScope::Version(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    batches: BTreeMap<String, BTreeSet<String>>,
    default_version: Option<String>,
}

impl VersionRegistry {
    pub fn from_states(states: &[ProcessingState], default_version: Option<String>) -> Self {
        let mut batches: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for state in states {
            batches
                .entry(state.version.clone())
                .or_default()
                .insert(state.id.clone());
        }
        Self {
            batches,
            default_version,
        }
    }

    /// Known tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.batches.keys().cloned().collect()
    }

    /// Whether a project produced by `processing_state_id` is visible in `scope`.
    /// Unknown tags include nothing.
    pub fn includes(&self, scope: &VersionScope, processing_state_id: &str) -> bool {
        match scope {
            VersionScope::All => true,
            VersionScope::Version(tag) => self
                .batches
                .get(tag)
                .map_or(false, |batch| batch.contains(processing_state_id)),
        }
    }

    /// Per-version project and source-file counts.
    pub fn summarize(&self, projects: &[ProjectSummary]) -> BTreeMap<String, VersionStats> {
        self.batches
            .iter()
            .map(|(tag, batch)| {
                let projects = projects
                    .iter()
                    .filter(|p| batch.contains(&p.processing_state_id))
                    .count();
                let stats = VersionStats {
                    projects,
                    source_files: batch.len(),
                };
                (tag.clone(), stats)
            })
            .collect()
    }

    pub fn response(&self) -> VersionsResponse {
        VersionsResponse {
            versions: self.tags(),
            default: self.default_version.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    pub projects: usize,
    pub source_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsResponse {
    pub versions: Vec<String>,
    pub default: Option<String>,
}
