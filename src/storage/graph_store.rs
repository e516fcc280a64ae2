//! GraphStore: versioned project persistence over a `DocumentStore`.
//!
//! Oversized projects are fragmented on save and reassembled on load.
//! Fragment replacement is generation-tagged: new fragments are written under
//! fresh ids, the metadata document is swapped, then older generations are
//! deleted. A concurrent reader never sees duplicated fragments, but one that
//! fetched the previous metadata just before the swap can still find some of
//! its fragments gone; that surfaces as a fragment-count mismatch warning.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::documents::{state_id, ProcessingState, Project, ProjectSummary};
use super::fragment;
use super::DocumentStore;
use crate::config::StorageConfig;
use crate::error::{CartographError, Result};
use crate::versions::{VersionRegistry, VersionScope};

/// What `save_project` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub project_id: String,
    pub estimated_bytes: u64,
    pub fragmented: bool,
    pub fragment_count: usize,
    pub generation: u64,
    pub stale_fragments_removed: usize,
}

/// What `delete_source_file` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub source_file: String,
    pub projects: usize,
    pub fragments: usize,
    pub states: usize,
}

/// Projects materialized for one scope, plus metadata for every stored project.
#[derive(Debug, Clone, Default)]
pub struct ScopedProjects {
    pub projects: Vec<Project>,
    pub all: Vec<ProjectSummary>,
}

pub struct GraphStore {
    backend: Arc<dyn DocumentStore>,
    config: StorageConfig,
}

impl GraphStore {
    pub fn new(backend: Arc<dyn DocumentStore>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Run one backend call under the configured deadline.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(CartographError::Timeout {
                operation,
                timeout_ms: self.config.timeout_ms,
            }),
        }
    }

    /// Store a project, fragmenting it when its estimated size exceeds the
    /// document ceiling. Upserts by `project_id`.
    pub async fn save_project(&self, mut project: Project) -> Result<SaveOutcome> {
        let previous = self
            .call("get_project", self.backend.get_project(&project.project_id))
            .await?;
        let generation = previous.map_or(0, |p| p.generation + 1);

        project.generation = generation;
        project.is_fragmented = false;
        project.fragment_count = None;
        project.fragment_ids.clear();

        let estimated = fragment::estimate_size(&project, self.config.size_inflation)?;
        let project_id = project.project_id.clone();

        let mut keep: HashSet<String> = HashSet::new();
        let fragment_count = if estimated > self.config.max_document_bytes {
            let count = fragment::fragment_count(estimated, self.config.target_fragment_bytes);
            let nodes = std::mem::take(&mut project.nodes);
            let edges = std::mem::take(&mut project.edges);
            let fragments = fragment::split(&project_id, generation, nodes, edges, count);

            self.call("put_fragments", self.backend.put_fragments(&fragments))
                .await?;

            project.is_fragmented = true;
            project.fragment_count = Some(count);
            project.fragment_ids = fragments.iter().map(|f| f.fragment_id.clone()).collect();
            keep.extend(project.fragment_ids.iter().cloned());

            info!(
                project_id = %project_id,
                estimated_bytes = estimated,
                fragments = count,
                "project exceeds document ceiling, stored as fragments"
            );
            count
        } else {
            0
        };

        self.call("put_project", self.backend.put_project(&project))
            .await?;

        let stale: Vec<String> = self
            .call("list_fragment_ids", self.backend.list_fragment_ids(&project_id))
            .await?
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        let stale_fragments_removed = if stale.is_empty() {
            0
        } else {
            self.call(
                "delete_fragments",
                self.backend.delete_fragments(&project_id, &stale),
            )
            .await?
        };

        debug!(
            project_id = %project_id,
            generation,
            stale_fragments_removed,
            "project saved"
        );

        Ok(SaveOutcome {
            project_id,
            estimated_bytes: estimated,
            fragmented: fragment_count > 0,
            fragment_count,
            generation,
            stale_fragments_removed,
        })
    }

    /// Load a fully materialized project.
    pub async fn load_project(&self, project_id: &str) -> Result<Option<Project>> {
        match self
            .call("get_project", self.backend.get_project(project_id))
            .await?
        {
            Some(meta) => Ok(Some(self.materialize(meta).await?)),
            None => Ok(None),
        }
    }

    /// Pull fragments into a metadata-only document. Non-fragmented documents
    /// pass through untouched.
    pub async fn materialize(&self, meta: Project) -> Result<Project> {
        if !meta.is_fragmented {
            return Ok(meta);
        }
        let fragments = self
            .call(
                "get_fragments",
                self.backend
                    .get_fragments(&meta.project_id, &meta.fragment_ids),
            )
            .await?;
        Ok(fragment::reassemble(meta, fragments))
    }

    /// True unless a processing state for (source file, version) records the same hash.
    pub async fn has_changed(
        &self,
        source_file: &str,
        content_hash: &str,
        version: &str,
    ) -> Result<bool> {
        let id = state_id(source_file, version);
        let state = self.call("get_state", self.backend.get_state(&id)).await?;
        Ok(state.map_or(true, |s| s.content_hash != content_hash))
    }

    /// Create or refresh the processing state for (source file, version).
    pub async fn record_state(
        &self,
        source_file: &str,
        version: &str,
        content_hash: &str,
    ) -> Result<ProcessingState> {
        let state = ProcessingState::new(source_file, version, content_hash);
        self.call("put_state", self.backend.put_state(&state))
            .await?;
        Ok(state)
    }

    /// Remove every project ingested from `source_file` (all versions), their
    /// fragments, and the matching processing states.
    pub async fn delete_source_file(&self, source_file: &str) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome {
            source_file: source_file.to_string(),
            ..Default::default()
        };

        let projects = self.list_projects().await?;
        for project in projects.iter().filter(|p| p.source_file == source_file) {
            let ids = self
                .call(
                    "list_fragment_ids",
                    self.backend.list_fragment_ids(&project.project_id),
                )
                .await?;
            if !ids.is_empty() {
                outcome.fragments += self
                    .call(
                        "delete_fragments",
                        self.backend.delete_fragments(&project.project_id, &ids),
                    )
                    .await?;
            }
            if self
                .call(
                    "delete_project",
                    self.backend.delete_project(&project.project_id),
                )
                .await?
            {
                outcome.projects += 1;
            }
        }

        let states = self.list_states().await?;
        for state in states.iter().filter(|s| s.source_file == source_file) {
            if self
                .call("delete_state", self.backend.delete_state(&state.id))
                .await?
            {
                outcome.states += 1;
            }
        }

        info!(
            source_file,
            projects = outcome.projects,
            fragments = outcome.fragments,
            states = outcome.states,
            "source file deleted"
        );
        Ok(outcome)
    }

    /// Stored project documents (fragmented ones are metadata only).
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.call("list_projects", self.backend.list_projects())
            .await
    }

    pub async fn list_states(&self) -> Result<Vec<ProcessingState>> {
        self.call("list_states", self.backend.list_states()).await
    }

    pub async fn version_registry(&self, default_version: Option<String>) -> Result<VersionRegistry> {
        let states = self.list_states().await?;
        Ok(VersionRegistry::from_states(&states, default_version))
    }

    /// Materialize every project visible in `scope`.
    pub async fn load_scope(
        &self,
        scope: &VersionScope,
        registry: &VersionRegistry,
    ) -> Result<ScopedProjects> {
        let metas = self.list_projects().await?;
        let all: Vec<ProjectSummary> = metas.iter().map(Project::summary).collect();

        let mut projects = Vec::new();
        for meta in metas {
            if registry.includes(scope, &meta.processing_state_id) {
                projects.push(self.materialize(meta).await?);
            }
        }

        debug!(
            scope = scope.cache_tag(),
            projects = projects.len(),
            stored = all.len(),
            "scope loaded"
        );
        Ok(ScopedProjects { projects, all })
    }
}
