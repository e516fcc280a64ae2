//! Storage layer.
//!
//! `DocumentStore` is the backing-store seam: three collections (projects,
//! fragments, processing states) addressed by id. `GraphStore` sits on top
//! and owns fragmentation, reassembly and change detection.

pub mod documents;
pub mod fragment;
pub mod fs;
pub mod graph_store;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use documents::{state_id, Fragment, ProcessingState, Project, ProjectSummary};
pub use fs::FsStore;
pub use graph_store::{DeleteOutcome, GraphStore, SaveOutcome, ScopedProjects};
pub use memory::MemoryStore;

/// A document backend. Implementations must be safe to share across tasks.
///
/// Calls may fail on connectivity; callers do not retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace by `project_id`.
    async fn put_project(&self, project: &Project) -> Result<()>;
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;
    async fn delete_project(&self, project_id: &str) -> Result<bool>;
    /// Every stored project document, as stored (fragmented ones carry metadata only).
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn put_fragments(&self, fragments: &[Fragment]) -> Result<()>;
    /// Fetch the listed fragments of one project. Missing ids are skipped.
    async fn get_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<Vec<Fragment>>;
    async fn list_fragment_ids(&self, parent_project_id: &str) -> Result<Vec<String>>;
    async fn delete_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<usize>;

    async fn put_state(&self, state: &ProcessingState) -> Result<()>;
    async fn get_state(&self, state_id: &str) -> Result<Option<ProcessingState>>;
    async fn list_states(&self) -> Result<Vec<ProcessingState>>;
    async fn delete_state(&self, state_id: &str) -> Result<bool>;
}
