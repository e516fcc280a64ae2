//! In-process document backend.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::documents::{Fragment, ProcessingState, Project};
use super::DocumentStore;
use crate::error::{CartographError, Result};

#[derive(Default)]
struct Collections {
    projects: BTreeMap<String, Project>,
    /// parent project id -> fragment id -> fragment
    fragments: HashMap<String, BTreeMap<String, Fragment>>,
    states: BTreeMap<String, ProcessingState>,
}

/// Keeps every document in memory. Used by tests and ephemeral daemons.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|e| CartographError::Storage(format!("lock error: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|e| CartographError::Storage(format!("lock error: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put_project(&self, project: &Project) -> Result<()> {
        self.write()?
            .projects
            .insert(project.project_id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self.read()?.projects.get(project_id).cloned())
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        Ok(self.write()?.projects.remove(project_id).is_some())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.read()?.projects.values().cloned().collect())
    }

    async fn put_fragments(&self, fragments: &[Fragment]) -> Result<()> {
        let mut inner = self.write()?;
        for fragment in fragments {
            inner
                .fragments
                .entry(fragment.parent_project_id.clone())
                .or_default()
                .insert(fragment.fragment_id.clone(), fragment.clone());
        }
        Ok(())
    }

    async fn get_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<Vec<Fragment>> {
        let inner = self.read()?;
        let Some(by_id) = inner.fragments.get(parent_project_id) else {
            return Ok(Vec::new());
        };
        Ok(fragment_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect())
    }

    async fn list_fragment_ids(&self, parent_project_id: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .fragments
            .get(parent_project_id)
            .map(|by_id| by_id.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<usize> {
        let mut inner = self.write()?;
        let Some(by_id) = inner.fragments.get_mut(parent_project_id) else {
            return Ok(0);
        };
        let removed = fragment_ids
            .iter()
            .filter(|id| by_id.remove(id.as_str()).is_some())
            .count();
        if by_id.is_empty() {
            inner.fragments.remove(parent_project_id);
        }
        Ok(removed)
    }

    async fn put_state(&self, state: &ProcessingState) -> Result<()> {
        self.write()?.states.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn get_state(&self, state_id: &str) -> Result<Option<ProcessingState>> {
        Ok(self.read()?.states.get(state_id).cloned())
    }

    async fn list_states(&self) -> Result<Vec<ProcessingState>> {
        Ok(self.read()?.states.values().cloned().collect())
    }

    async fn delete_state(&self, state_id: &str) -> Result<bool> {
        Ok(self.write()?.states.remove(state_id).is_some())
    }
}
