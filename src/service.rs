//! KnowledgeBase — the application context.
//!
//! Owns the graph store, the query cache, the configuration and the naming
//! convention, and exposes the query surface. Construct one per process and
//! share it (`Arc<KnowledgeBase>`); nothing here is global.
//!
//! Every query resolves its version scope first, then goes through the cache.
//! On a miss the scoped projects are loaded, assembled into a `CodeGraph` and
//! the query runs against that snapshot.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, QueryCache};
use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::graph::{build_from_projects, CodeGraph};
use crate::ingest::{scoped_project_id, ExtractorBatch, IngestReport, IngestStatus, ProjectReport};
use crate::query::{
    self, CallGraphResponse, ImplementationsResponse, InheritanceResponse, NodeResponse,
    SearchQuery, SearchResponse, Statistics,
};
use crate::resolve::{NamingConvention, NoConvention, ResolveRequest, ResolveResponse, SuffixConvention, SymbolResolver};
use crate::storage::{DeleteOutcome, DocumentStore, FsStore, GraphStore, MemoryStore, ProjectSummary};
use crate::versions::{VersionRegistry, VersionScope, VersionsResponse};

/// One version scope, loaded.
struct Snapshot {
    graph: CodeGraph,
    registry: VersionRegistry,
    all: Vec<ProjectSummary>,
}

pub struct KnowledgeBase {
    store: GraphStore,
    cache: Arc<QueryCache>,
    config: Config,
    convention: Arc<dyn NamingConvention>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

fn convention_for(config: &Config) -> Arc<dyn NamingConvention> {
    match config.query.extended_suffix.as_deref() {
        Some(suffix) if !suffix.is_empty() => Arc::new(SuffixConvention::new(suffix)),
        _ => Arc::new(NoConvention),
    }
}

impl KnowledgeBase {
    pub fn new(backend: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            store: GraphStore::new(backend, config.storage.clone()),
            cache: Arc::new(QueryCache::from_config(&config.cache)),
            convention: convention_for(&config),
            config,
            sweeper: Mutex::new(None),
        }
    }

    /// Open the configured backend for a project root.
    pub async fn open(root: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn DocumentStore> = match config.storage.backend {
            BackendKind::Fs => {
                let dir = config.store_dir(root);
                info!(path = %dir.display(), "opening document store");
                Arc::new(FsStore::init(&dir).await?)
            }
            BackendKind::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(backend, config))
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Replace the naming convention used by `resolve`.
    pub fn with_convention(mut self, convention: Arc<dyn NamingConvention>) -> Self {
        self.convention = convention;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Start background work (the cache expiry sweep). Needs a tokio runtime.
    pub fn start(&self) {
        let secs = self.config.cache.sweep_interval_secs;
        if secs == 0 {
            return;
        }
        let Ok(mut slot) = self.sweeper.lock() else {
            warn!("sweeper slot poisoned, not starting");
            return;
        };
        if slot.is_none() {
            *slot = Some(self.cache.spawn_sweeper(std::time::Duration::from_secs(secs)));
            debug!(interval_secs = secs, "cache sweeper started");
        }
    }

    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    fn scope(&self, version: Option<&str>) -> VersionScope {
        VersionScope::resolve(version, self.config.query.default_version.as_deref())
    }

    fn depth(&self, max_depth: Option<usize>) -> usize {
        max_depth.unwrap_or(self.config.query.default_max_depth)
    }

    async fn load_snapshot(&self, scope: &VersionScope) -> Result<Snapshot> {
        let registry = self
            .store
            .version_registry(self.config.query.default_version.clone())
            .await?;
        let scoped = self.store.load_scope(scope, &registry).await?;
        let graph = build_from_projects(&scoped.projects);
        Ok(Snapshot {
            graph,
            registry,
            all: scoped.all,
        })
    }

    /// Run `query` against the snapshot for `scope`, through the cache.
    async fn cached<T, P, F>(
        &self,
        operation: &'static str,
        scope: &VersionScope,
        params: &P,
        query: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce(&CodeGraph) -> T,
    {
        let key = CacheKey::new(operation, scope.cache_tag(), params)?;
        self.cache
            .get_or_compute(key, move || async move {
                let snapshot = self.load_snapshot(scope).await?;
                Ok(query(&snapshot.graph))
            })
            .await
    }

    // ─── Queries ───────────────────────────────────────────────────

    /// A query without a limit gets `query.default_search_limit`.
    pub async fn search(&self, q: &SearchQuery, version: Option<&str>) -> Result<SearchResponse> {
        let scope = self.scope(version);
        let mut q = q.clone();
        q.limit = Some(q.limit.unwrap_or(self.config.query.default_search_limit));
        self.cached("search", &scope, &q, |g| query::search_response(g, &q))
            .await
    }

    pub async fn get_node(&self, id: &str, version: Option<&str>) -> Result<NodeResponse> {
        let scope = self.scope(version);
        self.cached("node", &scope, id, |g| query::get_node(g, id))
            .await
    }

    pub async fn callers(
        &self,
        id: &str,
        max_depth: Option<usize>,
        include_indirect: bool,
        version: Option<&str>,
    ) -> Result<CallGraphResponse> {
        let scope = self.scope(version);
        let depth = self.depth(max_depth);
        self.cached("callers", &scope, &(id, depth, include_indirect), |g| {
            query::callers(g, id, depth, include_indirect)
        })
        .await
    }

    pub async fn callees(
        &self,
        id: &str,
        max_depth: Option<usize>,
        include_via_interface: bool,
        version: Option<&str>,
    ) -> Result<CallGraphResponse> {
        let scope = self.scope(version);
        let depth = self.depth(max_depth);
        self.cached("callees", &scope, &(id, depth, include_via_interface), |g| {
            query::callees(g, id, depth, include_via_interface)
        })
        .await
    }

    pub async fn inheritance(
        &self,
        class_id: &str,
        max_depth: Option<usize>,
        version: Option<&str>,
    ) -> Result<InheritanceResponse> {
        let scope = self.scope(version);
        let depth = self.depth(max_depth);
        self.cached("inheritance", &scope, &(class_id, depth), |g| {
            query::inheritance(g, class_id, depth)
        })
        .await
    }

    pub async fn implementations(
        &self,
        interface_id: &str,
        version: Option<&str>,
    ) -> Result<ImplementationsResponse> {
        let scope = self.scope(version);
        self.cached("implementations", &scope, interface_id, |g| {
            query::implementations(g, interface_id)
        })
        .await
    }

    pub async fn resolve(
        &self,
        req: &ResolveRequest,
        version: Option<&str>,
    ) -> Result<ResolveResponse> {
        let scope = self.scope(version);
        let convention = self.convention.as_ref();
        let limit = self.config.query.resolver_candidates;
        self.cached("resolve", &scope, req, |g| {
            SymbolResolver::new(g, convention, limit).resolve(req)
        })
        .await
    }

    /// Graph counts for the scope plus per-version storage counts.
    pub async fn statistics(&self, version: Option<&str>) -> Result<Statistics> {
        let scope = self.scope(version);
        let key = CacheKey::new("statistics", scope.cache_tag(), &())?;
        let scope = &scope;
        self.cache
            .get_or_compute(key, move || async move {
                let snapshot = self.load_snapshot(scope).await?;
                Ok(Statistics::new(
                    scope.cache_tag(),
                    snapshot.graph.stats(),
                    snapshot.registry.summarize(&snapshot.all),
                ))
            })
            .await
    }

    pub async fn versions(&self) -> Result<VersionsResponse> {
        let registry = self
            .store
            .version_registry(self.config.query.default_version.clone())
            .await?;
        Ok(registry.response())
    }

    // ─── Writes ────────────────────────────────────────────────────

    /// Store every project of a batch whose source file changed since the last
    /// ingestion under the same version. The processing state is recorded
    /// only after all of a source file's projects were saved.
    pub async fn ingest(&self, batch: &ExtractorBatch) -> Result<IngestReport> {
        batch.validate()?;
        let version = batch.version.as_str();
        let mut report = IngestReport::new(version);

        let result = self.store_changed_sources(batch, &mut report).await;

        // Projects saved before a failure are already visible in the store.
        if report.stored > 0 {
            self.cache.invalidate_version(version);
            self.cache.invalidate_version(VersionScope::All.cache_tag());
        }
        if let Err(e) = result {
            warn!(version, stored = report.stored, error = %e, "batch ingestion failed");
            return Err(e);
        }

        info!(
            version,
            stored = report.stored,
            unchanged = report.unchanged,
            "batch ingested"
        );
        Ok(report)
    }

    async fn store_changed_sources(
        &self,
        batch: &ExtractorBatch,
        report: &mut IngestReport,
    ) -> Result<()> {
        let version = batch.version.as_str();
        for (source_file, submissions) in batch.by_source_file() {
            let Some(first) = submissions.first() else {
                continue;
            };
            let hash = first.content_hash.as_str();
            let changed = self.store.has_changed(source_file, hash, version).await?;

            for sub in &submissions {
                if !changed {
                    report.push(ProjectReport {
                        project_id: scoped_project_id(version, &sub.project_id),
                        source_file: source_file.to_string(),
                        status: IngestStatus::Unchanged,
                        outcome: None,
                    });
                    continue;
                }
                let outcome = self.store.save_project(sub.to_project(version)).await?;
                report.push(ProjectReport {
                    project_id: outcome.project_id.clone(),
                    source_file: source_file.to_string(),
                    status: IngestStatus::Stored,
                    outcome: Some(outcome),
                });
            }

            if changed {
                self.store.record_state(source_file, version, hash).await?;
            } else {
                debug!(source_file, version, "source unchanged, skipped");
            }
        }
        Ok(())
    }

    pub async fn delete_source_file(&self, source_file: &str) -> Result<DeleteOutcome> {
        let outcome = self.store.delete_source_file(source_file).await?;
        self.cache.invalidate_all();
        Ok(outcome)
    }

    // ─── Cache control ─────────────────────────────────────────────

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached results for one version, or everything.
    pub fn invalidate_cache(&self, version: Option<&str>) {
        match version {
            Some(v) => self.cache.invalidate_version(v),
            None => self.cache.invalidate_all(),
        }
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
        info!(enabled, "query cache toggled");
    }
}

impl Drop for KnowledgeBase {
    fn drop(&mut self) {
        self.shutdown();
    }
}
