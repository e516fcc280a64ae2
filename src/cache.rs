//! Query cache — TTL-bounded memoization of query results.
//!
//! Entries are keyed by (operation, version tag, serialized parameters) and
//! stored as `serde_json::Value`, so one map serves every response type. The
//! store changes out of band, so nothing here invalidates on write; callers
//! invalidate explicitly after ingestion or deletion.
//!
//! Every invalidation bumps a generation. A computation that started before
//! an invalidation of its version does not write its result back.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: String,
    pub version: String,
    pub params: String,
}

impl CacheKey {
    pub fn new<P: Serialize + ?Sized>(
        operation: impl Into<String>,
        version: impl Into<String>,
        params: &P,
    ) -> Result<Self> {
        Ok(Self {
            operation: operation.into(),
            version: version.into(),
            params: serde_json::to_string(params)?,
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before the first lookup.
    pub hit_rate: f64,
    pub size: usize,
    pub enabled: bool,
}

pub struct QueryCache {
    entries: DashMap<CacheKey, CacheEntry>,
    /// Per version tag, bumped by `invalidate_version`.
    generations: DashMap<String, u64>,
    /// Bumped by `invalidate_all`.
    epoch: AtomicU64,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    enabled: AtomicBool,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::new(config.ttl());
        cache.set_enabled(config.enabled);
        cache
    }

    /// Fresh value for `key`. Expired entries are dropped on the way out.
    /// A disabled cache always misses and counts nothing.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }

        let ttl = self.ttl;
        // The shard guard must be released before `remove_if` below.
        let lookup = self
            .entries
            .get(key)
            .map(|entry| entry.is_fresh(ttl).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_fresh(ttl));
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: CacheKey, value: Value) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Return the cached `T` for `key`, or run `compute`, cache its result and
    /// return it. Errors from `compute` are returned and not cached.
    pub async fn get_or_compute<T, F, Fut>(&self, key: CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(&key) {
            match serde_json::from_value::<T>(value) {
                Ok(hit) => return Ok(hit),
                Err(e) => {
                    warn!(operation = %key.operation, error = %e, "cached value has wrong shape, recomputing");
                    self.entries.remove(&key);
                }
            }
        }

        let started = self.generation(&key.version);
        let fresh = compute().await?;
        if !self.is_enabled() {
            return Ok(fresh);
        }
        if self.generation(&key.version) != started {
            debug!(operation = %key.operation, version = %key.version, "invalidated during compute, not cached");
            return Ok(fresh);
        }
        self.set(key.clone(), serde_json::to_value(&fresh)?);
        // An invalidation may have landed between the check and the insert.
        if self.generation(&key.version) != started {
            self.entries.remove(&key);
        }
        Ok(fresh)
    }

    fn generation(&self, version: &str) -> (u64, u64) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let version = self.generations.get(version).map_or(0, |g| *g);
        (epoch, version)
    }

    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(dropped, "cache cleared");
    }

    /// Drop every entry computed for `version` (use `*` for all-versions queries).
    pub fn invalidate_version(&self, version: &str) {
        *self.generations.entry(version.to_string()).or_insert(0) += 1;
        let before = self.entries.len();
        self.entries.retain(|key, _| key.version != version);
        debug!(version, dropped = before.saturating_sub(self.entries.len()), "cache version invalidated");
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            size: self.entries.len(),
            enabled: self.is_enabled(),
        }
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(ttl));
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired entries. The task ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "expired cache entries swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn key(op: &str, version: &str, id: &str) -> CacheKey {
        CacheKey::new(op, version, &json!({ "id": id })).unwrap()
    }

    #[test]
    fn test_second_identical_lookup_hits() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let k = key("callers", "v1", "m1");
        assert!(cache.get(&k).is_none());
        cache.set(k.clone(), json!({"total": 2}));
        assert_eq!(cache.get(&k), Some(json!({"total": 2})));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_params_are_part_of_key() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.set(key("callers", "v1", "m1"), json!(1));
        assert!(cache.get(&key("callers", "v1", "m2")).is_none());
        assert!(cache.get(&key("callees", "v1", "m1")).is_none());
        assert!(cache.get(&key("callers", "v2", "m1")).is_none());
    }

    #[test]
    fn test_invalidate_all_forces_miss() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let k = key("search", "v1", "Order");
        cache.set(k.clone(), json!([]));
        cache.invalidate_all();
        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QueryCache::new(Duration::from_millis(30));
        let k = key("search", "v1", "Order");
        cache.set(k.clone(), json!([]));
        thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&k).is_none());
        // Expired entry was dropped by the lookup.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let cache = QueryCache::new(Duration::from_millis(30));
        cache.set(key("a", "v1", "1"), json!(1));
        cache.set(key("b", "v1", "2"), json!(2));
        thread::sleep(Duration::from_millis(60));
        cache.set(key("c", "v1", "3"), json!(3));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.set_enabled(false);
        let k = key("search", "v1", "Order");
        cache.set(k.clone(), json!([]));
        assert!(cache.get(&k).is_none());
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 0);
        assert!(!stats.enabled);

        cache.set_enabled(true);
        cache.set(k.clone(), json!([]));
        assert!(cache.get(&k).is_some());
    }

    #[test]
    fn test_invalidate_version_keeps_others() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.set(key("search", "v1", "x"), json!(1));
        cache.set(key("search", "v2", "x"), json!(2));
        cache.set(key("search", "*", "x"), json!(3));
        cache.invalidate_version("v1");
        assert!(cache.get(&key("search", "v1", "x")).is_none());
        assert_eq!(cache.get(&key("search", "v2", "x")), Some(json!(2)));
        assert_eq!(cache.get(&key("search", "*", "x")), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = AtomicU64::new(0);
        for _ in 0..3 {
            let value: Vec<String> = cache
                .get_or_compute(key("search", "v1", "x"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["m1".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["m1".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_get_or_compute_does_not_cache_errors() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let k = key("search", "v1", "x");
        let failed: Result<u32> = cache
            .get_or_compute(k.clone(), || async {
                Err(crate::error::CartographError::Storage("down".into()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let ok: u32 = cache.get_or_compute(k, || async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);
    }

    #[tokio::test]
    async fn test_result_invalidated_during_compute_is_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));

        let stale: u32 = cache
            .get_or_compute(key("callers", "v1", "m1"), || async {
                cache.invalidate_version("v1");
                Ok(1)
            })
            .await
            .unwrap();
        assert_eq!(stale, 1);
        assert!(cache.get(&key("callers", "v1", "m1")).is_none());

        // Other versions are unaffected.
        let other: u32 = cache
            .get_or_compute(key("callers", "v2", "m1"), || async {
                cache.invalidate_version("v1");
                Ok(2)
            })
            .await
            .unwrap();
        assert_eq!(other, 2);
        assert_eq!(cache.get(&key("callers", "v2", "m1")), Some(json!(2)));

        let _: u32 = cache
            .get_or_compute(key("callers", "*", "m1"), || async {
                cache.invalidate_all();
                Ok(3)
            })
            .await
            .unwrap();
        assert!(cache.is_empty());

        // Later computations cache normally again.
        let fresh: u32 = cache
            .get_or_compute(key("callers", "v1", "m1"), || async { Ok(4) })
            .await
            .unwrap();
        assert_eq!(fresh, 4);
        assert_eq!(cache.get(&key("callers", "v1", "m1")), Some(json!(4)));
    }

    #[test]
    fn test_concurrent_access_counts_every_lookup() {
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        cache.set(key("search", "v1", "hot"), json!(1));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.get(&key("search", "v1", "hot"));
                        cache.set(key("search", "v1", &format!("{}-{}", t, i)), json!(i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hits, 800);
        assert_eq!(stats.size, 801);
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_dropped() {
        let cache = Arc::new(QueryCache::new(Duration::from_millis(10)));
        cache.set(key("a", "v1", "1"), json!(1));
        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(cache.len(), 0);
        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
