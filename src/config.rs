//! Configuration for Cartograph.
//!
//! Loaded from `.cartograph/config.toml` under the project root. Every field
//! has a default, so an absent or partial file is fine.
//!
//! ```toml
//! [storage]
//! backend = "fs"
//! max_document_bytes = 15728640
//! target_fragment_bytes = 10485760
//!
//! [cache]
//! ttl_secs = 300
//!
//! [query]
//! default_version = "v2"
//! extended_suffix = "Extended"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CartographError, Result};

const MIB: u64 = 1024 * 1024;

/// Name of the per-project data directory.
pub const DATA_DIR: &str = ".cartograph";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Documents on disk under `.cartograph/store`.
    Fs,
    /// In-process only; lost on exit.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Store directory. Relative paths resolve against the project root.
    pub path: Option<PathBuf>,
    /// Ceiling for a single stored document (estimated size).
    pub max_document_bytes: u64,
    /// Target size of each fragment once a project has to be split.
    pub target_fragment_bytes: u64,
    /// Multiplier applied to the JSON byte count to approximate on-wire overhead.
    pub size_inflation: f64,
    /// Deadline for every backing-store call.
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Fs,
            path: None,
            max_document_bytes: 15 * MIB,
            target_fragment_bytes: 10 * MIB,
            size_inflation: 1.2,
            timeout_ms: 10_000,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// Interval of the background expiry sweep; 0 disables it.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            sweep_interval_secs: 120,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Version used when a query omits one. `None` means "all versions".
    pub default_version: Option<String>,
    /// How many simple-name candidates the resolver considers.
    pub resolver_candidates: usize,
    /// Type-name suffix marking a derived "extended" type, e.g. `OrderServiceExtended`.
    pub extended_suffix: Option<String>,
    /// Search result cap when a request gives none.
    pub default_search_limit: usize,
    pub default_max_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_version: None,
            resolver_candidates: 30,
            extended_suffix: Some("Extended".to_string()),
            default_search_limit: crate::query::DEFAULT_SEARCH_LIMIT,
            default_max_depth: 3,
        }
    }
}

impl Config {
    /// Path of the config file for a project root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(DATA_DIR).join("config.toml")
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| CartographError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.cartograph/config.toml`, falling back to defaults if it does not exist.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    /// Directory holding stored documents.
    pub fn store_dir(&self, root: &Path) -> PathBuf {
        match &self.storage.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(DATA_DIR).join("store"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.storage;
        if s.target_fragment_bytes == 0 {
            return Err(CartographError::Config(
                "storage.target_fragment_bytes must be > 0".into(),
            ));
        }
        if s.max_document_bytes < s.target_fragment_bytes {
            return Err(CartographError::Config(
                "storage.max_document_bytes must be >= storage.target_fragment_bytes".into(),
            ));
        }
        if !(s.size_inflation.is_finite() && s.size_inflation >= 1.0) {
            return Err(CartographError::Config(
                "storage.size_inflation must be >= 1.0".into(),
            ));
        }
        if s.timeout_ms == 0 {
            return Err(CartographError::Config("storage.timeout_ms must be > 0".into()));
        }
        if self.query.resolver_candidates == 0 {
            return Err(CartographError::Config(
                "query.resolver_candidates must be > 0".into(),
            ));
        }
        Ok(())
    }
}
