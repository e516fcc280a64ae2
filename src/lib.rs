//! # Cartograph
//!
//! A versioned knowledge graph of large object-oriented codebases.
//!
//! An external extractor submits facts (types, members, relationships) per
//! project. Cartograph stores them in size-bounded documents, scopes them by
//! version tag, and answers structural questions: who calls this method, what
//! does this type inherit, which types implement this interface, which node
//! does this name refer to.
//!
//! ## Key Features
//!
//! - **Size-bounded storage**: oversized projects are split into fragments
//!   and reassembled transparently on load
//! - **Versioned**: every query runs against one snapshot or all of them
//! - **Change detection**: unchanged inputs are skipped by content hash
//! - **Cached**: query results are memoized with a TTL
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cartograph::{Config, ExtractorBatch, KnowledgeBase};
//! use std::path::Path;
//!
//! # async fn demo(batch_json: &str) -> cartograph::Result<()> {
//! let kb = KnowledgeBase::open(Path::new("."), Config::default()).await?;
//! kb.ingest(&ExtractorBatch::from_json(batch_json)?).await?;
//!
//! let callers = kb.callers("Shop.OrderService.Save", Some(2), true, Some("v2")).await?;
//! println!("{} callers", callers.total);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod daemon;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod query;
pub mod resolve;
pub mod service;
pub mod storage;
pub mod versions;

// Re-exports for convenience
pub use cache::{CacheKey, CacheStats, QueryCache};
pub use config::Config;
pub use error::{CartographError, Result};
pub use graph::{build_from_projects, CodeGraph, Edge, Node, NodeKind, Relationship};
pub use ingest::{ExtractorBatch, IngestReport};
pub use query::{
    CallGraphResponse, ImplementationsResponse, InheritanceResponse, NodeResponse, SearchQuery,
    SearchResponse, Statistics, TraversalHit,
};
pub use resolve::{NamingConvention, ResolvePass, ResolveRequest, ResolveResponse, SymbolResolver};
pub use service::KnowledgeBase;
pub use storage::{DocumentStore, FsStore, GraphStore, MemoryStore, Project};
pub use versions::{VersionRegistry, VersionScope};
