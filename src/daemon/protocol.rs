//! Daemon protocol — request/response types for CLI-daemon communication.
//!
//! One JSON object per line in each direction.

use serde::{Deserialize, Serialize};

use crate::graph::NodeKind;
use crate::ingest::ExtractorBatch;
use crate::query::SearchQuery;

/// Request from CLI to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Request {
    /// Search for symbols by name
    #[serde(rename = "search")]
    Search {
        #[serde(flatten)]
        query: SearchQuery,
        #[serde(default)]
        version: Option<String>,
    },

    /// Fetch one node by id
    #[serde(rename = "node")]
    Node {
        id: String,
        #[serde(default)]
        version: Option<String>,
    },

    /// Who calls a method
    #[serde(rename = "callers")]
    Callers {
        id: String,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default)]
        include_indirect: bool,
        #[serde(default)]
        version: Option<String>,
    },

    /// What a method calls
    #[serde(rename = "callees")]
    Callees {
        id: String,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default)]
        include_indirect: bool,
        #[serde(default)]
        version: Option<String>,
    },

    /// Ancestors and descendants of a type
    #[serde(rename = "inheritance")]
    Inheritance {
        id: String,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Direct implementers of an interface
    #[serde(rename = "implementations")]
    Implementations {
        id: String,
        #[serde(default)]
        version: Option<String>,
    },

    /// Resolve a name to one node
    #[serde(rename = "resolve")]
    Resolve {
        name: String,
        kind: NodeKind,
        #[serde(default)]
        containing_type: Option<String>,
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Graph statistics
    #[serde(rename = "stats")]
    Stats {
        #[serde(default)]
        version: Option<String>,
    },

    /// Known version tags
    #[serde(rename = "versions")]
    Versions,

    /// Store an extractor batch
    #[serde(rename = "ingest")]
    Ingest { batch: ExtractorBatch },

    /// Remove everything ingested from a source file
    #[serde(rename = "delete_source")]
    DeleteSource { source_file: String },

    /// Cache hit/miss counters
    #[serde(rename = "cache_stats")]
    CacheStats,

    /// Drop cached results (one version, or all)
    #[serde(rename = "cache_invalidate")]
    CacheInvalidate {
        #[serde(default)]
        version: Option<String>,
    },

    /// Turn the cache on or off
    #[serde(rename = "cache_toggle")]
    CacheToggle { enabled: bool },

    /// Check if daemon is alive
    #[serde(rename = "ping")]
    Ping,

    /// Shutdown the daemon
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response from daemon to CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    /// Successful response with JSON data
    #[serde(rename = "ok")]
    Ok { data: serde_json::Value },

    /// Error response
    #[serde(rename = "error")]
    Error { message: String },

    /// Pong response (daemon is alive)
    #[serde(rename = "pong")]
    Pong,

    /// Shutdown acknowledgment
    #[serde(rename = "goodbye")]
    Goodbye,
}

impl Response {
    pub fn ok<T: Serialize>(data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Response::Ok { data },
            Err(e) => Response::error(format!("serialize error: {}", e)),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let req: Request =
            serde_json::from_str(r#"{"command":"callers","id":"m1","max_depth":2}"#).unwrap();
        match req {
            Request::Callers {
                id,
                max_depth,
                include_indirect,
                version,
            } => {
                assert_eq!(id, "m1");
                assert_eq!(max_depth, Some(2));
                assert!(!include_indirect);
                assert!(version.is_none());
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let req: Request =
            serde_json::from_str(r#"{"command":"search","query":"Order","limit":5}"#).unwrap();
        match req {
            Request::Search { query, .. } => {
                assert_eq!(query.query, "Order");
                assert_eq!(query.limit, Some(5));
                assert!(query.exact_first);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_string(&Response::ok(vec![1, 2])).unwrap();
        assert_eq!(json, r#"{"status":"ok","data":[1,2]}"#);
        let json = serde_json::to_string(&Response::Pong).unwrap();
        assert_eq!(json, r#"{"status":"pong"}"#);
    }
}
