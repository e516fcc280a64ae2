//! Query engine — stateless reads over a loaded `CodeGraph`.
//!
//! ## Core API
//!
//! ```ignore
//! callers(&graph, "m2", 2, true)      // who calls m2, two hops back
//! callees(&graph, "m1", 3, false)     // what m1 calls
//! inheritance(&graph, "c2", 5)        // ancestors + descendants
//! implementations(&graph, "i1")       // direct implementers
//! search(&graph, &SearchQuery::new("OrderService"))
//! ```

pub mod search;
pub mod traversal;
pub mod types;

pub use search::{get_node, search, search_response};
pub use traversal::{callees, callers, implementations, inheritance};
pub use types::{
    CallGraphResponse, ImplementationsResponse, InheritanceResponse, NodeResponse, SearchQuery,
    SearchResponse, Statistics, TraversalHit, DEFAULT_SEARCH_LIMIT,
};
