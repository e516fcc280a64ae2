//! Code graph: node/edge types and the in-memory graph queries run against.

pub mod builder;
pub mod engine;
pub mod types;

pub use builder::build_from_projects;
pub use engine::{CodeGraph, EdgeData, GraphStats};
pub use types::{Accessibility, Edge, Modifiers, Node, NodeKind, Relationship, SourceLocation};
