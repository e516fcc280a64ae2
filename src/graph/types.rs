//! Core graph types: nodes, edges and their closed kind sets.
//!
//! These are the records the extractor emits and the store persists. The
//! JSON shape is camelCase; unknown fields are rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Class,
    Interface,
    Method,
    Property,
    Field,
    Enum,
    Struct,
    Project,
    Layer,
}

impl NodeKind {
    pub const ALL: [NodeKind; 9] = [
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Method,
        NodeKind::Property,
        NodeKind::Field,
        NodeKind::Enum,
        NodeKind::Struct,
        NodeKind::Project,
        NodeKind::Layer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Method => "method",
            NodeKind::Property => "property",
            NodeKind::Field => "field",
            NodeKind::Enum => "enum",
            NodeKind::Struct => "struct",
            NodeKind::Project => "project",
            NodeKind::Layer => "layer",
        }
    }

    /// Types that can declare members.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::Class | NodeKind::Interface | NodeKind::Enum | NodeKind::Struct
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        NodeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| format!("unknown node kind '{}'", s))
    }
}

/// Relationship between two nodes. Closed set; no ad hoc kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relationship {
    Inherits,
    Implements,
    Calls,
    /// Indirect call dispatched through an interface.
    CallsVia,
    Uses,
    Contains,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Inherits => "Inherits",
            Relationship::Implements => "Implements",
            Relationship::Calls => "Calls",
            Relationship::CallsVia => "CallsVia",
            Relationship::Uses => "Uses",
            Relationship::Contains => "Contains",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accessibility {
    Public,
    Protected,
    Internal,
    Private,
    ProtectedInternal,
    PrivateProtected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_sealed: bool,
    pub accessibility: Option<Accessibility>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

/// A code entity. `id` is unique within a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub source_location: Option<SourceLocation>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        full_name: impl Into<String>,
        kind: NodeKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            full_name: full_name.into(),
            kind,
            namespace: None,
            project: None,
            modifiers: Modifiers::default(),
            source_location: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// A directed, typed relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    /// Number of occurrences folded into this edge, when the extractor counts them.
    #[serde(default)]
    pub count: Option<u32>,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: Relationship,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship,
            count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let json = r#"{
            "id": "m1",
            "name": "Save",
            "fullName": "Shop.Orders.OrderService.Save",
            "kind": "method",
            "namespace": "Shop.Orders",
            "modifiers": { "isStatic": true, "accessibility": "protectedInternal" }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, NodeKind::Method);
        assert!(node.modifiers.is_static);
        assert_eq!(
            node.modifiers.accessibility,
            Some(Accessibility::ProtectedInternal)
        );
        assert!(node.source_location.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"id":"a","name":"A","fullName":"A","kind":"class","Name":"dup"}"#;
        assert!(serde_json::from_str::<Node>(json).is_err());
    }

    #[test]
    fn test_relationship_is_closed() {
        let ok: Edge =
            serde_json::from_str(r#"{"source":"a","target":"b","relationship":"CallsVia"}"#)
                .unwrap();
        assert_eq!(ok.relationship, Relationship::CallsVia);

        let bad = serde_json::from_str::<Edge>(
            r#"{"source":"a","target":"b","relationship":"DependsOn"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_node_kind_from_str() {
        assert_eq!("Interface".parse::<NodeKind>().unwrap(), NodeKind::Interface);
        assert!("trait".parse::<NodeKind>().is_err());
        assert_eq!(NodeKind::Struct.to_string(), "struct");
    }

    #[test]
    fn test_bincode_roundtrip_keeps_optionals() {
        let mut node = Node::new("c1", "A", "N.A", NodeKind::Class).with_namespace("N");
        node.source_location = Some(SourceLocation {
            file: "A.cs".into(),
            line: 3,
            column: None,
        });
        let bytes = bincode::serialize(&node).unwrap();
        let back: Node = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, node);
    }
}
