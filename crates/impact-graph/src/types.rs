//! Core graph types
//!
//! Read-only snapshots of what the graph store returns for one request:
//! - [`EntityId`] and [`EntityKind`] for nodes
//! - [`RelationshipKind`] and [`TraversalEdge`] for edges
//! - [`TraversalRequest`] / [`TraversalResponse`] for the store contract

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Identifier of an entity, unique within the graph store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Kind of an engineering entity
///
/// Labels that do not match a known kind are preserved in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    /// Piping line (P&ID level)
    Line,
    /// Isometric drawing
    Iso,
    /// Fabrication spool
    Spool,
    /// Piping part / component
    Part,
    /// Bulk material
    Material,
    /// Procurement purchase order
    PurchaseOrder,
    /// Any label the taxonomy does not know
    Unknown(String),
}

impl EntityKind {
    /// Parse a store label, case-insensitively
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "line" => Self::Line,
            "iso" | "isometric" => Self::Iso,
            "spool" => Self::Spool,
            "part" => Self::Part,
            "material" => Self::Material,
            "purchaseorder" | "purchase_order" | "po" => Self::PurchaseOrder,
            _ => Self::Unknown(label.to_string()),
        }
    }

    /// Canonical label as stored in the graph
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Line => "Line",
            Self::Iso => "ISO",
            Self::Spool => "SPOOL",
            Self::Part => "Part",
            Self::Material => "Material",
            Self::PurchaseOrder => "PurchaseOrder",
            Self::Unknown(label) if label.is_empty() => "Unknown",
            Self::Unknown(label) => label,
        }
    }

    /// Unknown kind with the default label
    #[inline]
    #[must_use]
    pub fn unknown() -> Self {
        Self::Unknown("Unknown".to_string())
    }

    /// True for kinds the taxonomy recognises
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for EntityKind {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<EntityKind> for String {
    fn from(value: EntityKind) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of a relationship between two entities
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipKind {
    /// Line -> ISO
    HasIso,
    /// ISO -> Spool
    FabricatedAs,
    /// ISO -> Part
    HasPart,
    /// Spool -> Part
    Groups,
    /// Part -> Material
    RequiresMaterial,
    /// Material -> PurchaseOrder
    OrderedOn,
    /// Relationship outside the impact taxonomy
    Other(String),
}

impl RelationshipKind {
    /// Parse a store relationship type
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "HAS_ISO" => Self::HasIso,
            "FABRICATED_AS" => Self::FabricatedAs,
            "HAS_PART" => Self::HasPart,
            "GROUPS" => Self::Groups,
            "REQUIRES_MATERIAL" => Self::RequiresMaterial,
            "ORDERED_ON" => Self::OrderedOn,
            _ => Self::Other(label.to_string()),
        }
    }

    /// Canonical relationship type
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::HasIso => "HAS_ISO",
            Self::FabricatedAs => "FABRICATED_AS",
            Self::HasPart => "HAS_PART",
            Self::Groups => "GROUPS",
            Self::RequiresMaterial => "REQUIRES_MATERIAL",
            Self::OrderedOn => "ORDERED_ON",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for RelationshipKind {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<RelationshipKind> for String {
    fn from(value: RelationshipKind) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Node record returned by a traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique id in the store
    pub id: EntityId,
    /// Entity kind (store label)
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Kind-dependent status, e.g. "fabricated"
    #[serde(default)]
    pub status: Option<String>,
    /// Open property map
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl GraphNode {
    /// Create a node without status or properties
    #[must_use]
    pub fn new(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: None,
            properties: BTreeMap::new(),
        }
    }

    /// With status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// With a property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Status used for display: `latest_status` wins over `status`
    #[must_use]
    pub fn effective_status(&self) -> Option<&str> {
        self.property_str("latest_status").or(self.status.as_deref())
    }

    /// String property
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }

    /// Non-negative integer property; numeric strings are accepted
    #[must_use]
    pub fn property_u32(&self, key: &str) -> Option<u32> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point property
    #[must_use]
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// ISO-8601 date property (`YYYY-MM-DD`)
    #[must_use]
    pub fn property_date(&self, key: &str) -> Option<NaiveDate> {
        self.property_str(key)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    }
}

/// Directed edge returned by a traversal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraversalEdge {
    /// Source entity
    pub source: EntityId,
    /// Target entity
    pub target: EntityId,
    /// Relationship kind
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
}

impl TraversalEdge {
    /// Create an edge
    #[must_use]
    pub fn new(source: impl Into<EntityId>, target: impl Into<EntityId>, kind: RelationshipKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

/// Use case a traversal was planned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalPurpose {
    /// Change impact analysis
    Impact,
    /// Ad-hoc tree retrieval
    Tree,
    /// Batch line / ISO analysis
    Batch,
}

impl fmt::Display for TraversalPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Impact => f.write_str("impact"),
            Self::Tree => f.write_str("tree"),
            Self::Batch => f.write_str("batch"),
        }
    }
}

/// Request sent to the graph store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRequest {
    /// Root entities
    pub roots: Vec<EntityId>,
    /// Relationship kinds the traversal may follow
    pub allowed: BTreeSet<RelationshipKind>,
    /// Maximum hop count
    pub max_hops: u32,
    /// Planned use case
    pub purpose: TraversalPurpose,
}

impl TraversalRequest {
    /// True when the edge kind may be followed
    #[inline]
    #[must_use]
    pub fn allows(&self, kind: &RelationshipKind) -> bool {
        self.allowed.contains(kind)
    }
}

/// Flat traversal result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalResponse {
    /// Every node reached, roots included
    pub nodes: Vec<GraphNode>,
    /// Every edge followed
    pub edges: Vec<TraversalEdge>,
    /// Store claims it returned everything within the hop bound
    pub coverage_complete: bool,
    /// Edge count the store expected to return, when it knows
    #[serde(default)]
    pub expected_edge_count: Option<usize>,
    /// Traversable edges exist beyond the hop limit
    #[serde(default)]
    pub truncated_at_hop_limit: bool,
}

impl TraversalResponse {
    /// Index nodes by id
    #[must_use]
    pub fn node_index(&self) -> HashMap<&EntityId, &GraphNode> {
        self.nodes.iter().map(|n| (&n.id, n)).collect()
    }

    /// Look up one node
    #[must_use]
    pub fn node(&self, id: &EntityId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_labels_round_trip() {
        for kind in [
            EntityKind::Line,
            EntityKind::Iso,
            EntityKind::Spool,
            EntityKind::Part,
            EntityKind::Material,
            EntityKind::PurchaseOrder,
        ] {
            assert_eq!(EntityKind::from_label(kind.label()), kind);
        }
        assert_eq!(EntityKind::from_label("spool"), EntityKind::Spool);
        assert_eq!(
            EntityKind::from_label("Equipment"),
            EntityKind::Unknown("Equipment".into())
        );
    }

    #[test]
    fn relationship_kind_unknown_is_preserved() {
        let kind = RelationshipKind::from_label("SUPERSEDES");
        assert_eq!(kind, RelationshipKind::Other("SUPERSEDES".into()));
        assert_eq!(kind.label(), "SUPERSEDES");
    }

    #[test]
    fn graph_node_deserializes_store_shape() {
        let json = r#"{"id":"SP-1","type":"SPOOL","status":"fabricated","properties":{"weld_count":"3","planned_completion":"2025-03-01"}}"#;
        let node: GraphNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, EntityKind::Spool);
        assert_eq!(node.property_u32("weld_count"), Some(3));
        assert_eq!(
            node.property_date("planned_completion"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn latest_status_wins_over_status() {
        let node = GraphNode::new("SP-1", EntityKind::Spool)
            .with_status("in_progress")
            .with_property("latest_status", "fabricated");
        assert_eq!(node.effective_status(), Some("fabricated"));
    }
}
