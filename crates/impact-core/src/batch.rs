//! Batch line / ISO analysis
//!
//! Counts what a set of lines and ISOs touches, without simulation or
//! weighted scoring. Severity comes from the affected-entity total alone.

use crate::error::ValidationError;
use crate::result::requires_approval;
use impact_graph::{
    AssembledTree, EntityId, EntityKind, GraphNode, IsoDrawingId, TraversalResponse, TreeNode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Line ids
    #[serde(default)]
    pub line_ids: Vec<EntityId>,
    /// ISO ids
    #[serde(default)]
    pub iso_ids: Vec<EntityId>,
    /// Follow ISO to spool relationships
    #[serde(default = "enabled")]
    pub include_spools: bool,
    /// Follow ISO/spool to part relationships
    #[serde(default = "enabled")]
    pub include_parts: bool,
}

fn enabled() -> bool {
    true
}

impl BatchRequest {
    /// Request over lines and ISOs, spools and parts included
    #[must_use]
    pub fn new(line_ids: Vec<EntityId>, iso_ids: Vec<EntityId>) -> Self {
        Self {
            line_ids,
            iso_ids,
            include_spools: true,
            include_parts: true,
        }
    }

    /// Without spools
    #[inline]
    #[must_use]
    pub fn without_spools(mut self) -> Self {
        self.include_spools = false;
        self
    }

    /// Without parts
    #[inline]
    #[must_use]
    pub fn without_parts(mut self) -> Self {
        self.include_parts = false;
        self
    }

    /// Reject empty requests
    ///
    /// # Errors
    /// [`ValidationError::EmptyBatch`] when no id is given.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.line_ids.is_empty() && self.iso_ids.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        Ok(())
    }
}

/// Count-based severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSeverity {
    /// Nothing affected
    Low,
    /// Up to 10 entities
    Medium,
    /// Up to 30 entities
    High,
    /// More than 30 entities
    Critical,
}

impl BatchSeverity {
    /// Severity for an affected-entity total
    #[must_use]
    pub fn from_count(total: usize) -> Self {
        match total {
            0 => Self::Low,
            1..=10 => Self::Medium,
            11..=30 => Self::High,
            _ => Self::Critical,
        }
    }

    /// Lowercase label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Affected entity with its store properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    /// Entity id
    pub id: EntityId,
    /// Entity kind
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Store properties
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Drawing number (ISOs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_number: Option<String>,
    /// Sheet number (multi-sheet ISOs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_number: Option<String>,
}

impl EntitySummary {
    fn new(id: &EntityId, kind: &EntityKind, node: Option<&GraphNode>) -> Self {
        let (iso_number, sheet_number) = if *kind == EntityKind::Iso {
            let parsed = IsoDrawingId::parse(id);
            (Some(parsed.iso_number), parsed.sheet_number)
        } else {
            (None, None)
        };
        Self {
            id: id.clone(),
            kind: kind.clone(),
            properties: node.map(|n| n.properties.clone()).unwrap_or_default(),
            iso_number,
            sheet_number,
        }
    }
}

/// Hierarchy node with its impact count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactHierarchyNode {
    /// Entity id
    pub entity_id: EntityId,
    /// Entity kind
    pub entity_type: EntityKind,
    /// Children ordered by id
    pub children: Vec<ImpactHierarchyNode>,
    /// Store properties
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// This node plus everything beneath it
    pub impact_count: usize,
}

impl ImpactHierarchyNode {
    fn from_tree(node: &TreeNode, response: &TraversalResponse) -> Self {
        Self {
            entity_id: node.id.clone(),
            entity_type: node.kind.clone(),
            children: node
                .children
                .iter()
                .map(|c| Self::from_tree(c, response))
                .collect(),
            properties: response
                .node(&node.id)
                .map(|n| n.properties.clone())
                .unwrap_or_default(),
            impact_count: node.descendant_count + 1,
        }
    }
}

/// Aggregate batch figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Distinct lines
    pub total_affected_lines: usize,
    /// Distinct ISOs
    pub total_affected_isos: usize,
    /// Distinct spools
    pub total_affected_spools: usize,
    /// Distinct parts
    pub total_affected_parts: usize,
    /// All distinct entities
    pub total_impact_count: usize,
}

/// Batch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImpact {
    /// Affected lines by id
    pub affected_lines: BTreeMap<EntityId, EntitySummary>,
    /// Affected ISOs by id
    pub affected_isos: BTreeMap<EntityId, EntitySummary>,
    /// Affected spools by id
    pub affected_spools: BTreeMap<EntityId, EntitySummary>,
    /// Affected parts by id
    pub affected_parts: BTreeMap<EntityId, EntitySummary>,
    /// One hierarchy per root found in the store
    pub impact_hierarchy: Vec<ImpactHierarchyNode>,
    /// Aggregate figures
    pub metrics: BatchMetrics,
    /// Count-based severity
    pub severity: BatchSeverity,
    /// Approval gate
    pub requires_approval: bool,
    /// Requested roots absent from the store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_roots: Vec<EntityId>,
}

impl BatchImpact {
    /// Collect affected entities from assembled trees
    #[must_use]
    pub fn from_trees(trees: &[AssembledTree], response: &TraversalResponse) -> Self {
        let mut affected_lines = BTreeMap::new();
        let mut affected_isos = BTreeMap::new();
        let mut affected_spools = BTreeMap::new();
        let mut affected_parts = BTreeMap::new();
        let mut impact_hierarchy = Vec::new();
        let mut missing_roots = Vec::new();
        let index = response.node_index();

        for tree in trees {
            if !tree.found {
                tracing::warn!(root = %tree.root.id, "batch root not found in graph store, skipping");
                missing_roots.push(tree.root.id.clone());
                continue;
            }
            for node in tree.root.iter() {
                let bucket = match node.kind {
                    EntityKind::Line => &mut affected_lines,
                    EntityKind::Iso => &mut affected_isos,
                    EntityKind::Spool => &mut affected_spools,
                    EntityKind::Part => &mut affected_parts,
                    _ => continue,
                };
                bucket
                    .entry(node.id.clone())
                    .or_insert_with(|| EntitySummary::new(&node.id, &node.kind, index.get(&node.id).copied()));
            }
            impact_hierarchy.push(ImpactHierarchyNode::from_tree(&tree.root, response));
        }

        let metrics = BatchMetrics {
            total_affected_lines: affected_lines.len(),
            total_affected_isos: affected_isos.len(),
            total_affected_spools: affected_spools.len(),
            total_affected_parts: affected_parts.len(),
            total_impact_count: affected_lines.len()
                + affected_isos.len()
                + affected_spools.len()
                + affected_parts.len(),
        };
        let severity = BatchSeverity::from_count(metrics.total_impact_count);

        Self {
            affected_lines,
            affected_isos,
            affected_spools,
            affected_parts,
            impact_hierarchy,
            requires_approval: requires_approval(severity.as_str(), metrics.total_impact_count),
            metrics,
            severity,
            missing_roots,
        }
    }
}
