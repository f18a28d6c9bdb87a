//! Impact results
//!
//! An [`ImpactResult`] is complete and internally consistent in every
//! confidence mode. Apart from `analysis_timestamp` and
//! `metadata.analysis_duration_ms`, it is a pure function of the event, the
//! graph snapshot and the configuration.

use crate::degradation::{ConfidenceMode, FallbackProfile};
use crate::event::ChangeKind;
use crate::recommend::Recommendation;
use crate::scoring::SeverityAssessment;
use chrono::{DateTime, Utc};
use impact_graph::{EntityId, EntityKind, TraversalResponse, TreeNode};
use impact_sim::TimelineImpact;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Affected-entity total above which approval is always required
pub const APPROVAL_COUNT_THRESHOLD: usize = 15;

/// Approval rule shared by single and batch analysis
#[inline]
#[must_use]
pub fn requires_approval(severity_label: &str, total_impact_count: usize) -> bool {
    matches!(severity_label, "high" | "critical") || total_impact_count > APPROVAL_COUNT_THRESHOLD
}

/// Stable result id for an event (`IMP-` + 16 hex chars of SHA-256)
#[must_use]
pub fn impact_id_for(event_id: &str) -> String {
    let digest = Sha256::digest(event_id.as_bytes());
    format!("IMP-{}", &hex::encode(digest)[..16])
}

/// Distinct affected entities per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedCounts {
    /// Lines
    pub lines: usize,
    /// ISO drawings
    pub isos: usize,
    /// Spools
    pub spools: usize,
    /// Parts
    pub parts: usize,
    /// Bulk materials
    pub materials: usize,
    /// Purchase orders
    pub purchase_orders: usize,
    /// Welds on the affected spools
    pub welds: u64,
}

impl AffectedCounts {
    /// Affected entities of every kind (welds are not entities)
    #[must_use]
    pub fn total(&self) -> usize {
        self.lines + self.isos + self.spools + self.parts + self.materials + self.purchase_orders
    }
}

/// Affected entities below the changed one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectedEntities {
    /// Counts per kind
    pub counts: AffectedCounts,
    /// Ids per kind label; empty for estimated counts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, BTreeSet<EntityId>>,
}

impl AffectedEntities {
    /// Distinct descendants of the tree root, with welds read from the response
    #[must_use]
    pub fn from_tree(root: &TreeNode, response: &TraversalResponse) -> Self {
        let mut entities: BTreeMap<String, BTreeSet<EntityId>> = BTreeMap::new();
        let mut seen: BTreeMap<EntityId, EntityKind> = BTreeMap::new();
        for node in root.descendants() {
            if node.id == root.id {
                continue;
            }
            seen.entry(node.id.clone()).or_insert_with(|| node.kind.clone());
        }

        let index = response.node_index();
        let mut counts = AffectedCounts::default();
        for (id, kind) in seen {
            match kind {
                EntityKind::Line => counts.lines += 1,
                EntityKind::Iso => counts.isos += 1,
                EntityKind::Spool => {
                    counts.spools += 1;
                    let welds = index.get(&id).and_then(|n| n.property_u32("weld_count")).unwrap_or(0);
                    counts.welds += u64::from(welds);
                }
                EntityKind::Part => counts.parts += 1,
                EntityKind::Material => counts.materials += 1,
                EntityKind::PurchaseOrder => counts.purchase_orders += 1,
                EntityKind::Unknown(_) => {}
            }
            entities.entry(kind.label().to_string()).or_default().insert(id);
        }
        Self { counts, entities }
    }

    /// Estimated counts from a fallback profile
    #[must_use]
    pub fn from_profile(profile: &FallbackProfile) -> Self {
        Self {
            counts: AffectedCounts {
                isos: usize::try_from(profile.isos).unwrap_or(usize::MAX),
                spools: usize::try_from(profile.spools).unwrap_or(usize::MAX),
                welds: profile.welds(),
                ..AffectedCounts::default()
            },
            entities: BTreeMap::new(),
        }
    }
}

/// Data-quality and run facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Confidence mode
    pub simulation_confidence: ConfidenceMode,
    /// Completed trials as a percentage string, e.g. `"40%"`
    pub simulation_coverage: String,
    /// Trials finished
    pub trials_completed: usize,
    /// Trials asked for
    pub trials_requested: usize,
    /// Fraction of expected edges resolved; absent for fallback results
    pub coverage_ratio: Option<f64>,
    /// Coverage was below the minimum and forced UNKNOWN
    pub coverage_insufficient: bool,
    /// Deeper or fuller analysis would add information
    pub extended_analysis_recommended: bool,
    /// Hop limit the traversal ran with
    pub max_traversal_depth: u32,
    /// Deepest level reached in the tree
    pub depth_reached: u32,
    /// The changed entity exists in the store
    pub source_found: bool,
    /// Tree assembly stopped at the node budget
    pub tree_truncated: bool,
    /// Counts come from the fallback profile
    pub estimated_counts: bool,
    /// Why the analysis degraded, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<String>,
    /// Wall time of the analysis
    pub analysis_duration_ms: u64,
}

/// Complete impact verdict for one change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// Stable id derived from the event id
    pub impact_id: String,
    /// Triggering event
    pub event_id: String,
    /// Changed entity
    pub source_entity_id: EntityId,
    /// Kind of change
    pub change_kind: ChangeKind,
    /// When the analysis ran
    pub analysis_timestamp: DateTime<Utc>,
    /// Severity verdict
    pub severity: SeverityAssessment,
    /// Affected entities
    pub affected: AffectedEntities,
    /// Dependency tree of the changed entity
    pub tree: TreeNode,
    /// Schedule effect per entity
    pub timeline: BTreeMap<EntityId, TimelineImpact>,
    /// Advisories, most valuable first
    pub recommendations: Vec<Recommendation>,
    /// Data quality and run facts
    pub metadata: AnalysisMetadata,
}

impl ImpactResult {
    /// Confidence mode
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> ConfidenceMode {
        self.metadata.simulation_confidence
    }

    /// Largest delay in the timeline
    #[must_use]
    pub fn max_delay_days(&self) -> u32 {
        self.timeline.values().map(|t| t.delay_days).max().unwrap_or(0)
    }

    /// Flatten into workflow decision variables
    #[must_use]
    pub fn workflow_variables(&self) -> WorkflowVariables {
        WorkflowVariables::from_result(self)
    }
}

/// IMPACT or NO_IMPACT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// At least one entity affected
    Impact,
    /// Nothing affected
    NoImpact,
}

/// Primitive decision variables for the workflow engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowVariables {
    /// IMPACT or NO_IMPACT
    pub outcome: Outcome,
    /// low, medium, high or critical
    pub impact_severity: String,
    /// Approval gate
    pub requires_approval: bool,
    /// Affected lines
    pub affected_lines: usize,
    /// Affected ISOs
    pub affected_isos: usize,
    /// Affected spools
    pub affected_spools: usize,
    /// Affected parts
    pub affected_parts: usize,
    /// Affected materials
    pub affected_materials: usize,
    /// Affected purchase orders
    pub affected_purchase_orders: usize,
    /// Affected welds
    pub affected_welds: u64,
    /// All affected entities
    pub total_impact_count: usize,
    /// Largest delay in days
    pub estimated_delay_days: u32,
    /// Confidence mode
    pub confidence: ConfidenceMode,
}

impl WorkflowVariables {
    fn from_result(result: &ImpactResult) -> Self {
        let c = &result.affected.counts;
        let total = c.total();
        let label = result.severity.level.workflow_label();
        Self {
            outcome: if total > 0 { Outcome::Impact } else { Outcome::NoImpact },
            impact_severity: label.to_string(),
            requires_approval: requires_approval(label, total),
            affected_lines: c.lines,
            affected_isos: c.isos,
            affected_spools: c.spools,
            affected_parts: c.parts,
            affected_materials: c.materials,
            affected_purchase_orders: c.purchase_orders,
            affected_welds: c.welds,
            total_impact_count: total,
            estimated_delay_days: result.max_delay_days(),
            confidence: result.confidence(),
        }
    }
}
