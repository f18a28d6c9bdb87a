//! Rework tasks
//!
//! One task per affected entity. Base rework duration by kind:
//! - Spool: 2 days per weld
//! - ISO: fixed 5-day revision cycle
//! - PurchaseOrder: its `lead_time_days`
//! - anything else: 0
//!
//! A `rework_days` property overrides the kind default.

use crate::config::{ENGINEERING_POOL, FABRICATION_POOL, PROCUREMENT_POOL};
use chrono::NaiveDate;
use impact_graph::{EntityId, EntityKind, GraphNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rework days per affected weld on a spool
pub const DAYS_PER_WELD: u32 = 2;
/// Drawing revision cycle in days
pub const ISO_REVISION_DAYS: u32 = 5;

/// Current utilization (0.0..) per resource pool
pub type PoolUtilization = BTreeMap<String, f64>;

/// Rework work item for one affected entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTask {
    /// Affected entity
    pub entity_id: EntityId,
    /// Entity kind
    pub kind: EntityKind,
    /// Rework duration before any penalty
    pub base_days: u32,
    /// Resource pool doing the work, if any
    pub pool: Option<String>,
    /// Planned completion before the change
    pub baseline: NaiveDate,
}

impl SimulationTask {
    /// Create a task
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>, kind: EntityKind, base_days: u32, baseline: NaiveDate) -> Self {
        let pool = default_pool(&kind).map(str::to_string);
        Self {
            entity_id: entity_id.into(),
            kind,
            base_days,
            pool,
            baseline,
        }
    }

    /// Override the pool
    #[inline]
    #[must_use]
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Derive a task from a graph node
    ///
    /// Baseline is the node's `planned_completion`, else `fallback_baseline`.
    #[must_use]
    pub fn from_node(node: &GraphNode, fallback_baseline: NaiveDate) -> Self {
        let base_days = node
            .property_u32("rework_days")
            .unwrap_or_else(|| kind_base_days(node));
        let baseline = node.property_date("planned_completion").unwrap_or(fallback_baseline);
        let mut task = Self::new(node.id.clone(), node.kind.clone(), base_days, baseline);
        if let Some(pool) = node.property_str("resource_pool") {
            task.pool = Some(pool.to_string());
        }
        task
    }
}

fn kind_base_days(node: &GraphNode) -> u32 {
    match node.kind {
        EntityKind::Spool => DAYS_PER_WELD.saturating_mul(node.property_u32("weld_count").unwrap_or(0)),
        EntityKind::Iso => ISO_REVISION_DAYS,
        EntityKind::PurchaseOrder => node.property_u32("lead_time_days").unwrap_or(0),
        _ => 0,
    }
}

/// Pool that reworks an entity kind by default
#[must_use]
pub fn default_pool(kind: &EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Spool => Some(FABRICATION_POOL),
        EntityKind::Iso => Some(ENGINEERING_POOL),
        EntityKind::PurchaseOrder => Some(PROCUREMENT_POOL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    #[test]
    fn spool_days_follow_weld_count() {
        let fabricated = GraphNode::new("S-1", EntityKind::Spool)
            .with_status("fabricated")
            .with_property("weld_count", 3);
        let fresh = GraphNode::new("S-2", EntityKind::Spool).with_property("weld_count", 0);
        assert_eq!(SimulationTask::from_node(&fabricated, day()).base_days, 6);
        assert_eq!(SimulationTask::from_node(&fresh, day()).base_days, 0);
        assert_eq!(
            SimulationTask::from_node(&fresh, day()).pool.as_deref(),
            Some(FABRICATION_POOL)
        );
    }

    #[test]
    fn iso_revision_is_fixed_and_overridable() {
        let iso = GraphNode::new("I-1", EntityKind::Iso);
        assert_eq!(SimulationTask::from_node(&iso, day()).base_days, 5);
        let iso = iso.with_property("rework_days", 8).with_property("resource_pool", "contractor");
        let task = SimulationTask::from_node(&iso, day());
        assert_eq!(task.base_days, 8);
        assert_eq!(task.pool.as_deref(), Some("contractor"));
    }

    #[test]
    fn planned_completion_sets_baseline() {
        let po = GraphNode::new("PO-1", EntityKind::PurchaseOrder)
            .with_property("lead_time_days", 21)
            .with_property("planned_completion", "2025-02-01");
        let task = SimulationTask::from_node(&po, day());
        assert_eq!(task.base_days, 21);
        assert_eq!(task.baseline, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[test]
    fn parts_have_no_pool_and_no_rework() {
        let task = SimulationTask::from_node(&GraphNode::new("P-1", EntityKind::Part), day());
        assert_eq!(task.base_days, 0);
        assert_eq!(task.pool, None);
    }
}
