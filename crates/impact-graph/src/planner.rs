//! Traversal planner
//!
//! Turns a change (or a tree query) into a [`TraversalRequest`]. Pure: no
//! store access. A depth above the use-case ceiling is rejected, never
//! clamped, so callers can detect it and ask for extended analysis.

use crate::taxonomy::{self, SourceKind};
use crate::types::{EntityId, EntityKind, RelationshipKind, TraversalPurpose, TraversalRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Hop ceilings per use case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerLimits {
    /// Ceiling for impact analysis
    pub impact_max_hops: u32,
    /// Ceiling for ad-hoc tree queries
    pub tree_max_hops: u32,
    /// Ceiling when extended analysis is explicitly requested
    pub extended_max_hops: u32,
    /// Depth used by tree queries that do not ask for one
    pub default_tree_depth: u32,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            impact_max_hops: 3,
            tree_max_hops: 5,
            extended_max_hops: 5,
            default_tree_depth: 1,
        }
    }
}

/// Planning errors (all are caller validation failures)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Depth of zero requested
    #[error("{purpose} traversal depth must be at least 1")]
    ZeroDepth {
        /// Use case
        purpose: TraversalPurpose,
    },

    /// Depth above the hard ceiling
    #[error("{purpose} traversal depth {requested} exceeds ceiling {ceiling}; request extended analysis instead")]
    DepthExceedsCeiling {
        /// Use case
        purpose: TraversalPurpose,
        /// Requested depth
        requested: u32,
        /// Ceiling in force
        ceiling: u32,
    },

    /// No root entities given
    #[error("traversal requires at least one root entity")]
    NoRoots,

    /// A root id is empty
    #[error("root entity id must not be blank")]
    BlankRoot,
}

/// Plans traversal requests
#[derive(Debug, Clone, Default)]
pub struct TraversalPlanner {
    limits: PlannerLimits,
}

impl TraversalPlanner {
    /// Create planner with limits
    #[inline]
    #[must_use]
    pub fn new(limits: PlannerLimits) -> Self {
        Self { limits }
    }

    /// Limits in force
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &PlannerLimits {
        &self.limits
    }

    /// Plan an impact traversal from one changed entity
    ///
    /// # Errors
    /// Blank root, zero depth, or depth above the (extended) ceiling.
    pub fn plan_impact(
        &self,
        root: &EntityId,
        source: SourceKind,
        requested_depth: Option<u32>,
        extended: bool,
    ) -> Result<TraversalRequest, PlanError> {
        let ceiling = if extended {
            self.limits.extended_max_hops.max(self.limits.impact_max_hops)
        } else {
            self.limits.impact_max_hops
        };
        let max_hops = check_depth(TraversalPurpose::Impact, requested_depth.unwrap_or(ceiling), ceiling)?;
        let roots = normalize_roots([root.clone()])?;

        tracing::debug!(root = %root, %source, max_hops, "planned impact traversal");

        Ok(TraversalRequest {
            roots,
            allowed: taxonomy::allowed_for_source(source),
            max_hops,
            purpose: TraversalPurpose::Impact,
        })
    }

    /// Plan a tree query for one entity
    ///
    /// Without a kind hint every traversable relationship is allowed.
    ///
    /// # Errors
    /// Blank root, zero depth, or depth above the tree ceiling.
    pub fn plan_tree(
        &self,
        root: &EntityId,
        kind_hint: Option<&EntityKind>,
        depth: Option<u32>,
    ) -> Result<TraversalRequest, PlanError> {
        let ceiling = self.limits.tree_max_hops;
        let max_hops = check_depth(
            TraversalPurpose::Tree,
            depth.unwrap_or(self.limits.default_tree_depth),
            ceiling,
        )?;
        let roots = normalize_roots([root.clone()])?;
        let allowed = match kind_hint {
            Some(kind) => taxonomy::allowed_from(kind),
            None => taxonomy::allowed_from(&EntityKind::unknown()),
        };

        Ok(TraversalRequest {
            roots,
            allowed,
            max_hops,
            purpose: TraversalPurpose::Tree,
        })
    }

    /// Plan a batch traversal over lines and ISOs
    ///
    /// Procurement relationships are never followed; the switches drop
    /// spool or part relationships. Filters that leave nothing to follow
    /// yield a root-only request (`max_hops` 0).
    ///
    /// # Errors
    /// No roots or a blank root.
    pub fn plan_batch(
        &self,
        line_ids: &[EntityId],
        iso_ids: &[EntityId],
        include_spools: bool,
        include_parts: bool,
    ) -> Result<TraversalRequest, PlanError> {
        let roots = normalize_roots(line_ids.iter().chain(iso_ids).cloned())?;

        let mut allowed = BTreeSet::new();
        if !line_ids.is_empty() {
            allowed.insert(RelationshipKind::HasIso);
        }
        if include_spools {
            allowed.insert(RelationshipKind::FabricatedAs);
        }
        if include_parts {
            allowed.insert(RelationshipKind::HasPart);
        }
        if include_spools && include_parts {
            allowed.insert(RelationshipKind::Groups);
        }
        let max_hops = if allowed.is_empty() { 0 } else { self.limits.impact_max_hops };

        Ok(TraversalRequest {
            roots,
            allowed,
            max_hops,
            purpose: TraversalPurpose::Batch,
        })
    }
}

fn check_depth(purpose: TraversalPurpose, requested: u32, ceiling: u32) -> Result<u32, PlanError> {
    if requested == 0 {
        return Err(PlanError::ZeroDepth { purpose });
    }
    if requested > ceiling {
        return Err(PlanError::DepthExceedsCeiling {
            purpose,
            requested,
            ceiling,
        });
    }
    Ok(requested)
}

/// Trim ids, reject blanks, drop duplicates keeping first occurrence
fn normalize_roots(ids: impl IntoIterator<Item = EntityId>) -> Result<Vec<EntityId>, PlanError> {
    let mut seen = BTreeSet::new();
    let mut roots = Vec::new();
    for id in ids {
        if id.is_blank() {
            return Err(PlanError::BlankRoot);
        }
        let id = EntityId::new(id.as_str().trim());
        if seen.insert(id.clone()) {
            roots.push(id);
        }
    }
    if roots.is_empty() {
        return Err(PlanError::NoRoots);
    }
    Ok(roots)
}
