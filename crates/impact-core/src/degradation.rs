//! Degradation control
//!
//! Decides once per request where the dependency data comes from:
//! - [`Resolution::Measured`]: the store answered; counts come from the tree
//! - [`Resolution::Fallback`]: the store failed; counts come from a
//!   change-kind-keyed [`FallbackProfile`]
//!
//! The simulation can later lower a measured run from FULL to
//! PARTIAL_SIMULATION. Nothing ever raises confidence within a request.

use crate::event::{ChangeEvent, ChangeKind};
use impact_graph::{
    AssembledTree, GraphStorePool, StoreError, TraversalRequest, TraversalResponse, TreeAssembler,
};
use impact_sim::SimulationReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence stamped on every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceMode {
    /// Complete graph data and a complete simulation
    Full,
    /// Graph data measured, simulation stopped by its budget
    PartialSimulation,
    /// Graph store failed; counts and delay are rule-based estimates
    RuleBasedFallback,
}

impl ConfidenceMode {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::PartialSimulation => "PARTIAL_SIMULATION",
            Self::RuleBasedFallback => "RULE_BASED_FALLBACK",
        }
    }

    /// Mode of a measured run given its simulation
    #[must_use]
    pub fn after_simulation(report: &SimulationReport) -> Self {
        if report.is_partial() {
            Self::PartialSimulation
        } else {
            Self::Full
        }
    }
}

impl fmt::Display for ConfidenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assumed footprint of a change when the store is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackProfile {
    /// ISOs assumed affected
    pub isos: u32,
    /// Spools assumed affected
    pub spools: u32,
    /// Welds assumed per affected spool
    pub welds_per_spool: u32,
    /// Delay assumed for the source entity
    pub delay_days: u32,
}

impl FallbackProfile {
    /// Create profile
    #[inline]
    #[must_use]
    pub const fn new(isos: u32, spools: u32, welds_per_spool: u32, delay_days: u32) -> Self {
        Self {
            isos,
            spools,
            welds_per_spool,
            delay_days,
        }
    }

    /// Welds assumed affected
    #[inline]
    #[must_use]
    pub fn welds(&self) -> u64 {
        u64::from(self.spools) * u64::from(self.welds_per_spool)
    }

    /// Edges a complete traversal is expected to return
    #[inline]
    #[must_use]
    pub fn expected_edges(&self) -> usize {
        usize::try_from(self.isos.saturating_add(self.spools)).unwrap_or(usize::MAX)
    }
}

/// Fallback profile per change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTable {
    /// SPEC_CHANGE
    pub spec_change: FallbackProfile,
    /// GEOMETRY_CHANGE
    pub geometry_change: FallbackProfile,
    /// MATURITY_MISMATCH
    pub maturity_mismatch: FallbackProfile,
    /// TAG_MODIFICATION
    pub tag_modification: FallbackProfile,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            spec_change: FallbackProfile::new(3, 8, 3, 6),
            geometry_change: FallbackProfile::new(2, 5, 2, 4),
            maturity_mismatch: FallbackProfile::new(1, 2, 1, 2),
            tag_modification: FallbackProfile::new(1, 1, 0, 1),
        }
    }
}

impl FallbackTable {
    /// Profile for a change kind
    #[must_use]
    pub fn profile(&self, kind: ChangeKind) -> FallbackProfile {
        match kind {
            ChangeKind::SpecChange => self.spec_change,
            ChangeKind::GeometryChange => self.geometry_change,
            ChangeKind::MaturityMismatch => self.maturity_mismatch,
            ChangeKind::TagModification => self.tag_modification,
        }
    }
}

/// Fraction of expected edges a traversal returned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    /// Edges returned
    pub returned_edges: usize,
    /// Edges expected
    pub expected_edges: usize,
    /// `returned / expected`, capped at 1
    pub ratio: f64,
}

impl Coverage {
    /// Coverage of a response, using `estimate` when the store gives no count
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn of(response: &TraversalResponse, estimate: usize) -> Self {
        let returned = response.edges.len();
        if response.coverage_complete {
            return Self {
                returned_edges: returned,
                expected_edges: returned,
                ratio: 1.0,
            };
        }
        let expected = response.expected_edge_count.unwrap_or(estimate);
        let ratio = if expected == 0 {
            1.0
        } else {
            (returned as f64 / expected as f64).min(1.0)
        };
        Self {
            returned_edges: returned,
            expected_edges: expected,
            ratio,
        }
    }
}

/// Where the dependency data of one request comes from
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The store answered
    Measured {
        /// Request sent
        request: TraversalRequest,
        /// Flat response
        response: TraversalResponse,
        /// Tree rooted at the changed entity
        tree: AssembledTree,
        /// Edge coverage
        coverage: Coverage,
    },
    /// The store failed; estimates from the profile
    Fallback {
        /// Store failure that forced the fallback
        reason: StoreError,
        /// Profile in force
        profile: FallbackProfile,
    },
}

impl Resolution {
    /// True for rule-based fallback
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Probes the store and resolves dependency data
#[derive(Debug, Clone)]
pub struct DegradationController {
    pool: GraphStorePool,
    assembler: TreeAssembler,
    fallback: FallbackTable,
}

impl DegradationController {
    /// Create controller
    #[must_use]
    pub fn new(pool: GraphStorePool, assembler: TreeAssembler, fallback: FallbackTable) -> Self {
        Self {
            pool,
            assembler,
            fallback,
        }
    }

    /// Fallback table in force
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> &FallbackTable {
        &self.fallback
    }

    /// Probe, traverse and assemble; any store failure selects the fallback
    pub async fn resolve(&self, event: &ChangeEvent, request: TraversalRequest) -> Resolution {
        let profile = self.fallback.profile(event.change_kind);

        if let Err(reason) = self.pool.probe().await {
            tracing::warn!(event_id = %event.event_id, error = %reason, "graph store probe failed, using rule-based fallback");
            return Resolution::Fallback { reason, profile };
        }

        let response = match self.pool.traverse(&request).await {
            Ok(response) => response,
            Err(reason) => {
                tracing::warn!(event_id = %event.event_id, error = %reason, "traversal failed, using rule-based fallback");
                return Resolution::Fallback { reason, profile };
            }
        };

        let tree = self.assembler.assemble_root(
            &event.source_entity_id,
            Some(&event.source_kind.root_kind()),
            &request,
            &response,
        );
        let coverage = Coverage::of(&response, profile.expected_edges());
        tracing::debug!(
            event_id = %event.event_id,
            nodes = tree.node_count,
            edges = coverage.returned_edges,
            coverage = coverage.ratio,
            "dependency data measured"
        );

        Resolution::Measured {
            request,
            response,
            tree,
            coverage,
        }
    }
}
