//! Analysis configuration
//!
//! One TOML document with a section per component. Every field is optional;
//! missing sections take their defaults.
//!
//! ```toml
//! [planner]
//! impact_max_hops = 3
//!
//! [simulation]
//! trials = 500
//! budget_ms = 10000
//!
//! [fallback.spec_change]
//! isos = 4
//! spools = 10
//! welds_per_spool = 3
//! delay_days = 7
//! ```

use crate::degradation::FallbackTable;
use crate::error::ConfigError;
use crate::recommend::RecommendationConfig;
use crate::scoring::ScoringConfig;
use impact_graph::{PlannerLimits, PoolConfig, TreeConfig};
use impact_sim::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hop ceilings
    pub planner: PlannerLimits,
    /// Graph store pool
    pub store: PoolConfig,
    /// Tree assembly
    pub tree: TreeConfig,
    /// Timeline simulation
    pub simulation: SimulationConfig,
    /// Severity scoring
    pub scoring: ScoringConfig,
    /// Rule-based fallback profiles
    pub fallback: FallbackTable,
    /// Recommendation thresholds
    pub recommendations: RecommendationConfig,
}

impl AnalysisConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// TOML syntax errors or values rejected by [`Self::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Unreadable file, TOML syntax errors or invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded analysis config");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reject values no component can work with
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.planner;
        if p.impact_max_hops == 0 || p.tree_max_hops == 0 || p.default_tree_depth == 0 {
            return Err(ConfigError::Invalid("planner hop limits must be at least 1".into()));
        }
        if p.default_tree_depth > p.tree_max_hops {
            return Err(ConfigError::Invalid(format!(
                "planner.default_tree_depth {} exceeds tree_max_hops {}",
                p.default_tree_depth, p.tree_max_hops
            )));
        }
        if self.store.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid("store.max_concurrent_queries must be at least 1".into()));
        }
        if self.store.query_timeout_ms == 0 || self.store.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store timeouts must be positive".into()));
        }
        if self.tree.node_budget == 0 {
            return Err(ConfigError::Invalid("tree.node_budget must be at least 1".into()));
        }
        self.simulation.validate()?;
        if let Some(problem) = self.scoring.problems() {
            return Err(ConfigError::Invalid(problem));
        }
        let r = &self.recommendations;
        if !r.maturity_penalty_above.is_finite() || r.procurement_delay_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "recommendation thresholds must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// With planner limits
    #[inline]
    #[must_use]
    pub fn with_planner(mut self, planner: PlannerLimits) -> Self {
        self.planner = planner;
        self
    }

    /// With store pool settings
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: PoolConfig) -> Self {
        self.store = store;
        self
    }

    /// With tree settings
    #[inline]
    #[must_use]
    pub fn with_tree(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    /// With simulation settings
    #[inline]
    #[must_use]
    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// With scoring settings
    #[inline]
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// With fallback profiles
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackTable) -> Self {
        self.fallback = fallback;
        self
    }

    /// With recommendation thresholds
    #[inline]
    #[must_use]
    pub fn with_recommendations(mut self, recommendations: RecommendationConfig) -> Self {
        self.recommendations = recommendations;
        self
    }
}
