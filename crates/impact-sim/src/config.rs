//! Simulation configuration

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Fabrication crews (spools)
pub const FABRICATION_POOL: &str = "fabrication";
/// Drawing office (ISO revisions)
pub const ENGINEERING_POOL: &str = "engineering";
/// Buyers (purchase orders)
pub const PROCUREMENT_POOL: &str = "procurement";

/// Triangular distribution of the resource-conflict penalty, in days
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyDistribution {
    /// Lower bound
    pub min_days: f64,
    /// Most likely value
    pub mode_days: f64,
    /// Upper bound
    pub max_days: f64,
}

impl Default for PenaltyDistribution {
    fn default() -> Self {
        Self {
            min_days: 1.0,
            mode_days: 2.0,
            max_days: 5.0,
        }
    }
}

impl PenaltyDistribution {
    /// Inverse CDF of the triangular distribution at `u` in `[0, 1)`
    #[must_use]
    pub fn quantile(&self, u: f64) -> f64 {
        let (a, c, b) = (self.min_days, self.mode_days, self.max_days);
        let span = b - a;
        if span <= f64::EPSILON {
            return a;
        }
        let u = u.clamp(0.0, 1.0);
        let split = (c - a) / span;
        if u < split {
            a + (u * span * (c - a)).sqrt()
        } else {
            b - ((1.0 - u) * span * (b - c)).sqrt()
        }
    }

    /// Penalty in whole days at `u`
    #[must_use]
    pub fn sample_days(&self, u: f64) -> u32 {
        whole_days(self.quantile(u))
    }

    /// Most likely penalty in whole days
    #[must_use]
    pub fn mode_whole_days(&self) -> u32 {
        whole_days(self.mode_days)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_days(days: f64) -> u32 {
    days.max(0.0).round().min(f64::from(u32::MAX)) as u32
}

/// Simulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation horizon in days
    pub horizon_days: u32,
    /// Monte-Carlo trials per run
    pub trials: usize,
    /// Wall-clock budget in milliseconds
    pub budget_ms: u64,
    /// Trials per parallel chunk (budget is checked between chunks)
    pub chunk_size: usize,
    /// Parallel crews per resource pool
    pub pool_capacities: BTreeMap<String, u32>,
    /// Capacity of pools not listed above
    pub default_pool_capacity: u32,
    /// Penalty for tasks in over-allocated pools
    pub penalty: PenaltyDistribution,
    /// Utilization above which a pool is over-allocated
    pub utilization_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let pool_capacities = [FABRICATION_POOL, ENGINEERING_POOL, PROCUREMENT_POOL]
            .into_iter()
            .map(|p| (p.to_string(), 5))
            .collect();
        Self {
            horizon_days: 90,
            trials: 1_000,
            budget_ms: 30_000,
            chunk_size: 50,
            pool_capacities,
            default_pool_capacity: 5,
            penalty: PenaltyDistribution::default(),
            utilization_threshold: 0.9,
        }
    }
}

impl SimulationConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trial count
    #[inline]
    #[must_use]
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Set wall-clock budget
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set capacity of one pool
    #[inline]
    #[must_use]
    pub fn with_pool_capacity(mut self, pool: impl Into<String>, crews: u32) -> Self {
        self.pool_capacities.insert(pool.into(), crews);
        self
    }

    /// Set penalty distribution
    #[inline]
    #[must_use]
    pub fn with_penalty(mut self, penalty: PenaltyDistribution) -> Self {
        self.penalty = penalty;
        self
    }

    /// Wall-clock budget
    #[inline]
    #[must_use]
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    /// Crews available in a pool
    #[must_use]
    pub fn capacity(&self, pool: &str) -> u32 {
        self.pool_capacities
            .get(pool)
            .copied()
            .unwrap_or(self.default_pool_capacity)
            .max(1)
    }

    /// Reject settings the simulator cannot run with
    ///
    /// # Errors
    /// [`SimError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_string()));
        if self.trials == 0 {
            return invalid("simulation.trials must be at least 1");
        }
        if self.chunk_size == 0 {
            return invalid("simulation.chunk_size must be at least 1");
        }
        if self.horizon_days == 0 {
            return invalid("simulation.horizon_days must be at least 1");
        }
        if self.default_pool_capacity == 0 || self.pool_capacities.values().any(|&c| c == 0) {
            return invalid("simulation pool capacities must be at least 1");
        }
        let p = &self.penalty;
        if !(p.min_days >= 0.0 && p.min_days <= p.mode_days && p.mode_days <= p.max_days) {
            return invalid("simulation.penalty must satisfy 0 <= min <= mode <= max");
        }
        if !(self.utilization_threshold > 0.0 && self.utilization_threshold.is_finite()) {
            return invalid("simulation.utilization_threshold must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_spans_bounds_and_peaks_at_mode() {
        let p = PenaltyDistribution::default();
        assert!((p.quantile(0.0) - 1.0).abs() < 1e-9);
        assert!((p.quantile(1.0) - 5.0).abs() < 1e-9);
        // CDF at the mode is (c - a) / (b - a) = 0.25
        assert!((p.quantile(0.25) - 2.0).abs() < 1e-9);
        assert_eq!(p.mode_whole_days(), 2);
    }

    #[test]
    fn degenerate_distribution_is_constant() {
        let p = PenaltyDistribution {
            min_days: 3.0,
            mode_days: 3.0,
            max_days: 3.0,
        };
        assert_eq!(p.sample_days(0.7), 3);
    }

    #[test]
    fn unknown_pool_uses_default_capacity() {
        let cfg = SimulationConfig::default().with_pool_capacity(FABRICATION_POOL, 2);
        assert_eq!(cfg.capacity(FABRICATION_POOL), 2);
        assert_eq!(cfg.capacity("painting"), 5);
    }

    #[test]
    fn validation_rejects_nonsense() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::default().with_trials(0).validate().is_err());
        let bad_penalty = SimulationConfig::default().with_penalty(PenaltyDistribution {
            min_days: 4.0,
            mode_days: 2.0,
            max_days: 5.0,
        });
        assert!(bad_penalty.validate().is_err());
        assert!(SimulationConfig::default()
            .with_pool_capacity(ENGINEERING_POOL, 0)
            .validate()
            .is_err());
    }
}
