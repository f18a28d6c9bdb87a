//! Simulation report

use chrono::{Days, NaiveDate};
use impact_graph::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How far a run got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    /// Every requested trial completed
    Complete,
    /// Budget stopped the run early
    Partial,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("COMPLETE"),
            Self::Partial => f.write_str("PARTIAL"),
        }
    }
}

/// Schedule effect on one affected entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineImpact {
    /// Planned completion before the change
    pub baseline_completion: NaiveDate,
    /// Completion after rework; never before the baseline
    pub revised_completion: NaiveDate,
    /// Representative delay in whole days
    pub delay_days: u32,
    /// Most trials ran past the simulation horizon
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub beyond_horizon: bool,
    /// Pool doing the rework
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
}

impl TimelineImpact {
    /// Impact from a baseline and a delay
    #[must_use]
    pub fn from_delay(baseline: NaiveDate, delay_days: u32) -> Self {
        let revised = baseline
            .checked_add_days(Days::new(u64::from(delay_days)))
            .unwrap_or(NaiveDate::MAX);
        Self {
            baseline_completion: baseline,
            revised_completion: revised,
            delay_days,
            beyond_horizon: false,
            resource_pool: None,
        }
    }

    /// With the rework pool
    #[inline]
    #[must_use]
    pub fn with_pool(mut self, pool: Option<String>) -> Self {
        self.resource_pool = pool;
        self
    }
}

/// Result of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Complete or partial
    pub status: SimulationStatus,
    /// Trials asked for
    pub trials_requested: usize,
    /// Trials finished
    pub trials_completed: usize,
    /// Seed the trials were derived from
    pub seed: u64,
    /// Per-entity schedule effect
    pub timeline: BTreeMap<EntityId, TimelineImpact>,
    /// Median of the per-trial maximum delay
    pub max_delay_p50: u32,
    /// 90th percentile of the per-trial maximum delay
    pub max_delay_p90: u32,
    /// Affected pools over the utilization threshold
    pub conflicted_pools: BTreeSet<String>,
    /// No trial completed; values are a deterministic estimate
    pub estimated: bool,
    /// Wall time spent
    pub elapsed_ms: u64,
}

impl SimulationReport {
    /// Completed trials as a whole percentage of requested trials
    #[must_use]
    pub fn coverage_percent(&self) -> u32 {
        if self.trials_requested == 0 {
            return 100;
        }
        let pct = self.trials_completed.saturating_mul(100) / self.trials_requested;
        u32::try_from(pct.min(100)).unwrap_or(100)
    }

    /// Coverage as shown to callers, e.g. `"40%"`
    #[must_use]
    pub fn coverage_label(&self) -> String {
        format!("{}%", self.coverage_percent())
    }

    /// Largest representative delay over all entities
    #[must_use]
    pub fn max_delay_days(&self) -> u32 {
        self.timeline.values().map(|t| t.delay_days).max().unwrap_or(0)
    }

    /// True when the budget cut the run short
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == SimulationStatus::Partial
    }

    /// Plain-text summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Timeline Simulation Report ===\n");
        out.push_str(&format!("Status: {}\n", self.status));
        out.push_str(&format!(
            "Trials: {}/{} ({})\n",
            self.trials_completed,
            self.trials_requested,
            self.coverage_label()
        ));
        out.push_str(&format!("Seed: {}\n", self.seed));
        out.push_str(&format!(
            "Max delay p50/p90: {}/{} days\n",
            self.max_delay_p50, self.max_delay_p90
        ));
        if !self.conflicted_pools.is_empty() {
            let pools: Vec<&str> = self.conflicted_pools.iter().map(String::as_str).collect();
            out.push_str(&format!("Over-allocated pools: {}\n", pools.join(", ")));
        }
        for (id, impact) in &self.timeline {
            out.push_str(&format!(
                "  {id}: {} -> {} (+{}d){}\n",
                impact.baseline_completion,
                impact.revised_completion,
                impact.delay_days,
                if impact.beyond_horizon { " beyond horizon" } else { "" }
            ));
        }
        out
    }
}

/// Median, rounded up to whole days, of unsorted samples
pub(crate) fn median_ceil(samples: &mut [u32]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    samples.sort_unstable();
    let n = samples.len();
    if n % 2 == 1 {
        samples[n / 2]
    } else {
        let (a, b) = (u64::from(samples[n / 2 - 1]), u64::from(samples[n / 2]));
        u32::try_from((a + b).div_ceil(2)).unwrap_or(u32::MAX)
    }
}

/// Nearest-rank percentile of sorted samples (`pct` in 1..=100)
pub(crate) fn percentile(sorted: &[u32], pct: usize) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).clamp(1, sorted.len());
    sorted[rank - 1]
}
