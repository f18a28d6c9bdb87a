//! Recommendation rules
//!
//! Every rule is checked independently and every matching rule fires.
//! Output is ordered by the score contribution each action addresses,
//! largest first, ties broken by code.

use crate::scoring::{factor, SeverityAssessment};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Rule thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Batch scheduling above this many spools
    pub batch_spools_above: usize,
    /// Escalation above this many delay days
    pub escalate_delay_above_days: u32,
    /// Maturity alignment above this penalty
    pub maturity_penalty_above: f64,
    /// Score weight per day of purchase-order delay
    pub procurement_delay_weight: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            batch_spools_above: 5,
            escalate_delay_above_days: 30,
            maturity_penalty_above: 50.0,
            procurement_delay_weight: 20.0,
        }
    }
}

/// Advisory codes
pub mod code {
    //! Stable recommendation codes

    /// Schedule affected spools as one fabrication batch
    pub const BATCH_SCHEDULING: &str = "BATCH_SCHEDULING";
    /// Escalate the schedule impact
    pub const SCHEDULE_ESCALATION: &str = "SCHEDULE_ESCALATION";
    /// Start the maturity alignment workflow
    pub const MATURITY_ALIGNMENT: &str = "MATURITY_ALIGNMENT";
    /// Notify procurement
    pub const PROCUREMENT_NOTIFICATION: &str = "PROCUREMENT_NOTIFICATION";
    /// Rebalance over-allocated pools
    pub const RESOURCE_LEVELLING: &str = "RESOURCE_LEVELLING";
    /// Reconcile missing dependency data
    pub const DATA_RECONCILIATION: &str = "DATA_RECONCILIATION";
    /// Re-run with extended analysis
    pub const EXTENDED_ANALYSIS: &str = "EXTENDED_ANALYSIS";
}

/// One advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Stable code
    pub code: String,
    /// Human-readable advice
    pub message: String,
    /// Metric that triggered the rule
    pub metric: String,
    /// Metric value
    pub metric_value: f64,
    /// Score contribution the action addresses
    pub impact_reduction: f64,
}

/// Facts the rules look at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationInputs<'a> {
    /// Scored assessment
    pub assessment: &'a SeverityAssessment,
    /// Distinct affected purchase orders
    pub purchase_orders: usize,
    /// Largest delay among affected purchase orders
    pub max_purchase_order_delay: u32,
    /// Deeper or fuller analysis would add information
    pub extended_analysis_recommended: bool,
}

/// Deterministic rule table
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl RecommendationEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    /// Thresholds in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Fire all matching rules
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn recommend(&self, inputs: &RecommendationInputs<'_>) -> Vec<Recommendation> {
        let a = inputs.assessment;
        let cfg = &self.config;
        let mut out = Vec::new();

        let spools = a.factor(factor::SPOOLS).map_or(0.0, |f| f.quantity);
        if spools > cfg.batch_spools_above as f64 {
            out.push(rec(
                code::BATCH_SCHEDULING,
                format!("{spools} spools affected; schedule rework as a single fabrication batch"),
                factor::SPOOLS,
                spools,
                a.contribution(factor::SPOOLS),
            ));
        }

        let delay = a.factor(factor::DELAY).map_or(0.0, |f| f.quantity);
        if delay > f64::from(cfg.escalate_delay_above_days) {
            out.push(rec(
                code::SCHEDULE_ESCALATION,
                format!("estimated delay of {delay} days; escalate to project controls"),
                factor::DELAY,
                delay,
                a.contribution(factor::DELAY),
            ));
        }

        let maturity_penalty = a.contribution(factor::MATURITY);
        if maturity_penalty > cfg.maturity_penalty_above {
            out.push(rec(
                code::MATURITY_ALIGNMENT,
                format!("maturity penalty {maturity_penalty}; start the maturity alignment workflow"),
                factor::MATURITY,
                maturity_penalty,
                maturity_penalty,
            ));
        }

        if inputs.purchase_orders > 0 {
            let po_delay = f64::from(inputs.max_purchase_order_delay);
            out.push(rec(
                code::PROCUREMENT_NOTIFICATION,
                format!(
                    "{} purchase order(s) affected; notify procurement",
                    inputs.purchase_orders
                ),
                "affected_purchase_orders",
                inputs.purchase_orders as f64,
                po_delay * cfg.procurement_delay_weight,
            ));
        }

        let conflict = a.factor(factor::RESOURCES).map_or(0.0, |f| f.quantity);
        if conflict > 0.0 {
            out.push(rec(
                code::RESOURCE_LEVELLING,
                format!("resource conflict score {conflict}; level the load before rework starts"),
                factor::RESOURCES,
                conflict,
                a.contribution(factor::RESOURCES),
            ));
        }

        if a.coverage_insufficient {
            let coverage = a.coverage.unwrap_or(0.0);
            out.push(rec(
                code::DATA_RECONCILIATION,
                format!(
                    "only {:.0}% of expected dependencies resolved; reconcile graph data",
                    coverage * 100.0
                ),
                "coverage_ratio",
                coverage,
                0.0,
            ));
        }

        if inputs.extended_analysis_recommended {
            out.push(rec(
                code::EXTENDED_ANALYSIS,
                "result is incomplete; re-run with extended analysis".to_string(),
                "extended_analysis_recommended",
                1.0,
                0.0,
            ));
        }

        out.sort_by(|x, y| {
            y.impact_reduction
                .partial_cmp(&x.impact_reduction)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.code.cmp(&y.code))
        });
        out
    }
}

fn rec(code: &str, message: String, metric: &str, metric_value: f64, impact_reduction: f64) -> Recommendation {
    Recommendation {
        code: code.to_string(),
        message,
        metric: metric.to_string(),
        metric_value,
        impact_reduction,
    }
}
