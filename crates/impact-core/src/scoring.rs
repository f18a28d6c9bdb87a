//! Severity scoring
//!
//! `score = 10·spools + 5·welds + 20·max_delay_days + maturity_penalty + 15·resource_conflict_score`
//!
//! - `maturity_penalty = 25·|source − related|` for maturity mismatches, else 0
//! - `resource_conflict_score = 10` per affected pool over its utilization threshold
//!
//! Classification is top-down on strict `>`: a score of exactly 100 is
//! HIGH. Coverage below the minimum forces UNKNOWN whatever the score.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Factor weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per affected spool
    pub spool: f64,
    /// Per affected weld
    pub weld: f64,
    /// Per day of maximum delay
    pub delay_day: f64,
    /// Per maturity level of gap
    pub maturity_gap: f64,
    /// Multiplier of the resource-conflict score
    pub resource_conflict: f64,
    /// Resource-conflict score per over-allocated pool
    pub per_conflicted_pool: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            spool: 10.0,
            weld: 5.0,
            delay_day: 20.0,
            maturity_gap: 25.0,
            resource_conflict: 15.0,
            per_conflicted_pool: 10.0,
        }
    }
}

/// Lower bounds (exclusive) of each level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// Above this: CRITICAL
    pub critical: f64,
    /// Above this: HIGH
    pub high: f64,
    /// Above this: MEDIUM
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 100.0,
            high: 50.0,
            medium: 20.0,
        }
    }
}

/// Scorer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Factor weights
    pub weights: ScoringWeights,
    /// Level thresholds
    pub thresholds: SeverityThresholds,
    /// Share of the score above which a factor is named in the rationale
    pub significance_share: f64,
    /// Coverage below which the level is UNKNOWN
    pub min_coverage: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: SeverityThresholds::default(),
            significance_share: 0.15,
            min_coverage: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Check weights and threshold order
    pub(crate) fn problems(&self) -> Option<String> {
        let w = &self.weights;
        let weights = [
            w.spool,
            w.weld,
            w.delay_day,
            w.maturity_gap,
            w.resource_conflict,
            w.per_conflicted_pool,
        ];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Some("scoring weights must be finite and non-negative".into());
        }
        let t = &self.thresholds;
        if !(t.medium >= 0.0 && t.medium < t.high && t.high < t.critical) {
            return Some("scoring thresholds must satisfy 0 <= medium < high < critical".into());
        }
        if !(0.0..=1.0).contains(&self.significance_share) || !(0.0..=1.0).contains(&self.min_coverage) {
            return Some("significance_share and min_coverage must lie in 0..=1".into());
        }
        None
    }
}

/// Ordinal severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    /// Score at or below the medium threshold
    Low,
    /// Above the medium threshold
    Medium,
    /// Above the high threshold
    High,
    /// Above the critical threshold
    Critical,
    /// Not enough dependency data to classify
    Unknown,
}

impl SeverityLevel {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Workflow decision label; UNKNOWN is treated as high
    #[must_use]
    pub fn workflow_label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High | Self::Unknown => "high",
            Self::Critical => "critical",
        }
    }

    /// Handling priority; none while the level is unknown
    #[must_use]
    pub fn priority(self) -> Option<Priority> {
        match self {
            Self::Critical => Some(Priority::P1),
            Self::High => Some(Priority::P2),
            Self::Medium => Some(Priority::P3),
            Self::Low => Some(Priority::P4),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Immediate
    P1,
    /// High
    P2,
    /// Normal
    P3,
    /// Low
    P4,
}

/// Names of the scored factors
pub mod factor {
    //! Factor names as they appear in breakdowns and rationales

    /// Affected spools
    pub const SPOOLS: &str = "affected_spools";
    /// Affected welds
    pub const WELDS: &str = "affected_welds";
    /// Maximum schedule delay
    pub const DELAY: &str = "schedule_delay";
    /// Maturity gap
    pub const MATURITY: &str = "maturity_gap";
    /// Over-allocated resource pools
    pub const RESOURCES: &str = "resource_conflict";
}

/// Measured or estimated inputs of one assessment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringInputs {
    /// Distinct affected spools
    pub affected_spools: usize,
    /// Welds on the affected spools
    pub affected_welds: u64,
    /// Distinct affected purchase orders
    pub affected_purchase_orders: usize,
    /// Largest delay over all affected entities
    pub max_delay_days: u32,
    /// Maturity gap (0 unless the change is a maturity mismatch)
    pub maturity_gap: u32,
    /// Affected pools over the utilization threshold
    pub conflicted_pools: usize,
    /// Fraction of expected edges resolved; `None` when not measured
    pub coverage: Option<f64>,
}

/// One scored factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityFactor {
    /// Factor name
    pub name: String,
    /// Raw quantity
    pub quantity: f64,
    /// Weight applied
    pub weight: f64,
    /// `quantity · weight`
    pub contribution: f64,
    /// Contribution as a fraction of the total score
    pub share: f64,
    /// Share is above the significance threshold
    pub significant: bool,
}

/// Result of scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    /// Weighted score
    pub score: f64,
    /// Classified level
    pub level: SeverityLevel,
    /// Handling priority
    pub priority: Option<Priority>,
    /// Factor breakdown, in formula order
    pub factors: Vec<SeverityFactor>,
    /// Coverage used for classification
    pub coverage: Option<f64>,
    /// Coverage was below the minimum
    pub coverage_insufficient: bool,
    /// Human-readable explanation
    pub rationale: String,
}

impl SeverityAssessment {
    /// Factor by name
    #[must_use]
    pub fn factor(&self, name: &str) -> Option<&SeverityFactor> {
        self.factors.iter().find(|f| f.name == name)
    }

    /// Contribution of a factor (0 when absent)
    #[must_use]
    pub fn contribution(&self, name: &str) -> f64 {
        self.factor(name).map_or(0.0, |f| f.contribution)
    }

    /// Names of significant factors
    pub fn significant_factors(&self) -> impl Iterator<Item = &str> {
        self.factors.iter().filter(|f| f.significant).map(|f| f.name.as_str())
    }
}

/// Computes severity assessments
#[derive(Debug, Clone, Default)]
pub struct SeverityScorer {
    config: ScoringConfig,
}

impl SeverityScorer {
    /// Create scorer
    #[inline]
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Settings in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Resource-conflict score for a number of over-allocated pools
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn resource_conflict_score(&self, conflicted_pools: usize) -> f64 {
        conflicted_pools as f64 * self.config.weights.per_conflicted_pool
    }

    /// Level for a score, ignoring coverage
    #[must_use]
    pub fn classify(&self, score: f64) -> SeverityLevel {
        let t = &self.config.thresholds;
        if score > t.critical {
            SeverityLevel::Critical
        } else if score > t.high {
            SeverityLevel::High
        } else if score > t.medium {
            SeverityLevel::Medium
        } else {
            SeverityLevel::Low
        }
    }

    /// Score, classify and explain
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn assess(&self, inputs: &ScoringInputs) -> SeverityAssessment {
        let w = &self.config.weights;
        let raw = [
            (factor::SPOOLS, inputs.affected_spools as f64, w.spool),
            (factor::WELDS, inputs.affected_welds as f64, w.weld),
            (factor::DELAY, f64::from(inputs.max_delay_days), w.delay_day),
            (factor::MATURITY, f64::from(inputs.maturity_gap), w.maturity_gap),
            (
                factor::RESOURCES,
                self.resource_conflict_score(inputs.conflicted_pools),
                w.resource_conflict,
            ),
        ];

        let score: f64 = raw.iter().map(|(_, q, w)| q * w).sum();
        let factors: Vec<SeverityFactor> = raw
            .iter()
            .map(|&(name, quantity, weight)| {
                let contribution = quantity * weight;
                let share = if score > 0.0 { contribution / score } else { 0.0 };
                SeverityFactor {
                    name: name.to_string(),
                    quantity,
                    weight,
                    contribution,
                    share,
                    significant: share > self.config.significance_share,
                }
            })
            .collect();

        let coverage_insufficient = inputs.coverage.is_some_and(|c| c < self.config.min_coverage);
        let level = if coverage_insufficient {
            SeverityLevel::Unknown
        } else {
            self.classify(score)
        };

        let rationale = self.rationale(score, level, &factors, inputs.coverage);
        SeverityAssessment {
            score,
            level,
            priority: level.priority(),
            factors,
            coverage: inputs.coverage,
            coverage_insufficient,
            rationale,
        }
    }

    fn rationale(&self, score: f64, level: SeverityLevel, factors: &[SeverityFactor], coverage: Option<f64>) -> String {
        let mut significant: Vec<&SeverityFactor> = factors.iter().filter(|f| f.significant).collect();
        significant.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        let mut text = format!("{level} (score {score})");
        if level == SeverityLevel::Unknown {
            if let Some(c) = coverage {
                text.push_str(&format!(
                    ": dependency coverage {:.0}% below the {:.0}% minimum",
                    c * 100.0,
                    self.config.min_coverage * 100.0
                ));
            }
        }
        if significant.is_empty() {
            text.push_str(if level == SeverityLevel::Unknown {
                "; no dominant factor"
            } else {
                ": no dominant factor"
            });
            return text;
        }

        let drivers: Vec<String> = significant
            .iter()
            .map(|f| format!("{} ({} = {:.0}%)", f.name, f.contribution, f.share * 100.0))
            .collect();
        text.push_str(if level == SeverityLevel::Unknown {
            "; driven by "
        } else {
            ": driven by "
        });
        text.push_str(&drivers.join(", "));
        text
    }
}
