//! Error types for impact analysis
//!
//! Only [`ValidationError`] aborts a request. Store and simulation failures
//! are absorbed by degradation and reported through the result metadata.

use impact_graph::{PlanError, SnapshotError, StoreError};
use impact_sim::SimError;

/// Main impact error type
#[derive(Debug, thiserror::Error)]
pub enum ImpactError {
    /// Malformed or out-of-range input
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Graph store failure outside the degradable analysis path
    #[error("graph store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Simulation could not run
    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),

    /// Graph snapshot could not be loaded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Invariant broken inside the engine
    #[error("internal error: {0}")]
    Internal(String),
}

impl ImpactError {
    /// Check if error is a caller validation failure
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if analysis can continue in a degraded mode
    #[inline]
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Simulation(_))
    }
}

impl From<PlanError> for ImpactError {
    fn from(e: PlanError) -> Self {
        Self::Validation(ValidationError::Plan(e))
    }
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Event id is empty
    #[error("event_id must not be blank")]
    BlankEventId,

    /// Source entity id is empty
    #[error("source_entity_id must not be blank")]
    BlankEntityId,

    /// Attribute without a name
    #[error("changed attribute name must not be blank")]
    BlankAttributeName,

    /// Same attribute listed twice
    #[error("changed attribute '{0}' listed more than once")]
    DuplicateAttribute(String),

    /// Attribute whose old and new value match
    #[error("changed attribute '{0}' has identical old and new values")]
    UnchangedAttribute(String),

    /// Maturity mismatch without both maturity levels
    #[error("MATURITY_MISMATCH requires source_maturity and related_maturity")]
    MissingMaturity,

    /// Maturity level outside the accepted scale
    #[error("maturity level {level} outside 0..={max}")]
    MaturityOutOfRange {
        /// Level given
        level: u8,
        /// Highest accepted level
        max: u8,
    },

    /// Batch without any line or ISO
    #[error("batch analysis requires at least one line or ISO id")]
    EmptyBatch,

    /// Traversal request rejected by the planner
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid config toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<SimError> for ConfigError {
    fn from(e: SimError) -> Self {
        Self::Invalid(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_graph::TraversalPurpose;

    #[test]
    fn plan_errors_are_validation() {
        let err: ImpactError = PlanError::ZeroDepth {
            purpose: TraversalPurpose::Impact,
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_degradable());
    }

    #[test]
    fn store_errors_are_degradable() {
        let err: ImpactError = StoreError::Unavailable("refused".into()).into();
        assert!(err.is_degradable());
    }
}
