//! Error types for the timeline simulator

/// Simulator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Settings the simulator cannot run with
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// Worker running the trials panicked or was cancelled
    #[error("simulation aborted: {0}")]
    Aborted(String),
}
