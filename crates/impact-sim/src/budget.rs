//! Trial budgets
//!
//! A budget decides when the Monte-Carlo loop stops taking new trials.
//! Trials already finished are always kept.

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Stop condition for a simulation run
pub trait TrialBudget: Send + Sync + Debug {
    /// True once no further trial may start
    fn exhausted(&self, completed: usize) -> bool;

    /// Trials that may still start, when the budget counts trials
    fn allowance(&self, _completed: usize) -> Option<usize> {
        None
    }
}

/// Hard wall-clock deadline
#[derive(Debug, Clone, Copy)]
pub struct WallClockBudget {
    deadline: Instant,
}

impl WallClockBudget {
    /// Deadline `budget` from now
    #[must_use]
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }

    /// Time left before the deadline
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl TrialBudget for WallClockBudget {
    fn exhausted(&self, _completed: usize) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Deterministic stop after a fixed number of trials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialCapBudget(pub usize);

impl TrialBudget for TrialCapBudget {
    fn exhausted(&self, completed: usize) -> bool {
        completed >= self.0
    }

    fn allowance(&self, completed: usize) -> Option<usize> {
        Some(self.0.saturating_sub(completed))
    }
}

/// Never exhausted
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl TrialBudget for Unbounded {
    fn exhausted(&self, _completed: usize) -> bool {
        false
    }
}
