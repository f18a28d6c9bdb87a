//! Impact Sim - schedule delay estimation for rework
//!
//! A discrete-event simulation over a fixed horizon at daily granularity:
//! - one rework task per affected entity, duration by kind
//! - resource pools with a fixed number of crews, shortest task first
//! - a triangular penalty on tasks in over-allocated pools
//! - Monte-Carlo trials in parallel, stopped by a [`TrialBudget`]
//!
//! # Example
//!
//! ```rust,ignore
//! use impact_sim::{seed_for, SimulationConfig, TimelineSimulator, WallClockBudget};
//!
//! let config = SimulationConfig::default();
//! let sim = TimelineSimulator::new(config.clone())?;
//! let budget = WallClockBudget::starting_now(config.budget());
//! let report = sim.run(&tasks, &utilization, seed_for("EVT-42"), &budget);
//! println!("{}", report.generate_text());
//! ```

#![warn(unreachable_pub)]

pub mod budget;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod task;
mod trial;

// Re-exports for convenience
pub use budget::{TrialBudget, TrialCapBudget, Unbounded, WallClockBudget};
pub use config::{
    PenaltyDistribution, SimulationConfig, ENGINEERING_POOL, FABRICATION_POOL, PROCUREMENT_POOL,
};
pub use error::SimError;
pub use report::{SimulationReport, SimulationStatus, TimelineImpact};
pub use runner::{seed_for, TimelineSimulator};
pub use task::{default_pool, PoolUtilization, SimulationTask};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
