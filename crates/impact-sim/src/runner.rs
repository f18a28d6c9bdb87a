//! Monte-Carlo runner
//!
//! Trials are independent and seeded by index (`seed ^ trial`), so a run is
//! reproducible regardless of how rayon schedules chunks. The budget is
//! checked before each chunk and before each trial; finished trials are
//! never discarded.

use crate::budget::TrialBudget;
use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::report::{median_ceil, percentile, SimulationReport, SimulationStatus, TimelineImpact};
use crate::task::{PoolUtilization, SimulationTask};
use crate::trial::{TrialOutcome, TrialPlan};
use impact_graph::EntityId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Seed derived from a correlation key (first 8 bytes of its SHA-256)
#[must_use]
pub fn seed_for(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Timeline simulator
#[derive(Debug, Clone, Default)]
pub struct TimelineSimulator {
    config: SimulationConfig,
}

impl TimelineSimulator {
    /// Create simulator
    ///
    /// # Errors
    /// [`SimError::InvalidConfig`] when the config does not validate.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run on the blocking thread pool so the async runtime stays responsive
    ///
    /// # Errors
    /// [`SimError::Aborted`] if the worker panicked.
    pub async fn simulate(
        &self,
        tasks: Vec<SimulationTask>,
        utilization: PoolUtilization,
        seed: u64,
        budget: Arc<dyn TrialBudget>,
    ) -> Result<SimulationReport, SimError> {
        let sim = self.clone();
        tokio::task::spawn_blocking(move || sim.run(&tasks, &utilization, seed, budget.as_ref()))
            .await
            .map_err(|e| SimError::Aborted(e.to_string()))
    }

    /// Run synchronously on the rayon pool
    #[must_use]
    pub fn run(
        &self,
        tasks: &[SimulationTask],
        utilization: &PoolUtilization,
        seed: u64,
        budget: &dyn TrialBudget,
    ) -> SimulationReport {
        let started = Instant::now();
        let plan = TrialPlan::new(tasks, utilization, &self.config);
        let requested = self.config.trials;
        let chunk = self.config.chunk_size.max(1);
        let penalty = self.config.penalty;

        let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(requested);
        while outcomes.len() < requested {
            let done = outcomes.len();
            if budget.exhausted(done) {
                break;
            }
            let mut n = chunk.min(requested - done);
            if let Some(allowance) = budget.allowance(done) {
                n = n.min(allowance);
            }
            if n == 0 {
                break;
            }

            let batch: Vec<TrialOutcome> = (done..done + n)
                .into_par_iter()
                .filter_map(|trial| {
                    if budget.exhausted(done) {
                        return None;
                    }
                    let mut rng = StdRng::seed_from_u64(seed ^ trial as u64);
                    Some(plan.run(|| penalty.sample_days(rng.random::<f64>())))
                })
                .collect();
            let short = batch.len() < n;
            outcomes.extend(batch);
            if short {
                break;
            }
        }

        let completed = outcomes.len();
        let estimated = completed == 0;
        if estimated {
            let at_mode = penalty.mode_whole_days();
            outcomes.push(plan.run(|| at_mode));
        }

        let mut timeline: BTreeMap<EntityId, TimelineImpact> = BTreeMap::new();
        for (ix, task) in tasks.iter().enumerate() {
            let mut samples: Vec<u32> = outcomes.iter().map(|o| o.delays[ix]).collect();
            let clamped = outcomes.iter().filter(|o| o.clamped[ix]).count();
            let delay = median_ceil(&mut samples);
            let mut impact = TimelineImpact::from_delay(task.baseline, delay).with_pool(task.pool.clone());
            impact.beyond_horizon = clamped * 2 > outcomes.len();
            // Diamonds can list an entity twice; keep the larger delay.
            let keep = timeline
                .get(&task.entity_id)
                .map_or(true, |existing| existing.delay_days < delay);
            if keep {
                timeline.insert(task.entity_id.clone(), impact);
            }
        }

        let mut max_delays: Vec<u32> = outcomes.iter().map(TrialOutcome::max_delay).collect();
        max_delays.sort_unstable();

        let status = if completed < requested {
            SimulationStatus::Partial
        } else {
            SimulationStatus::Complete
        };

        let report = SimulationReport {
            status,
            trials_requested: requested,
            trials_completed: completed,
            seed,
            timeline,
            max_delay_p50: percentile(&max_delays, 50),
            max_delay_p90: percentile(&max_delays, 90),
            conflicted_pools: plan.conflicted_pools(),
            estimated,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        if report.is_partial() {
            tracing::warn!(
                trials = completed,
                requested,
                coverage = %report.coverage_label(),
                "simulation budget exhausted; reporting partial distribution"
            );
        } else {
            tracing::debug!(trials = completed, elapsed_ms = report.elapsed_ms, "simulation complete");
        }
        report
    }
}
