//! Single discrete-event trial
//!
//! Each pool owns a fixed number of crews. Tasks are dispatched
//! shortest-first (ties by entity id) onto the crew that frees up earliest;
//! the event queue is a min-heap of crew release days. A task's delay is the
//! day its rework completes, clamped to the horizon.

use crate::config::SimulationConfig;
use crate::task::{PoolUtilization, SimulationTask};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Delays of one trial, indexed like the task list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrialOutcome {
    pub(crate) delays: Vec<u32>,
    pub(crate) clamped: Vec<bool>,
}

impl TrialOutcome {
    pub(crate) fn max_delay(&self) -> u32 {
        self.delays.iter().copied().max().unwrap_or(0)
    }
}

/// Immutable trial setup shared by every trial of a run
#[derive(Debug)]
pub(crate) struct TrialPlan<'a> {
    tasks: &'a [SimulationTask],
    pools: BTreeMap<&'a str, (u32, Vec<usize>)>,
    penalized: Vec<bool>,
    horizon: u32,
}

impl<'a> TrialPlan<'a> {
    pub(crate) fn new(tasks: &'a [SimulationTask], utilization: &PoolUtilization, config: &SimulationConfig) -> Self {
        let mut pools: BTreeMap<&str, (u32, Vec<usize>)> = BTreeMap::new();
        let mut penalized = vec![false; tasks.len()];
        for (ix, task) in tasks.iter().enumerate() {
            if let Some(pool) = task.pool.as_deref() {
                pools
                    .entry(pool)
                    .or_insert_with(|| (config.capacity(pool), Vec::new()))
                    .1
                    .push(ix);
                penalized[ix] = utilization
                    .get(pool)
                    .is_some_and(|&u| u > config.utilization_threshold);
            }
        }
        Self {
            tasks,
            pools,
            penalized,
            horizon: config.horizon_days,
        }
    }

    /// Pools of the plan whose utilization is over the threshold
    pub(crate) fn conflicted_pools(&self) -> BTreeSet<String> {
        self.pools
            .iter()
            .filter(|(_, (_, members))| members.iter().any(|&ix| self.penalized[ix]))
            .map(|(pool, _)| (*pool).to_string())
            .collect()
    }

    /// Run one trial; `penalty` is drawn once per penalized task, in task order
    pub(crate) fn run(&self, mut penalty: impl FnMut() -> u32) -> TrialOutcome {
        let durations: Vec<u32> = self
            .tasks
            .iter()
            .zip(&self.penalized)
            .map(|(task, &penalized)| {
                if penalized {
                    task.base_days.saturating_add(penalty())
                } else {
                    task.base_days
                }
            })
            .collect();

        // Tasks outside any pool run immediately.
        let mut finish = durations.clone();

        for (capacity, members) in self.pools.values() {
            let mut order = members.clone();
            order.sort_by(|&a, &b| {
                durations[a]
                    .cmp(&durations[b])
                    .then_with(|| self.tasks[a].entity_id.cmp(&self.tasks[b].entity_id))
            });

            let mut crews: BinaryHeap<Reverse<u32>> = (0..*capacity).map(|_| Reverse(0)).collect();
            for ix in order {
                let Reverse(free_at) = crews.pop().unwrap_or(Reverse(0));
                let done = free_at.saturating_add(durations[ix]);
                finish[ix] = done;
                crews.push(Reverse(done));
            }
        }

        let clamped = finish.iter().map(|&d| d > self.horizon).collect();
        let delays = finish.into_iter().map(|d| d.min(self.horizon)).collect();
        TrialOutcome { delays, clamped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FABRICATION_POOL;
    use chrono::NaiveDate;
    use impact_graph::EntityKind;

    fn spool(id: &str, days: u32) -> SimulationTask {
        SimulationTask::new(id, EntityKind::Spool, days, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn shortest_task_goes_first_on_single_crew() {
        let tasks = vec![spool("S-1", 6), spool("S-2", 0)];
        let cfg = SimulationConfig::default().with_pool_capacity(FABRICATION_POOL, 1);
        let plan = TrialPlan::new(&tasks, &PoolUtilization::new(), &cfg);
        let out = plan.run(|| 0);
        assert_eq!(out.delays, vec![6, 0]);
        assert_eq!(out.max_delay(), 6);
    }

    #[test]
    fn queueing_delays_tasks_beyond_capacity() {
        let tasks = vec![spool("A", 4), spool("B", 4), spool("C", 4)];
        let cfg = SimulationConfig::default().with_pool_capacity(FABRICATION_POOL, 2);
        let plan = TrialPlan::new(&tasks, &PoolUtilization::new(), &cfg);
        assert_eq!(plan.run(|| 0).delays, vec![4, 4, 8]);
    }

    #[test]
    fn conflicted_pool_adds_penalty() {
        let tasks = vec![spool("A", 2)];
        let util: PoolUtilization = [(FABRICATION_POOL.to_string(), 0.95)].into_iter().collect();
        let plan = TrialPlan::new(&tasks, &util, &SimulationConfig::default());
        assert_eq!(plan.run(|| 3).delays, vec![5]);
        assert!(plan.conflicted_pools().contains(FABRICATION_POOL));
    }

    #[test]
    fn utilization_at_threshold_is_not_a_conflict() {
        let tasks = vec![spool("A", 2)];
        let util: PoolUtilization = [(FABRICATION_POOL.to_string(), 0.9)].into_iter().collect();
        let plan = TrialPlan::new(&tasks, &util, &SimulationConfig::default());
        assert!(plan.conflicted_pools().is_empty());
    }

    #[test]
    fn completion_is_clamped_to_horizon() {
        let tasks = vec![spool("A", 120)];
        let plan = TrialPlan::new(&tasks, &PoolUtilization::new(), &SimulationConfig::default());
        let out = plan.run(|| 0);
        assert_eq!(out.delays, vec![90]);
        assert_eq!(out.clamped, vec![true]);
    }
}
