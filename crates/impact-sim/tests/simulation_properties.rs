use chrono::NaiveDate;
use impact_graph::{EntityId, EntityKind, GraphNode};
use impact_sim::{
    PoolUtilization, SimulationConfig, SimulationStatus, SimulationTask, TimelineSimulator,
    TrialCapBudget, Unbounded, WallClockBudget, FABRICATION_POOL,
};
use proptest::prelude::*;
use std::time::Duration;

fn baseline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn spools(welds: &[u32]) -> Vec<SimulationTask> {
    welds
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let node = GraphNode::new(format!("SP-{i:03}"), EntityKind::Spool).with_property("weld_count", w);
            SimulationTask::from_node(&node, baseline())
        })
        .collect()
}

fn small() -> SimulationConfig {
    SimulationConfig::default().with_trials(60)
}

proptest! {
    #[test]
    fn prop_revised_never_precedes_baseline(
        welds in proptest::collection::vec(0..40u32, 1..12),
        utilization in 0.0..1.5f64,
        capacity in 1..4u32,
        seed in any::<u64>(),
    ) {
        let cfg = small().with_pool_capacity(FABRICATION_POOL, capacity);
        let util: PoolUtilization = [(FABRICATION_POOL.to_string(), utilization)].into_iter().collect();
        let report = TimelineSimulator::new(cfg).unwrap().run(&spools(&welds), &util, seed, &Unbounded);
        for impact in report.timeline.values() {
            prop_assert!(impact.revised_completion >= impact.baseline_completion);
            prop_assert!(impact.delay_days <= 90);
        }
        prop_assert!(report.max_delay_p50 <= report.max_delay_p90);
    }

    #[test]
    fn prop_trial_cap_is_honoured_exactly(cap in 0..200usize) {
        let cfg = SimulationConfig::default().with_trials(150);
        let report = TimelineSimulator::new(cfg)
            .unwrap()
            .run(&spools(&[3, 1]), &PoolUtilization::new(), 9, &TrialCapBudget(cap));
        prop_assert_eq!(report.trials_completed, cap.min(150));
        prop_assert_eq!(report.is_partial(), cap < 150);
        prop_assert_eq!(report.timeline.len(), 2);
    }
}

#[test]
fn test_expired_wall_clock_still_reports_values() {
    let budget = WallClockBudget::starting_now(Duration::ZERO);
    let util: PoolUtilization = [(FABRICATION_POOL.to_string(), 0.99)].into_iter().collect();
    let report = TimelineSimulator::default().run(&spools(&[3]), &util, 5, &budget);

    assert_eq!(report.status, SimulationStatus::Partial);
    assert!(report.estimated);
    assert_eq!(report.coverage_label(), "0%");
    // 2 days per weld plus the penalty at its mode
    assert_eq!(report.max_delay_days(), 8);
}

#[test]
fn test_capacity_queues_long_jobs_behind_short_ones() {
    let cfg = small().with_pool_capacity(FABRICATION_POOL, 1);
    let report = TimelineSimulator::new(cfg)
        .unwrap()
        .run(&spools(&[5, 1]), &PoolUtilization::new(), 1, &Unbounded);
    // SP-001 (2 days) runs first, SP-000 (10 days) waits behind it
    assert_eq!(report.timeline[&EntityId::from("SP-001")].delay_days, 2);
    assert_eq!(report.timeline[&EntityId::from("SP-000")].delay_days, 12);
}

#[test]
fn test_long_queue_is_clamped_to_horizon() {
    let cfg = small().with_pool_capacity(FABRICATION_POOL, 1);
    let report = TimelineSimulator::new(cfg)
        .unwrap()
        .run(&spools(&[30, 30]), &PoolUtilization::new(), 1, &Unbounded);
    let last = &report.timeline[&EntityId::from("SP-001")];
    assert_eq!(last.delay_days, 90);
    assert!(last.beyond_horizon);
}
