use impact_core::prelude::*;
use impact_core::recommend::code;
use impact_core::{BatchSeverity, Outcome, Priority, ValidationError};
use impact_graph::ChildrenHierarchy;
use impact_sim::{PoolUtilization, TrialCapBudget, Unbounded, FABRICATION_POOL};
use impact_test_utils::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn unbounded() -> AnalysisOptions {
    AnalysisOptions::new().with_budget(Arc::new(Unbounded))
}

#[tokio::test]
async fn test_iso_with_two_spools_is_critical() {
    let engine = engine_over(iso_with_two_spools().store());
    let event = iso_event("EVT-100", ChangeKind::SpecChange);

    let result = engine.analyze(&event, &unbounded()).await.unwrap();

    assert_eq!(result.confidence(), ConfidenceMode::Full);
    assert_eq!(result.timeline[&EntityId::from("SP-001")].delay_days, 6);
    assert_eq!(result.timeline[&EntityId::from("SP-002")].delay_days, 0);
    assert_eq!(result.affected.counts.spools, 2);
    assert_eq!(result.affected.counts.welds, 3);
    assert!((result.severity.score - 155.0).abs() < f64::EPSILON);
    assert_eq!(result.severity.level, SeverityLevel::Critical);
    assert_eq!(result.severity.priority, Some(Priority::P1));
    assert!(result.severity.rationale.contains("schedule_delay"));
    assert_eq!(result.metadata.simulation_coverage, "100%");
    assert_eq!(result.metadata.coverage_ratio, Some(1.0));
    assert!(!result.metadata.extended_analysis_recommended);
    assert!(result.recommendations.is_empty());
    assert_eq!(result.tree.descendant_count, 2);
}

#[tokio::test]
async fn test_unreachable_store_uses_rule_based_fallback() {
    let engine = engine_over(UnreachableStore);
    let event = iso_event("EVT-200", ChangeKind::SpecChange);

    let result = engine.analyze(&event, &AnalysisOptions::default()).await.unwrap();

    assert_eq!(result.confidence(), ConfidenceMode::RuleBasedFallback);
    assert_eq!(result.affected.counts.isos, 3);
    assert_eq!(result.affected.counts.spools, 8);
    assert_eq!(result.affected.counts.welds, 24);
    assert!(result.metadata.estimated_counts);
    assert_eq!(result.metadata.coverage_ratio, None);
    assert_eq!(result.metadata.trials_completed, 0);
    assert!(result.metadata.degradation_reason.as_deref().unwrap().contains("connection refused"));
    // Root only, with a profile-based delay for the changed entity
    assert!(result.tree.is_leaf());
    assert_eq!(result.timeline[&EntityId::from(SCENARIO_ISO)].delay_days, 6);
    // 10·8 + 5·24 + 20·6
    assert!((result.severity.score - 320.0).abs() < f64::EPSILON);
    assert_eq!(result.severity.level, SeverityLevel::Critical);

    let codes: Vec<&str> = result.recommendations.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec![code::BATCH_SCHEDULING, code::EXTENDED_ANALYSIS]);

    let vars = result.workflow_variables();
    assert_eq!(vars.outcome, Outcome::Impact);
    assert_eq!(vars.affected_isos, 3);
    assert_eq!(vars.total_impact_count, 11);
    assert_eq!(vars.confidence, ConfidenceMode::RuleBasedFallback);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_store_times_out_into_fallback() {
    let engine = engine_over(HangingStore);
    let event = iso_event("EVT-201", ChangeKind::TagModification);

    let result = engine.analyze(&event, &AnalysisOptions::default()).await.unwrap();

    assert_eq!(result.confidence(), ConfidenceMode::RuleBasedFallback);
    assert!(result.metadata.degradation_reason.as_deref().unwrap().contains("timed out"));
    assert_eq!(result.affected.counts.isos, 1);
    assert_eq!(engine.pool().stats().timeouts, 1);
}

#[tokio::test]
async fn test_trial_cap_at_40_percent_reports_partial_simulation() {
    let engine = engine_over(iso_with_two_spools().store());
    let event = iso_event("EVT-300", ChangeKind::SpecChange);
    let utilization: PoolUtilization = [(FABRICATION_POOL.to_string(), 0.95)].into_iter().collect();
    let options = AnalysisOptions::new()
        .with_utilization(utilization)
        .with_budget(Arc::new(TrialCapBudget(400)));

    let result = engine.analyze(&event, &options).await.unwrap();

    assert_eq!(result.confidence(), ConfidenceMode::PartialSimulation);
    assert_eq!(result.metadata.simulation_coverage, "40%");
    assert_eq!(result.metadata.trials_completed, 400);
    assert!(result.timeline[&EntityId::from("SP-001")].delay_days >= 7);
    assert!(result.max_delay_days() > 0);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.code == code::RESOURCE_LEVELLING));
    assert!(result.metadata.extended_analysis_recommended);
}

#[tokio::test]
async fn test_low_coverage_forces_unknown() {
    let store = PartialCoverageStore::new(line_plant().store(), 2, Some(8));
    let engine = engine_over(store);
    let event = event("EVT-400", SourceKind::PId, SCENARIO_LINE, ChangeKind::GeometryChange);

    let result = engine.analyze(&event, &unbounded()).await.unwrap();

    assert_eq!(result.severity.level, SeverityLevel::Unknown);
    assert_eq!(result.severity.priority, None);
    assert!(result.metadata.coverage_insufficient);
    assert_eq!(result.metadata.coverage_ratio, Some(0.25));
    assert!(result.severity.rationale.contains("25%"));
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.code == code::DATA_RECONCILIATION));

    let vars = result.workflow_variables();
    assert_eq!(vars.impact_severity, "high");
    assert!(vars.requires_approval);
}

#[tokio::test]
async fn test_identical_calls_give_identical_results() {
    let engine = engine_over(line_plant().store());
    let event = event("EVT-500", SourceKind::PId, SCENARIO_LINE, ChangeKind::SpecChange);
    let utilization: PoolUtilization = [(FABRICATION_POOL.to_string(), 0.97)].into_iter().collect();
    let options = unbounded().with_utilization(utilization);

    let first = engine.analyze(&event, &options).await.unwrap();
    let mut second = engine.analyze(&event, &options).await.unwrap();
    second.analysis_timestamp = first.analysis_timestamp;
    second.metadata.analysis_duration_ms = first.metadata.analysis_duration_ms;

    assert_eq!(first.impact_id, second.impact_id);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_line_change_is_hop_limited_until_extended() {
    let engine = engine_over(line_plant().store());
    let event = event("EVT-600", SourceKind::PId, SCENARIO_LINE, ChangeKind::SpecChange);

    let shallow = engine.analyze(&event, &unbounded()).await.unwrap();
    assert_eq!(shallow.metadata.max_traversal_depth, 3);
    assert!(shallow.metadata.extended_analysis_recommended);
    assert_eq!(shallow.affected.counts.purchase_orders, 0);
    assert_eq!(shallow.affected.counts.isos, 2);
    assert_eq!(shallow.affected.counts.materials, 1);

    let deep = engine.analyze(&event, &unbounded().extended()).await.unwrap();
    assert_eq!(deep.metadata.max_traversal_depth, 5);
    assert!(!deep.metadata.extended_analysis_recommended);
    assert_eq!(deep.affected.counts.purchase_orders, 1);
    assert_eq!(deep.timeline[&EntityId::from("PO-9")].delay_days, 12);
    let procurement = deep
        .recommendations
        .iter()
        .find(|r| r.code == code::PROCUREMENT_NOTIFICATION)
        .unwrap();
    assert!((procurement.impact_reduction - 240.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_maturity_gap_adds_penalty() {
    let engine = engine_over(iso_with_two_spools().store());
    let event = iso_event("EVT-700", ChangeKind::MaturityMismatch).with_maturity(1, 4);

    let result = engine.analyze(&event, &unbounded()).await.unwrap();

    // 155 plus 25·3
    assert!((result.severity.score - 230.0).abs() < f64::EPSILON);
    assert!(result.recommendations.iter().any(|r| r.code == code::MATURITY_ALIGNMENT));
}

#[tokio::test]
async fn test_validation_errors_never_reach_the_store() {
    let store = Arc::new(CountingStore::new(iso_with_two_spools().store()));
    let engine = ImpactEngine::new(store.clone(), AnalysisConfig::default()).unwrap();

    let mut blank = iso_event("EVT-800", ChangeKind::SpecChange);
    blank.event_id = String::new();
    let err = engine.analyze(&blank, &unbounded()).await.unwrap_err();
    assert!(matches!(err, ImpactError::Validation(ValidationError::BlankEventId)));

    let too_deep = engine
        .analyze(&iso_event("EVT-801", ChangeKind::SpecChange), &unbounded().with_depth(9))
        .await
        .unwrap_err();
    assert!(too_deep.is_validation());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn test_analyze_all_keeps_input_order() {
    let engine = engine_over(iso_with_two_spools().store());
    let mut bad = iso_event("EVT-901", ChangeKind::SpecChange);
    bad.source_entity_id = EntityId::new(" ");
    let events = vec![
        iso_event("EVT-900", ChangeKind::SpecChange),
        bad,
        iso_event("EVT-902", ChangeKind::TagModification),
    ];

    let results = engine.analyze_all(&events, &unbounded()).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().event_id, "EVT-900");
    assert!(results[1].as_ref().unwrap_err().is_validation());
    assert_eq!(results[2].as_ref().unwrap().event_id, "EVT-902");
}

#[tokio::test]
async fn test_batch_over_line_collects_distinct_entities() {
    let engine = engine_over(line_plant().store());
    let request = BatchRequest::new(vec![SCENARIO_LINE.into(), "NO-SUCH-LINE".into()], vec![]);

    let batch = engine.batch(&request).await.unwrap();

    assert_eq!(batch.metrics.total_affected_lines, 1);
    assert_eq!(batch.metrics.total_affected_isos, 2);
    assert_eq!(batch.metrics.total_affected_spools, 2);
    assert_eq!(batch.metrics.total_affected_parts, 1);
    assert_eq!(batch.metrics.total_impact_count, 6);
    assert_eq!(batch.missing_roots, vec![EntityId::from("NO-SUCH-LINE")]);
    assert!(!batch.requires_approval);

    let sheet = &batch.affected_isos[&EntityId::from(SCENARIO_ISO)];
    assert_eq!(sheet.iso_number.as_deref(), Some("TS002-662-LPPL-2014"));
    assert_eq!(sheet.sheet_number.as_deref(), Some("SHT1"));

    let without_parts = engine.batch(&request.clone().without_parts()).await.unwrap();
    assert_eq!(without_parts.metrics.total_affected_parts, 0);
    assert_eq!(without_parts.metrics.total_impact_count, 5);
}

#[tokio::test]
async fn test_empty_batch_is_a_validation_error() {
    let engine = engine_over(line_plant().store());
    let err = engine.batch(&BatchRequest::new(vec![], vec![])).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_iso_batch_without_children_lists_the_roots() {
    let engine = engine_over(iso_with_two_spools().store());
    let request = BatchRequest::new(vec![], vec![SCENARIO_ISO.into()])
        .without_spools()
        .without_parts();

    let batch = engine.batch(&request).await.unwrap();

    assert_eq!(batch.metrics.total_affected_isos, 1);
    assert_eq!(batch.metrics.total_affected_spools, 0);
    assert_eq!(batch.metrics.total_impact_count, 1);
    assert_eq!(batch.severity, BatchSeverity::Medium);
    assert!(batch.affected_isos.contains_key(&EntityId::from(SCENARIO_ISO)));
}

#[tokio::test]
async fn test_batch_over_unreachable_store_reports_missing_roots() {
    let engine = engine_over(UnreachableStore);
    let request = BatchRequest::new(vec![SCENARIO_LINE.into()], vec![SCENARIO_ISO.into()]);

    let batch = engine.batch(&request).await.unwrap();

    assert_eq!(batch.metrics.total_impact_count, 0);
    assert_eq!(batch.severity, BatchSeverity::Low);
    assert!(batch.impact_hierarchy.is_empty());
    assert_eq!(
        batch.missing_roots,
        vec![EntityId::from(SCENARIO_LINE), EntityId::from(SCENARIO_ISO)]
    );
}

#[tokio::test]
async fn test_children_queries_and_health() {
    let engine = engine_over(line_plant().store());
    let hierarchy = engine
        .children_hierarchy(&EntityKind::Line, &SCENARIO_LINE.into(), Some(2))
        .await
        .unwrap();
    let json = serde_json::to_value(ChildrenHierarchy::new(&hierarchy)).unwrap();
    assert_eq!(json["entity_type"], "Line");
    assert_eq!(json["children"].as_array().unwrap().len(), 2);
    assert_eq!(json["total_descendants"], hierarchy.root.descendant_count);

    let down = engine_over(UnreachableStore);
    let status = down.children_status(&"SP-101".into(), None).await.unwrap();
    assert!(status.root.is_leaf());
    assert_eq!(status.root.kind, EntityKind::unknown());

    let health = down.health().await;
    assert!(!health.reachable);
    assert!(health.error.is_some());
    assert_eq!(health.store, "unreachable");
}
