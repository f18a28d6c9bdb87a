use impact_core::{AnalysisConfig, ChangeKind, ConfidenceMode, ConfigError, FallbackProfile};
use impact_test_utils::{engine_with, iso_event, UnreachableStore};
use pretty_assertions::assert_eq;
use std::io::Write;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_overrides_from_file() {
    let file = write_config(
        r#"
        [planner]
        impact_max_hops = 4
        extended_max_hops = 6

        [store]
        max_concurrent_queries = 4

        [simulation]
        trials = 200
        budget_ms = 5000

        [simulation.pool_capacities]
        fabrication = 2

        [scoring]
        min_coverage = 0.6
        "#,
    );

    let config = AnalysisConfig::load(file.path()).unwrap();

    assert_eq!(config.planner.impact_max_hops, 4);
    assert_eq!(config.planner.tree_max_hops, 5);
    assert_eq!(config.store.max_concurrent_queries, 4);
    assert_eq!(config.simulation.trials, 200);
    assert_eq!(config.simulation.capacity("fabrication"), 2);
    assert!((config.scoring.min_coverage - 0.6).abs() < f64::EPSILON);
    assert!((config.scoring.significance_share - 0.15).abs() < f64::EPSILON);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let file = write_config("[simulation\ntrials = 3");
    let err = AnalysisConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config("[simulation]\nchunk_size = 0\n");
    assert!(matches!(
        AnalysisConfig::load(file.path()).unwrap_err(),
        ConfigError::Invalid(_)
    ));

    let file = write_config("[scoring.weights]\nspool = -1.0\n");
    assert!(matches!(
        AnalysisConfig::load(file.path()).unwrap_err(),
        ConfigError::Invalid(_)
    ));
}

#[tokio::test]
async fn test_fallback_table_is_policy() {
    let file = write_config(
        r"
        [fallback.geometry_change]
        isos = 7
        spools = 1
        welds_per_spool = 1
        delay_days = 1
        ",
    );
    let config = AnalysisConfig::load(file.path()).unwrap();
    assert_eq!(config.fallback.geometry_change, FallbackProfile::new(7, 1, 1, 1));

    let engine = engine_with(UnreachableStore, config);
    let result = engine
        .analyze(&iso_event("EVT-CFG", ChangeKind::GeometryChange), &Default::default())
        .await
        .unwrap();
    assert_eq!(result.confidence(), ConfidenceMode::RuleBasedFallback);
    assert_eq!(result.affected.counts.isos, 7);
}
