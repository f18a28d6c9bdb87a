//! Impact Core - change-impact resolution
//!
//! Turns a [`ChangeEvent`] into an explainable [`ImpactResult`]:
//! - Bounded traversal of the dependency graph ([`impact_graph`])
//! - Rework schedule simulation ([`impact_sim`])
//! - Weighted multi-factor severity with a factor breakdown
//! - Degradation to partial simulation or rule-based estimates
//! - Advisory recommendations and workflow decision variables
//!
//! Only validation failures abort a request. Store and simulation failures
//! lower the confidence mode stamped on the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use impact_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryGraphStore::from_snapshot(GraphSnapshot::load("graph.json")?)?;
//! let engine = ImpactEngine::new(Arc::new(store), AnalysisConfig::default())?;
//!
//! let event = ChangeEvent::from_json_str(&std::fs::read_to_string("event.json")?)?;
//! let result = engine.analyze(&event, &AnalysisOptions::default()).await?;
//!
//! println!("{} ({})", result.severity.rationale, result.confidence());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod config;
pub mod degradation;
pub mod engine;
pub mod error;
pub mod event;
pub mod recommend;
pub mod result;
pub mod scoring;

// Re-exports for convenience
pub use batch::{BatchImpact, BatchMetrics, BatchRequest, BatchSeverity, EntitySummary, ImpactHierarchyNode};
pub use config::AnalysisConfig;
pub use degradation::{ConfidenceMode, Coverage, DegradationController, FallbackProfile, FallbackTable, Resolution};
pub use engine::{AnalysisOptions, HealthReport, ImpactEngine};
pub use error::{ConfigError, ImpactError, ValidationError};
pub use event::{ChangeEvent, ChangeKind, ChangedAttribute, MAX_MATURITY};
pub use recommend::{Recommendation, RecommendationConfig, RecommendationEngine};
pub use result::{
    impact_id_for, requires_approval, AffectedCounts, AffectedEntities, AnalysisMetadata, ImpactResult,
    Outcome, WorkflowVariables,
};
pub use scoring::{
    Priority, ScoringConfig, ScoringInputs, SeverityAssessment, SeverityFactor, SeverityLevel, SeverityScorer,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running impact analysis
    pub use crate::{
        AnalysisConfig, AnalysisOptions, BatchRequest, ChangeEvent, ChangeKind, ConfidenceMode, ImpactEngine,
        ImpactError, ImpactResult, SeverityLevel,
    };
    pub use impact_graph::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use impact_graph::{GraphSnapshot, InMemoryGraphStore, SourceKind};
    use impact_sim::Unbounded;
    use std::sync::Arc;

    fn engine() -> ImpactEngine {
        let snapshot = GraphSnapshot::from_json_str(
            r#"{
                "nodes": [
                    {"id": "L-1", "type": "Line"},
                    {"id": "I-1.SHT1", "type": "ISO"},
                    {"id": "S-1", "type": "SPOOL", "properties": {"weld_count": 4}},
                    {"id": "P-1", "type": "Part"}
                ],
                "edges": [
                    {"source": "L-1", "target": "I-1.SHT1", "type": "HAS_ISO"},
                    {"source": "I-1.SHT1", "target": "S-1", "type": "FABRICATED_AS"},
                    {"source": "S-1", "target": "P-1", "type": "GROUPS"}
                ]
            }"#,
        )
        .unwrap();
        let store = InMemoryGraphStore::from_snapshot(snapshot).unwrap();
        ImpactEngine::new(Arc::new(store), AnalysisConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn line_change_flows_to_workflow_variables() {
        let event = ChangeEvent::new(
            "EVT-L1",
            SourceKind::PId,
            "L-1",
            ChangeKind::SpecChange,
            Utc.with_ymd_and_hms(2025, 2, 3, 8, 0, 0).unwrap(),
        );
        let options = AnalysisOptions::new().with_budget(Arc::new(Unbounded));
        let result = engine().analyze(&event, &options).await.unwrap();

        // I + S + P below the line; spool rework 8 days, ISO revision 5
        assert_eq!(result.affected.counts.total(), 3);
        assert_eq!(result.max_delay_days(), 8);
        // 10·1 + 5·4 + 20·8
        assert!((result.severity.score - 190.0).abs() < f64::EPSILON);

        let vars = result.workflow_variables();
        assert_eq!(vars.outcome, Outcome::Impact);
        assert_eq!(vars.impact_severity, "critical");
        assert!(vars.requires_approval);
        assert_eq!(vars.total_impact_count, 3);
        assert_eq!(vars.estimated_delay_days, 8);
        assert_eq!(vars.confidence, ConfidenceMode::Full);
    }

    #[tokio::test]
    async fn batch_and_children_share_the_store() {
        let engine = engine();
        let batch = engine
            .batch(&BatchRequest::new(vec!["L-1".into(), "L-404".into()], vec![]))
            .await
            .unwrap();
        assert_eq!(batch.metrics.total_impact_count, 4);
        assert_eq!(batch.impact_hierarchy[0].impact_count, 4);
        assert_eq!(batch.severity, BatchSeverity::Medium);

        let tree = engine.children_status(&"I-1.SHT1".into(), Some(2)).await.unwrap();
        assert_eq!(tree.root.descendant_count, 2);
        assert_eq!(engine.pool().stats().queries_started, 2);
    }
}
