//! Impact engine
//!
//! Entry points for every use case. The engine owns no per-request state;
//! one instance can serve any number of concurrent requests.
//!
//! # Workflow of [`ImpactEngine::analyze`]
//! 1. Validate the event and plan the traversal (only these can fail)
//! 2. Resolve dependency data once: measured or rule-based fallback
//! 3. Simulate rework on measured data (may downgrade to partial)
//! 4. Score, recommend and assemble the result

use crate::batch::{BatchImpact, BatchRequest};
use crate::config::AnalysisConfig;
use crate::degradation::{ConfidenceMode, Coverage, DegradationController, FallbackProfile, Resolution};
use crate::error::ImpactError;
use crate::event::ChangeEvent;
use crate::recommend::{RecommendationEngine, RecommendationInputs};
use crate::result::{impact_id_for, AffectedEntities, AnalysisMetadata, ImpactResult};
use crate::scoring::{ScoringInputs, SeverityScorer};
use chrono::NaiveDate;
use futures::future::join_all;
use impact_graph::{
    AssembledTree, EntityId, EntityKind, GraphStore, GraphStorePool, PoolStats, TraversalResponse,
    TraversalPlanner, TreeAssembler, TreeNode,
};
use impact_sim::{
    default_pool, seed_for, PoolUtilization, SimulationReport, SimulationTask, TimelineImpact,
    TimelineSimulator, TrialBudget, TrialCapBudget, WallClockBudget,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Hop limit below the ceiling; `None` uses the ceiling
    pub requested_depth: Option<u32>,
    /// Allow the extended hop ceiling
    pub extended: bool,
    /// Current utilization per resource pool
    pub utilization: PoolUtilization,
    /// Simulation stop condition; `None` uses the configured wall clock
    pub budget: Option<Arc<dyn TrialBudget>>,
    /// Seed override; `None` derives the seed from the event id
    pub seed: Option<u64>,
}

impl AnalysisOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a requested depth
    #[inline]
    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.requested_depth = Some(depth);
        self
    }

    /// With extended analysis
    #[inline]
    #[must_use]
    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// With pool utilization
    #[inline]
    #[must_use]
    pub fn with_utilization(mut self, utilization: PoolUtilization) -> Self {
        self.utilization = utilization;
        self
    }

    /// With a simulation budget
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: Arc<dyn TrialBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// With a fixed seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Store reachability and pool saturation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Store name
    pub store: String,
    /// Probe succeeded
    pub reachable: bool,
    /// Probe error, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pool statistics
    pub pool: PoolStats,
}

/// What stage 2 and 3 found, whichever way the data was resolved
struct Findings {
    mode: ConfidenceMode,
    tree: TreeNode,
    affected: AffectedEntities,
    timeline: BTreeMap<EntityId, TimelineImpact>,
    conflicted_pools: usize,
    coverage: Option<Coverage>,
    trials_completed: usize,
    simulation_coverage: String,
    source_found: bool,
    tree_truncated: bool,
    hop_limited: bool,
    degradation_reason: Option<String>,
}

/// Change-impact engine
#[derive(Debug, Clone)]
pub struct ImpactEngine {
    config: AnalysisConfig,
    pool: GraphStorePool,
    planner: TraversalPlanner,
    assembler: TreeAssembler,
    controller: DegradationController,
    simulator: TimelineSimulator,
    scorer: SeverityScorer,
    recommender: RecommendationEngine,
}

impl ImpactEngine {
    /// Create engine over a store
    ///
    /// # Errors
    /// [`ImpactError::Config`] when the config does not validate.
    pub fn new(store: Arc<dyn GraphStore>, config: AnalysisConfig) -> Result<Self, ImpactError> {
        let pool = GraphStorePool::new(store, config.store);
        Self::with_pool(pool, config)
    }

    /// Create engine over an existing pool handle
    ///
    /// # Errors
    /// [`ImpactError::Config`] when the config does not validate.
    pub fn with_pool(pool: GraphStorePool, config: AnalysisConfig) -> Result<Self, ImpactError> {
        config.validate()?;
        let assembler = TreeAssembler::new(config.tree);
        Ok(Self {
            planner: TraversalPlanner::new(config.planner),
            controller: DegradationController::new(pool.clone(), assembler.clone(), config.fallback),
            simulator: TimelineSimulator::new(config.simulation.clone())?,
            scorer: SeverityScorer::new(config.scoring),
            recommender: RecommendationEngine::new(config.recommendations),
            assembler,
            pool,
            config,
        })
    }

    /// Configuration in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Pool handle shared by every request
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &GraphStorePool {
        &self.pool
    }

    /// Analyze one change event
    ///
    /// # Errors
    /// Only [`ImpactError::Validation`]; every other failure degrades.
    #[tracing::instrument(skip_all, fields(event_id = %event.event_id, change_kind = %event.change_kind))]
    pub async fn analyze(&self, event: &ChangeEvent, options: &AnalysisOptions) -> Result<ImpactResult, ImpactError> {
        let started = Instant::now();
        event.validate()?;
        let request =
            self.planner
                .plan_impact(&event.source_entity_id, event.source_kind, options.requested_depth, options.extended)?;
        let max_hops = request.max_hops;

        let findings = match self.controller.resolve(event, request).await {
            Resolution::Measured {
                response,
                tree,
                coverage,
                ..
            } => self.measured(event, options, &response, tree, coverage).await,
            Resolution::Fallback { reason, profile } => {
                self.fallback(event, options, &profile, reason.to_string())
            }
        };

        let maturity_gap = event.maturity_gap();
        let coverage_ratio = findings.coverage.map(|c| c.ratio);
        let counts = findings.affected.counts;
        let max_delay = findings.timeline.values().map(|t| t.delay_days).max().unwrap_or(0);
        let assessment = self.scorer.assess(&ScoringInputs {
            affected_spools: counts.spools,
            affected_welds: counts.welds,
            affected_purchase_orders: counts.purchase_orders,
            max_delay_days: max_delay,
            maturity_gap,
            conflicted_pools: findings.conflicted_pools,
            coverage: coverage_ratio,
        });

        let extended_analysis_recommended =
            findings.hop_limited || findings.tree_truncated || findings.mode != ConfidenceMode::Full;
        let max_purchase_order_delay = findings
            .timeline
            .iter()
            .filter(|(id, _)| {
                findings
                    .affected
                    .entities
                    .get(EntityKind::PurchaseOrder.label())
                    .is_some_and(|pos| pos.contains(*id))
            })
            .map(|(_, t)| t.delay_days)
            .max()
            .unwrap_or(0);
        let recommendations = self.recommender.recommend(&RecommendationInputs {
            assessment: &assessment,
            purchase_orders: counts.purchase_orders,
            max_purchase_order_delay,
            extended_analysis_recommended,
        });

        let metadata = AnalysisMetadata {
            simulation_confidence: findings.mode,
            simulation_coverage: findings.simulation_coverage,
            trials_completed: findings.trials_completed,
            trials_requested: self.config.simulation.trials,
            coverage_ratio,
            coverage_insufficient: assessment.coverage_insufficient,
            extended_analysis_recommended,
            max_traversal_depth: max_hops,
            depth_reached: findings.tree.max_depth(),
            source_found: findings.source_found,
            tree_truncated: findings.tree_truncated,
            estimated_counts: findings.mode == ConfidenceMode::RuleBasedFallback,
            degradation_reason: findings.degradation_reason,
            analysis_duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        metrics::counter!("impact_analysis_total", "confidence" => findings.mode.as_str()).increment(1);
        tracing::info!(
            confidence = %findings.mode,
            severity = %assessment.level,
            score = assessment.score,
            affected = counts.total(),
            duration_ms = metadata.analysis_duration_ms,
            "impact analysis complete"
        );

        Ok(ImpactResult {
            impact_id: impact_id_for(&event.event_id),
            event_id: event.event_id.clone(),
            source_entity_id: event.source_entity_id.clone(),
            change_kind: event.change_kind,
            analysis_timestamp: chrono::Utc::now(),
            severity: assessment,
            affected: findings.affected,
            tree: findings.tree,
            timeline: findings.timeline,
            recommendations,
            metadata,
        })
    }

    /// Analyze several events concurrently; results keep input order
    pub async fn analyze_all(
        &self,
        events: &[ChangeEvent],
        options: &AnalysisOptions,
    ) -> Vec<Result<ImpactResult, ImpactError>> {
        join_all(events.iter().map(|event| self.analyze(event, options))).await
    }

    /// Run only the simulation for an event's measured dependencies
    ///
    /// # Errors
    /// Validation failures, store failures and simulation aborts.
    #[tracing::instrument(skip_all, fields(event_id = %event.event_id))]
    pub async fn simulate(&self, event: &ChangeEvent, options: &AnalysisOptions) -> Result<SimulationReport, ImpactError> {
        event.validate()?;
        let request =
            self.planner
                .plan_impact(&event.source_entity_id, event.source_kind, options.requested_depth, options.extended)?;
        let response = self.pool.traverse(&request).await?;
        let tree = self.assembler.assemble_root(
            &event.source_entity_id,
            Some(&event.source_kind.root_kind()),
            &request,
            &response,
        );
        let tasks = tasks_for(&tree.root, &response, event.baseline_date());
        let report = self
            .simulator
            .simulate(tasks, options.utilization.clone(), self.seed(event, options), self.budget(options))
            .await?;
        Ok(report)
    }

    /// Batch analysis over lines and ISOs
    ///
    /// A store failure is logged and every root is reported as missing.
    ///
    /// # Errors
    /// Empty or invalid request.
    #[tracing::instrument(skip_all, fields(lines = request.line_ids.len(), isos = request.iso_ids.len()))]
    pub async fn batch(&self, request: &BatchRequest) -> Result<BatchImpact, ImpactError> {
        request.validate()?;
        let plan = self.planner.plan_batch(
            &request.line_ids,
            &request.iso_ids,
            request.include_spools,
            request.include_parts,
        )?;
        let response = match self.pool.traverse(&plan).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, roots = plan.roots.len(), "batch traversal failed");
                TraversalResponse::default()
            }
        };
        let trees = self.assembler.assemble(&plan, &response);
        let impact = BatchImpact::from_trees(&trees, &response);
        tracing::info!(
            total = impact.metrics.total_impact_count,
            severity = impact.severity.as_str(),
            missing = impact.missing_roots.len(),
            "batch analysis complete"
        );
        Ok(impact)
    }

    /// Detailed children tree of any entity
    ///
    /// A store failure yields an empty tree of kind Unknown.
    ///
    /// # Errors
    /// Blank id or depth outside the tree ceiling.
    #[tracing::instrument(skip(self))]
    pub async fn children_status(&self, id: &EntityId, depth: Option<u32>) -> Result<AssembledTree, ImpactError> {
        let request = self.planner.plan_tree(id, None, depth)?;
        match self.pool.traverse(&request).await {
            Ok(response) => Ok(self.assembler.assemble_root(id, None, &request, &response)),
            Err(e) => {
                tracing::error!(error = %e, "children status query failed");
                Ok(AssembledTree {
                    root: TreeNode::leaf(id.clone(), EntityKind::unknown(), None, 0),
                    found: false,
                    truncated: false,
                    hop_limited: false,
                    node_count: 1,
                })
            }
        }
    }

    /// Minimal children hierarchy of an entity of known kind
    ///
    /// # Errors
    /// Blank id, depth outside the tree ceiling, or a store failure.
    #[tracing::instrument(skip(self))]
    pub async fn children_hierarchy(
        &self,
        kind: &EntityKind,
        id: &EntityId,
        depth: Option<u32>,
    ) -> Result<AssembledTree, ImpactError> {
        let request = self.planner.plan_tree(id, Some(kind), depth)?;
        let response = self.pool.traverse(&request).await?;
        Ok(self.assembler.assemble_root(id, Some(kind), &request, &response))
    }

    /// Store reachability and pool saturation
    pub async fn health(&self) -> HealthReport {
        let probe = self.pool.probe().await;
        if let Err(e) = &probe {
            tracing::warn!(error = %e, "graph store health probe failed");
        }
        HealthReport {
            store: self.pool.store_name().to_string(),
            reachable: probe.is_ok(),
            error: probe.err().map(|e| e.to_string()),
            pool: self.pool.stats(),
        }
    }

    async fn measured(
        &self,
        event: &ChangeEvent,
        options: &AnalysisOptions,
        response: &TraversalResponse,
        tree: AssembledTree,
        coverage: Coverage,
    ) -> Findings {
        let affected = AffectedEntities::from_tree(&tree.root, response);
        let tasks = tasks_for(&tree.root, response, event.baseline_date());
        let seed = self.seed(event, options);

        let mut degradation_reason = None;
        let report = match self
            .simulator
            .simulate(tasks.clone(), options.utilization.clone(), seed, self.budget(options))
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "simulation aborted, reporting estimate");
                degradation_reason = Some(e.to_string());
                self.simulator.run(&tasks, &options.utilization, seed, &TrialCapBudget(0))
            }
        };
        let mode = ConfidenceMode::after_simulation(&report);
        if mode == ConfidenceMode::PartialSimulation && degradation_reason.is_none() {
            degradation_reason = Some(format!(
                "simulation budget exhausted after {} of {} trials",
                report.trials_completed, report.trials_requested
            ));
        }

        Findings {
            mode,
            affected,
            conflicted_pools: report.conflicted_pools.len(),
            coverage: Some(coverage),
            trials_completed: report.trials_completed,
            simulation_coverage: report.coverage_label(),
            source_found: tree.found,
            tree_truncated: tree.truncated,
            hop_limited: tree.hop_limited,
            tree: tree.root,
            timeline: report.timeline,
            degradation_reason,
        }
    }

    fn fallback(
        &self,
        event: &ChangeEvent,
        options: &AnalysisOptions,
        profile: &FallbackProfile,
        reason: String,
    ) -> Findings {
        let root_kind = event.source_kind.root_kind();
        let pool = default_pool(&root_kind).map(str::to_string);
        let impact = TimelineImpact::from_delay(event.baseline_date(), profile.delay_days).with_pool(pool);
        let timeline = BTreeMap::from([(event.source_entity_id.clone(), impact)]);

        let threshold = self.config.simulation.utilization_threshold;
        let touched = [
            (profile.isos > 0).then_some(impact_sim::ENGINEERING_POOL),
            (profile.spools > 0).then_some(impact_sim::FABRICATION_POOL),
        ];
        let conflicted_pools = touched
            .into_iter()
            .flatten()
            .filter(|p| options.utilization.get(*p).is_some_and(|&u| u > threshold))
            .count();

        Findings {
            mode: ConfidenceMode::RuleBasedFallback,
            tree: TreeNode::leaf(event.source_entity_id.clone(), root_kind, None, 0),
            affected: AffectedEntities::from_profile(profile),
            timeline,
            conflicted_pools,
            coverage: None,
            trials_completed: 0,
            simulation_coverage: "0%".to_string(),
            source_found: false,
            tree_truncated: false,
            hop_limited: false,
            degradation_reason: Some(reason),
        }
    }

    fn seed(&self, event: &ChangeEvent, options: &AnalysisOptions) -> u64 {
        options.seed.unwrap_or_else(|| seed_for(&event.event_id))
    }

    fn budget(&self, options: &AnalysisOptions) -> Arc<dyn TrialBudget> {
        options
            .budget
            .clone()
            .unwrap_or_else(|| Arc::new(WallClockBudget::starting_now(self.config.simulation.budget())))
    }
}

/// One rework task per distinct affected entity known to the store
fn tasks_for(root: &TreeNode, response: &TraversalResponse, baseline: NaiveDate) -> Vec<SimulationTask> {
    let index = response.node_index();
    let mut seen = BTreeSet::new();
    root.descendants()
        .filter(|node| seen.insert(&node.id))
        .filter_map(|node| index.get(&node.id).map(|n| SimulationTask::from_node(n, baseline)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use chrono::{TimeZone, Utc};
    use impact_graph::{GraphNode, InMemoryGraphStore, RelationshipKind, SourceKind, TraversalEdge};
    use impact_sim::Unbounded;

    fn engine() -> ImpactEngine {
        let store = InMemoryGraphStore::new();
        store.upsert_node(GraphNode::new("I-1", EntityKind::Iso));
        store.upsert_node(GraphNode::new("S-1", EntityKind::Spool).with_property("weld_count", 2));
        store
            .add_edge(TraversalEdge::new("I-1", "S-1", RelationshipKind::FabricatedAs))
            .unwrap();
        ImpactEngine::new(Arc::new(store), AnalysisConfig::default()).unwrap()
    }

    fn event() -> ChangeEvent {
        ChangeEvent::new(
            "EVT-1",
            SourceKind::Iso,
            "I-1",
            ChangeKind::GeometryChange,
            Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn measured_timeline_excludes_the_changed_entity() {
        let options = AnalysisOptions::new().with_budget(Arc::new(Unbounded));
        let result = engine().analyze(&event(), &options).await.unwrap();
        assert_eq!(result.confidence(), ConfidenceMode::Full);
        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.timeline[&EntityId::from("S-1")].delay_days, 4);
        assert_eq!(result.affected.counts.welds, 2);
    }

    #[tokio::test]
    async fn depth_over_ceiling_is_rejected() {
        let options = AnalysisOptions::new().with_depth(4);
        let err = engine().analyze(&event(), &options).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn extended_raises_the_ceiling() {
        let options = AnalysisOptions::new()
            .with_depth(5)
            .extended()
            .with_budget(Arc::new(TrialCapBudget(10)));
        let result = engine().analyze(&event(), &options).await.unwrap();
        assert_eq!(result.metadata.max_traversal_depth, 5);
        assert_eq!(result.confidence(), ConfidenceMode::PartialSimulation);
    }

    #[tokio::test]
    async fn health_reports_store() {
        let health = engine().health().await;
        assert!(health.reachable);
        assert_eq!(health.store, "in-memory");
        assert_eq!(health.pool.queries_started, 1);
    }
}
