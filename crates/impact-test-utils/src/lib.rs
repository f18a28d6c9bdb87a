//! Testing utilities for the rework impact workspace
//!
//! Snapshot builders, fault-injecting graph stores and sample events.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use impact_core::{AnalysisConfig, ChangeEvent, ChangeKind, ImpactEngine};
use impact_graph::{
    EntityId, EntityKind, GraphNode, GraphSnapshot, GraphStore, InMemoryGraphStore, RelationshipKind,
    SourceKind, StoreError, TraversalEdge, TraversalRequest, TraversalResponse,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SCENARIO_ISO: &str = "TS002-662-LPPL-2014.SHT1";
pub const SCENARIO_LINE: &str = "662-LPPL-2014";

#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: GraphSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(self, id: &str, kind: EntityKind) -> Self {
        self.with(GraphNode::new(id, kind))
    }

    pub fn spool(self, id: &str, status: &str, welds: u32) -> Self {
        self.with(
            GraphNode::new(id, EntityKind::Spool)
                .with_status(status)
                .with_property("weld_count", welds),
        )
    }

    pub fn with(mut self, node: GraphNode) -> Self {
        self.snapshot.nodes.push(node);
        self
    }

    pub fn edge(mut self, source: &str, target: &str, kind: RelationshipKind) -> Self {
        self.snapshot.edges.push(TraversalEdge::new(source, target, kind));
        self
    }

    pub fn build(self) -> GraphSnapshot {
        self.snapshot
    }

    pub fn store(self) -> InMemoryGraphStore {
        InMemoryGraphStore::from_snapshot(self.snapshot).unwrap()
    }
}

/// ISO with one fabricated spool (3 welds) and one in-progress spool (0 welds)
pub fn iso_with_two_spools() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .node(SCENARIO_ISO, EntityKind::Iso)
        .spool("SP-001", "fabricated", 3)
        .spool("SP-002", "in_progress", 0)
        .edge(SCENARIO_ISO, "SP-001", RelationshipKind::FabricatedAs)
        .edge(SCENARIO_ISO, "SP-002", RelationshipKind::FabricatedAs)
}

/// Line with two ISO sheets, shared parts and a procurement chain
pub fn line_plant() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .node(SCENARIO_LINE, EntityKind::Line)
        .node("TS002-662-LPPL-2014.SHT1", EntityKind::Iso)
        .node("TS002-662-LPPL-2014.SHT2", EntityKind::Iso)
        .spool("SP-101", "fabricated", 4)
        .spool("SP-102", "planned", 2)
        .node("PT-1", EntityKind::Part)
        .node("MAT-1", EntityKind::Material)
        .with(GraphNode::new("PO-9", EntityKind::PurchaseOrder).with_property("lead_time_days", 12))
        .edge(SCENARIO_LINE, "TS002-662-LPPL-2014.SHT1", RelationshipKind::HasIso)
        .edge(SCENARIO_LINE, "TS002-662-LPPL-2014.SHT2", RelationshipKind::HasIso)
        .edge("TS002-662-LPPL-2014.SHT1", "SP-101", RelationshipKind::FabricatedAs)
        .edge("TS002-662-LPPL-2014.SHT2", "SP-102", RelationshipKind::FabricatedAs)
        .edge("TS002-662-LPPL-2014.SHT1", "PT-1", RelationshipKind::HasPart)
        .edge("SP-101", "PT-1", RelationshipKind::Groups)
        .edge("PT-1", "MAT-1", RelationshipKind::RequiresMaterial)
        .edge("MAT-1", "PO-9", RelationshipKind::OrderedOn)
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
}

pub fn event(event_id: &str, source_kind: SourceKind, entity: &str, kind: ChangeKind) -> ChangeEvent {
    ChangeEvent::new(event_id, source_kind, entity, kind, timestamp())
}

pub fn iso_event(event_id: &str, kind: ChangeKind) -> ChangeEvent {
    event(event_id, SourceKind::Iso, SCENARIO_ISO, kind)
}

pub fn engine_over(store: impl GraphStore + 'static) -> ImpactEngine {
    ImpactEngine::new(Arc::new(store), AnalysisConfig::default()).unwrap()
}

pub fn engine_with(store: impl GraphStore + 'static, config: AnalysisConfig) -> ImpactEngine {
    ImpactEngine::new(Arc::new(store), config).unwrap()
}

/// Refuses every connection
#[derive(Debug, Default)]
pub struct UnreachableStore;

#[async_trait]
impl GraphStore for UnreachableStore {
    async fn traverse(&self, _request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

/// Answers probes but never finishes a traversal
#[derive(Debug, Default)]
pub struct HangingStore;

#[async_trait]
impl GraphStore for HangingStore {
    async fn traverse(&self, _request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// Returns only the first `keep` edges and reports the expected count
#[derive(Debug)]
pub struct PartialCoverageStore {
    inner: InMemoryGraphStore,
    keep: usize,
    expected: Option<usize>,
}

impl PartialCoverageStore {
    pub fn new(inner: InMemoryGraphStore, keep: usize, expected: Option<usize>) -> Self {
        Self { inner, keep, expected }
    }
}

#[async_trait]
impl GraphStore for PartialCoverageStore {
    async fn traverse(&self, request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        let mut response = self.inner.traverse(request).await?;
        response.edges.truncate(self.keep);
        let kept: BTreeSet<EntityId> = request
            .roots
            .iter()
            .chain(response.edges.iter().map(|e| &e.target))
            .cloned()
            .collect();
        response.nodes.retain(|n| kept.contains(&n.id));
        response.coverage_complete = false;
        response.expected_edge_count = self.expected;
        Ok(response)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "partial"
    }
}

/// Counts traversals, delegating to an in-memory store
#[derive(Debug)]
pub struct CountingStore {
    inner: InMemoryGraphStore,
    pub traversals: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryGraphStore) -> Self {
        Self {
            inner,
            traversals: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.traversals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for CountingStore {
    async fn traverse(&self, request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        self.traversals.fetch_add(1, Ordering::SeqCst);
        self.inner.traverse(request).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
