use impact_graph::prelude::*;
use impact_graph::{SnapshotError, StoreError, TraversalPurpose};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const SNAPSHOT: &str = r#"{
    "nodes": [
        {"id": "L-1", "type": "Line"},
        {"id": "I-1", "type": "ISO"},
        {"id": "I-2", "type": "ISO"},
        {"id": "S-1", "type": "SPOOL", "properties": {"weld_count": 3}}
    ],
    "edges": [
        {"source": "L-1", "target": "I-1", "type": "HAS_ISO"},
        {"source": "L-1", "target": "I-2", "type": "HAS_ISO"},
        {"source": "I-1", "target": "S-1", "type": "FABRICATED_AS"}
    ]
}"#;

#[test]
fn test_snapshot_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SNAPSHOT.as_bytes()).unwrap();

    let snapshot = GraphSnapshot::load(file.path()).unwrap();
    let store = InMemoryGraphStore::from_snapshot(snapshot).unwrap();
    assert_eq!(store.node_count(), 4);
    assert_eq!(store.edge_count(), 3);
    assert_eq!(
        store.get(&"S-1".into()).and_then(|n| n.property_u32("weld_count")),
        Some(3)
    );
}

#[test]
fn test_missing_snapshot_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraphSnapshot::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SnapshotError::Io { .. }));
}

#[test]
fn test_malformed_snapshot_is_parse_error() {
    assert!(matches!(
        GraphSnapshot::from_json_str("{not json"),
        Err(SnapshotError::Parse(_))
    ));
}

#[tokio::test]
async fn test_traversal_output_is_sorted() {
    let store = InMemoryGraphStore::from_snapshot(GraphSnapshot::from_json_str(SNAPSHOT).unwrap()).unwrap();
    let request = TraversalPlanner::default()
        .plan_impact(&"L-1".into(), SourceKind::PId, None, false)
        .unwrap();
    let response = store.traverse(&request).await.unwrap();

    let ids: Vec<&str> = response.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["I-1", "I-2", "L-1", "S-1"]);
    assert_eq!(response.edges.len(), 3);
}

#[derive(Debug)]
struct SlowStore;

#[async_trait::async_trait]
impl GraphStore for SlowStore {
    async fn traverse(&self, _request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(TraversalResponse::default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_saturated_pool_queues_instead_of_failing() {
    let pool = GraphStorePool::new(
        Arc::new(SlowStore),
        PoolConfig {
            max_concurrent_queries: 1,
            ..PoolConfig::default()
        },
    );
    let request = TraversalRequest {
        roots: vec!["L-1".into()],
        allowed: Default::default(),
        max_hops: 1,
        purpose: TraversalPurpose::Impact,
    };

    let started = tokio::time::Instant::now();
    let results = spawn_all(&pool, &request, 3).await;
    assert!(results.iter().all(Result::is_ok));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(pool.stats().queries_started, 3);
    assert_eq!(pool.stats().available, 1);
}

async fn spawn_all(
    pool: &GraphStorePool,
    request: &TraversalRequest,
    n: usize,
) -> Vec<Result<TraversalResponse, StoreError>> {
    let mut handles = Vec::new();
    for _ in 0..n {
        let pool = pool.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move { pool.traverse(&request).await }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}
