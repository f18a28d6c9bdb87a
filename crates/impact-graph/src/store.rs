//! Graph store contract and pooled access
//!
//! The store is only ever read. [`GraphStorePool`] is the explicitly passed
//! handle every request goes through:
//! - a shared semaphore caps concurrent queries (saturation queues)
//! - every call is bounded by a timeout so connectivity loss fails fast

use crate::types::{TraversalRequest, TraversalResponse};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Graph store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// Call did not finish in time
    #[error("graph store {operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Timeout in force
        timeout_ms: u64,
    },

    /// Store answered with an error
    #[error("graph store query failed: {0}")]
    Query(String),

    /// Pool was shut down
    #[error("graph store pool closed")]
    PoolClosed,
}

impl StoreError {
    /// True when the store could not be reached at all
    #[inline]
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. } | Self::PoolClosed)
    }
}

/// Narrow read-only traversal interface of the graph store
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync + std::fmt::Debug {
    /// Traverse from the request roots along allowed relationships
    async fn traverse(&self, request: &TraversalRequest) -> Result<TraversalResponse, StoreError>;

    /// Cheap availability probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Store name for logs
    fn name(&self) -> &'static str {
        "graph-store"
    }
}

/// Pool settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Concurrent queries allowed across all requests
    pub max_concurrent_queries: usize,
    /// Traversal timeout in milliseconds
    pub query_timeout_ms: u64,
    /// Availability probe timeout in milliseconds
    pub probe_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: 16,
            query_timeout_ms: 5_000,
            probe_timeout_ms: 1_000,
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured concurrency limit
    pub capacity: usize,
    /// Permits currently free
    pub available: usize,
    /// Queries issued (traversals and probes)
    pub queries_started: u64,
    /// Queries that returned an error
    pub queries_failed: u64,
    /// Queries cut by the timeout
    pub timeouts: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    started: AtomicU64,
    failed: AtomicU64,
    timeouts: AtomicU64,
}

/// Scoped, shareable handle to the graph store
#[derive(Debug, Clone)]
pub struct GraphStorePool {
    store: Arc<dyn GraphStore>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
    counters: Arc<PoolCounters>,
}

impl GraphStorePool {
    /// Create pool over a store
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, config: PoolConfig) -> Self {
        let capacity = config.max_concurrent_queries.max(1);
        Self {
            store,
            permits: Arc::new(Semaphore::new(capacity)),
            config: PoolConfig {
                max_concurrent_queries: capacity,
                ..config
            },
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Pool settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Name of the underlying store
    #[inline]
    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Run a traversal under a permit and the query timeout
    ///
    /// # Errors
    /// Store errors, or [`StoreError::Timeout`] when the store hangs.
    pub async fn traverse(&self, request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        let timeout_ms = self.config.query_timeout_ms;
        let store = Arc::clone(&self.store);
        self.bounded("traverse", timeout_ms, async move { store.traverse(request).await })
            .await
    }

    /// Probe availability under a permit and the probe timeout
    ///
    /// # Errors
    /// Store errors, or [`StoreError::Timeout`] when the probe hangs.
    pub async fn probe(&self) -> Result<(), StoreError> {
        let timeout_ms = self.config.probe_timeout_ms;
        let store = Arc::clone(&self.store);
        self.bounded("ping", timeout_ms, async move { store.ping().await })
            .await
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.config.max_concurrent_queries,
            available: self.permits.available_permits(),
            queries_started: self.counters.started.load(Ordering::Relaxed),
            queries_failed: self.counters.failed.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Stop handing out permits; queued and future calls fail
    pub fn close(&self) {
        self.permits.close();
    }

    async fn bounded<T, F>(&self, operation: &'static str, timeout_ms: u64, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        // Permit is released when it drops, on every return path.
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(store = self.store.name(), operation, error = %e, "graph store call failed");
                Err(e)
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(store = self.store.name(), operation, timeout_ms, "graph store call timed out");
                Err(StoreError::Timeout {
                    operation,
                    timeout_ms,
                })
            }
        }
    }
}
