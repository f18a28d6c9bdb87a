//! In-memory graph store
//!
//! Serves traversals from a loaded [`GraphSnapshot`]. Used by the CLI and
//! by tests; production deployments put a database-backed store behind the
//! same [`GraphStore`] trait.

use crate::store::{GraphStore, StoreError};
use crate::types::{EntityId, GraphNode, TraversalEdge, TraversalRequest, TraversalResponse};
use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

/// Snapshot loading errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// File could not be read
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        /// Snapshot path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON did not parse
    #[error("invalid snapshot json: {0}")]
    Parse(#[from] serde_json::Error),

    /// Edge references a node the snapshot does not contain
    #[error("edge {source_id} -> {target_id} references an unknown node")]
    DanglingEdge {
        /// Edge source
        source_id: EntityId,
        /// Edge target
        target_id: EntityId,
    },
}

/// Serializable graph contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<TraversalEdge>,
}

impl GraphSnapshot {
    /// Parse from JSON text
    ///
    /// # Errors
    /// Returns [`SnapshotError::Parse`] on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// I/O or parse failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Default)]
struct SnapshotGraph {
    graph: StableDiGraph<GraphNode, crate::types::RelationshipKind>,
    index: HashMap<EntityId, NodeIndex>,
}

/// Graph store backed by a petgraph in memory
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<SnapshotGraph>,
}

impl InMemoryGraphStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot
    ///
    /// # Errors
    /// [`SnapshotError::DanglingEdge`] when an edge names a missing node.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, SnapshotError> {
        let store = Self::new();
        for node in snapshot.nodes {
            store.upsert_node(node);
        }
        for edge in snapshot.edges {
            store.add_edge(edge)?;
        }
        Ok(store)
    }

    /// Insert a node or replace the one with the same id
    pub fn upsert_node(&self, node: GraphNode) {
        let mut inner = self.inner.write();
        let existing = inner.index.get(&node.id).copied();
        if let Some(ix) = existing {
            inner.graph[ix] = node;
        } else {
            let id = node.id.clone();
            let ix = inner.graph.add_node(node);
            inner.index.insert(id, ix);
        }
    }

    /// Add an edge between two existing nodes; duplicates are ignored
    ///
    /// # Errors
    /// [`SnapshotError::DanglingEdge`] when either end is missing.
    pub fn add_edge(&self, edge: TraversalEdge) -> Result<(), SnapshotError> {
        let mut inner = self.inner.write();
        let from = inner.index.get(&edge.source).copied();
        let to = inner.index.get(&edge.target).copied();
        let (Some(from), Some(to)) = (from, to) else {
            return Err(SnapshotError::DanglingEdge {
                source_id: edge.source,
                target_id: edge.target,
            });
        };
        let exists = inner
            .graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && e.weight() == &edge.kind);
        if !exists {
            inner.graph.add_edge(from, to, edge.kind);
        }
        Ok(())
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<GraphNode> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&ix| inner.graph[ix].clone())
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }

    /// Copy the current contents out as a snapshot
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let inner = self.inner.read();
        let mut nodes: Vec<GraphNode> = inner.graph.node_weights().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<TraversalEdge> = inner
            .graph
            .edge_references()
            .map(|e| {
                TraversalEdge::new(
                    inner.graph[e.source()].id.clone(),
                    inner.graph[e.target()].id.clone(),
                    e.weight().clone(),
                )
            })
            .collect();
        edges.sort();
        GraphSnapshot { nodes, edges }
    }

    fn run_traversal(&self, request: &TraversalRequest) -> TraversalResponse {
        let inner = self.inner.read();
        let graph = &inner.graph;

        let mut reached: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut edges: BTreeSet<TraversalEdge> = BTreeSet::new();
        let mut expanded: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::new();
        let mut truncated = false;

        for root in &request.roots {
            if let Some(&ix) = inner.index.get(root) {
                reached.insert(ix);
                queue.push_back((ix, 0));
            }
        }

        while let Some((ix, depth)) = queue.pop_front() {
            if !expanded.insert(ix) {
                continue;
            }
            for edge in graph.edges_directed(ix, Direction::Outgoing) {
                if !request.allows(edge.weight()) {
                    continue;
                }
                // Breadth-first: every node within the bound is already reached here
                if depth >= request.max_hops {
                    truncated |= !reached.contains(&edge.target());
                    continue;
                }
                edges.insert(TraversalEdge::new(
                    graph[ix].id.clone(),
                    graph[edge.target()].id.clone(),
                    edge.weight().clone(),
                ));
                reached.insert(edge.target());
                queue.push_back((edge.target(), depth + 1));
            }
        }

        let mut nodes: Vec<GraphNode> = reached.into_iter().map(|ix| graph[ix].clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        TraversalResponse {
            nodes,
            edges: edges.into_iter().collect(),
            coverage_complete: true,
            expected_edge_count: None,
            truncated_at_hop_limit: truncated,
        }
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn traverse(&self, request: &TraversalRequest) -> Result<TraversalResponse, StoreError> {
        let response = self.run_traversal(request);
        tracing::debug!(
            roots = request.roots.len(),
            nodes = response.nodes.len(),
            edges = response.edges.len(),
            "in-memory traversal complete"
        );
        Ok(response)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
