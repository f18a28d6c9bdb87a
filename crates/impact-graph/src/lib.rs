//! Impact Graph - dependency graph access for change-impact analysis
//!
//! Everything between a change and an assembled dependency tree:
//! - Entity taxonomy (which relationships connect which kinds)
//! - Traversal planning with per-use-case hop ceilings
//! - Graph store contract and the pooled, time-bounded store handle
//! - Tree assembly with per-path cycle cutting
//! - Detailed and minimal tree projections
//!
//! # Example
//!
//! ```rust,ignore
//! use impact_graph::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryGraphStore::from_snapshot(GraphSnapshot::load("graph.json")?)?;
//! let pool = GraphStorePool::new(Arc::new(store), PoolConfig::default());
//!
//! let request = TraversalPlanner::default().plan_tree(&"LINE-1".into(), None, Some(3))?;
//! let response = pool.traverse(&request).await?;
//! let trees = TreeAssembler::default().assemble(&request, &response);
//!
//! println!("{} descendants", trees[0].root.descendant_count);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod iso;
pub mod memory;
pub mod planner;
pub mod projection;
pub mod store;
pub mod taxonomy;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use iso::IsoDrawingId;
pub use memory::{GraphSnapshot, InMemoryGraphStore, SnapshotError};
pub use planner::{PlanError, PlannerLimits, TraversalPlanner};
pub use projection::{ChildrenHierarchy, ChildrenStatus, DetailedView, MinimalView};
pub use store::{GraphStore, GraphStorePool, PoolConfig, PoolStats, StoreError};
pub use taxonomy::SourceKind;
pub use tree::{AssembledTree, TreeAssembler, TreeConfig, TreeNode};
pub use types::{
    EntityId, EntityKind, GraphNode, RelationshipKind, TraversalEdge, TraversalPurpose,
    TraversalRequest, TraversalResponse,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the impact graph
    pub use crate::{
        AssembledTree, EntityId, EntityKind, GraphNode, GraphSnapshot, GraphStore, GraphStorePool,
        InMemoryGraphStore, PoolConfig, RelationshipKind, SourceKind, TraversalEdge,
        TraversalPlanner, TraversalRequest, TraversalResponse, TreeAssembler, TreeNode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
