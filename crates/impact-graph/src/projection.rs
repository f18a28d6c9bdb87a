//! Tree projections
//!
//! Borrowed views over an assembled [`TreeNode`]; nothing is recomputed.
//! - [`DetailedView`]: id, type, status, children (status checking)
//! - [`MinimalView`]: id, latest_status, children (dashboards)

use crate::tree::{AssembledTree, TreeNode};
use crate::types::{EntityId, EntityKind};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

/// Detailed projection of a tree node
#[derive(Debug, Clone, Copy)]
pub struct DetailedView<'a>(pub &'a TreeNode);

/// Minimal projection of a tree node
#[derive(Debug, Clone, Copy)]
pub struct MinimalView<'a>(pub &'a TreeNode);

struct Children<'a, V> {
    nodes: &'a [TreeNode],
    view: fn(&'a TreeNode) -> V,
}

impl<V: Serialize> Serialize for Children<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.nodes.len()))?;
        for node in self.nodes {
            seq.serialize_element(&(self.view)(node))?;
        }
        seq.end()
    }
}

impl Serialize for DetailedView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let mut s = serializer.serialize_struct("DetailedNode", 4)?;
        s.serialize_field("id", &node.id)?;
        s.serialize_field("type", &node.kind)?;
        s.serialize_field("status", &node.status)?;
        s.serialize_field(
            "children",
            &Children {
                nodes: &node.children,
                view: DetailedView,
            },
        )?;
        s.end()
    }
}

impl Serialize for MinimalView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let mut s = serializer.serialize_struct("MinimalNode", 3)?;
        s.serialize_field("id", &node.id)?;
        s.serialize_field("latest_status", &node.status)?;
        s.serialize_field(
            "children",
            &Children {
                nodes: &node.children,
                view: MinimalView,
            },
        )?;
        s.end()
    }
}

/// Children of one entity in the detailed projection
#[derive(Debug, Clone)]
pub struct ChildrenStatus<'a> {
    /// Queried entity
    pub entity_id: &'a EntityId,
    /// Resolved kind of the queried entity
    pub entity_type: &'a EntityKind,
    root: &'a TreeNode,
}

impl<'a> ChildrenStatus<'a> {
    /// View over an assembled tree
    #[must_use]
    pub fn new(tree: &'a AssembledTree) -> Self {
        Self {
            entity_id: &tree.root.id,
            entity_type: &tree.root.kind,
            root: &tree.root,
        }
    }

    /// Direct children, detailed
    pub fn children(&self) -> impl Iterator<Item = DetailedView<'a>> {
        self.root.children.iter().map(DetailedView)
    }
}

impl Serialize for ChildrenStatus<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ChildrenStatus", 3)?;
        s.serialize_field("entity_id", self.entity_id)?;
        s.serialize_field("entity_type", self.entity_type)?;
        s.serialize_field(
            "children",
            &Children {
                nodes: &self.root.children,
                view: DetailedView,
            },
        )?;
        s.end()
    }
}

/// Children of one entity in the minimal projection, with a total count
#[derive(Debug, Clone)]
pub struct ChildrenHierarchy<'a> {
    /// Queried entity
    pub entity_id: &'a EntityId,
    /// Kind the caller asked about
    pub entity_type: &'a EntityKind,
    /// Every node beneath the queried entity
    pub total_descendants: usize,
    root: &'a TreeNode,
}

impl<'a> ChildrenHierarchy<'a> {
    /// View over an assembled tree
    #[must_use]
    pub fn new(tree: &'a AssembledTree) -> Self {
        Self {
            entity_id: &tree.root.id,
            entity_type: &tree.root.kind,
            total_descendants: tree.root.descendant_count,
            root: &tree.root,
        }
    }

    /// Direct children, minimal
    pub fn children(&self) -> impl Iterator<Item = MinimalView<'a>> {
        self.root.children.iter().map(MinimalView)
    }
}

impl Serialize for ChildrenHierarchy<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ChildrenHierarchy", 4)?;
        s.serialize_field("entity_id", self.entity_id)?;
        s.serialize_field("entity_type", self.entity_type)?;
        s.serialize_field(
            "children",
            &Children {
                nodes: &self.root.children,
                view: MinimalView,
            },
        )?;
        s.serialize_field("total_descendants", &self.total_descendants)?;
        s.end()
    }
}
