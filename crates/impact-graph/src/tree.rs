//! Tree assembly
//!
//! Turns a flat [`TraversalResponse`] into one rooted tree per requested
//! root. Expansion is breadth-first with a visited set per path:
//! - a node shared by two parents (diamond) appears under both
//! - an edge back to an ancestor on the same path is cut and recorded in
//!   the parent's `cycle_refs`
//!
//! Invariants of every assembled [`TreeNode`]:
//! - `descendant_count == children.len() + Σ child.descendant_count`
//! - no id repeats along a root-to-leaf path
//! - `depth <= request.max_hops`

use crate::taxonomy;
use crate::types::{EntityId, EntityKind, TraversalEdge, TraversalRequest, TraversalResponse};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Tree assembly settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum nodes per assembled tree, root included
    pub node_budget: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { node_budget: 10_000 }
    }
}

/// Assembled tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Entity id
    pub id: EntityId,
    /// Entity kind
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Resolved status (`latest_status` wins over `status`)
    pub status: Option<String>,
    /// Hops below the tree root
    pub depth: u32,
    /// Nodes beneath this one
    pub descendant_count: usize,
    /// Ancestors this node links back to (cut cycles)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle_refs: Vec<EntityId>,
    /// Children ordered by id
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Leaf node
    #[must_use]
    pub fn leaf(id: EntityId, kind: EntityKind, status: Option<String>, depth: u32) -> Self {
        Self {
            id,
            kind,
            status,
            depth,
            descendant_count: 0,
            cycle_refs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// True when the node has no children
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order iterator over this node and everything beneath it
    #[must_use]
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter { stack: vec![self] }
    }

    /// Pre-order iterator over the nodes beneath this one
    pub fn descendants(&self) -> impl Iterator<Item = &TreeNode> {
        self.iter().skip(1)
    }

    /// Deepest depth in the subtree
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.iter().map(|n| n.depth).max().unwrap_or(self.depth)
    }
}

/// Pre-order tree iterator
#[derive(Debug)]
pub struct TreeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// One assembled tree plus how it was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledTree {
    /// Root of the tree
    pub root: TreeNode,
    /// Root exists in the store
    pub found: bool,
    /// Node budget stopped expansion
    pub truncated: bool,
    /// Traversable edges exist beyond the hop limit
    pub hop_limited: bool,
    /// Nodes in the tree, root included
    pub node_count: usize,
}

impl AssembledTree {
    /// Deepest depth reached below the root
    #[inline]
    #[must_use]
    pub fn max_depth_reached(&self) -> u32 {
        self.root.max_depth()
    }
}

#[derive(Debug)]
struct Slot {
    id: EntityId,
    kind: EntityKind,
    status: Option<String>,
    depth: u32,
    path: im::HashSet<EntityId>,
    children: Vec<usize>,
    cycle_refs: Vec<EntityId>,
}

/// Builds trees from traversal responses
#[derive(Debug, Clone, Default)]
pub struct TreeAssembler {
    config: TreeConfig,
}

impl TreeAssembler {
    /// Create assembler
    #[inline]
    #[must_use]
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }

    /// Settings in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// One tree per request root, in request order
    #[must_use]
    pub fn assemble(&self, request: &TraversalRequest, response: &TraversalResponse) -> Vec<AssembledTree> {
        let adjacency = Adjacency::build(request, response);
        request
            .roots
            .iter()
            .map(|root| self.assemble_with(root, None, request, response, &adjacency))
            .collect()
    }

    /// Tree for a single root; the hint names the root kind when the store
    /// does not know the entity
    #[must_use]
    pub fn assemble_root(
        &self,
        root: &EntityId,
        kind_hint: Option<&EntityKind>,
        request: &TraversalRequest,
        response: &TraversalResponse,
    ) -> AssembledTree {
        let adjacency = Adjacency::build(request, response);
        self.assemble_with(root, kind_hint, request, response, &adjacency)
    }

    fn assemble_with(
        &self,
        root: &EntityId,
        kind_hint: Option<&EntityKind>,
        request: &TraversalRequest,
        response: &TraversalResponse,
        adjacency: &Adjacency<'_>,
    ) -> AssembledTree {
        let nodes = response.node_index();

        let Some(root_node) = nodes.get(root) else {
            tracing::debug!(root = %root, "root not present in graph store");
            let kind = kind_hint.cloned().unwrap_or_else(EntityKind::unknown);
            return AssembledTree {
                root: TreeNode::leaf(root.clone(), kind, None, 0),
                found: false,
                truncated: false,
                hop_limited: false,
                node_count: 1,
            };
        };

        let budget = self.config.node_budget.max(1);
        let mut truncated = false;
        let mut hop_limited = response.truncated_at_hop_limit;
        let mut beyond_bound: Vec<&EntityId> = Vec::new();

        let mut slots = vec![Slot {
            id: root.clone(),
            kind: root_node.kind.clone(),
            status: root_node.effective_status().map(str::to_string),
            depth: 0,
            path: im::HashSet::unit(root.clone()),
            children: Vec::new(),
            cycle_refs: Vec::new(),
        }];
        let mut queue = VecDeque::from([0usize]);

        'expand: while let Some(ix) = queue.pop_front() {
            let edges = adjacency.outgoing(&slots[ix].id);
            if edges.is_empty() {
                continue;
            }
            if slots[ix].depth >= request.max_hops {
                beyond_bound.extend(edges.iter().map(|e| &e.target));
                continue;
            }

            for edge in edges {
                if slots[ix].path.contains(&edge.target) {
                    slots[ix].cycle_refs.push(edge.target.clone());
                    continue;
                }
                if slots.len() >= budget {
                    truncated = true;
                    break 'expand;
                }

                let (kind, status) = match nodes.get(&edge.target) {
                    Some(node) => (node.kind.clone(), node.effective_status().map(str::to_string)),
                    None => (taxonomy::target_kind(&edge.kind), None),
                };
                let child = Slot {
                    id: edge.target.clone(),
                    kind,
                    status,
                    depth: slots[ix].depth + 1,
                    path: slots[ix].path.update(edge.target.clone()),
                    children: Vec::new(),
                    cycle_refs: Vec::new(),
                };
                let child_ix = slots.len();
                slots.push(child);
                slots[ix].children.push(child_ix);
                queue.push_back(child_ix);
            }
        }

        // Targets placed elsewhere within the bound (diamonds, cycles) add nothing
        if !hop_limited && !beyond_bound.is_empty() {
            let placed: HashSet<&EntityId> = slots.iter().map(|s| &s.id).collect();
            hop_limited = beyond_bound.iter().any(|t| !placed.contains(t));
        }

        if truncated {
            tracing::warn!(root = %root, budget, "tree node budget reached; expansion stopped");
        }

        let node_count = slots.len();
        AssembledTree {
            root: fold(slots),
            found: true,
            truncated,
            hop_limited,
            node_count,
        }
    }
}

/// Build nodes bottom-up; children always sit at higher slot indices
fn fold(slots: Vec<Slot>) -> TreeNode {
    let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(slots.len());
    built.resize_with(slots.len(), || None);

    for (ix, slot) in slots.into_iter().enumerate().rev() {
        let children: Vec<TreeNode> = slot
            .children
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        let descendant_count = children.len() + children.iter().map(|c| c.descendant_count).sum::<usize>();
        built[ix] = Some(TreeNode {
            id: slot.id,
            kind: slot.kind,
            status: slot.status,
            depth: slot.depth,
            descendant_count,
            cycle_refs: slot.cycle_refs,
            children,
        });
    }

    built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_else(|| TreeNode::leaf(EntityId::new(""), EntityKind::unknown(), None, 0))
}

/// Allowed outgoing edges per source, sorted and de-duplicated by target
struct Adjacency<'a> {
    edges: HashMap<&'a EntityId, Vec<&'a TraversalEdge>>,
}

impl<'a> Adjacency<'a> {
    fn build(request: &TraversalRequest, response: &'a TraversalResponse) -> Self {
        let mut edges: HashMap<&EntityId, Vec<&TraversalEdge>> = HashMap::new();
        for edge in response.edges.iter().filter(|e| request.allows(&e.kind)) {
            edges.entry(&edge.source).or_default().push(edge);
        }
        for list in edges.values_mut() {
            list.sort_by(|a, b| a.target.cmp(&b.target).then_with(|| a.kind.cmp(&b.kind)));
            list.dedup_by(|a, b| a.target == b.target);
        }
        Self { edges }
    }

    fn outgoing(&self, id: &EntityId) -> &[&'a TraversalEdge] {
        self.edges.get(id).map_or(&[], Vec::as_slice)
    }
}
