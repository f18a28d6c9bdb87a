use impact_graph::taxonomy;
use impact_graph::types::{
    EntityId, EntityKind, GraphNode, TraversalEdge, TraversalPurpose, TraversalRequest,
    TraversalResponse,
};
use impact_graph::{TreeAssembler, TreeConfig, TreeNode};
use proptest::prelude::*;
use std::collections::HashSet;

fn node_id(ix: usize) -> String {
    format!("N{ix:02}")
}

fn graph(node_count: usize, edges: &[(usize, usize, usize)]) -> TraversalResponse {
    let kinds = taxonomy::impact_relationships();
    TraversalResponse {
        nodes: (0..node_count)
            .map(|i| GraphNode::new(node_id(i), EntityKind::unknown()))
            .collect(),
        edges: edges
            .iter()
            .filter(|(s, t, _)| *s < node_count && *t < node_count)
            .map(|&(s, t, k)| TraversalEdge::new(node_id(s), node_id(t), kinds[k % kinds.len()].clone()))
            .collect(),
        coverage_complete: true,
        ..TraversalResponse::default()
    }
}

fn request(max_hops: u32) -> TraversalRequest {
    TraversalRequest {
        roots: vec![EntityId::new(node_id(0))],
        allowed: taxonomy::allowed_from(&EntityKind::unknown()),
        max_hops,
        purpose: TraversalPurpose::Tree,
    }
}

fn check_counts(node: &TreeNode) -> Result<(), TestCaseError> {
    let expected = node.children.len() + node.children.iter().map(|c| c.descendant_count).sum::<usize>();
    prop_assert_eq!(node.descendant_count, expected);
    for child in &node.children {
        check_counts(child)?;
    }
    Ok(())
}

fn check_paths(node: &TreeNode, path: &mut Vec<EntityId>) -> Result<(), TestCaseError> {
    prop_assert!(!path.contains(&node.id), "{} repeats on path {:?}", node.id, path);
    path.push(node.id.clone());
    for child in &node.children {
        prop_assert_eq!(child.depth, node.depth + 1);
        check_paths(child, path)?;
    }
    path.pop();
    Ok(())
}

proptest! {
    #[test]
    fn prop_descendant_count_is_recursive_sum(
        node_count in 1..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize, 0..6usize), 0..40),
        max_hops in 1..6u32,
    ) {
        let resp = graph(node_count, &edges);
        let tree = TreeAssembler::default().assemble(&request(max_hops), &resp).remove(0);
        check_counts(&tree.root)?;
        prop_assert_eq!(tree.node_count, tree.root.descendant_count + 1);
    }

    #[test]
    fn prop_no_id_repeats_on_any_path(
        node_count in 1..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize, 0..6usize), 0..40),
        max_hops in 1..6u32,
    ) {
        let resp = graph(node_count, &edges);
        let tree = TreeAssembler::default().assemble(&request(max_hops), &resp).remove(0);
        check_paths(&tree.root, &mut Vec::new())?;
    }

    #[test]
    fn prop_depth_never_exceeds_max_hops(
        node_count in 1..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize, 0..6usize), 0..40),
        max_hops in 1..6u32,
    ) {
        let resp = graph(node_count, &edges);
        let tree = TreeAssembler::default().assemble(&request(max_hops), &resp).remove(0);
        prop_assert!(tree.root.iter().all(|n| n.depth <= max_hops));
    }

    #[test]
    fn prop_budget_caps_node_count(
        edges in proptest::collection::vec((0..12usize, 0..12usize, 0..6usize), 0..40),
        budget in 1..20usize,
    ) {
        let resp = graph(12, &edges);
        let tree = TreeAssembler::new(TreeConfig { node_budget: budget })
            .assemble(&request(5), &resp)
            .remove(0);
        prop_assert!(tree.node_count <= budget);
        check_counts(&tree.root)?;
    }
}

#[test]
fn test_leaf_has_zero_descendants() {
    let resp = graph(1, &[]);
    let tree = TreeAssembler::default().assemble(&request(3), &resp).remove(0);
    assert!(tree.root.is_leaf());
    assert_eq!(tree.root.descendant_count, 0);
}

#[test]
fn test_three_cycle_is_cut_once_per_path() {
    // N00 -> N01 -> N02 -> N00
    let resp = graph(3, &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]);
    let tree = TreeAssembler::default().assemble(&request(5), &resp).remove(0);
    let ids: Vec<&str> = tree.root.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["N00", "N01", "N02"]);
    let deepest = &tree.root.children[0].children[0];
    assert_eq!(deepest.cycle_refs, vec![EntityId::from("N00")]);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}
