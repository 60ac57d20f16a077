use approx::assert_relative_eq;
use binpoisson::model::{BranchLength, PhyloTree, TraitState};
use binpoisson::traversal::{NodeIndex, PostOrderTraversal, Topology, TraversalSpecification};
use binpoisson::{BinaryPoissonPruning, PartialLikelihood, PruningError, RateModel};
use rayon::prelude::*;

const TOLERANCE: f64 = 1e-12;

// ============= Helpers =============
fn star_tree(branch_lengths: &[f64]) -> PhyloTree {
    let mut tree = PhyloTree::new(branch_lengths.len());
    let tips = branch_lengths
        .iter()
        .enumerate()
        .map(|(i, &t)| tree.add_tip(&format!("t{i}"), BranchLength::new(t)))
        .collect();
    tree.add_root(tips);
    tree
}

/// Balanced tree with branch lengths varying by vertex index.
fn balanced_tree(num_tips: usize) -> PhyloTree {
    let length = |i: usize| BranchLength::new(0.05 + 0.01 * (i % 7) as f64);

    let mut tree = PhyloTree::new(num_tips);
    let mut level: Vec<_> = (0..num_tips)
        .map(|i| tree.add_tip(&format!("tip{i}"), length(i)))
        .collect();

    while level.len() > 2 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let index = tree.num_nodes();
                next.push(tree.add_internal_vertex(pair.to_vec(), length(index)));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    tree.add_root(level);
    tree
}

fn alternating_states(num_tips: usize) -> Vec<TraitState> {
    (0..num_tips).map(|i| TraitState::from(i % 3 == 0)).collect()
}

fn run_sequential(tree: &PhyloTree, model: &RateModel, states: &[TraitState]) -> PartialLikelihood {
    let pruning = BinaryPoissonPruning::new(tree, model, states).unwrap();
    PostOrderTraversal::new(tree).traverse(&pruning).unwrap();
    pruning.root_likelihood_vector().unwrap()
}

// ============= Initialization =============
#[test]
fn test_initialize_tips_and_internal() {
    let tree = star_tree(&[1.0, 1.0]);
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Present];
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();

    for node in 0..tree.num_nodes() {
        pruning.init_node(node);
        pruning.visit_node(node);
    }

    assert_eq!(pruning.partial_likelihood(0).to_array(), [1.0, 0.0]);
    assert_eq!(pruning.partial_likelihood(1).to_array(), [0.0, 1.0]);
    assert_eq!(pruning.partial_likelihood(2).to_array(), [1.0, 1.0]);
}

#[test]
fn test_observation_count_mismatch() {
    let tree = star_tree(&[1.0, 1.0, 1.0]);
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Present];

    let result = BinaryPoissonPruning::new(&tree, &model, &states);
    assert!(matches!(result, Err(PruningError::Shape(_))));
}

// ============= Results =============
#[test]
fn test_single_edge_tree() {
    let t = 0.75;
    let mut tree = PhyloTree::new(1);
    let tip = tree.add_tip("Gallirallus australis", BranchLength::new(t));
    tree.add_root(vec![tip]);

    let model = RateModel::with_rates(0.3, 1.2).unwrap();
    let root = run_sequential(&tree, &model, &[TraitState::Absent]);
    let p = model.transition_matrix(t).unwrap();

    assert_relative_eq!(root.l0, p[(0, 0)], epsilon = TOLERANCE);
    assert_relative_eq!(root.l1, p[(1, 0)], epsilon = TOLERANCE);
}

#[test]
fn test_star_tree_is_product_over_tips() {
    let lengths = [0.1, 0.4, 0.9, 1.6];
    let tree = star_tree(&lengths);
    let model = RateModel::with_rates(0.8, 0.5).unwrap();

    for observed in TraitState::ALL {
        let states = vec![observed; lengths.len()];
        let root = run_sequential(&tree, &model, &states);

        for root_state in TraitState::ALL {
            let expected: f64 = lengths
                .iter()
                .map(|&t| {
                    model.transition_matrix(t).unwrap()[(root_state.index(), observed.index())]
                })
                .product();
            assert_relative_eq!(root.get(root_state), expected, epsilon = TOLERANCE);
        }
    }
}

#[test]
fn test_cherry_with_outgroup() {
    // ((A:0.2,B:0.3):0.4,C:0.5); with A=0, B=1, C=1
    let mut tree = PhyloTree::new(3);
    let a = tree.add_tip("A", BranchLength::new(0.2));
    let b = tree.add_tip("B", BranchLength::new(0.3));
    let c = tree.add_tip("C", BranchLength::new(0.5));
    let ab = tree.add_internal_vertex(vec![a, b], BranchLength::new(0.4));
    tree.add_root(vec![ab, c]);

    let model = RateModel::with_rates(1.1, 0.6).unwrap();
    let states = [TraitState::Absent, TraitState::Present, TraitState::Present];
    let root = run_sequential(&tree, &model, &states);

    let p = |t: f64| model.transition_matrix(t).unwrap();
    let (pa, pb, pc, pab) = (p(0.2), p(0.3), p(0.5), p(0.4));
    let inner = [pa[(0, 0)] * pb[(0, 1)], pa[(1, 0)] * pb[(1, 1)]];
    for r in 0..2 {
        let via_inner = pab[(r, 0)] * inner[0] + pab[(r, 1)] * inner[1];
        let expected = via_inner * pc[(r, 1)];
        assert_relative_eq!(root.to_array()[r], expected, epsilon = TOLERANCE);
    }
}

#[test]
fn test_sibling_order_independence() {
    let tree = star_tree(&[0.3, 0.7, 1.9]);
    let model = RateModel::with_rates(0.9, 0.4).unwrap();
    let states = [TraitState::Present, TraitState::Absent, TraitState::Present];
    let root_index = tree.root();

    let permutations: [[NodeIndex; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let results: Vec<PartialLikelihood> = permutations
        .iter()
        .map(|order| {
            let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
            for node in 0..tree.num_nodes() {
                pruning.initialize_node(node);
            }
            for &child in order {
                pruning.reduce_child_into_parent(child, root_index).unwrap();
            }
            pruning.root_likelihood_vector().unwrap()
        })
        .collect();

    for result in &results[1..] {
        assert_relative_eq!(result.l0, results[0].l0, epsilon = TOLERANCE);
        assert_relative_eq!(result.l1, results[0].l1, epsilon = TOLERANCE);
    }
}

#[test]
fn test_zero_length_branches_keep_tip_state() {
    let tree = star_tree(&[0.0, 0.0]);
    let model = RateModel::with_rates(2.0, 3.0).unwrap();
    let root = run_sequential(&tree, &model, &[TraitState::Present, TraitState::Present]);

    assert_relative_eq!(root.l0, 0.0, epsilon = TOLERANCE);
    assert_relative_eq!(root.l1, 1.0, epsilon = TOLERANCE);
}

// ============= Contract violations =============
#[test]
fn test_root_queried_before_traversal() {
    let tree = star_tree(&[1.0, 1.0]);
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Absent];
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();

    assert!(matches!(
        pruning.root_likelihood_vector(),
        Err(PruningError::Precondition(_))
    ));

    for node in 0..tree.num_nodes() {
        pruning.initialize_node(node);
    }
    pruning.reduce_child_into_parent(0, 2).unwrap();
    assert!(matches!(
        pruning.root_likelihood_vector(),
        Err(PruningError::Precondition(_))
    ));

    pruning.reduce_child_into_parent(1, 2).unwrap();
    assert!(pruning.root_likelihood_vector().is_ok());
}

#[test]
fn test_unfinalized_child_rejected() {
    let tree = balanced_tree(4);
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = alternating_states(4);
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    for node in 0..tree.num_nodes() {
        pruning.initialize_node(node);
    }

    // Internal vertex 4 still waits for tips 0 and 1
    let parent = tree.parent(4).unwrap();
    assert!(matches!(
        pruning.reduce_child_into_parent(4, parent),
        Err(PruningError::Precondition(_))
    ));
}

#[test]
fn test_double_reduction_rejected() {
    let tree = star_tree(&[1.0, 1.0]);
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Absent];
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    for node in 0..tree.num_nodes() {
        pruning.initialize_node(node);
    }

    pruning.reduce_child_into_parent(0, 2).unwrap();
    assert!(matches!(
        pruning.reduce_child_into_parent(0, 2),
        Err(PruningError::Precondition(_))
    ));
}

#[test]
fn test_rejected_reduction_can_be_retried() {
    // ((t0,t1)4,(t2,t3)5)6
    let tree = balanced_tree(4);
    let model = RateModel::with_rates(0.7, 1.4).unwrap();
    let states = alternating_states(4);
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    pruning.initialize_node(2);

    assert!(matches!(
        pruning.reduce_child_into_parent(2, 5),
        Err(PruningError::Precondition(_))
    ));

    for node in [0, 1, 3, 4, 5, 6] {
        pruning.initialize_node(node);
    }
    for (child, parent) in [(2, 5), (3, 5), (0, 4), (1, 4), (4, 6), (5, 6)] {
        pruning.reduce_child_into_parent(child, parent).unwrap();
    }

    let root = pruning.root_likelihood_vector().unwrap();
    let expected = run_sequential(&tree, &model, &states);
    assert_relative_eq!(root.l0, expected.l0, epsilon = TOLERANCE);
    assert_relative_eq!(root.l1, expected.l1, epsilon = TOLERANCE);
}

#[test]
fn test_reduction_along_non_edge_rejected() {
    // ((A,B)3,C)4
    let mut tree = PhyloTree::new(3);
    let a = tree.add_tip("A", BranchLength::new(0.2));
    let b = tree.add_tip("B", BranchLength::new(0.3));
    let c = tree.add_tip("C", BranchLength::new(0.5));
    let ab = tree.add_internal_vertex(vec![a, b], BranchLength::new(0.4));
    let root = tree.add_root(vec![ab, c]);

    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Present, TraitState::Present];
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    for node in 0..tree.num_nodes() {
        pruning.initialize_node(node);
    }

    assert!(matches!(
        pruning.reduce_child_into_parent(a, root),
        Err(PruningError::Precondition(_))
    ));
    assert!(matches!(
        pruning.reduce_child_into_parent(root, root),
        Err(PruningError::Precondition(_))
    ));
    pruning.reduce_child_into_parent(c, root).unwrap();

    // Vertex 3 was never reduced, so the root is still incomplete
    assert!(matches!(
        pruning.root_likelihood_vector(),
        Err(PruningError::Precondition(_))
    ));

    // Tip A was left untouched by the rejected call
    pruning.reduce_child_into_parent(a, ab).unwrap();
}

#[test]
fn test_tree_without_root_rejected() {
    let mut tree = PhyloTree::new(2);
    tree.add_tip("A", BranchLength::new(1.0));
    tree.add_tip("B", BranchLength::new(1.0));
    let model = RateModel::with_rates(1.0, 1.0).unwrap();
    let states = [TraitState::Absent, TraitState::Present];

    let result = BinaryPoissonPruning::new(&tree, &model, &states);
    assert!(matches!(result, Err(PruningError::Precondition(_))));
}

#[test]
fn test_unparameterized_model_fails_traversal() {
    let tree = star_tree(&[1.0, 1.0]);
    let model = RateModel::new();
    let states = [TraitState::Absent, TraitState::Present];
    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();

    let result = PostOrderTraversal::new(&tree).traverse(&pruning);
    assert!(matches!(result, Err(PruningError::PropagatedParameter(_))));
    assert!(pruning.root_likelihood_vector().is_err());
}

// ============= Concurrency =============
/// Reduces the subtree below `node` with one rayon task per child.
fn reduce_subtree_parallel<S: TraversalSpecification + Sync>(
    tree: &PhyloTree,
    spec: &S,
    node: NodeIndex,
) -> Result<(), PruningError> {
    tree.children(node).par_iter().try_for_each(|&child| {
        reduce_subtree_parallel(tree, spec, child)?;
        spec.visit_node(child);
        spec.prune_node(child, node)
    })
}

#[test]
fn test_parallel_subtrees_match_sequential() {
    let tree = balanced_tree(257);
    let model = RateModel::with_rates(0.6, 1.3).unwrap();
    let states = alternating_states(257);

    let sequential = run_sequential(&tree, &model, &states);

    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    (0..tree.num_nodes())
        .into_par_iter()
        .for_each(|node| pruning.init_node(node));
    reduce_subtree_parallel(&tree, &pruning, tree.root()).unwrap();
    let parallel = pruning.root_likelihood_vector().unwrap();

    assert_relative_eq!(parallel.l0, sequential.l0, max_relative = 1e-10);
    assert_relative_eq!(parallel.l1, sequential.l1, max_relative = 1e-10);
}

#[test]
fn test_parallel_star_reductions_into_same_parent() {
    let lengths: Vec<f64> = (0..64).map(|i| 0.01 * (i + 1) as f64).collect();
    let tree = star_tree(&lengths);
    let model = RateModel::with_rates(0.2, 0.2).unwrap();
    let states = vec![TraitState::Absent; lengths.len()];

    let sequential = run_sequential(&tree, &model, &states);

    let pruning = BinaryPoissonPruning::new(&tree, &model, &states).unwrap();
    for node in 0..tree.num_nodes() {
        pruning.initialize_node(node);
    }
    (0..lengths.len())
        .into_par_iter()
        .try_for_each(|tip| pruning.reduce_child_into_parent(tip, tree.root()))
        .unwrap();
    let parallel = pruning.root_likelihood_vector().unwrap();

    assert_relative_eq!(parallel.l0, sequential.l0, max_relative = 1e-10);
    assert_relative_eq!(parallel.l1, sequential.l1, max_relative = 1e-10);
}
