//! Felsenstein pruning for binary traits under the two-state rate model.
//!
//! For every node `v` the partial likelihood `(L0, L1)` is the probability of
//! the tip data below `v`, conditional on `v` being in state 0 or 1.
//!
//! # Algorithm
//! 1. Tips: `(1, 0)` if state 0 was observed, `(0, 1)` if state 1 was observed.
//!    Internal vertices and root: `(1, 1)`.
//! 2. For each child `c` of a parent `p`, with `P = P(t_c)`:
//!    ```text
//!    p.L0 *= P[0][0]·c.L0 + P[0][1]·c.L1
//!    p.L1 *= P[1][0]·c.L0 + P[1][1]·c.L1
//!    ```
//! 3. The vector at the root is the result.
//!
//! # Concurrency
//! Each node's state lives behind its own lock, so a [BinaryPoissonPruning]
//! can be shared between threads working on disjoint subtrees. The rate model
//! is borrowed immutably for the whole pass and thus cannot change midway.

use crate::error::{PruningError, Result};
use crate::model::TraitState;
use crate::rate_model::RateModel;
use crate::traversal::{NodeIndex, Topology, TraversalSpecification};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use tracing::trace;

// =#========================================================================#=
// PARTIAL LIKELIHOOD
// =#========================================================================#=
/// Likelihood of the data in a subtree, conditional on the state of its root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialLikelihood {
    /// Conditional on state 0
    pub l0: f64,
    /// Conditional on state 1
    pub l1: f64,
}

impl PartialLikelihood {
    /// Neutral element of the multiplicative reduction.
    pub const ONE: PartialLikelihood = PartialLikelihood { l0: 1.0, l1: 1.0 };

    /// Creates a new vector.
    pub fn new(l0: f64, l1: f64) -> Self {
        PartialLikelihood { l0, l1 }
    }

    /// Certainty of the observed `state`, zero likelihood for the other.
    pub fn observed(state: TraitState) -> Self {
        match state {
            TraitState::Absent => PartialLikelihood::new(1.0, 0.0),
            TraitState::Present => PartialLikelihood::new(0.0, 1.0),
        }
    }

    /// Returns the entry conditional on `state`.
    pub fn get(&self, state: TraitState) -> f64 {
        match state {
            TraitState::Absent => self.l0,
            TraitState::Present => self.l1,
        }
    }

    /// Returns the vector as array `[L0, L1]`.
    pub fn to_array(self) -> [f64; 2] {
        [self.l0, self.l1]
    }
}

impl fmt::Display for PartialLikelihood {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.l0, self.l1)
    }
}

// =#========================================================================#=
// NODE SLOT
// =#========================================================================#=
/// Lifecycle of a node during one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeState {
    Uninitialized,
    /// Waiting for `pending` more children to be pruned in.
    Accumulating { pending: usize },
    Finalized,
    /// Finalized and already pruned into its parent.
    Consumed,
}

#[derive(Debug)]
struct NodeSlot {
    likelihood: PartialLikelihood,
    state: NodeState,
}

impl NodeSlot {
    fn finalize_if_done(&mut self) {
        if self.state == (NodeState::Accumulating { pending: 0 }) {
            self.state = NodeState::Finalized;
        }
    }
}

// =#========================================================================#=
// BINARY POISSON PRUNING
// =#========================================================================#=
/// Pruning state of one likelihood pass over a tree.
///
/// Implements [TraversalSpecification], to be driven by e.g.
/// [PostOrderTraversal](crate::traversal::PostOrderTraversal).
///
/// # Example
/// ```
/// use binpoisson::model::{BranchLength, PhyloTree, TraitState};
/// use binpoisson::traversal::PostOrderTraversal;
/// use binpoisson::{BinaryPoissonPruning, RateModel};
///
/// let mut tree = PhyloTree::new(2);
/// let a = tree.add_tip("A", BranchLength::new(0.5));
/// let b = tree.add_tip("B", BranchLength::new(1.0));
/// tree.add_root(vec![a, b]);
///
/// let model = RateModel::with_rates(1.0, 2.0)?;
/// let states = [TraitState::Absent, TraitState::Present];
/// let pruning = BinaryPoissonPruning::new(&tree, &model, &states)?;
/// PostOrderTraversal::new(&tree).traverse(&pruning)?;
///
/// let root = pruning.root_likelihood_vector()?;
/// assert!(root.l0 > 0.0 && root.l1 > 0.0);
/// # Ok::<(), binpoisson::PruningError>(())
/// ```
pub struct BinaryPoissonPruning<'a, T: Topology> {
    tree: &'a T,
    model: &'a RateModel,
    tip_states: &'a [TraitState],
    nodes: Vec<Mutex<NodeSlot>>,
    order_checks: bool,
}

impl<'a, T: Topology> BinaryPoissonPruning<'a, T> {
    /// Creates the pruning state for one pass.
    ///
    /// # Arguments
    /// * `tree` - Tree to compute on
    /// * `model` - Rate model, shared read-only for the whole pass
    /// * `tip_states` - Observed states, already in tip order of `tree`
    ///
    /// # Errors
    /// - [Precondition](PruningError::Precondition) if `tree` has no root
    /// - [Shape](PruningError::Shape) if `tip_states` does not have one entry per tip
    pub fn new(tree: &'a T, model: &'a RateModel, tip_states: &'a [TraitState]) -> Result<Self> {
        if !tree.has_root() {
            return Err(PruningError::precondition("tree has no root"));
        }
        if tip_states.len() != tree.num_tips() {
            return Err(PruningError::shape_mismatch(
                "observations",
                tree.num_tips(),
                tip_states.len(),
            ));
        }

        let nodes = (0..tree.num_nodes())
            .map(|_| {
                Mutex::new(NodeSlot {
                    likelihood: PartialLikelihood::ONE,
                    state: NodeState::Uninitialized,
                })
            })
            .collect();

        Ok(BinaryPoissonPruning {
            tree,
            model,
            tip_states,
            nodes,
            order_checks: true,
        })
    }

    /// Enables or disables verification that each reduction follows an edge of
    /// the tree and that the child is finalized when pruned.
    ///
    /// Enabled by default. When disabled, the caller alone is responsible for
    /// the children-before-parent order; the root query is checked regardless.
    pub fn with_order_checks(mut self, enabled: bool) -> Self {
        self.order_checks = enabled;
        self
    }

    /// Sets the initial partial likelihood of `node`.
    ///
    /// Tips get certainty of their observed state, all other nodes `(1, 1)`.
    pub fn initialize_node(&self, node: NodeIndex) {
        let mut slot = self.nodes[node].lock();
        if self.tree.is_tip(node) {
            slot.likelihood = PartialLikelihood::observed(self.tip_states[node]);
            slot.state = NodeState::Finalized;
        } else {
            slot.likelihood = PartialLikelihood::ONE;
            slot.state = NodeState::Accumulating {
                pending: self.tree.children(node).len(),
            };
            slot.finalize_if_done();
        }
    }

    /// Multiplies the contribution of `child`, propagated along its branch,
    /// into the partial likelihood of `parent`.
    ///
    /// Siblings may be reduced in any order. Reductions into the same parent
    /// are serialized by the parent's lock. A rejected call leaves both nodes
    /// untouched, so it can be retried once its precondition holds.
    ///
    /// # Errors
    /// - [PropagatedParameter](PruningError::PropagatedParameter) if the rate model has no valid rates
    /// - [InvalidParameter](PruningError::InvalidParameter) if the branch length is negative
    /// - [Precondition](PruningError::Precondition) if `parent` is not initialized or
    ///   already complete, or (with order checks) `parent` is not the parent of `child`,
    ///   or `child` is not finalized or was already reduced
    pub fn reduce_child_into_parent(&self, child: NodeIndex, parent: NodeIndex) -> Result<()> {
        if child == parent {
            return Err(PruningError::precondition(format!(
                "node {child} cannot be reduced into itself"
            )));
        }
        if self.order_checks && self.tree.parent(child) != Some(parent) {
            return Err(PruningError::precondition(format!(
                "node {parent} is not the parent of child {child}"
            )));
        }
        let p = self.model.transition_matrix(self.tree.branch_length(child))?;

        let (mut child_slot, mut slot) = self.lock_child_and_parent(child, parent);
        if self.order_checks {
            match child_slot.state {
                NodeState::Finalized => {}
                NodeState::Consumed => {
                    return Err(PruningError::precondition(format!(
                        "child {child} was already reduced into its parent"
                    )));
                }
                _ => {
                    return Err(PruningError::precondition(format!(
                        "child {child} is not finalized yet"
                    )));
                }
            }
        }

        let pending = match slot.state {
            NodeState::Accumulating { pending } if pending > 0 => pending,
            NodeState::Uninitialized => {
                return Err(PruningError::precondition(format!(
                    "parent {parent} must be initialized before reducing child {child} into it"
                )));
            }
            _ => {
                return Err(PruningError::precondition(format!(
                    "parent {parent} received more reductions than it has children"
                )));
            }
        };

        child_slot.state = NodeState::Consumed;
        let c = child_slot.likelihood;
        slot.state = NodeState::Accumulating { pending: pending - 1 };
        slot.likelihood.l0 *= p[(0, 0)] * c.l0 + p[(0, 1)] * c.l1;
        slot.likelihood.l1 *= p[(1, 0)] * c.l0 + p[(1, 1)] * c.l1;
        slot.finalize_if_done();

        trace!(child, parent, likelihood = %slot.likelihood, "reduced child into parent");
        Ok(())
    }

    /// Returns the partial likelihood vector at the root.
    ///
    /// # Errors
    /// [Precondition](PruningError::Precondition) if the traversal is incomplete.
    pub fn root_likelihood_vector(&self) -> Result<PartialLikelihood> {
        let root = self.tree.root();
        let slot = self.nodes[root].lock();
        match slot.state {
            NodeState::Finalized => Ok(slot.likelihood),
            _ => Err(PruningError::precondition(
                "root likelihood queried before the traversal completed",
            )),
        }
    }

    /// Returns the current partial likelihood of any node, finalized or not.
    pub fn partial_likelihood(&self, node: NodeIndex) -> PartialLikelihood {
        self.nodes[node].lock().likelihood
    }

    /// Locks both slots, always in ascending node order.
    fn lock_child_and_parent(
        &self,
        child: NodeIndex,
        parent: NodeIndex,
    ) -> (MutexGuard<'_, NodeSlot>, MutexGuard<'_, NodeSlot>) {
        if child < parent {
            let child_slot = self.nodes[child].lock();
            (child_slot, self.nodes[parent].lock())
        } else {
            let parent_slot = self.nodes[parent].lock();
            (self.nodes[child].lock(), parent_slot)
        }
    }
}

impl<T: Topology> TraversalSpecification for BinaryPoissonPruning<'_, T> {
    fn init_node(&self, node: NodeIndex) {
        self.initialize_node(node);
    }

    // Nothing to do once all children are in
    fn visit_node(&self, _node: NodeIndex) {}

    fn prune_node(&self, child: NodeIndex, parent: NodeIndex) -> Result<()> {
        self.reduce_child_into_parent(child, parent)
    }
}
