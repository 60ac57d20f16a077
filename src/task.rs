//! Traversal task: a tree, its observations and a rate model bundled for
//! repeated likelihood evaluation.
//!
//! A [TraversalTask] is configured once with a [TraversalTaskBuilder] and
//! then evaluated for as many parameter sets as needed, e.g. by an optimizer:
//! ```
//! use binpoisson::model::{BranchLength, PhyloTree, TipObservations};
//! use binpoisson::TraversalTaskBuilder;
//!
//! let mut tree = PhyloTree::new(3);
//! let a = tree.add_tip("A", BranchLength::new(0.3));
//! let b = tree.add_tip("B", BranchLength::new(0.3));
//! let c = tree.add_tip("C", BranchLength::new(0.8));
//! let ab = tree.add_internal_vertex(vec![a, b], BranchLength::new(0.5));
//! tree.add_root(vec![ab, c]);
//!
//! let observations = TipObservations::from_raw(
//!     vec!["C".into(), "A".into(), "B".into()],
//!     &[1, 0, 0],
//! )?;
//!
//! let mut task = TraversalTaskBuilder::new(&tree)
//!     .with_observations(observations)
//!     .build()?;
//!
//! for rates in [[0.5, 0.5], [1.0, 2.0]] {
//!     let root = task.traverse_tree(&rates)?;
//!     println!("q = {rates:?}: root vector {root}");
//! }
//! # Ok::<(), binpoisson::PruningError>(())
//! ```

use crate::error::{PruningError, Result};
use crate::model::{TipObservations, TraitState};
use crate::pruning::{BinaryPoissonPruning, PartialLikelihood};
use crate::rate_model::RateModel;
use crate::traversal::{LabelledTips, PostOrderTraversal, Topology};
use tracing::debug;

// =#========================================================================#=
// TRAVERSAL TASK
// =#========================================================================#=
/// Owns the rate model and aligned observations for likelihood passes over a tree.
#[derive(Debug, Clone)]
pub struct TraversalTask<'a, T: Topology> {
    tree: &'a T,
    model: RateModel,
    tip_states: Vec<TraitState>,
    order_checks: bool,
}

impl<'a, T: Topology> TraversalTask<'a, T> {
    /// Sets the rates from `parameters = (q01, q10)` and runs a full pass,
    /// returning the partial likelihood vector at the root.
    ///
    /// # Errors
    /// [Shape](PruningError::Shape) or [InvalidParameter](PruningError::InvalidParameter)
    /// for a bad parameter vector, otherwise as [TraversalTask::traverse].
    pub fn traverse_tree(&mut self, parameters: &[f64]) -> Result<PartialLikelihood> {
        self.model.set_parameters(parameters)?;
        self.traverse()
    }

    /// Runs a full pass with the current rates.
    ///
    /// # Errors
    /// [PropagatedParameter](PruningError::PropagatedParameter) if no valid
    /// rates are set; any error raised while pruning.
    pub fn traverse(&self) -> Result<PartialLikelihood> {
        let pruning = BinaryPoissonPruning::new(self.tree, &self.model, &self.tip_states)?
            .with_order_checks(self.order_checks);
        PostOrderTraversal::new(self.tree).traverse(&pruning)?;

        let root = pruning.root_likelihood_vector()?;
        debug!(rates = ?self.model.rates(), %root, "likelihood pass completed");
        Ok(root)
    }

    /// Sets the rates without traversing.
    pub fn set_rates(&mut self, q01: f64, q10: f64) -> Result<()> {
        self.model.set_rates(q01, q10)
    }

    /// Returns the rate model.
    pub fn model(&self) -> &RateModel {
        &self.model
    }

    /// Returns the observed states in tip order.
    pub fn tip_states(&self) -> &[TraitState] {
        &self.tip_states
    }

    /// Returns the tree.
    pub fn tree(&self) -> &'a T {
        self.tree
    }
}

// =#========================================================================#=
// BUILDER
// =#========================================================================#=
/// Builder for [TraversalTask].
///
/// Observations are required, given either labelled
/// ([with_observations](TraversalTaskBuilder::with_observations)) or already
/// in tip order ([with_tip_states](TraversalTaskBuilder::with_tip_states)).
/// Defaults:
/// - No initial rates (set them with [TraversalTask::traverse_tree])
/// - Order checks enabled
#[derive(Debug)]
pub struct TraversalTaskBuilder<'a, T: Topology> {
    tree: &'a T,
    tip_states: Option<Result<Vec<TraitState>>>,
    rates: Option<(f64, f64)>,
    order_checks: bool,
}

impl<'a, T: Topology> TraversalTaskBuilder<'a, T> {
    /// Creates a new builder for the given tree.
    pub fn new(tree: &'a T) -> Self {
        TraversalTaskBuilder {
            tree,
            tip_states: None,
            rates: None,
            order_checks: true,
        }
    }

    /// Uses observations that are already in the tip order of the tree.
    pub fn with_tip_states(mut self, tip_states: Vec<TraitState>) -> Self {
        self.tip_states = Some(Ok(tip_states));
        self
    }

    /// Parameterizes the rate model right away.
    pub fn with_rates(mut self, q01: f64, q10: f64) -> Self {
        self.rates = Some((q01, q10));
        self
    }

    /// Enables or disables checking that every child is finalized before it
    /// gets pruned into its parent (enabled by default).
    pub fn with_order_checks(mut self, enabled: bool) -> Self {
        self.order_checks = enabled;
        self
    }

    /// Builds the task.
    ///
    /// # Errors
    /// - [Precondition](PruningError::Precondition) if the tree has no root or
    ///   no observations were given
    /// - [Shape](PruningError::Shape) if the observations do not match the tips
    /// - [InvalidParameter](PruningError::InvalidParameter) for invalid initial rates
    pub fn build(self) -> Result<TraversalTask<'a, T>> {
        if !self.tree.has_root() {
            return Err(PruningError::precondition("tree has no root"));
        }
        let tip_states = self
            .tip_states
            .ok_or_else(|| PruningError::precondition("observations must be provided"))??;
        if tip_states.len() != self.tree.num_tips() {
            return Err(PruningError::shape_mismatch(
                "observations",
                self.tree.num_tips(),
                tip_states.len(),
            ));
        }

        let mut model = RateModel::new();
        if let Some((q01, q10)) = self.rates {
            model.set_rates(q01, q10)?;
        }

        debug!(
            num_tips = self.tree.num_tips(),
            num_nodes = self.tree.num_nodes(),
            "traversal task created"
        );

        Ok(TraversalTask {
            tree: self.tree,
            model,
            tip_states,
            order_checks: self.order_checks,
        })
    }
}

impl<'a, T: LabelledTips> TraversalTaskBuilder<'a, T> {
    /// Uses labelled observations, aligned to the tips of the tree by label.
    ///
    /// Alignment errors are reported by [build](TraversalTaskBuilder::build).
    pub fn with_observations(mut self, observations: TipObservations) -> Self {
        self.tip_states = Some(observations.aligned_to(self.tree.tip_labels()));
        self
    }
}
