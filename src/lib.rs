//! Binpoisson computes the likelihood of binary trait data at the tips of a
//! rooted phylogenetic tree under a two-state continuous-time Markov model.
//!
//! The computation is Felsenstein's pruning algorithm specialized to two
//! states: a single post-order (tip-to-root) pass maintains, for every node,
//! the likelihood of the data below it conditional on the node's state.
//! Core functionality provided:
//! - Rate model: [RateModel] builds the generator from the rates `q01` and
//!   `q10`, caches its eigendecomposition once per parameter set and yields
//!   transition probability matrices for any branch length.
//! - Pruning: [BinaryPoissonPruning] holds the per-node partial likelihoods and
//!   implements the per-node operations (initialize, visit, reduce child into parent).
//! - Traversal contract: [traversal::Topology] and
//!   [traversal::TraversalSpecification] decouple the computation from tree
//!   types and from the driver, with [traversal::PostOrderTraversal] as
//!   sequential driver.
//! - Tree model: [model::PhyloTree] (arena pattern, tips first, root last) and
//!   labelled [model::TipObservations].
//! - Traversal task: [TraversalTask] bundles all of the above for repeated
//!   evaluation under changing rates.
//!
//! Limitations:
//! - Only binary traits with two rates
//! - No tree parsing; build trees via [model::PhyloTree] or bring your own [traversal::Topology]
//! - The result is the root vector `(L0, L1)`; weighing it with a root prior
//!   (e.g. [RateModel::equilibrium_frequencies]) is left to the caller
//!
//! # Example
//! ```
//! use binpoisson::model::{BranchLength, PhyloTree, TipObservations};
//! use binpoisson::root_likelihood;
//!
//! let mut tree = PhyloTree::new(2);
//! let a = tree.add_tip("A", BranchLength::new(0.1));
//! let b = tree.add_tip("B", BranchLength::new(0.2));
//! tree.add_root(vec![a, b]);
//!
//! let observations = TipObservations::from_raw(vec!["A".into(), "B".into()], &[0, 0])?;
//! let root = root_likelihood(&tree, &observations, 0.5, 0.5)?;
//! assert!(root.l0 > root.l1);
//! # Ok::<(), binpoisson::PruningError>(())
//! ```

pub mod error;
pub mod model;
pub mod pruning;
pub mod rate_model;
pub mod task;
pub mod traversal;

pub use error::{PruningError, Result};
pub use pruning::{BinaryPoissonPruning, PartialLikelihood};
pub use rate_model::RateModel;
pub use task::{TraversalTask, TraversalTaskBuilder};

use crate::model::{PhyloTree, TipObservations};

// ============================================================================
// Quick API
// ============================================================================
/// Computes the root partial likelihood vector for labelled `observations`
/// on `tree` with rates `q01` and `q10`, using default settings.
///
/// See [TraversalTaskBuilder] for configuration and repeated evaluation.
///
/// # Errors
/// - [Precondition](PruningError::Precondition) if `tree` is not valid
/// - [Shape](PruningError::Shape) if the observations do not match the tips
/// - [InvalidParameter](PruningError::InvalidParameter) for non-positive rates
pub fn root_likelihood(
    tree: &PhyloTree,
    observations: &TipObservations,
    q01: f64,
    q10: f64,
) -> Result<PartialLikelihood> {
    tree.validate()?;
    TraversalTaskBuilder::new(tree)
        .with_observations(observations.clone())
        .with_rates(q01, q10)
        .build()?
        .traverse()
}
