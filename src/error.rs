//! Error type for rate-model parameterization and likelihood pruning.
//!
//! All fallible operations of this crate return [PruningError], grouped into
//! four kinds:
//! - [Shape](PruningError::Shape): counts or lengths that do not line up
//!   (observations vs. tips, parameter vector length, tip labels)
//! - [InvalidParameter](PruningError::InvalidParameter): values outside their
//!   domain (non-positive rates, negative branch lengths, non-binary states)
//! - [Precondition](PruningError::Precondition): calls made out of order,
//!   e.g. querying the root before the traversal finished
//! - [PropagatedParameter](PruningError::PropagatedParameter): using a rate
//!   model that was never parameterized or got invalidated

use thiserror::Error;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, PruningError>;

// =#========================================================================#=
// PRUNING ERROR
// =#========================================================================#=
/// Errors raised while parameterizing the rate model or pruning a tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PruningError {
    /// Sizes of inputs do not match (detected eagerly, before any traversal).
    #[error("shape mismatch - {0}")]
    Shape(String),

    /// A value lies outside of its admissible domain.
    #[error("invalid parameter - {0}")]
    InvalidParameter(String),

    /// An operation was invoked before its requirements were met.
    #[error("precondition violated - {0}")]
    Precondition(String),

    /// The rate model cannot provide transition probabilities.
    #[error("rate model unusable - {0}")]
    PropagatedParameter(String),
}

impl PruningError {
    /// Convenience constructor for a count mismatch of `what`.
    pub fn shape_mismatch(what: &str, expected: usize, found: usize) -> Self {
        PruningError::Shape(format!("{what} must have length {expected}, but has {found}"))
    }

    /// Convenience constructor for an out-of-domain value.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        PruningError::InvalidParameter(msg.into())
    }

    /// Convenience constructor for an out-of-order call.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        PruningError::Precondition(msg.into())
    }

    /// Returns `true` for errors caused by the shape of the inputs.
    pub fn is_shape(&self) -> bool {
        matches!(self, PruningError::Shape(_))
    }
}
