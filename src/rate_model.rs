//! Continuous-time two-state Markov model of binary trait evolution.
//!
//! The model is parameterized by the rate `q01` of switching from state 0 to
//! state 1 and the rate `q10` of switching back, giving the generator
//! ```text
//!     Q = | -q01   q01 |
//!         |  q10  -q10 |
//! ```
//! The transition probabilities over a branch of length `t` are
//! `P(t) = exp(Q t) = V · diag(exp(λ t)) · V⁻¹`, with eigenvalues `λ` and
//! eigenvectors `V` of `Q`. These are computed once per parameter set in
//! [RateModel::set_rates], so that each branch only costs an elementwise
//! exponential and two 2×2 products.
//!
//! For this generator the eigendecomposition is known in closed form:
//! ```text
//!     λ = (0, -(q01 + q10))
//!     V = | 1   q01 |      V⁻¹ = 1/(q01+q10) · | q10   q01 |
//!         | 1  -q10 |                           |  1    -1  |
//! ```

use crate::error::{PruningError, Result};
use nalgebra::{Matrix2, RowVector2, Vector2};
use tracing::{debug, warn};

/// Number of parameters of the model, `(q01, q10)`.
pub const NUM_PARAMETERS: usize = 2;

// =#========================================================================#=
// RATE MODEL
// =#========================================================================#=
/// Two-state rate model with cached eigendecomposition.
///
/// A new model is unparameterized; asking it for transition probabilities
/// fails with [PropagatedParameter](PruningError::PropagatedParameter) until
/// [RateModel::set_rates] succeeded. A failed call to `set_rates` invalidates
/// previously set rates.
///
/// # Example
/// ```
/// use binpoisson::RateModel;
///
/// let mut model = RateModel::new();
/// model.set_rates(0.5, 1.5)?;
///
/// let p = model.transition_matrix(0.7)?;
/// assert!((p[(0, 0)] + p[(0, 1)] - 1.0).abs() < 1e-12);
/// # Ok::<(), binpoisson::PruningError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateModel {
    eigen: Option<Eigensystem>,
}

/// Generator and its eigendecomposition for one parameter set.
#[derive(Debug, Clone)]
struct Eigensystem {
    q01: f64,
    q10: f64,
    generator: Matrix2<f64>,
    eigenvalues: Vector2<f64>,
    eigenvectors: Matrix2<f64>,
    eigenvectors_inv: Matrix2<f64>,
}

impl Eigensystem {
    fn new(q01: f64, q10: f64) -> Self {
        let total = q01 + q10;
        Eigensystem {
            q01,
            q10,
            generator: Matrix2::new(-q01, q01, q10, -q10),
            eigenvalues: Vector2::new(0.0, -total),
            eigenvectors: Matrix2::new(1.0, q01, 1.0, -q10),
            eigenvectors_inv: Matrix2::new(q10, q01, 1.0, -1.0) / total,
        }
    }
}

impl RateModel {
    /// Creates an unparameterized model.
    pub fn new() -> Self {
        RateModel { eigen: None }
    }

    /// Creates a model parameterized with `q01` and `q10`.
    ///
    /// # Errors
    /// See [RateModel::set_rates].
    pub fn with_rates(q01: f64, q10: f64) -> Result<Self> {
        let mut model = RateModel::new();
        model.set_rates(q01, q10)?;
        Ok(model)
    }

    /// Sets the rates and recomputes the cached eigendecomposition.
    ///
    /// # Errors
    /// [InvalidParameter](PruningError::InvalidParameter) unless both rates
    /// are strictly positive and finite. The model is left unparameterized then.
    pub fn set_rates(&mut self, q01: f64, q10: f64) -> Result<()> {
        if !(q01 > 0.0 && q10 > 0.0 && q01.is_finite() && q10.is_finite()) {
            self.eigen = None;
            warn!(q01, q10, "rejected non-positive transition rates");
            return Err(PruningError::invalid_parameter(format!(
                "the parameters q01 and q10 must be positive, got q01={q01} and q10={q10}"
            )));
        }

        let eigen = Eigensystem::new(q01, q10);
        debug!(
            q01,
            q10,
            lambda0 = eigen.eigenvalues[0],
            lambda1 = eigen.eigenvalues[1],
            "rate model parameterized"
        );
        self.eigen = Some(eigen);
        Ok(())
    }

    /// Sets the rates from a parameter vector `(q01, q10)`.
    ///
    /// # Errors
    /// [Shape](PruningError::Shape) if `parameters` does not have exactly two
    /// entries, otherwise as [RateModel::set_rates].
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        match *parameters {
            [q01, q10] => self.set_rates(q01, q10),
            _ => {
                self.eigen = None;
                Err(PruningError::shape_mismatch(
                    "parameter vector (q01, q10)",
                    NUM_PARAMETERS,
                    parameters.len(),
                ))
            }
        }
    }

    /// Returns `true` if rates are set.
    pub fn is_parameterized(&self) -> bool {
        self.eigen.is_some()
    }

    /// Returns the current rates `(q01, q10)`, if set.
    pub fn rates(&self) -> Option<(f64, f64)> {
        self.eigen.as_ref().map(|e| (e.q01, e.q10))
    }

    /// Returns the generator matrix `Q`, if set.
    pub fn generator(&self) -> Option<&Matrix2<f64>> {
        self.eigen.as_ref().map(|e| &e.generator)
    }

    /// Returns the eigenvalues of `Q`, if set.
    pub fn eigenvalues(&self) -> Option<&Vector2<f64>> {
        self.eigen.as_ref().map(|e| &e.eigenvalues)
    }

    /// Returns the transition probability matrix `P(t)`, where `P(t)[(i, j)]`
    /// is the probability of being in state `j` after time `t` when starting in state `i`.
    ///
    /// # Errors
    /// - [InvalidParameter](PruningError::InvalidParameter) if `t` is negative or not finite
    /// - [PropagatedParameter](PruningError::PropagatedParameter) if the model has no valid rates
    pub fn transition_matrix(&self, t: f64) -> Result<Matrix2<f64>> {
        let eigen = self.parameterized()?;
        if !(t >= 0.0 && t.is_finite()) {
            return Err(PruningError::invalid_parameter(format!(
                "branch length must be non-negative and finite, got {t}"
            )));
        }

        let decay = Matrix2::from_diagonal(&eigen.eigenvalues.map(|lambda| (lambda * t).exp()));
        Ok(eigen.eigenvectors * decay * eigen.eigenvectors_inv)
    }

    /// Returns the stationary distribution `(π0, π1) = (q10, q01) / (q01 + q10)`.
    ///
    /// This is the usual prior on the root state when reducing the root
    /// likelihood vector to a scalar.
    ///
    /// # Errors
    /// [PropagatedParameter](PruningError::PropagatedParameter) if the model has no valid rates.
    pub fn equilibrium_frequencies(&self) -> Result<RowVector2<f64>> {
        let eigen = self.parameterized()?;
        Ok(RowVector2::new(eigen.q10, eigen.q01) / (eigen.q01 + eigen.q10))
    }

    fn parameterized(&self) -> Result<&Eigensystem> {
        self.eigen.as_ref().ok_or_else(|| {
            PruningError::PropagatedParameter(
                "rates q01 and q10 have not been set successfully".to_string(),
            )
        })
    }
}
