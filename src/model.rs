//! Physical models assembled from the cochain algebra.
//!
//! A model is a scalar energy functional over one or more cochains,
//! exposed to external optimization routines through the
//! [`ScalarObjective`] trait: a function of a flat coefficient vector,
//! optionally paired with its gradient. The crate implements no
//! optimizer itself; anything that consumes `(objective, gradient,
//! initial guess)` and produces a coefficient vector can drive these
//! models.

pub mod elastica;
pub mod poisson;

use nalgebra as na;

/// A scalar objective function over a flat coefficient vector,
/// the calling convention consumed by external optimizers.
pub trait ScalarObjective {
    /// Number of coefficients the objective expects.
    fn dof_count(&self) -> usize;

    /// The objective value at `x`.
    ///
    /// `x` must have exactly [`dof_count`][Self::dof_count] entries.
    fn value(&self, x: &na::DVector<f64>) -> f64;

    /// The gradient of the objective at `x`, for optimizers that can
    /// exploit one. The default implementation reports none.
    fn gradient(&self, _x: &na::DVector<f64>) -> Option<na::DVector<f64>> {
        None
    }
}
