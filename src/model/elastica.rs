//! Bending energy of an inextensible elastic rod, discretized over a
//! 1-dimensional complex.
//!
//! The rod's shape is described by the turning angle `θ`, a dual
//! 1-cochain (one value per node's dual segment). The energy of a
//! configuration under a distributed transverse load `A` is
//!
//! ```text
//! E(θ) = B/2 ⟨δθ, δθ⟩ - ⟨A, sin θ⟩
//! ```
//!
//! with `B` the bending stiffness and `δθ` the discrete curvature.

use nalgebra as na;

use itertools::izip;
use std::rc::Rc;

use crate::cochain::{Cochain, CochainError, Kind};
use crate::complex::SimplicialComplex;
use crate::model::ScalarObjective;

/// An elastic rod bending problem over a 1-dimensional complex.
///
/// Implements [`ScalarObjective`] with an analytic gradient.
#[derive(Clone, Debug)]
pub struct ElasticaProblem {
    complex: Rc<SimplicialComplex>,
    bending_stiffness: f64,
    load: Cochain,
}

impl ElasticaProblem {
    /// Set up a rod problem from a transverse load.
    ///
    /// `load` must be a dual 1-cochain on a 1-dimensional complex.
    /// Geometric quantities are resolved here so evaluation cannot
    /// fail later.
    pub fn new(load: Cochain, bending_stiffness: f64) -> Result<Self, CochainError> {
        let complex = Rc::clone(load.complex());
        if complex.dim() != 1 {
            return Err(CochainError::DimensionOutOfRange {
                dim: complex.dim(),
                what: "elastic rod model",
                complex_dim: 1,
            });
        }
        if load.dim() != 1 || load.kind() != Kind::Dual {
            return Err(CochainError::MismatchedDimensionOrKind {
                left_dim: load.dim(),
                left_kind: load.kind(),
                right_dim: 1,
                right_kind: Kind::Dual,
            });
        }
        complex.hodge_star(0)?;
        complex.hodge_star(1)?;
        complex.hodge_star_inverse(0)?;
        complex.hodge_star_inverse(1)?;

        Ok(Self {
            complex,
            bending_stiffness,
            load,
        })
    }

    /// The bending energy of an angle configuration.
    pub fn energy(&self, theta: &Cochain) -> Result<f64, CochainError> {
        let curvature = theta.codifferential()?;
        let bending =
            0.5 * self.bending_stiffness * curvature.inner_product(&curvature)?;
        let load_term = self.load.inner_product(&theta.map(f64::sin))?;
        Ok(bending - load_term)
    }

    /// The gradient of [`energy`][Self::energy] with respect to the
    /// angle values.
    ///
    /// The bending half reduces to pulling the curvature back through
    /// the transposed incidence (the dual coboundary) and weighting by
    /// the inverse Hodge diagonal; the load half is coefficientwise.
    pub fn energy_gradient(&self, theta: &Cochain) -> Result<na::DVector<f64>, CochainError> {
        let curvature = theta.codifferential()?;
        let pulled_back = curvature.coboundary()?;
        let star_0_inv = self.complex.hodge_star_inverse(0)?;

        let mut grad = na::DVector::zeros(theta.len());
        for (g, w, pb, a, t) in izip!(
            grad.iter_mut(),
            star_0_inv,
            pulled_back.values().iter(),
            self.load.values().iter(),
            theta.values().iter(),
        ) {
            *g = self.bending_stiffness * w * pb - w * a * t.cos();
        }
        Ok(grad)
    }

    fn wrap(&self, x: &na::DVector<f64>) -> Cochain {
        Cochain::new(&self.complex, 1, Kind::Dual, x.clone())
            .expect("coefficient vector must have one entry per mesh node")
    }
}

impl ScalarObjective for ElasticaProblem {
    fn dof_count(&self) -> usize {
        self.complex.simplex_count(0)
    }

    fn value(&self, x: &na::DVector<f64>) -> f64 {
        self.energy(&self.wrap(x))
            .expect("geometry was validated at problem setup")
    }

    fn gradient(&self, x: &na::DVector<f64>) -> Option<na::DVector<f64>> {
        Some(
            self.energy_gradient(&self.wrap(x))
                .expect("geometry was validated at problem setup"),
        )
    }
}
