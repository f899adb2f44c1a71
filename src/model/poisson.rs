//! The Poisson problem in its Dirichlet-energy formulation.
//!
//! The energy of a primal 0-cochain `u` with a source `f` is
//!
//! ```text
//! E(u) = k/2 ⟨du, du⟩ + ⟨u, f⟩ + γ/2 Σ_b (u_b - g_b)²
//! ```
//!
//! where the last sum runs over the penalized Dirichlet constraints.
//! Minimizing `E` solves the discrete Poisson equation `k·Δu = -f`
//! with the constrained values held at the boundary.

use nalgebra as na;

use itertools::izip;
use std::rc::Rc;

use crate::cochain::{Cochain, CochainError, Kind};
use crate::complex::{MeshError, SimplicialComplex};
use crate::model::ScalarObjective;

/// A Poisson problem over the vertices of a complex.
///
/// Implements [`ScalarObjective`] with an analytic gradient, so it can
/// be handed directly to a gradient-based optimizer.
#[derive(Clone, Debug)]
pub struct PoissonProblem {
    complex: Rc<SimplicialComplex>,
    stiffness: f64,
    source: Cochain,
    boundary_values: Vec<(usize, f64)>,
    penalty: f64,
}

impl PoissonProblem {
    /// Set up a Poisson problem.
    ///
    /// `source` must be a primal 0-cochain; `boundary_values` are
    /// `(vertex index, imposed value)` pairs enforced through a
    /// quadratic penalty with coefficient `penalty`.
    ///
    /// The geometric quantities the energy depends on are computed
    /// here, so degenerate meshes fail at setup rather than in the
    /// middle of an optimization run.
    pub fn new(
        source: Cochain,
        stiffness: f64,
        boundary_values: Vec<(usize, f64)>,
        penalty: f64,
    ) -> Result<Self, CochainError> {
        if source.dim() != 0 || source.kind() != Kind::Primal {
            return Err(CochainError::MismatchedDimensionOrKind {
                left_dim: source.dim(),
                left_kind: source.kind(),
                right_dim: 0,
                right_kind: Kind::Primal,
            });
        }
        let complex = Rc::clone(source.complex());
        let vertex_count = complex.simplex_count(0);
        for &(vertex, _) in &boundary_values {
            if vertex >= vertex_count {
                return Err(CochainError::Mesh(MeshError::MalformedSimplex {
                    simplex: 0,
                    vertex,
                }));
            }
        }
        // resolve every lazy quantity the energy and gradient touch
        complex.hodge_star(0)?;
        complex.hodge_star(1)?;
        complex.hodge_star_inverse(0)?;

        Ok(Self {
            complex,
            stiffness,
            source,
            boundary_values,
            penalty,
        })
    }

    /// The Dirichlet energy of a candidate solution.
    pub fn energy(&self, u: &Cochain) -> Result<f64, CochainError> {
        let du = u.coboundary()?;
        let dirichlet = 0.5 * self.stiffness * du.inner_product(&du)?;
        let source_term = u.inner_product(&self.source)?;
        let penalty: f64 = self
            .boundary_values
            .iter()
            .map(|&(vertex, value)| {
                let r = u.values()[vertex] - value;
                r * r
            })
            .sum::<f64>()
            * 0.5
            * self.penalty;
        Ok(dirichlet + source_term + penalty)
    }

    /// The gradient of [`energy`][Self::energy] with respect to the
    /// nodal values: `H₀ ⊙ (k·Δu + f)` plus the penalty terms, with
    /// `Δ` the 0-dimensional Laplace-de Rham operator.
    pub fn energy_gradient(&self, u: &Cochain) -> Result<na::DVector<f64>, CochainError> {
        let laplacian = u.laplace_de_rham()?;
        let star_0 = self.complex.hodge_star(0)?;
        let mut grad = na::DVector::zeros(u.len());
        for (g, w, lap, f) in izip!(
            grad.iter_mut(),
            star_0,
            laplacian.values().iter(),
            self.source.values().iter(),
        ) {
            *g = w * (self.stiffness * lap + f);
        }
        for &(vertex, value) in &self.boundary_values {
            grad[vertex] += self.penalty * (u.values()[vertex] - value);
        }
        Ok(grad)
    }

    fn wrap(&self, x: &na::DVector<f64>) -> Cochain {
        Cochain::new(&self.complex, 0, Kind::Primal, x.clone())
            .expect("coefficient vector must have one entry per mesh vertex")
    }
}

impl ScalarObjective for PoissonProblem {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::line_mesh_1d;
    use approx::abs_diff_eq;

    fn uniform_problem(node_count: usize, source_value: f64) -> PoissonProblem {
        let mesh = Rc::new(line_mesh_1d(node_count, 1.0));
        let source = Cochain::zeros(&mesh, 0, Kind::Primal)
            .unwrap()
            .map(|_| source_value);
        PoissonProblem::new(source, 1.0, vec![(0, 0.0)], 1e6).unwrap()
    }

    /// Textbook conjugate gradient on the affine gradient field,
    /// standing in for an external optimizer. Consumes only the
    /// `ScalarObjective` interface.
    fn minimize_quadratic(obj: &impl ScalarObjective, x0: na::DVector<f64>) -> na::DVector<f64> {
        let g0 = obj.gradient(&na::DVector::zeros(x0.len())).unwrap();
        let apply_a = |v: &na::DVector<f64>| obj.gradient(v).unwrap() - &g0;
        let b = -&g0;

        let mut x = x0;
        let mut r = &b - apply_a(&x);
        let mut p = r.clone();
        let mut rs_old = r.dot(&r);
        for _ in 0..10 * b.len() {
            if rs_old.sqrt() < 1e-12 {
                break;
            }
            let ap = apply_a(&p);
            let alpha = rs_old / p.dot(&ap);
            x += alpha * &p;
            r -= alpha * &ap;
            let rs_new = r.dot(&r);
            p = &r + (rs_new / rs_old) * p;
            rs_old = rs_new;
        }
        x
    }

    /// Minimizing the Dirichlet energy on a uniform 1-D mesh with a
    /// constant source and a single constrained endpoint reproduces
    /// the closed-form quadratic solution at the nodes.
    #[test]
    fn solves_1d_poisson_against_closed_form() {
        let node_count = 11;
        let source_value = 4.0;
        let problem = uniform_problem(node_count, source_value);

        let u0 = na::DVector::from_iterator(
            node_count,
            (0..node_count).map(|i| 0.01 * ((i * 13 % 7) as f64 - 3.0)),
        );
        let u = minimize_quadratic(&problem, u0);

        // u'' = f/k with u(0) = 0 and a natural condition at x = 1
        // gives u(x) = (f/k) (x²/2 - x)
        for (i, &u_i) in u.iter().enumerate() {
            let x = i as f64 / (node_count - 1) as f64;
            let exact = source_value * (x * x / 2.0 - x);
            assert!(
                abs_diff_eq!(u_i, exact, epsilon = 1e-3),
                "node {i}: solved {u_i}, exact {exact}"
            );
        }

        // the minimum is below the energy of the zero guess
        let zero = na::DVector::zeros(node_count);
        assert!(problem.value(&u) < problem.value(&zero));
    }

    /// The analytic gradient matches central finite differences
    /// of the energy.
    #[test]
    fn gradient_matches_finite_differences() {
        let problem = uniform_problem(6, -2.5);
        let x = na::DVector::from_iterator(6, (0..6).map(|i| 0.3 * (i as f64).sin() - 0.1));
        let grad = problem.gradient(&x).unwrap();

        let eps = 1e-6;
        for i in 0..x.len() {
            let mut plus = x.clone();
            plus[i] += eps;
            let mut minus = x.clone();
            minus[i] -= eps;
            let fd = (problem.value(&plus) - problem.value(&minus)) / (2.0 * eps);
            // the penalty coefficient dwarfs the other terms at the
            // constrained node, so compare relative to its magnitude
            let scale = 1.0 + fd.abs();
            assert!(
                (grad[i] - fd).abs() / scale < 1e-4,
                "gradient component {i}: analytic {}, finite difference {fd}",
                grad[i]
            );
        }
    }

    #[test]
    fn rejects_bad_setup() {
        let mesh = Rc::new(line_mesh_1d(4, 1.0));
        // wrong source dimension
        let edge_source = Cochain::zeros(&mesh, 1, Kind::Primal).unwrap();
        assert!(matches!(
            PoissonProblem::new(edge_source, 1.0, vec![], 1.0),
            Err(CochainError::MismatchedDimensionOrKind { .. })
        ));

        // out-of-range constrained vertex
        let source = Cochain::zeros(&mesh, 0, Kind::Primal).unwrap();
        assert!(matches!(
            PoissonProblem::new(source, 1.0, vec![(17, 0.0)], 1.0),
            Err(CochainError::Mesh(MeshError::MalformedSimplex { .. }))
        ));
    }
}
