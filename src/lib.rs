//! `decal` is a toolkit for Discrete Exterior Calculus (DEC)
//! on simplicial complexes of arbitrary dimension.
//!
//! The core object is the [`SimplicialComplex`]:
//! it takes the vertex-index table of the top-dimensional simplices
//! plus vertex coordinates, enumerates every lower-dimensional face
//! with a canonical orientation, and derives the signed boundary
//! operators connecting the dimensions. Geometric quantities
//! (circumcenters, primal and dual volumes, the diagonal Hodge star)
//! are computed lazily on first access and memoized for the lifetime
//! of the complex.
//!
//! Values attached to the cells of a complex are [`Cochain`]s,
//! tagged with a dimension and a primal/dual [`Kind`].
//! The cochain algebra ([`Cochain::add`], [`Cochain::scale`],
//! [`Cochain::inner_product`], [`Cochain::coboundary`],
//! [`Cochain::star`], [`Cochain::codifferential`],
//! [`Cochain::laplace_de_rham`]) is pure: every operation
//! validates its operands and returns a new cochain.
//!
//! Physical models are assembled on top of the algebra as scalar
//! energy functionals implementing [`model::ScalarObjective`],
//! the calling convention consumed by external optimizers.
//! [`model::poisson`] and [`model::elastica`] are provided.
//!
//! Process-wide numeric configuration (precision regime, index width,
//! device) is selected once with [`config::configure`] before any
//! complex is built and is immutable afterwards.

#![warn(missing_docs)]

pub mod config;
#[doc(inline)]
pub use config::{configure, Config, ConfigError};

pub mod complex;
#[doc(inline)]
pub use complex::{MeshError, SimplicialComplex};

pub mod geometry;

pub mod cochain;
#[doc(inline)]
pub use cochain::{Cochain, CochainError, Kind};

pub mod model;

// nalgebra re-export for convenience, so downstream code
// can name vector types without adding the dependency itself
pub use nalgebra as na;

/// Type alias for the dynamically sized `nalgebra` vector
/// used for coefficients and coordinates throughout the crate.
pub type DVec = na::DVector<f64>;
