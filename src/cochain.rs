//! Cochains, i.e. values assigned to the cells of a mesh,
//! and the operator algebra acting on them.
//!
//! Every operation validates its operands up front and returns a new
//! cochain; nothing is mutated in place. Operators that change
//! dimension or kind (coboundary, Hodge star, codifferential) pull the
//! sparse incidence matrices and volume ratios they need from the
//! cochain's complex, computing them lazily on first use.

use nalgebra as na;
use nalgebra_sparse as nas;

use itertools::izip;
use std::rc::Rc;

use crate::complex::{MeshError, SimplicialComplex};

/// Whether a cochain lives on the primal simplices or on the cells of
/// the circumcentric dual mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Values attached to the simplices of the mesh itself.
    Primal,
    /// Values attached to the dual cells; a dual `k`-cochain stores
    /// one coefficient per primal `(n-k)`-simplex.
    Dual,
}

/// Error in constructing a cochain or applying an operator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CochainError {
    /// The operands are bound to different complex instances.
    #[error("operands are bound to different complexes")]
    MismatchedComplex,
    /// The operands differ in dimension or primal/dual kind.
    #[error(
        "operand dimension/kind mismatch: {left_dim} ({left_kind:?}) vs {right_dim} ({right_kind:?})"
    )]
    MismatchedDimensionOrKind {
        /// Dimension of the left operand.
        left_dim: usize,
        /// Kind of the left operand.
        left_kind: Kind,
        /// Dimension of the right operand.
        right_dim: usize,
        /// Kind of the right operand.
        right_kind: Kind,
    },
    /// An operator was requested at a dimension where it is undefined.
    #[error("dimension {dim} out of range for {what} on a {complex_dim}-complex")]
    DimensionOutOfRange {
        /// The requested dimension.
        dim: usize,
        /// The operator that was requested.
        what: &'static str,
        /// Top dimension of the complex.
        complex_dim: usize,
    },
    /// The coefficient array length does not match the cell count.
    #[error("coefficient array of length {got}, expected {expected} for dimension {dim} ({kind:?})")]
    WrongLength {
        /// Supplied coefficient count.
        got: usize,
        /// Number of cells at this dimension and kind.
        expected: usize,
        /// Requested dimension.
        dim: usize,
        /// Requested kind.
        kind: Kind,
    },
    /// A geometric quantity needed by the operator failed to compute.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// A vector of values attached to the `dim`-dimensional cells of a
/// [`SimplicialComplex`], either primal or dual.
///
/// Cochains share the complex they are bound to; operations combining
/// two cochains require the *same* complex instance, not merely an
/// equal one.
#[derive(Clone, Debug)]
pub struct Cochain {
    complex: Rc<SimplicialComplex>,
    dim: usize,
    kind: Kind,
    values: na::DVector<f64>,
}

impl PartialEq for Cochain {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.complex, &other.complex)
            && self.dim == other.dim
            && self.kind == other.kind
            && self.values == other.values
    }
}

impl Cochain {
    /// Construct a cochain from a coefficient vector.
    ///
    /// The length must equal the complex's cell count at the given
    /// dimension and kind.
    pub fn new(
        complex: &Rc<SimplicialComplex>,
        dim: usize,
        kind: Kind,
        values: na::DVector<f64>,
    ) -> Result<Self, CochainError> {
        let expected = cell_count(complex, dim, kind)?;
        if values.len() != expected {
            return Err(CochainError::WrongLength {
                got: values.len(),
                expected,
                dim,
                kind,
            });
        }
        Ok(Self {
            complex: Rc::clone(complex),
            dim,
            kind,
            values,
        })
    }

    /// Construct a cochain of zeros at the given dimension and kind.
    pub fn zeros(
        complex: &Rc<SimplicialComplex>,
        dim: usize,
        kind: Kind,
    ) -> Result<Self, CochainError> {
        let len = cell_count(complex, dim, kind)?;
        Ok(Self {
            complex: Rc::clone(complex),
            dim,
            kind,
            values: na::DVector::zeros(len),
        })
    }

    /// Dimension of the cells this cochain assigns values to.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Primal or dual kind of this cochain.
    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The complex this cochain is bound to.
    #[inline]
    pub fn complex(&self) -> &Rc<SimplicialComplex> {
        &self.complex
    }

    /// The coefficient vector.
    #[inline]
    pub fn values(&self) -> &na::DVector<f64> {
        &self.values
    }

    /// Number of coefficients.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cochain has no coefficients.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dimension of the primal simplices indexing the coefficients.
    #[inline]
    fn primal_dim(&self) -> usize {
        match self.kind {
            Kind::Primal => self.dim,
            Kind::Dual => self.complex.dim() - self.dim,
        }
    }

    fn with_values(&self, dim: usize, kind: Kind, values: na::DVector<f64>) -> Self {
        Self {
            complex: Rc::clone(&self.complex),
            dim,
            kind,
            values,
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<(), CochainError> {
        if !Rc::ptr_eq(&self.complex, &other.complex) {
            return Err(CochainError::MismatchedComplex);
        }
        if self.dim != other.dim || self.kind != other.kind {
            return Err(CochainError::MismatchedDimensionOrKind {
                left_dim: self.dim,
                left_kind: self.kind,
                right_dim: other.dim,
                right_kind: other.kind,
            });
        }
        Ok(())
    }

    //
    // the algebra
    //

    /// Coefficientwise sum of two cochains of identical complex,
    /// dimension and kind.
    pub fn add(&self, other: &Self) -> Result<Self, CochainError> {
        self.check_compatible(other)?;
        Ok(self.with_values(self.dim, self.kind, &self.values + &other.values))
    }

    /// Coefficientwise difference of two compatible cochains.
    pub fn sub(&self, other: &Self) -> Result<Self, CochainError> {
        self.check_compatible(other)?;
        Ok(self.with_values(self.dim, self.kind, &self.values - &other.values))
    }

    /// Multiply every coefficient by a scalar.
    pub fn scale(&self, factor: f64) -> Self {
        self.with_values(self.dim, self.kind, factor * &self.values)
    }

    /// Apply a function to every coefficient, e.g. lifting `f64::sin`
    /// to cochains.
    pub fn map(&self, f: impl FnMut(f64) -> f64) -> Self {
        self.with_values(self.dim, self.kind, self.values.map(f))
    }

    /// The mass-weighted inner product `Σ aᵢ bᵢ wᵢ`, where the weight
    /// is the Hodge diagonal at this dimension (the inverse diagonal
    /// for dual cochains).
    ///
    /// Symmetric and bilinear; positive definite on well-centered
    /// meshes where all volume ratios are positive.
    pub fn inner_product(&self, other: &Self) -> Result<f64, CochainError> {
        self.check_compatible(other)?;
        let weights = match self.kind {
            Kind::Primal => self.complex.hodge_star(self.dim)?,
            Kind::Dual => self.complex.hodge_star_inverse(self.primal_dim())?,
        };
        Ok(izip!(self.values.iter(), other.values.iter(), weights)
            .map(|(a, b, w)| a * b * w)
            .sum())
    }

    /// The coboundary (exterior derivative) `d`, raising the dimension
    /// by one within the same kind.
    ///
    /// For primal cochains this applies the signed incidence matrix of
    /// the next dimension up; for dual cochains its transpose.
    pub fn coboundary(&self) -> Result<Self, CochainError> {
        let n = self.complex.dim();
        if self.dim >= n {
            return Err(CochainError::DimensionOutOfRange {
                dim: self.dim,
                what: "coboundary",
                complex_dim: n,
            });
        }
        let out_values = match self.kind {
            Kind::Primal => {
                apply_signed(self.complex.boundary_map(self.dim + 1)?, &self.values)
            }
            Kind::Dual => {
                // the coboundary on the dual mesh runs against the
                // primal incidence: one primal dimension down
                apply_signed(
                    self.complex.coboundary_map(self.primal_dim() - 1)?,
                    &self.values,
                )
            }
        };
        Ok(self.with_values(self.dim + 1, self.kind, out_values))
    }

    /// The diagonal Hodge star, mapping a primal `p`-cochain to a dual
    /// `(n-p)`-cochain by the dual/primal volume ratio, and a dual
    /// cochain back by the inverse ratio.
    ///
    /// Applying the star twice returns the original cochain scaled by
    /// `(-1)^{p(n-p)}`, with `p` the primal dimension; this round-trip
    /// law is part of the operator's contract and is verified by the
    /// property tests.
    pub fn star(&self) -> Result<Self, CochainError> {
        let n = self.complex.dim();
        let p = self.primal_dim();
        let (out_kind, diag, sign) = match self.kind {
            Kind::Primal => (Kind::Dual, self.complex.hodge_star(p)?, 1.0),
            Kind::Dual => (
                Kind::Primal,
                self.complex.hodge_star_inverse(p)?,
                neg_one_pow(p * (n - p)),
            ),
        };
        let out_values = na::DVector::from_iterator(
            self.values.len(),
            izip!(self.values.iter(), diag).map(|(v, d)| sign * v * d),
        );
        Ok(self.with_values(n - self.dim, out_kind, out_values))
    }

    /// The codifferential `δ`, lowering the dimension by one within
    /// the same kind: the signed composition `star ∘ coboundary ∘
    /// star`.
    ///
    /// The sign is chosen so that `δ` is exactly the adjoint of
    /// [`coboundary`][Self::coboundary] under
    /// [`inner_product`][Self::inner_product] on a closed mesh:
    /// `⟨da, b⟩ = ⟨a, δb⟩`.
    pub fn codifferential(&self) -> Result<Self, CochainError> {
        let n = self.complex.dim();
        if self.dim == 0 {
            return Err(CochainError::DimensionOutOfRange {
                dim: 0,
                what: "codifferential",
                complex_dim: n,
            });
        }
        let sign = match self.kind {
            // the dual star at the output dimension contributes
            // (-1)^{(p-1)(n-p+1)}; cancel it
            Kind::Primal => neg_one_pow((self.dim - 1) * (n - self.dim + 1)),
            // the dual star at the input contributes (-1)^{q(n-q)}
            Kind::Dual => {
                let q = self.primal_dim();
                neg_one_pow(q * (n - q))
            }
        };
        Ok(self.star()?.coboundary()?.star()?.scale(sign))
    }

    /// The Laplace-de Rham operator `δd + dδ`, with the undefined half
    /// omitted at the dimension extremes.
    ///
    /// Symmetric and positive semi-definite with respect to
    /// [`inner_product`][Self::inner_product] on closed meshes.
    pub fn laplace_de_rham(&self) -> Result<Self, CochainError> {
        let n = self.complex.dim();
        let up = if self.dim < n {
            Some(self.coboundary()?.codifferential()?)
        } else {
            None
        };
        let down = if self.dim > 0 {
            Some(self.codifferential()?.coboundary()?)
        } else {
            None
        };
        match (up, down) {
            (Some(u), Some(d)) => u.add(&d),
            (Some(u), None) => Ok(u),
            (None, Some(d)) => Ok(d),
            // a complex always has dimension at least 1,
            // so one of the halves exists
            (None, None) => unreachable!(),
        }
    }
}

/// Number of cells at a dimension and kind, range-checked.
fn cell_count(
    complex: &SimplicialComplex,
    dim: usize,
    kind: Kind,
) -> Result<usize, CochainError> {
    let n = complex.dim();
    if dim > n {
        return Err(CochainError::DimensionOutOfRange {
            dim,
            what: "cochain",
            complex_dim: n,
        });
    }
    let primal_dim = match kind {
        Kind::Primal => dim,
        Kind::Dual => n - dim,
    };
    Ok(complex.simplex_count(primal_dim))
}

/// Apply a signed incidence matrix to a coefficient vector without
/// materializing a floating-point copy of the matrix.
fn apply_signed(matrix: &nas::CsrMatrix<i8>, values: &na::DVector<f64>) -> na::DVector<f64> {
    let mut out = na::DVector::zeros(matrix.nrows());
    for (row_idx, row) in matrix.row_iter().enumerate() {
        let mut sum = 0.0;
        for (&col, &sign) in izip!(row.col_indices(), row.values()) {
            sum += sign as f64 * values[col];
        }
        out[row_idx] = sum;
    }
    out
}

#[inline]
fn neg_one_pow(exponent: usize) -> f64 {
    if exponent % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

//
// tests
//
