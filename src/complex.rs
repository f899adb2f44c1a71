//! The core discretization structure of DEC, the simplicial complex.

/// Combinatorial construction of the simplex tables and boundary maps,
/// plus the shared test meshes.
mod construction;
#[doc(hidden)]
pub use construction::{
    circle_mesh_1d, line_mesh_1d, octahedron_sphere, tiny_mesh_2d, tiny_mesh_3d,
};

use fixedbitset as fb;
use nalgebra as na;
use nalgebra_sparse as nas;

use std::{cell::OnceCell, collections::HashMap};

use crate::geometry;

/// Error in constructing a complex or accessing one of its operators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// A top-dimensional simplex in the input incidence list contains
    /// a repeated or out-of-range vertex index.
    #[error("malformed simplex {simplex}: vertex index {vertex} is repeated or out of range")]
    MalformedSimplex {
        /// Index of the offending top-dimensional simplex in the input.
        simplex: usize,
        /// The repeated or invalid vertex index.
        vertex: usize,
    },
    /// A geometric computation on a simplex was singular or
    /// ill-conditioned beyond the configured tolerance.
    #[error("degenerate {dim}-simplex {simplex}: {detail}")]
    NumericDegeneracy {
        /// Dimension of the degenerate simplex.
        dim: usize,
        /// Index of the degenerate simplex within its dimension.
        simplex: usize,
        /// Which computation failed.
        detail: &'static str,
    },
    /// An operator or quantity was requested at a dimension outside
    /// the valid range for this complex.
    #[error("dimension {dim} out of range for {what} on a {complex_dim}-complex")]
    DimensionOutOfRange {
        /// The requested dimension.
        dim: usize,
        /// The operator or quantity that was requested.
        what: &'static str,
        /// Top dimension of the complex.
        complex_dim: usize,
    },
    /// The vertex coordinate rows do not all share one ambient dimension.
    #[error("vertex {vertex} has {got} coordinates, expected {ambient_dim}")]
    RaggedCoordinates {
        /// Index of the offending vertex.
        vertex: usize,
        /// Ambient dimension established by the first vertex.
        ambient_dim: usize,
        /// Number of coordinates found.
        got: usize,
    },
    /// The flat index list does not divide evenly into simplices.
    #[error("index list of length {len} does not divide into simplices of {simplex_size} vertices")]
    TruncatedIndexList {
        /// Length of the flat index list.
        len: usize,
        /// Vertices per top-dimensional simplex.
        simplex_size: usize,
    },
    /// The complex dimension exceeds the ambient space dimension,
    /// or a 0-dimensional complex was requested.
    #[error("complex dimension {dim} invalid for ambient dimension {ambient_dim}")]
    InvalidDimension {
        /// Requested top dimension.
        dim: usize,
        /// Ambient dimension of the coordinates.
        ambient_dim: usize,
    },
    /// A mesh size exceeds the limit of the configured index width.
    #[error("mesh size {count} exceeds the configured index width limit {max}")]
    IndexWidthExceeded {
        /// The offending count.
        count: usize,
        /// Largest count the configuration accepts.
        max: usize,
    },
    /// A replacement coordinate array does not have one row per vertex.
    #[error("got {got} coordinate rows for a complex with {expected} vertices")]
    VertexCountMismatch {
        /// Number of rows supplied.
        got: usize,
        /// Number of vertices in the complex.
        expected: usize,
    },
}

/// A discretized manifold: simplex tables for every dimension,
/// signed boundary operators between them, and lazily computed
/// circumcentric geometry.
///
/// Topology is immutable after construction. Vertex coordinates can be
/// replaced with [`set_vertex_coords`][Self::set_vertex_coords], which
/// invalidates every cached geometric quantity.
#[derive(Debug)]
pub struct SimplicialComplex {
    dim: usize,
    ambient_dim: usize,
    vertices: Vec<na::DVector<f64>>,
    /// one collection per dimension 0..=dim
    simplices: Vec<SimplexCollection>,
    /// orientation of each top simplex relative to its canonical
    /// (sorted) vertex order, +1 for even input permutations
    orientations: Vec<i8>,
    well_centered: bool,
    geometry: GeometryCache,
}

/// Storage for all simplices of one dimension.
#[derive(Debug)]
pub(crate) struct SimplexCollection {
    /// points per simplex in the storage Vec
    pub simplex_size: usize,
    /// canonically sorted vertex indices, stored flat to avoid
    /// per-dimension generics
    pub indices: Vec<usize>,
    /// map from the vertex indices of a simplex to its index in this
    /// collection, built lazily in `find_simplex_index`
    index_map: OnceCell<HashMap<Vec<usize>, usize>>,
    /// rows correspond to simplices of this dimension, columns to their
    /// codimension-1 faces, values to the relative orientation.
    /// empty matrix with zero columns at dimension 0.
    pub boundary_map: nas::CsrMatrix<i8>,
    /// transpose of the next dimension's `boundary_map`, stored for
    /// efficient coface navigation. zero columns at the top dimension.
    pub coboundary_map: nas::CsrMatrix<i8>,
    /// simplices lying on the boundary of the mesh
    pub mesh_boundary: fb::FixedBitSet,
}

impl Default for SimplexCollection {
    fn default() -> Self {
        // empty collections to be filled during construction;
        // the sparse matrix types provide no Default themselves
        Self {
            simplex_size: 0,
            indices: Vec::new(),
            index_map: OnceCell::new(),
            boundary_map: nas::CsrMatrix::zeros(0, 0),
            coboundary_map: nas::CsrMatrix::zeros(0, 0),
            mesh_boundary: fb::FixedBitSet::default(),
        }
    }
}

impl SimplexCollection {
    /// Get the number of simplices in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len() / self.simplex_size
    }

    /// Get the slice of vertex indices corresponding to a single simplex.
    #[inline]
    pub fn simplex_indices(&self, simplex_idx: usize) -> &[usize] {
        let start = simplex_idx * self.simplex_size;
        &self.indices[start..start + self.simplex_size]
    }
}

/// Memoized geometric quantities, all pure functions of
/// (topology, vertex coordinates).
#[derive(Debug, Default)]
struct GeometryCache {
    /// circumcenters per dimension 1..=dim (0-simplices are the
    /// vertices themselves), plus the barycentric coordinates of each
    /// circumcenter within its simplex, needed for dual volume signs
    circumcenters: OnceCell<geometry::Circumcenters>,
    /// unsigned primal volumes per dimension 0..=dim
    primal_volumes: OnceCell<Vec<Vec<f64>>>,
    /// signed dual volumes per dimension 0..=dim
    dual_volumes: OnceCell<Vec<Vec<f64>>>,
    /// dual/primal volume ratio per dimension 0..=dim
    hodge_star: OnceCell<Vec<Vec<f64>>>,
    /// primal/dual volume ratio per dimension 0..=dim
    hodge_star_inverse: OnceCell<Vec<Vec<f64>>>,
}

impl SimplicialComplex {
    /// Construct a complex from vertex coordinates and the flat
    /// vertex-index list of its top-dimensional simplices,
    /// where every `dim + 1` consecutive indices form one simplex.
    ///
    /// The orientation of each top simplex is taken from the order its
    /// vertices are listed in. Dual volumes are computed with the
    /// general signed accumulation valid for non-well-centered meshes;
    /// use [`new_well_centered`][Self::new_well_centered] when every
    /// circumcenter is known to lie inside its simplex.
    pub fn new(
        dim: usize,
        vertices: Vec<na::DVector<f64>>,
        indices: Vec<usize>,
    ) -> Result<Self, MeshError> {
        construction::build_complex(dim, vertices, indices, false)
    }

    /// Construct a complex known to be well-centered.
    ///
    /// The dual-volume accumulation skips orientation bookkeeping
    /// entirely; the choice is fixed here, once, so no data-dependent
    /// branch appears in any per-call numeric path.
    pub fn new_well_centered(
        dim: usize,
        vertices: Vec<na::DVector<f64>>,
        indices: Vec<usize>,
    ) -> Result<Self, MeshError> {
        construction::build_complex(dim, vertices, indices, true)
    }

    pub(crate) fn from_parts(
        dim: usize,
        ambient_dim: usize,
        vertices: Vec<na::DVector<f64>>,
        simplices: Vec<SimplexCollection>,
        orientations: Vec<i8>,
        well_centered: bool,
    ) -> Self {
        Self {
            dim,
            ambient_dim,
            vertices,
            simplices,
            orientations,
            well_centered,
            geometry: GeometryCache::default(),
        }
    }

    /// Orientation of each top-dimensional simplex relative to its
    /// canonically sorted vertex order: +1 when the input listed the
    /// vertices in an even permutation of ascending order, -1 for odd.
    pub fn top_orientations(&self) -> &[i8] {
        &self.orientations
    }

    /// Top dimension of the complex.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Dimension of the space the vertex coordinates live in.
    #[inline]
    pub fn ambient_dim(&self) -> usize {
        self.ambient_dim
    }

    /// Whether the complex was constructed with the well-centered
    /// dual-volume strategy.
    #[inline]
    pub fn is_well_centered(&self) -> bool {
        self.well_centered
    }

    /// Get a slice of all vertex coordinates in the complex.
    #[inline]
    pub fn vertices(&self) -> &[na::DVector<f64>] {
        &self.vertices
    }

    /// Get the number of `dim`-simplices in the complex.
    ///
    /// Panics if `dim > self.dim()`; use the operator accessors for
    /// range-checked access.
    #[inline]
    pub fn simplex_count(&self, dim: usize) -> usize {
        self.simplices[dim].len()
    }

    pub(crate) fn collection(&self, dim: usize) -> &SimplexCollection {
        &self.simplices[dim]
    }

    /// Access the vertex indices of the `dim`-simplices as a chunked
    /// iterator where each element is one simplex's sorted index slice.
    pub fn simplex_indices(
        &self,
        dim: usize,
    ) -> Result<std::slice::ChunksExact<'_, usize>, MeshError> {
        self.check_dim(dim, "simplex indices")?;
        let coll = &self.simplices[dim];
        Ok(coll.indices.chunks_exact(coll.simplex_size))
    }

    /// Find the index of a `dim`-simplex given its sorted vertex indices.
    ///
    /// Returns None if no such simplex exists, which is always the case
    /// if the slice length isn't `dim + 1`.
    pub fn find_simplex_index(&self, dim: usize, indices: &[usize]) -> Option<usize> {
        let coll = self.simplices.get(dim)?;
        let index_map = coll.index_map.get_or_init(|| {
            coll.indices
                .chunks_exact(coll.simplex_size)
                .enumerate()
                .map(|(i, vert_is)| (Vec::from(vert_is), i))
                .collect()
        });
        index_map.get(indices).copied()
    }

    /// The signed incidence matrix between `p`-simplices (rows) and
    /// their `(p-1)`-faces (columns), valid for `p` in `1..=dim`.
    ///
    /// Applied to a `(p-1)`-cochain coefficient vector this matrix is
    /// the coboundary `d_{p-1}`; transposed, it is the boundary
    /// operator on `p`-chains. The composition of two successive
    /// boundary maps vanishes identically in integer arithmetic.
    pub fn boundary_map(&self, p: usize) -> Result<&nas::CsrMatrix<i8>, MeshError> {
        if p == 0 || p > self.dim {
            return Err(MeshError::DimensionOutOfRange {
                dim: p,
                what: "boundary operator",
                complex_dim: self.dim,
            });
        }
        Ok(&self.simplices[p].boundary_map)
    }

    /// Transpose of [`boundary_map`][Self::boundary_map]`(p + 1)`:
    /// rows are `p`-simplices, columns their cofaces.
    /// Valid for `p` in `0..dim`.
    pub fn coboundary_map(&self, p: usize) -> Result<&nas::CsrMatrix<i8>, MeshError> {
        if p >= self.dim {
            return Err(MeshError::DimensionOutOfRange {
                dim: p,
                what: "coboundary operator",
                complex_dim: self.dim,
            });
        }
        Ok(&self.simplices[p].coboundary_map)
    }

    /// The set of `dim`-simplices on the boundary of the mesh.
    ///
    /// A codimension-1 simplex is on the boundary when it has exactly
    /// one coface; lower dimensions are closed downwards from there.
    /// The set at the top dimension is always empty.
    pub fn mesh_boundary(&self, dim: usize) -> Result<&fb::FixedBitSet, MeshError> {
        self.check_dim(dim, "mesh boundary")?;
        Ok(&self.simplices[dim].mesh_boundary)
    }

    /// Whether the mesh has no boundary (e.g. a circle or a sphere).
    pub fn is_closed(&self) -> bool {
        self.simplices[self.dim - 1].mesh_boundary.count_ones(..) == 0
    }

    /// Circumcenters of the `dim`-simplices.
    ///
    /// For `dim == 0` these are the vertices themselves. Computed for
    /// every dimension on first access and memoized; a degenerate
    /// simplex fails with [`MeshError::NumericDegeneracy`].
    pub fn circumcenters(&self, dim: usize) -> Result<&[na::DVector<f64>], MeshError> {
        self.check_dim(dim, "circumcenters")?;
        if dim == 0 {
            return Ok(&self.vertices);
        }
        Ok(&self.circumcenter_data()?.centers[dim - 1])
    }

    /// Barycentric coordinates of each `dim`-simplex's circumcenter
    /// with respect to that simplex, flattened in chunks of `dim + 1`.
    ///
    /// Negative coordinates identify non-well-centered simplices.
    /// Defined for `dim` in `1..=self.dim()`.
    pub fn circumcenter_barycentric(&self, dim: usize) -> Result<&[f64], MeshError> {
        if dim == 0 || dim > self.dim {
            return Err(MeshError::DimensionOutOfRange {
                dim,
                what: "circumcenter barycentric coordinates",
                complex_dim: self.dim,
            });
        }
        Ok(&self.circumcenter_data()?.barycentric[dim - 1])
    }

    fn circumcenter_data(&self) -> Result<&geometry::Circumcenters, MeshError> {
        if self.geometry.circumcenters.get().is_none() {
            let computed = geometry::compute_circumcenters(self)?;
            let _ = self.geometry.circumcenters.set(computed);
        }
        Ok(self
            .geometry
            .circumcenters
            .get()
            .expect("circumcenter cache was just populated"))
    }

    /// Unsigned volumes of the `dim`-simplices
    /// (1 for every 0-simplex by convention).
    pub fn primal_volumes(&self, dim: usize) -> Result<&[f64], MeshError> {
        self.check_dim(dim, "primal volumes")?;
        if self.geometry.primal_volumes.get().is_none() {
            let computed = geometry::compute_primal_volumes(self)?;
            let _ = self.geometry.primal_volumes.set(computed);
        }
        Ok(&self
            .geometry
            .primal_volumes
            .get()
            .expect("primal volume cache was just populated")[dim])
    }

    /// Volumes of the circumcentric dual cells of the `dim`-simplices
    /// (1 for every top simplex's dual vertex by convention).
    ///
    /// Elementary dual pieces are accumulated with orientation signs,
    /// so on a non-well-centered mesh individual entries can be zero
    /// or negative. Circumcenters are computed first if they have not
    /// been requested yet.
    pub fn dual_volumes(&self, dim: usize) -> Result<&[f64], MeshError> {
        self.check_dim(dim, "dual volumes")?;
        if self.geometry.dual_volumes.get().is_none() {
            // resolve the prerequisite regardless of external call order
            self.circumcenter_data()?;
            let computed = geometry::compute_dual_volumes(self)?;
            let _ = self.geometry.dual_volumes.set(computed);
        }
        Ok(&self
            .geometry
            .dual_volumes
            .get()
            .expect("dual volume cache was just populated")[dim])
    }

    /// The diagonal of the discrete Hodge star at dimension `dim`:
    /// the ratio of dual to primal volume per `dim`-simplex.
    pub fn hodge_star(&self, dim: usize) -> Result<&[f64], MeshError> {
        self.check_dim(dim, "Hodge star")?;
        if self.geometry.hodge_star.get().is_none() {
            let computed = geometry::compute_hodge_star(self)?;
            let _ = self.geometry.hodge_star.set(computed);
        }
        Ok(&self
            .geometry
            .hodge_star
            .get()
            .expect("Hodge star cache was just populated")[dim])
    }

    /// The diagonal of the inverse Hodge star at dimension `dim`:
    /// the ratio of primal to dual volume per `dim`-simplex.
    ///
    /// Fails with [`MeshError::NumericDegeneracy`] if some dual volume
    /// is below the configured tolerance, which can happen on
    /// non-well-centered meshes where elementary duals cancel.
    pub fn hodge_star_inverse(&self, dim: usize) -> Result<&[f64], MeshError> {
        self.check_dim(dim, "inverse Hodge star")?;
        if self.geometry.hodge_star_inverse.get().is_none() {
            let computed = geometry::compute_hodge_star_inverse(self)?;
            let _ = self.geometry.hodge_star_inverse.set(computed);
        }
        Ok(&self
            .geometry
            .hodge_star_inverse
            .get()
            .expect("inverse Hodge star cache was just populated")[dim])
    }

    /// Replace the vertex coordinates, keeping the topology.
    ///
    /// Every cached geometric quantity is invalidated and recomputed
    /// on next access. Intended for registration of perturbed
    /// coordinates in differentiable pipelines; requires exclusive
    /// access, so no cochains may be borrowing the complex.
    pub fn set_vertex_coords(
        &mut self,
        vertices: Vec<na::DVector<f64>>,
    ) -> Result<(), MeshError> {
        if vertices.len() != self.vertices.len() {
            return Err(MeshError::VertexCountMismatch {
                got: vertices.len(),
                expected: self.vertices.len(),
            });
        }
        for (i, v) in vertices.iter().enumerate() {
            if v.len() != self.ambient_dim {
                return Err(MeshError::RaggedCoordinates {
                    vertex: i,
                    ambient_dim: self.ambient_dim,
                    got: v.len(),
                });
            }
        }
        self.vertices = vertices;
        self.geometry = GeometryCache::default();
        Ok(())
    }

    fn check_dim(&self, dim: usize, what: &'static str) -> Result<(), MeshError> {
        if dim > self.dim {
            return Err(MeshError::DimensionOutOfRange {
                dim,
                what,
                complex_dim: self.dim,
            });
        }
        Ok(())
    }
}
