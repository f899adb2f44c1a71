//! Purely combinatorial construction of a simplicial complex:
//! face enumeration, canonical orientation, and boundary maps.
//! No floating-point arithmetic happens here.

use nalgebra as na;
use nalgebra_sparse as nas;

use itertools::{izip, Itertools};

use super::{MeshError, SimplexCollection, SimplicialComplex};
use crate::config::Config;

/// Build a complex from the flat vertex-index list of its
/// top-dimensional simplices.
///
/// Face enumeration works top-down: every unique subset of `p` vertices
/// of a `p`-simplex is one of its boundary faces, with the alternating
/// sign rule giving the relative orientation. Faces are deduplicated by
/// lexicographic sorting, which also fixes the index assignment, so the
/// same input always produces the same tables.
pub(super) fn build_complex(
    dim: usize,
    vertices: Vec<na::DVector<f64>>,
    mut indices: Vec<usize>,
    well_centered: bool,
) -> Result<SimplicialComplex, MeshError> {
    let config = Config::global();

    let ambient_dim = vertices.first().map(|v| v.len()).unwrap_or(0);
    for (i, v) in vertices.iter().enumerate() {
        if v.len() != ambient_dim {
            return Err(MeshError::RaggedCoordinates {
                vertex: i,
                ambient_dim,
                got: v.len(),
            });
        }
    }
    if dim == 0 || dim > ambient_dim {
        return Err(MeshError::InvalidDimension { dim, ambient_dim });
    }

    let simplex_size = dim + 1;
    if indices.len() % simplex_size != 0 {
        return Err(MeshError::TruncatedIndexList {
            len: indices.len(),
            simplex_size,
        });
    }
    let top_count = indices.len() / simplex_size;
    let max_index = config.max_index();
    if vertices.len() > max_index || top_count > max_index {
        return Err(MeshError::IndexWidthExceeded {
            count: vertices.len().max(top_count),
            max: max_index,
        });
    }

    // canonicalize each top simplex to ascending vertex order,
    // keeping the parity of the input ordering as the orientation
    // of the simplex. validation happens in the same pass.
    let mut orientations: Vec<i8> = Vec::with_capacity(top_count);
    for (simplex_idx, simplex) in indices.chunks_exact_mut(simplex_size).enumerate() {
        for &v in simplex.iter() {
            if v >= vertices.len() {
                return Err(MeshError::MalformedSimplex {
                    simplex: simplex_idx,
                    vertex: v,
                });
            }
        }
        let parity = sort_counting_swaps(simplex);
        if let Some(w) = simplex.windows(2).find(|w| w[0] == w[1]) {
            return Err(MeshError::MalformedSimplex {
                simplex: simplex_idx,
                vertex: w[0],
            });
        }
        orientations.push(if parity % 2 == 0 { 1 } else { -1 });
    }

    // collection for every dimension of simplex, including 0
    // (even though those are just the vertices),
    // for unified storage and iteration
    let mut simplices: Vec<SimplexCollection> = (0..=dim)
        .map(|p| SimplexCollection {
            simplex_size: p + 1,
            ..Default::default()
        })
        .collect();
    simplices[0].indices = (0..vertices.len()).collect();
    simplices[dim].indices = indices;

    // the rest of the levels are inferred
    // from boundaries of the top-level simplices
    for upper_dim in (1..=dim).rev() {
        let (head, tail) = simplices.split_at_mut(upper_dim);
        let lower = &mut head[upper_dim - 1];
        let upper = &mut tail[0];
        let upper_size = upper.simplex_size;
        // only the top level can carry nontrivial input parity;
        // all lower levels are generated already sorted
        let top_signs: Option<&[i8]> = (upper_dim == dim).then_some(orientations.as_slice());

        if upper_dim == 1 {
            // boundary simplices of edges are the vertices themselves,
            // whose indices are already fixed; a COO matrix suffices
            // since no deduplication is needed
            let mut boundary_coo = nas::CooMatrix::new(upper.len(), vertices.len());
            for (simplex_idx, edge) in upper.indices.chunks_exact(2).enumerate() {
                let sign = top_signs.map_or(1, |s| s[simplex_idx]);
                boundary_coo.push(simplex_idx, edge[0], -sign);
                boundary_coo.push(simplex_idx, edge[1], sign);
            }
            let boundary_map = nas::CsrMatrix::from(&boundary_coo);
            lower.coboundary_map = boundary_map.transpose();
            upper.boundary_map = boundary_map;
            continue;
        }
        let lower_size = lower.simplex_size;

        // buffers collecting the vertex indices, orientations,
        // and parent simplices of every boundary face, duplicates included
        let boundary_count = upper.len() * upper_size;
        let mut face_indices: Vec<usize> = Vec::with_capacity(boundary_count * lower_size);
        let mut face_orientations: Vec<i8> = Vec::with_capacity(boundary_count);
        let mut face_parents: Vec<usize> = Vec::with_capacity(boundary_count);

        for (parent_idx, parent) in upper.indices.chunks_exact(upper_size).enumerate() {
            let parent_sign = top_signs.map_or(1, |s| s[parent_idx]);
            // every combination that omits one vertex
            // is a face on the boundary of the parent
            for exclude_idx in 0..upper_size {
                for (i, &v) in parent.iter().enumerate() {
                    if i != exclude_idx {
                        face_indices.push(v);
                    }
                }
                // omitting the i-th vertex contributes the alternating
                // sign (-1)^i relative to the parent's orientation
                let omission_sign: i8 = if exclude_idx % 2 == 0 { 1 } else { -1 };
                face_orientations.push(omission_sign * parent_sign);
                face_parents.push(parent_idx);
            }
        }

        // sort faces lexicographically by vertex indices;
        // duplicates become adjacent and the surviving order
        // is the deterministic index assignment for this dimension
        let mut sorted_face_indices = Vec::with_capacity(face_indices.len());
        let mut sorted_orientations = Vec::with_capacity(face_orientations.len());
        let mut sorted_parents = Vec::with_capacity(face_parents.len());
        for (chunk, ori, parent) in izip!(
            face_indices.chunks_exact(lower_size),
            &face_orientations,
            &face_parents,
        )
        .sorted_unstable_by_key(|(chunk, _, _)| *chunk)
        {
            sorted_face_indices.extend_from_slice(chunk);
            sorted_orientations.push(*ori);
            sorted_parents.push(*parent);
        }

        // we're building the matrix where rows are the deduplicated
        // faces and columns their parent simplices; only row offsets
        // need constructing, the entries are already in order
        let mut row_offsets: Vec<usize> = vec![0];
        let mut face_iter = sorted_face_indices
            .chunks_exact(lower_size)
            .enumerate()
            .peekable();
        while let Some((face_idx, chunk)) = face_iter.next() {
            // a duplicate face stays on the same row,
            // marking it as a boundary of multiple parents
            if matches!(face_iter.peek(), Some((_, next)) if *next == chunk) {
                continue;
            }
            row_offsets.push(face_idx + 1);
            lower.indices.extend_from_slice(chunk);
        }

        let row_count = lower.len();
        let col_count = upper.len();
        let coboundary_map = nas::CsrMatrix::try_from_unsorted_csr_data(
            row_count,
            col_count,
            row_offsets,
            sorted_parents,
            sorted_orientations,
        )
        .expect("face incidence data was not valid CSR. This is a bug in decal");

        upper.boundary_map = coboundary_map.transpose();
        lower.coboundary_map = coboundary_map;
    }

    for coll in &simplices {
        if coll.len() > max_index {
            return Err(MeshError::IndexWidthExceeded {
                count: coll.len(),
                max: max_index,
            });
        }
    }

    // set dimensions of the empty 0-boundary and top-coboundary
    // matrices so that row indexing works on them too
    simplices[0].boundary_map = nas::CsrMatrix::zeros(simplices[0].len(), 0);
    simplices[dim].coboundary_map = nas::CsrMatrix::zeros(simplices[dim].len(), 0);

    //
    // identify the mesh boundary
    //

    for coll in &mut simplices {
        coll.mesh_boundary.grow(coll.len());
    }

    // a codimension-1 simplex with exactly one coface
    // is on the boundary of the mesh
    let codim_1 = &mut simplices[dim - 1];
    let coboundary_map = &codim_1.coboundary_map;
    let mesh_boundary = &mut codim_1.mesh_boundary;
    for (row_idx, coboundary_row) in coboundary_map.row_iter().enumerate() {
        if coboundary_row.nnz() == 1 {
            mesh_boundary.insert(row_idx);
        }
    }

    // close the boundary sets downwards:
    // every face of a boundary simplex is also on the boundary
    let mut level_iter = simplices.iter_mut().rev().skip(1).peekable();
    while let Some(upper) = level_iter.next() {
        let Some(lower) = level_iter.peek_mut() else {
            break;
        };
        for simplex_idx in upper.mesh_boundary.ones() {
            for face_idx in upper.boundary_map.row(simplex_idx).col_indices() {
                lower.mesh_boundary.insert(*face_idx);
            }
        }
    }

    Ok(SimplicialComplex::from_parts(
        dim,
        ambient_dim,
        vertices,
        simplices,
        orientations,
        well_centered,
    ))
}

/// Sort a simplex's vertex indices in place, returning the number of
/// swaps performed. The parity of this count is the parity of the
/// input ordering as a permutation of the sorted one.
fn sort_counting_swaps(simplex: &mut [usize]) -> usize {
    // insertion sort; simplices are tiny so this beats anything fancier
    let mut swaps = 0;
    for i in 1..simplex.len() {
        let mut j = i;
        while j > 0 && simplex[j - 1] > simplex[j] {
            simplex.swap(j - 1, j);
            swaps += 1;
            j -= 1;
        }
    }
    swaps
}

//
// test meshes
//

/// A small hexagon-shaped 2D mesh for testing basic functionality.
/// Shaped somewhat like this:
///    ____
///   /\  /\
///  /__\/__\
///  \  /\  /
///   \/__\/
///
/// with vertices and triangles ordered left to right, top to bottom.
///
/// This is public for use in tests and doctests across the crate;
/// it is not meant as a user-facing API and thus hidden from docs.
#[doc(hidden)]
pub fn tiny_mesh_2d() -> SimplicialComplex {
    let vertices = vec![
        na::dvector![-0.5, 1.0],
        na::dvector![0.5, 1.0],
        na::dvector![-1.0, 0.0],
        na::dvector![0.0, 0.0],
        na::dvector![1.0, 0.0],
        na::dvector![-0.5, -1.0],
        na::dvector![0.5, -1.0],
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 3,
        0, 1, 3,
        1, 3, 4,
        2, 3, 5,
        3, 5, 6,
        3, 4, 6,
    ];
    SimplicialComplex::new(2, vertices, indices).expect("test mesh is valid")
}

/// A small 3D mesh for testing basic functionality.
/// Four tetrahedra arranged into a diamond shape,
/// split like this down the x,y plane:
///
///    /\
///   /__\
///   \  /
///    \/
///
/// and with a single point both up and down the z-axis.
#[doc(hidden)]
pub fn tiny_mesh_3d() -> SimplicialComplex {
    let vertices = vec![
        na::dvector![0.0, 1.0, 0.0],
        na::dvector![-0.5, 0.0, 0.0],
        na::dvector![0.5, 0.0, 0.0],
        na::dvector![0.0, -1.0, 0.0],
        na::dvector![0.0, 0.0, -1.0],
        na::dvector![0.0, 0.0, 1.0],
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 4,
        0, 1, 2, 5,
        1, 2, 3, 4,
        1, 2, 3, 5,
    ];
    SimplicialComplex::new(3, vertices, indices).expect("test mesh is valid")
}

/// A uniform 1D mesh of `node_count` nodes over the interval
/// `[0, length]`, well-centered by construction.
#[doc(hidden)]
pub fn line_mesh_1d(node_count: usize, length: f64) -> SimplicialComplex {
    let spacing = length / (node_count - 1) as f64;
    let vertices: Vec<na::DVector<f64>> = (0..node_count)
        .map(|i| na::dvector![i as f64 * spacing])
        .collect();
    let indices: Vec<usize> = (0..node_count - 1).flat_map(|i| [i, i + 1]).collect();
    SimplicialComplex::new_well_centered(1, vertices, indices).expect("test mesh is valid")
}

/// A closed 1D mesh: `node_count` nodes on a circle of the given
/// radius, joined into a cycle of edges.
#[doc(hidden)]
pub fn circle_mesh_1d(node_count: usize, radius: f64) -> SimplicialComplex {
    let vertices: Vec<na::DVector<f64>> = (0..node_count)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / node_count as f64;
            na::dvector![radius * angle.cos(), radius * angle.sin()]
        })
        .collect();
    let indices: Vec<usize> = (0..node_count)
        .flat_map(|i| [i, (i + 1) % node_count])
        .collect();
    SimplicialComplex::new_well_centered(1, vertices, indices).expect("test mesh is valid")
}

/// A closed 2D surface in 3D space: the boundary of an octahedron
/// with unit vertices on the coordinate axes.
#[doc(hidden)]
pub fn octahedron_sphere() -> SimplicialComplex {
    let vertices = vec![
        na::dvector![1.0, 0.0, 0.0],
        na::dvector![-1.0, 0.0, 0.0],
        na::dvector![0.0, 1.0, 0.0],
        na::dvector![0.0, -1.0, 0.0],
        na::dvector![0.0, 0.0, 1.0],
        na::dvector![0.0, 0.0, -1.0],
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 4,
        2, 1, 4,
        1, 3, 4,
        3, 0, 4,
        2, 0, 5,
        1, 2, 5,
        3, 1, 5,
        0, 3, 5,
    ];
    SimplicialComplex::new(2, vertices, indices).expect("test mesh is valid")
}

//
// tests
//
