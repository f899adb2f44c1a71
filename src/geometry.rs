//! Numeric geometry of simplices: circumcenters, primal volumes,
//! circumcentric dual volumes, and the diagonal Hodge star built from
//! their ratio.
//!
//! Everything here is a pure function of the combinatorial tables and
//! the vertex coordinates. The free functions operate on explicit
//! point sets; the `compute_*` functions fill the caches of a
//! [`SimplicialComplex`] and are invoked through its lazy accessors.

use nalgebra as na;

use itertools::{iproduct, izip, Itertools};

use crate::complex::{MeshError, SimplicialComplex};
use crate::config::Config;

/// Circumcenters of every simplex of dimension 1 and above, together
/// with their barycentric coordinates inside the owning simplex.
///
/// The barycentric coordinates drive the orientation signs of the
/// dual-volume accumulation: a negative coordinate means the
/// circumcenter lies on the far side of the opposite face.
#[derive(Debug)]
pub(crate) struct Circumcenters {
    /// per dimension 1..=n: one center per simplex
    pub centers: Vec<Vec<na::DVector<f64>>>,
    /// per dimension 1..=n: coordinates flattened in chunks of dim + 1
    pub barycentric: Vec<Vec<f64>>,
}

/// Compute the circumcenter of the simplex spanned by the given
/// points, returning it together with its barycentric coordinates.
///
/// The circumcenter is expressed as the barycentric combination of the
/// vertices equidistant from all of them, which leads to a small
/// symmetric linear system solved here by LU factorization.
///
/// Returns None for a degenerate (affinely dependent) point set:
/// a singular system, a non-finite solution, or barycentric
/// coordinates larger than the inverse square root of the configured
/// degeneracy tolerance, which is where a nearly-flat simplex sends
/// its circumcenter off towards infinity.
pub fn circumcenter(points: &[na::DVector<f64>]) -> Option<(na::DVector<f64>, Vec<f64>)> {
    let tol = Config::global().degeneracy_tolerance();
    let point_count = points.len();
    // one extra row normalizes the barycentric coordinates to sum to 1
    let system_dim = point_count + 1;

    let mut coef_mat = na::DMatrix::zeros(system_dim, system_dim);
    let mut rhs = na::DVector::zeros(system_dim);
    for i in 0..point_count {
        coef_mat[(i, system_dim - 1)] = 1.0;
        coef_mat[(system_dim - 1, i)] = 1.0;
    }
    rhs[system_dim - 1] = 1.0;
    for (row, row_point) in points.iter().enumerate() {
        rhs[row] = row_point.dot(row_point);
        for (col, col_point) in points.iter().enumerate() {
            coef_mat[(row, col)] = 2.0 * row_point.dot(col_point);
        }
    }

    let solution = coef_mat.lu().solve(&rhs)?;
    let bary = solution.rows(0, point_count);
    // the solve succeeds numerically even for nearly-flat simplices;
    // those are recognized by the coordinates blowing up
    let bary_limit = 1.0 / tol.sqrt();
    if !solution.iter().all(|x| x.is_finite()) || bary.amax() > bary_limit {
        return None;
    }

    let mut center = na::DVector::zeros(points[0].len());
    for (&weight, point) in izip!(bary.iter(), points) {
        center += weight * point;
    }
    Some((center, bary.iter().copied().collect()))
}

/// Compute the unsigned volume of the simplex spanned by the given
/// points: `sqrt(det(V^T V)) / p!` where the columns of `V` are the
/// edge vectors from the first point.
///
/// Valid for any simplex dimension up to the ambient dimension;
/// a single point has volume 1 by convention.
pub fn unsigned_volume(points: &[na::DVector<f64>]) -> f64 {
    let edge_count = points.len() - 1;
    if edge_count == 0 {
        return 1.0;
    }
    let edges: Vec<na::DVector<f64>> =
        points[1..].iter().map(|p| p - &points[0]).collect();
    let mut gram = na::DMatrix::zeros(edge_count, edge_count);
    for (row, col) in iproduct!(0..edge_count, 0..edge_count) {
        gram[(row, col)] = edges[row].dot(&edges[col]);
    }
    f64::sqrt(f64::abs(gram.determinant())) / factorial(edge_count)
}

/// Compute the signed volume of a full-dimensional simplex:
/// `det(V) / p!`, positive when the edge vectors from the first point
/// form a positively oriented frame.
///
/// The number of points must be exactly one more than the ambient
/// dimension.
pub fn signed_volume(points: &[na::DVector<f64>]) -> f64 {
    let edge_count = points.len() - 1;
    debug_assert_eq!(edge_count, points[0].len());
    let mut edge_mat = na::DMatrix::zeros(edge_count, edge_count);
    for (row, edge_point) in points[1..].iter().enumerate() {
        let edge = edge_point - &points[0];
        edge_mat.row_mut(row).copy_from_slice(edge.as_slice());
    }
    edge_mat.determinant() / factorial(edge_count)
}

#[inline]
fn factorial(k: usize) -> f64 {
    (1..=k).product::<usize>() as f64
}

//
// cache computations driven by SimplicialComplex accessors
//

pub(crate) fn compute_circumcenters(
    complex: &SimplicialComplex,
) -> Result<Circumcenters, MeshError> {
    let n = complex.dim();
    let verts = complex.vertices();
    let mut centers: Vec<Vec<na::DVector<f64>>> = Vec::with_capacity(n);
    let mut barycentric: Vec<Vec<f64>> = Vec::with_capacity(n);

    // for line segments the circumcenter is simply the midpoint,
    // computed as a special case for efficiency
    let coll = complex.collection(1);
    let mut midpoints = Vec::with_capacity(coll.len());
    let mut midpoint_bary = Vec::with_capacity(coll.len() * 2);
    for edge in coll.indices.chunks_exact(2) {
        midpoints.push(0.5 * (&verts[edge[0]] + &verts[edge[1]]));
        midpoint_bary.extend([0.5, 0.5]);
    }
    centers.push(midpoints);
    barycentric.push(midpoint_bary);

    for p in 2..=n {
        let coll = complex.collection(p);
        let mut dim_centers = Vec::with_capacity(coll.len());
        let mut dim_bary = Vec::with_capacity(coll.len() * (p + 1));
        let mut points: Vec<na::DVector<f64>> = Vec::with_capacity(p + 1);
        for (simplex_idx, indices) in coll.indices.chunks_exact(p + 1).enumerate() {
            points.clear();
            points.extend(indices.iter().map(|&i| verts[i].clone()));
            let (center, bary) =
                circumcenter(&points).ok_or(MeshError::NumericDegeneracy {
                    dim: p,
                    simplex: simplex_idx,
                    detail: "singular or ill-conditioned circumcenter system",
                })?;
            dim_centers.push(center);
            dim_bary.extend(bary);
        }
        centers.push(dim_centers);
        barycentric.push(dim_bary);
    }

    Ok(Circumcenters {
        centers,
        barycentric,
    })
}

pub(crate) fn compute_primal_volumes(
    complex: &SimplicialComplex,
) -> Result<Vec<Vec<f64>>, MeshError> {
    let n = complex.dim();
    let verts = complex.vertices();
    let mut volumes: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    // 0-simplices have volume 1 by convention
    volumes.push(vec![1.0; verts.len()]);

    for p in 1..=n {
        let coll = complex.collection(p);
        let mut dim_volumes = Vec::with_capacity(coll.len());
        let mut points: Vec<na::DVector<f64>> = Vec::with_capacity(p + 1);
        // the top dimension of a full-dimensional mesh gets signed
        // volumes so that orientation inconsistencies show up in the
        // Hodge star instead of vanishing silently
        let signed = p == complex.ambient_dim();
        for (simplex_idx, indices) in coll.indices.chunks_exact(p + 1).enumerate() {
            if p == 1 {
                // edge lengths, no determinant needed
                dim_volumes.push((&verts[indices[1]] - &verts[indices[0]]).magnitude());
                continue;
            }
            points.clear();
            points.extend(indices.iter().map(|&i| verts[i].clone()));
            if signed {
                let orientation = complex.top_orientations()[simplex_idx] as f64;
                dim_volumes.push(orientation * signed_volume(&points));
            } else {
                dim_volumes.push(unsigned_volume(&points));
            }
        }
        volumes.push(dim_volumes);
    }

    // 1-dimensional full meshes also get their edge volumes signed
    if complex.ambient_dim() == 1 {
        let coll = complex.collection(1);
        for (simplex_idx, indices) in coll.indices.chunks_exact(2).enumerate() {
            let orientation = complex.top_orientations()[simplex_idx] as f64;
            let length = verts[indices[1]][0] - verts[indices[0]][0];
            volumes[1][simplex_idx] = orientation * length;
        }
    }

    Ok(volumes)
}

/// Parameters threaded through the recursive dual-volume traversal.
/// Plain arguments would work too, but there are enough of them
/// that names help.
struct DualTraversal<'a> {
    complex: &'a SimplicialComplex,
    /// circumcenters per dimension 0..=n (index 0 is the vertices)
    centers: &'a [&'a [na::DVector<f64>]],
    /// circumcenter barycentric coordinates per dimension 2..=n;
    /// empty on the well-centered fast path
    bary: &'a [&'a [f64]],
    well_centered: bool,
    /// dimension of the primal simplex whose faces are visited next
    curr_dim: usize,
    /// index of that simplex
    curr_simplex: usize,
    /// accumulated orientation sign of the elementary dual so far
    curr_sign: f64,
    /// denominator of the volume formula so far
    edge_count_factorial: usize,
    /// circumcenter of the top simplex the traversal started from
    root_vertex: &'a na::DVector<f64>,
    /// edges of the elementary dual simplex being built
    edges: &'a mut Vec<na::DVector<f64>>,
    /// reusable Gram matrix allocation
    vol_mat: &'a mut na::DMatrix<f64>,
    /// accumulation target, per dimension
    dual_volumes: &'a mut [Vec<f64>],
}

pub(crate) fn compute_dual_volumes(
    complex: &SimplicialComplex,
) -> Result<Vec<Vec<f64>>, MeshError> {
    let n = complex.dim();
    let well_centered = complex.is_well_centered();

    let centers: Vec<&[na::DVector<f64>]> = (0..=n)
        .map(|p| complex.circumcenters(p))
        .collect::<Result<_, _>>()?;
    // barycentric signs are only consulted on the general path
    let bary: Vec<&[f64]> = if well_centered || n < 2 {
        Vec::new()
    } else {
        (2..=n)
            .map(|p| complex.circumcenter_barycentric(p))
            .collect::<Result<_, _>>()?
    };

    let mut dual_volumes: Vec<Vec<f64>> = (0..=n)
        .map(|p| vec![0.0; complex.simplex_count(p)])
        .collect();
    // the dual of a top simplex is its circumcenter point, volume 1
    dual_volumes[n] = vec![1.0; complex.simplex_count(n)];

    // reused allocations for the Gram determinants
    let mut vol_mat = na::DMatrix::zeros(n, n);
    let mut edges: Vec<na::DVector<f64>> = Vec::with_capacity(n);

    // for each top simplex, generate its first circumcentric
    // subdivision and add every piece to the dual volume of the
    // primal simplex it is dual to
    for top_idx in 0..complex.simplex_count(n) {
        let top_coll = complex.collection(n);
        let top_center = &centers[n][top_idx];
        let top_indices = top_coll.simplex_indices(top_idx);

        for &face_idx in top_coll.boundary_map.row(top_idx).col_indices() {
            // codimension-1 elementary duals are line segments from
            // circumcenter to circumcenter; handle them directly
            let face_center = &centers[n - 1][face_idx];
            let edge = face_center - top_center;

            // the sign of an elementary dual is the sign of the
            // barycentric coordinate of the parent circumcenter
            // relative to the vertex opposite the face: negative
            // exactly when the center lies beyond the face
            let sign = if well_centered || n <= 1 {
                1.0
            } else {
                opposite_bary_sign(complex, bary[n - 2], n, top_idx, top_indices, face_idx)
            };

            dual_volumes[n - 1][face_idx] += edge.magnitude().copysign(sign);

            vol_mat[(0, 0)] = edge.dot(&edge);
            edges.clear();
            edges.push(edge);

            traverse(DualTraversal {
                complex,
                centers: &centers,
                bary: &bary,
                well_centered,
                curr_dim: n - 1,
                curr_simplex: face_idx,
                curr_sign: sign,
                edge_count_factorial: 1,
                root_vertex: top_center,
                edges: &mut edges,
                vol_mat: &mut vol_mat,
                dual_volumes: &mut dual_volumes,
            });
        }
    }

    Ok(dual_volumes)
}

/// Recursively descend the face lattice from one codimension-1 face,
/// accumulating the volumes of the elementary dual simplices rooted at
/// the starting top circumcenter.
fn traverse(s: DualTraversal<'_>) {
    if s.curr_dim == 0 {
        return;
    }

    // the edge count doubles as the dimension of the dual piece
    // being extended
    let dual_dim = s.edges.len();
    let next_factorial = s.edge_count_factorial * (dual_dim + 1);

    let coll = s.complex.collection(s.curr_dim);
    let curr_indices = coll.simplex_indices(s.curr_simplex);

    for &face_idx in coll.boundary_map.row(s.curr_simplex).col_indices() {
        let face_center = &s.centers[s.curr_dim - 1][face_idx];
        let new_edge = face_center - s.root_vertex;

        // extend the Gram matrix by one row and column
        s.vol_mat[(dual_dim, dual_dim)] = new_edge.dot(&new_edge);
        for edge_idx in 0..dual_dim {
            let dot_val = s.edges[edge_idx].dot(&new_edge);
            s.vol_mat[(edge_idx, dual_dim)] = dot_val;
            s.vol_mat[(dual_dim, edge_idx)] = dot_val;
        }

        let vol = f64::sqrt(f64::abs(
            s.vol_mat
                .view_range(0..=dual_dim, 0..=dual_dim)
                .determinant(),
        )) / next_factorial as f64;

        let next_sign = if s.well_centered || s.curr_dim <= 1 {
            s.curr_sign
        } else {
            s.curr_sign
                * opposite_bary_sign(
                    s.complex,
                    s.bary[s.curr_dim - 2],
                    s.curr_dim,
                    s.curr_simplex,
                    curr_indices,
                    face_idx,
                )
        };

        // signed accumulation: the absolute value is only ever taken
        // of the elementary magnitudes above, never of the sum,
        // so cancelling pieces of non-well-centered cells survive
        s.dual_volumes[s.curr_dim - 1][face_idx] += vol.copysign(next_sign);

        s.edges.push(new_edge);
        traverse(DualTraversal {
            complex: s.complex,
            centers: s.centers,
            bary: s.bary,
            well_centered: s.well_centered,
            curr_dim: s.curr_dim - 1,
            curr_simplex: face_idx,
            curr_sign: next_sign,
            edge_count_factorial: next_factorial,
            root_vertex: s.root_vertex,
            edges: &mut *s.edges,
            vol_mat: &mut *s.vol_mat,
            dual_volumes: &mut *s.dual_volumes,
        });
        s.edges.pop();
    }
}

/// Sign of the barycentric coordinate of a parent simplex's
/// circumcenter at the vertex opposite the given face.
fn opposite_bary_sign(
    complex: &SimplicialComplex,
    bary: &[f64],
    parent_dim: usize,
    parent_idx: usize,
    parent_indices: &[usize],
    face_idx: usize,
) -> f64 {
    let face_indices = complex.collection(parent_dim - 1).simplex_indices(face_idx);
    // simplices are stored sorted, so the omitted vertex has to be
    // searched for; cheap because simplices are tiny
    let (opposite_pos, _) = parent_indices
        .iter()
        .find_position(|idx| !face_indices.contains(idx))
        .expect("a face must omit exactly one parent vertex");
    bary[parent_idx * (parent_dim + 1) + opposite_pos].signum()
}

pub(crate) fn compute_hodge_star(
    complex: &SimplicialComplex,
) -> Result<Vec<Vec<f64>>, MeshError> {
    let tol = Config::global().degeneracy_tolerance();
    let mut stars = Vec::with_capacity(complex.dim() + 1);
    for p in 0..=complex.dim() {
        let primal = complex.primal_volumes(p)?;
        let dual = complex.dual_volumes(p)?;
        let mut diag = Vec::with_capacity(primal.len());
        for (i, (&pv, &dv)) in izip!(primal, dual).enumerate() {
            if pv.abs() < tol {
                return Err(MeshError::NumericDegeneracy {
                    dim: p,
                    simplex: i,
                    detail: "vanishing primal volume in Hodge star",
                });
            }
            diag.push(dv / pv);
        }
        stars.push(diag);
    }
    Ok(stars)
}

pub(crate) fn compute_hodge_star_inverse(
    complex: &SimplicialComplex,
) -> Result<Vec<Vec<f64>>, MeshError> {
    let tol = Config::global().degeneracy_tolerance();
    let mut stars = Vec::with_capacity(complex.dim() + 1);
    for p in 0..=complex.dim() {
        let primal = complex.primal_volumes(p)?;
        let dual = complex.dual_volumes(p)?;
        let mut diag = Vec::with_capacity(primal.len());
        for (i, (&pv, &dv)) in izip!(primal, dual).enumerate() {
            if dv.abs() < tol {
                return Err(MeshError::NumericDegeneracy {
                    dim: p,
                    simplex: i,
                    detail: "vanishing dual volume in inverse Hodge star",
                });
            }
            diag.push(pv / dv);
        }
        stars.push(diag);
    }
    Ok(stars)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::{
        line_mesh_1d, octahedron_sphere, tiny_mesh_2d, tiny_mesh_3d,
    };
    use approx::{abs_diff_eq, relative_eq};

    type Vec2 = na::DVector<f64>;

    fn dvec2(x: f64, y: f64) -> Vec2 {
        na::dvector![x, y]
    }

    /// Circumcenters, volumes and dual volumes are computed correctly
    /// for a simple 2d mesh.
    #[test]
    fn tiny_2d_geometry_is_correct() {
        let mesh = tiny_mesh_2d();

        // primal volumes

        // all diagonal edges are the same length, as are the horizontals
        let diag = f64::sqrt(5.0) / 2.0;
        let horiz = 1.0;
        #[rustfmt::skip]
        let expected_1_volumes = vec![
            horiz,
            diag, diag, diag, diag,
            horiz, diag, horiz,
            diag, diag, diag,
            horiz,
        ];
        let actual_1_volumes = mesh.primal_volumes(1).unwrap();
        let all_approx_eq =
            izip!(&expected_1_volumes, actual_1_volumes).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected 1-volumes {expected_1_volumes:?}, got {actual_1_volumes:?}"
        );

        // all triangles have base 1 and height 1; the mesh is embedded
        // in its own dimension, so the volumes carry the orientation
        // sign of the input vertex ordering
        let expected_2_volumes = [0.5, -0.5, 0.5, -0.5, 0.5, -0.5];
        let actual_2_volumes = mesh.primal_volumes(2).unwrap();
        let all_approx_eq =
            izip!(&expected_2_volumes, actual_2_volumes).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected 2-volumes {expected_2_volumes:?}, got {actual_2_volumes:?}"
        );

        // circumcenters

        #[rustfmt::skip]
        let expected_2_centers: Vec<Vec2> = [
            (-0.5, 0.375), (0.0, 0.625), (0.5, 0.375),
            (-0.5, -0.375), (0.0, -0.625), (0.5, -0.375),
        ]
        .into_iter()
        .map(|(x, y)| dvec2(x, y))
        .collect();

        let centers = mesh.circumcenters(2).unwrap();
        assert_eq!(expected_2_centers.len(), centers.len());
        for expected in &expected_2_centers {
            let found = centers
                .iter()
                .any(|actual| (expected - actual).magnitude_squared() <= f64::EPSILON);
            assert!(
                found,
                "expected 2-circumcenter {expected} not found in {centers:?}"
            );
        }

        // dual volumes

        let dual_diag = f64::sqrt(5.0) / 4.0;
        #[rustfmt::skip]
        let expected_1_dual_vols = vec![
            0.375, 0.5 * dual_diag, dual_diag,
            dual_diag, 0.5 * dual_diag,
            0.75, 0.5 * dual_diag,
            0.75, dual_diag, dual_diag,
            0.5 * dual_diag, 0.375,
        ];
        let actual_1_dual_vols = mesh.dual_volumes(1).unwrap();
        let all_approx_eq =
            izip!(&expected_1_dual_vols, actual_1_dual_vols).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected dual 1-volumes {expected_1_dual_vols:?}, got {actual_1_dual_vols:?}"
        );

        // sizes of the elementary dual triangles
        let side_el = 5.0 / 64.0;
        let base_el = 3.0 / 32.0;
        // dual cells touching the top and bottom boundaries are the same shape
        let bound_vert = 3.0 * side_el + base_el;
        let bound_horiz = 2.0 * side_el + 2.0 * base_el;
        let center = 8.0 * side_el + 4.0 * base_el;
        #[rustfmt::skip]
        let expected_0_dual_vols = vec![
            bound_vert, bound_vert,
            bound_horiz, center, bound_horiz,
            bound_vert, bound_vert,
        ];
        let actual_0_dual_vols = mesh.dual_volumes(0).unwrap();
        let all_approx_eq =
            izip!(&expected_0_dual_vols, actual_0_dual_vols).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected dual 0-volumes {expected_0_dual_vols:?}, got {actual_0_dual_vols:?}"
        );
    }

    /// Signed top-dimensional volumes and unsigned lower volumes
    /// are correct for a simple 3d mesh.
    #[test]
    fn tiny_3d_geometry_is_correct() {
        let mesh = tiny_mesh_3d();

        // most diagonals have this length
        let diag = f64::sqrt(5.0) / 2.0;
        use std::f64::consts::SQRT_2;
        #[rustfmt::skip]
        let expected_1_volumes = vec![
            diag, diag, SQRT_2, SQRT_2,
            1.0, diag, diag, diag,
            diag, diag, diag,
            SQRT_2, SQRT_2,
        ];
        let actual_1_volumes = mesh.primal_volumes(1).unwrap();
        let all_approx_eq =
            izip!(&expected_1_volumes, actual_1_volumes).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected 1-volumes {expected_1_volumes:?}, got {actual_1_volumes:?}"
        );

        // tetrahedra all have the same size; the signs follow the
        // input vertex ordering
        let tet_vol = 1.0 / 6.0;
        let expected_3_volumes = [-tet_vol, tet_vol, tet_vol, -tet_vol];
        let actual_3_volumes = mesh.primal_volumes(3).unwrap();
        let all_approx_eq =
            izip!(&expected_3_volumes, actual_3_volumes).all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected 3-volumes {expected_3_volumes:?}, got {actual_3_volumes:?}"
        );

        // dual volumes, computed by hand for the interior/boundary
        // triangle classes
        let boundary = 0.10206;
        let inside = 0.75;
        #[rustfmt::skip]
        let expected_2_dual_vols = vec![
            inside, boundary, boundary, boundary, boundary,
            inside, inside, inside, boundary, boundary,
            boundary, boundary,
        ];
        let actual_2_dual_vols = mesh.dual_volumes(2).unwrap();
        let all_approx_eq = izip!(&expected_2_dual_vols, actual_2_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 0.00001));
        assert!(
            all_approx_eq,
            "expected dual 2-volumes {expected_2_dual_vols:?}, got {actual_2_dual_vols:?}"
        );

        #[rustfmt::skip]
        let expected_1_dual_vols = vec![
            0.1514008, 0.1514008, 0.0147308, 0.0147308,
            0.75 * 0.75, 0.1514008, 0.1514008, 0.1514008,
            0.1514008, 0.1514008, 0.1514008,
            0.0147308, 0.0147308,
        ];
        let actual_1_dual_vols = mesh.dual_volumes(1).unwrap();
        let all_approx_eq = izip!(&expected_1_dual_vols, actual_1_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 0.000001));
        assert!(
            all_approx_eq,
            "expected dual 1-volumes {expected_1_dual_vols:?}, got {actual_1_dual_vols:?}"
        );

        #[rustfmt::skip]
        let expected_0_dual_vols = vec![
            0.06336792, 0.20659792, 0.20659792, 0.06336792,
            0.06336792, 0.06336792,
        ];
        let actual_0_dual_vols = mesh.dual_volumes(0).unwrap();
        let all_approx_eq = izip!(&expected_0_dual_vols, actual_0_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 0.000001));
        assert!(
            all_approx_eq,
            "expected dual 0-volumes {expected_0_dual_vols:?}, got {actual_0_dual_vols:?}"
        );
    }

    /// Dual volumes are computed correctly for meshes
    /// with circumcenters outside of their simplices.
    #[test]
    fn non_well_centered_dual_volumes() {
        // diamond-shaped mesh with two triangles,
        // one of which is very shallow
        // with circumcenter inside the other one
        let mesh_2d = SimplicialComplex::new(
            2,
            vec![
                dvec2(0.0, 0.5),
                dvec2(-1.0, 0.0),
                dvec2(1.0, 0.0),
                dvec2(0.0, -2.0),
            ],
            vec![0, 1, 2, 1, 2, 3],
        )
        .unwrap();

        let expected_1_dual_vols = [
            f64::sqrt(5.0) / 2.0,
            f64::sqrt(5.0) / 2.0,
            // this one has one negative and one positive elementary dual
            0.0,
            f64::sqrt(5.0) / 4.0,
            f64::sqrt(5.0) / 4.0,
        ];
        let actual_1_dual_vols = mesh_2d.dual_volumes(1).unwrap();
        let all_approx_eq = izip!(&expected_1_dual_vols, actual_1_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 1e-12));
        assert!(
            all_approx_eq,
            "expected dual 1-volumes {expected_1_dual_vols:?}, got {actual_1_dual_vols:?}"
        );

        // the middle two have one negative elementary dual that
        // cancels another one (an unsigned sum would give 1.375)
        let expected_0_dual_vols = [0.625, 0.625, 0.625, 0.625];
        let actual_0_dual_vols = mesh_2d.dual_volumes(0).unwrap();
        let all_approx_eq = izip!(&expected_0_dual_vols, actual_0_dual_vols)
            .all(|(l, r)| relative_eq!(l, r));
        assert!(
            all_approx_eq,
            "expected dual 0-volumes {expected_0_dual_vols:?}, got {actual_0_dual_vols:?}"
        );

        // two tetrahedra sharing a non-well-centered triangle,
        // one of them low enough for a second negative sign
        let mesh_3d = SimplicialComplex::new(
            3,
            vec![
                na::dvector![0.0, 0.5, 0.0],
                na::dvector![-1.0, 0.0, 0.0],
                na::dvector![1.0, 0.0, 0.0],
                na::dvector![0.0, 0.0, 0.5],
                na::dvector![0.0, 0.0, -2.0],
            ],
            vec![0, 1, 2, 3, 0, 1, 2, 4],
        )
        .unwrap();

        let expected_2_dual_vols = [
            // the shared middle triangle has two identical elementary
            // duals with opposite signs
            0.0,
            4.0 / 3.0,
            0.9274260335029676,
            4.0 / 3.0,
            0.9274260335029676,
            -0.75,
            -0.75,
        ];
        let actual_2_dual_vols = mesh_3d.dual_volumes(2).unwrap();
        let all_approx_eq = izip!(&expected_2_dual_vols, actual_2_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 1e-9));
        assert!(
            all_approx_eq,
            "expected dual 2-volumes {expected_2_dual_vols:?}, got {actual_2_dual_vols:?}"
        );

        let expected_1_dual_vols = [
            0.576763,
            0.576763,
            0.628539,
            0.417219,
            0.0,
            0.124226 - 0.419263,
            0.056568 - 0.209631,
            0.124226 - 0.419263,
            0.056568 - 0.209631,
        ];
        let actual_1_dual_vols = mesh_3d.dual_volumes(1).unwrap();
        let all_approx_eq = izip!(&expected_1_dual_vols, actual_1_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 0.00001));
        assert!(
            all_approx_eq,
            "expected dual 1-volumes {expected_1_dual_vols:?}, got {actual_1_dual_vols:?}"
        );

        let expected_0_dual_vols = [0.432374, -0.004547, -0.004547, -0.035879, 0.029265];
        let actual_0_dual_vols = mesh_3d.dual_volumes(0).unwrap();
        let all_approx_eq = izip!(&expected_0_dual_vols, actual_0_dual_vols)
            .all(|(l, r)| abs_diff_eq!(l, r, epsilon = 0.00001));
        assert!(
            all_approx_eq,
            "expected dual 0-volumes {expected_0_dual_vols:?}, got {actual_0_dual_vols:?}"
        );
    }

    /// A uniform 1D mesh: primal edge volumes are the spacing, interior
    /// dual 0-volumes are the mean of the adjacent edge lengths, and
    /// the 0-dimensional Hodge diagonal equals the dual volume.
    #[test]
    fn uniform_line_scenario() {
        let node_count = 6;
        let length = 1.0;
        let mesh = line_mesh_1d(node_count, length);
        let spacing = length / (node_count - 1) as f64;

        let primal_1 = mesh.primal_volumes(1).unwrap();
        assert!(primal_1.iter().all(|&v| relative_eq!(v, spacing)));

        let dual_0 = mesh.dual_volumes(0).unwrap();
        for (i, &dv) in dual_0.iter().enumerate() {
            let expected = if i == 0 || i == node_count - 1 {
                spacing / 2.0
            } else {
                // mean of the two adjacent primal edge lengths
                spacing
            };
            assert!(
                relative_eq!(dv, expected),
                "dual 0-volume {dv} at node {i}, expected {expected}"
            );
        }

        // primal 0-volumes are 1 by convention, so the 0-star is the
        // dual volume itself
        let star_0 = mesh.hodge_star(0).unwrap();
        assert!(izip!(star_0, dual_0).all(|(s, d)| relative_eq!(s, d)));
        // and the 1-star is the reciprocal of the edge length
        let star_1 = mesh.hodge_star(1).unwrap();
        assert!(star_1.iter().all(|&s| relative_eq!(s, 1.0 / spacing)));
    }

    /// The circumcentric subdivision partitions the mesh: vertex dual
    /// volumes sum to the total mesh volume.
    #[test]
    fn dual_cells_partition_closed_mesh() {
        let mesh = octahedron_sphere();
        let total_area: f64 = mesh.primal_volumes(2).unwrap().iter().sum();
        assert!(relative_eq!(total_area, 4.0 * f64::sqrt(3.0)));

        let dual_0_sum: f64 = mesh.dual_volumes(0).unwrap().iter().sum();
        assert!(
            abs_diff_eq!(dual_0_sum, total_area, epsilon = 1e-12),
            "dual 0-volumes summed to {dual_0_sum}, expected {total_area}"
        );
    }

    /// Degenerate simplices are reported, not propagated as NaN.
    #[test]
    fn degenerate_simplex_is_detected() {
        // three collinear points
        let points = vec![dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(2.0, 0.0)];
        assert!(circumcenter(&points).is_none());

        let mesh = SimplicialComplex::new(
            2,
            vec![dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(2.0, 0.0)],
            vec![0, 1, 2],
        )
        .unwrap();
        let err = mesh.circumcenters(2).unwrap_err();
        assert_eq!(
            err,
            MeshError::NumericDegeneracy {
                dim: 2,
                simplex: 0,
                detail: "singular or ill-conditioned circumcenter system",
            }
        );
        // the failure surfaces through dependent quantities too
        assert!(mesh.dual_volumes(0).is_err());
    }

    #[test]
    fn volume_formulas_match_known_shapes() {
        // unit right triangle in 3d
        let tri = vec![
            na::dvector![0.0, 0.0, 0.0],
            na::dvector![1.0, 0.0, 0.0],
            na::dvector![0.0, 1.0, 0.0],
        ];
        assert!(relative_eq!(unsigned_volume(&tri), 0.5));

        // unit square's diagonal split, signed both ways
        let ccw = vec![dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(0.0, 1.0)];
        let cw = vec![dvec2(0.0, 0.0), dvec2(0.0, 1.0), dvec2(1.0, 0.0)];
        assert!(relative_eq!(signed_volume(&ccw), 0.5));
        assert!(relative_eq!(signed_volume(&cw), -0.5));

        // a point has volume 1 by convention
        assert!(relative_eq!(unsigned_volume(&tri[..1]), 1.0));
    }
}
