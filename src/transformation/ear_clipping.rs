//! Ear-clipping algorithm for creating a triangle mesh from a simple polygon.
//! Based on <https://github.com/ivanfratric/polypartition>.

use crate::math::{Point, Real, Vector};
use crate::utils::{corner_direction, is_point_in_triangle, orthonormal_basis, Orientation};
use na::Point2;

/// The information stored for each vertex in the ear clipping algorithm.
#[derive(Clone, Default)]
struct EarInfo {
    /// Whether the vertex is still active i.e. it has not been clipped yet.
    is_active: bool,
    /// Whether the vertex is the tip of an ear and should be clipped.
    is_ear: bool,
    /// How small the angle of the ear is. Ears with a smaller angle are clipped first.
    pointiness: Real,
    /// The index of the previous vertex.
    p_prev: usize,
    /// The index of the next vertex.
    p_next: usize,
}

/// Updates the fields `pointiness` and `is_ear` for a given vertex index.
fn update_vertex(idx: usize, info: &mut EarInfo, active: &[bool], points: &[Point2<Real>]) -> bool {
    let p = points[idx];
    let p1 = points[info.p_prev];
    let p3 = points[info.p_next];

    let vec1 = (p1 - p).normalize();
    let vec3 = (p3 - p).normalize();
    info.pointiness = vec1.dot(&vec3);
    if info.pointiness.is_nan() {
        return false;
    }

    // A point is considered an ear when it is convex and no other active point is
    // inside the triangle spanned by it and its two neighbors.
    let mut error = false;
    info.is_ear = corner_direction(&p1, &p, &p3) == Orientation::Ccw
        && (0..points.len())
            .filter(|&i| active[i] && i != info.p_prev && i != idx && i != info.p_next)
            .filter(|&i| points[i] != p1 && points[i] != p && points[i] != p3)
            .all(|i| {
                if let Some(is) = is_point_in_triangle(&points[i], &p1, &p, &p3) {
                    !is
                } else {
                    error = true;
                    true
                }
            });
    !error
}

/// Triangulates a counter-clockwise simple polygon by ear clipping.
///
/// Returns `None` if the polygon has less than three vertices, is clockwise, or if no ear can be
/// found at some point (e.g. because of self-intersections).
pub fn triangulate_ear_clipping(vertices: &[Point2<Real>]) -> Option<Vec<[u32; 3]>> {
    let n_vertices = vertices.len();
    if n_vertices < 3 {
        return None;
    }

    let mut infos = vec![EarInfo::default(); n_vertices];
    let mut active = vec![true; n_vertices];

    for (i, info) in infos.iter_mut().enumerate() {
        info.is_active = true;
        info.p_prev = if i == 0 { n_vertices - 1 } else { i - 1 };
        info.p_next = if i == n_vertices - 1 { 0 } else { i + 1 };
        if !update_vertex(i, info, &active, vertices) {
            return None;
        }
    }

    let mut output_indices = Vec::with_capacity(n_vertices - 2);

    for i in 0..n_vertices - 3 {
        // Search through all active ears and pick out the pointiest.
        let (ear_i, _) = infos
            .iter()
            .enumerate()
            .filter(|(_, info)| info.is_active && info.is_ear)
            .max_by(|(_, info1), (_, info2)| info1.pointiness.total_cmp(&info2.pointiness))?;

        infos[ear_i].is_active = false;
        active[ear_i] = false;

        let EarInfo { p_prev, p_next, .. } = infos[ear_i];
        output_indices.push([p_prev as u32, ear_i as u32, p_next as u32]);

        infos[p_prev].p_next = p_next;
        infos[p_next].p_prev = p_prev;

        // The last three vertices are necessarily convex.
        if i == n_vertices - 4 {
            break;
        }

        if !update_vertex(p_prev, &mut infos[p_prev], &active, vertices)
            || !update_vertex(p_next, &mut infos[p_next], &active, vertices)
        {
            return None;
        }
    }

    if let Some((i, info)) = infos.iter().enumerate().find(|(_, info)| info.is_active) {
        output_indices.push([info.p_prev as u32, i as u32, info.p_next as u32]);
    }

    Some(output_indices)
}

/// The Newell normal of a 3D polygon, with a length equal to twice its projected area.
pub fn polygon_normal(vertices: &[Point<Real>]) -> Vector<Real> {
    let mut normal = Vector::zeros();

    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }

    normal
}

/// Triangulates a simple, roughly planar, 3D polygon.
///
/// The polygon is projected on the plane orthogonal to its Newell normal, so the returned
/// triangles are oriented like the polygon. If ear clipping fails, the polygon is fan
/// triangulated from its first vertex instead.
pub fn triangulate_simple_polygon(vertices: &[Point<Real>]) -> Vec<[u32; 3]> {
    let n = vertices.len();
    if n < 3 {
        return vec![];
    } else if n == 3 {
        return vec![[0, 1, 2]];
    }

    let normal = polygon_normal(vertices)
        .try_normalize(1.0e-12)
        .unwrap_or_else(Vector::z);
    let [u, v] = orthonormal_basis(&normal);
    let projected: Vec<_> = vertices
        .iter()
        .map(|pt| Point2::new(pt.coords.dot(&u), pt.coords.dot(&v)))
        .collect();

    triangulate_ear_clipping(&projected)
        .unwrap_or_else(|| (1..n as u32 - 1).map(|i| [0, i, i + 1]).collect())
}
