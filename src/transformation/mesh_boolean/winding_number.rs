use crate::math::{Point, Real};
use crate::mesh::DynamicMesh;

const ON_TRIANGLE_TOLERANCE: Real = 1.0e-12;

/// The generalized winding number of `mesh` at the point `pt`.
///
/// This is the sum of the signed solid angles of the triangles of `mesh` seen from `pt`, divided
/// by `4π`. It is close to 1 inside a closed outward-oriented mesh, close to 0 outside, and
/// degrades gracefully (to fractional values) when the mesh has small holes. Points on the
/// surface get `0.5` away from edges.
pub fn winding_number(mesh: &DynamicMesh, pt: &Point<Real>) -> Real {
    triangles_winding_number(mesh.triangle_ids().map(|tid| mesh.triangle_points(tid)), pt)
}

pub(crate) fn triangles_winding_number(
    triangles: impl IntoIterator<Item = [Point<Real>; 3]>,
    pt: &Point<Real>,
) -> Real {
    let mut total = 0.0;

    for [a, b, c] in triangles {
        let (a, b, c) = (a - pt, b - pt, c - pt);
        let (la, lb, lc) = (a.norm(), b.norm(), c.norm());

        let numerator = a.dot(&b.cross(&c));
        let denominator = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;

        // A point lying on the triangle itself sees it as a flat angle of either sign.
        if denominator <= 0.0 && numerator.abs() <= ON_TRIANGLE_TOLERANCE * la * lb * lc {
            continue;
        }

        total += 2.0 * numerator.atan2(denominator);
    }

    total / (4.0 * core::f64::consts::PI)
}
