use crate::math::*;

/// Computes the normal of a counter-clock-wise triangle.
///
/// Returns `None` if the triangle is degenerate.
#[inline]
pub fn ccw_face_normal(pts: [&Point<Real>; 3]) -> Option<UnitVector<Real>> {
    let ab = *pts[1] - *pts[0];
    let ac = *pts[2] - *pts[0];
    let res = ab.cross(&ac);

    UnitVector::try_new(res, DEFAULT_EPSILON)
}

/// The area of the triangle with the given vertices.
#[inline]
pub fn triangle_area(pts: [&Point<Real>; 3]) -> Real {
    (*pts[1] - *pts[0]).cross(&(*pts[2] - *pts[0])).norm() * 0.5
}
