use crate::math::{Point, Real, Vector};

/// The time of impact of the ray `origin + t * dir` with the triangle `tri`, for `t` in
/// `(min_toi, max_toi]`.
///
/// Both faces of the triangle are hit.
// Fast, Minimum Storage Ray/Triangle Intersection, Möller and Trumbore 1997.
pub fn ray_triangle_toi(
    origin: &Point<Real>,
    dir: &Vector<Real>,
    tri: &[Point<Real>; 3],
    min_toi: Real,
    max_toi: Real,
) -> Option<Real> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() <= Real::EPSILON * e1.norm() * e2.norm() * dir.norm() {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - tri[0];
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let toi = e2.dot(&q) * inv_det;
    (toi > min_toi && toi <= max_toi).then_some(toi)
}
