use super::EPS;
use crate::math::{Point, Real, Vector};

/// The intersection between two triangles.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum TriangleTriangleIntersection {
    /// The triangles cross along a segment.
    Segment([Point<Real>; 2]),
    /// The triangles lie on the same plane. Their overlap, if any, must be computed in 2D.
    Coplanar,
}

// Points where the triangle `tri` (with vertex ids `ids`) meets the plane with signed vertex
// distances `dists`. Crossing points are computed from the edge endpoint with the smallest id
// so that triangles sharing an edge get bit-identical points.
fn plane_crossings(
    tri: &[Point<Real>; 3],
    ids: [u32; 3],
    dists: [Real; 3],
) -> arrayvec::ArrayVec<Point<Real>, 3> {
    let mut result = arrayvec::ArrayVec::new();

    for k in 0..3 {
        if dists[k] == 0.0 {
            result.push(tri[k]);
        }
    }

    for k in 0..3 {
        let (mut i, mut j) = (k, (k + 1) % 3);
        if dists[i] * dists[j] >= 0.0 {
            continue;
        }

        if ids[j] < ids[i] {
            core::mem::swap(&mut i, &mut j);
        }

        let t = dists[i] / (dists[i] - dists[j]);
        if !result.is_full() {
            result.push(tri[i] + (tri[j] - tri[i]) * t);
        }
    }

    result
}

fn signed_distances(
    tri: &[Point<Real>; 3],
    origin: &Point<Real>,
    normal: &Vector<Real>,
) -> [Real; 3] {
    tri.map(|pt| {
        let d = (pt - origin).dot(normal);
        if d.abs() < EPS {
            0.0
        } else {
            d
        }
    })
}

/// Computes the intersection of two triangles given with their vertex ids.
///
/// Vertex ids are only used to make the computed points independent from the triangle they are
/// computed for: two triangles sharing an edge obtain exactly the same crossing point on that
/// edge. Touching triangles (intersecting at a single point) are reported as not intersecting.
pub(crate) fn triangle_triangle_intersection(
    tri1: &[Point<Real>; 3],
    ids1: [u32; 3],
    tri2: &[Point<Real>; 3],
    ids2: [u32; 3],
) -> Option<TriangleTriangleIntersection> {
    let normal1 = (tri1[1] - tri1[0])
        .cross(&(tri1[2] - tri1[0]))
        .try_normalize(Real::EPSILON)?;
    let normal2 = (tri2[1] - tri2[0])
        .cross(&(tri2[2] - tri2[0]))
        .try_normalize(Real::EPSILON)?;

    let dists1 = signed_distances(tri1, &tri2[0], &normal2);
    if dists1.iter().all(|d| *d > 0.0) || dists1.iter().all(|d| *d < 0.0) {
        return None;
    }

    let dists2 = signed_distances(tri2, &tri1[0], &normal1);
    if dists2.iter().all(|d| *d > 0.0) || dists2.iter().all(|d| *d < 0.0) {
        return None;
    }

    let Some(dir) = normal1.cross(&normal2).try_normalize(EPS) else {
        return if dists1.iter().all(|d| *d == 0.0) {
            Some(TriangleTriangleIntersection::Coplanar)
        } else {
            None
        };
    };

    if dists1.iter().all(|d| *d == 0.0) || dists2.iter().all(|d| *d == 0.0) {
        // Nearly coplanar triangles.
        return Some(TriangleTriangleIntersection::Coplanar);
    }

    let pts1 = plane_crossings(tri1, ids1, dists1);
    let pts2 = plane_crossings(tri2, ids2, dists2);

    let range = |pts: &[Point<Real>]| {
        let mut min = (Real::MAX, Point::origin());
        let mut max = (-Real::MAX, Point::origin());
        for pt in pts {
            let t = dir.dot(&pt.coords);
            if t < min.0 {
                min = (t, *pt);
            }
            if t > max.0 {
                max = (t, *pt);
            }
        }
        (min, max)
    };

    if pts1.is_empty() || pts2.is_empty() {
        return None;
    }

    let (min1, max1) = range(&pts1);
    let (min2, max2) = range(&pts2);
    let lo = if min1.0 >= min2.0 { min1 } else { min2 };
    let hi = if max1.0 <= max2.0 { max1 } else { max2 };

    if hi.0 - lo.0 <= EPS {
        return None;
    }

    Some(TriangleTriangleIntersection::Segment([lo.1, hi.1]))
}

#[cfg(test)]
mod test {
    use super::{triangle_triangle_intersection, TriangleTriangleIntersection};
    use crate::math::Point;

    #[test]
    fn crossing_triangles() {
        let tri1 = [
            Point::new(-1.0, -1.0, 0.0),
            Point::new(1.0, -1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ];
        let tri2 = [
            Point::new(0.0, -2.0, -1.0),
            Point::new(0.0, 2.0, -1.0),
            Point::new(0.0, 0.0, 1.0),
        ];

        let Some(TriangleTriangleIntersection::Segment([a, b])) =
            triangle_triangle_intersection(&tri1, [0, 1, 2], &tri2, [3, 4, 5])
        else {
            panic!("The triangles should intersect along a segment.");
        };

        assert_relative_eq!(a.z, 0.0);
        assert_relative_eq!(b.z, 0.0);
        assert_relative_eq!(a.x, 0.0);
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(a.y.min(b.y), -1.0);
        assert_relative_eq!(a.y.max(b.y), 1.0);
    }

    #[test]
    fn shared_edge_points_are_identical() {
        // Two triangles sharing the edge (1, 2), listed in different orders.
        let p = [
            Point::new(0.0, 0.0, -1.0),
            Point::new(1.0, 0.3, -0.7),
            Point::new(0.2, 1.0, 1.3),
            Point::new(1.5, 1.5, 0.1),
        ];
        let cutter = [
            Point::new(-5.0, -5.0, 0.0),
            Point::new(5.0, -5.0, 0.0),
            Point::new(0.0, 5.0, 0.0),
        ];

        let cut = |tri: [usize; 3]| {
            let pts = tri.map(|i| p[i]);
            triangle_triangle_intersection(&pts, tri.map(|i| i as u32), &cutter, [9, 10, 11])
        };
        let seg1 = cut([0, 1, 2]);
        let seg2 = cut([2, 1, 3]);

        let (
            Some(TriangleTriangleIntersection::Segment(s1)),
            Some(TriangleTriangleIntersection::Segment(s2)),
        ) = (seg1, seg2)
        else {
            panic!("Both triangles should cross the cutter.");
        };

        assert!(s1.iter().any(|a| s2.contains(a)));
    }

    #[test]
    fn coplanar_and_disjoint() {
        let tri1 = [Point::origin(), Point::new(1.0, 0.0, 0.0), Point::new(0.0, 1.0, 0.0)];
        let tri2 = [
            Point::new(0.2, 0.2, 0.0),
            Point::new(2.0, 0.2, 0.0),
            Point::new(0.2, 2.0, 0.0),
        ];
        assert_eq!(
            triangle_triangle_intersection(&tri1, [0, 1, 2], &tri2, [3, 4, 5]),
            Some(TriangleTriangleIntersection::Coplanar)
        );

        let far = tri2.map(|p| p + na::Vector3::z());
        assert_eq!(triangle_triangle_intersection(&tri1, [0, 1, 2], &far, [3, 4, 5]), None);
    }
}
