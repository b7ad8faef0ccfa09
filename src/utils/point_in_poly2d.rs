use crate::math::Real;
use na::Point2;

/// Tests if the given point is inside an arbitrary closed polygon with arbitrary orientation,
/// using the even-odd rule.
///
/// The polygon is assumed to be closed, i.e., first and last point of the polygon are implicitly
/// assumed to be connected by an edge.
pub fn point_in_poly2d(pt: &Point2<Real>, poly: &[Point2<Real>]) -> bool {
    let mut inside = false;

    for (i, a) in poly.iter().enumerate() {
        let b = poly[(i + 1) % poly.len()];

        if (a.y > pt.y) != (b.y > pt.y) {
            let x_cross = a.x + (pt.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if pt.x < x_cross {
                inside = !inside;
            }
        }
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_in_poly2d_self_intersecting() {
        let poly = [
            [-1.0, -1.0],
            [0.0, -1.0],
            [0.0, 1.0],
            [-2.0, 1.0],
            [-2.0, -2.0],
            [1.0, -2.0],
            [1.0, 2.0],
            [-1.0, 2.0],
        ]
        .map(Point2::from);
        assert!(!point_in_poly2d(&[-0.5, -0.5].into(), &poly));
        assert!(point_in_poly2d(&[0.5, -0.5].into(), &poly));
    }

    #[test]
    fn point_in_poly2d_concave() {
        let poly = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [1.0, 1.0], [0.0, 2.0]].map(Point2::from);
        assert!(point_in_poly2d(&[0.5, 0.5].into(), &poly));
        assert!(!point_in_poly2d(&[1.0, 1.5].into(), &poly));
        assert!(!point_in_poly2d(&[3.0, 0.5].into(), &poly));
    }
}
