use crate::cells::Plane;
use crate::math::{Point, Point2, Real, Vector};

/// An orthonormal frame with its `z` axis along the normal of a plane.
///
/// The `x` axis is the projection on the plane of the coordinate axis most orthogonal to the
/// normal, so planes aligned with the coordinate axes get the same UV layout whatever their
/// boundary.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct PlaneFrame {
    pub origin: Point<Real>,
    pub axes: [Vector<Real>; 3],
}

impl PlaneFrame {
    pub fn axis_aligned(plane: &Plane) -> Self {
        let normal = plane.normal;
        let abs = normal.abs();
        let min_axis = if abs.x <= abs.y && abs.x <= abs.z {
            0
        } else if abs.y <= abs.z {
            1
        } else {
            2
        };

        let mut target = Vector::zeros();
        target[min_axis] = 1.0;
        let x = (target - normal * normal.dot(&target)).normalize();
        let y = normal.cross(&x);

        Self {
            origin: plane.origin(),
            axes: [x, y, normal],
        }
    }

    pub fn to_plane_uv(&self, pt: &Point<Real>) -> Point2<Real> {
        let dpt = pt - self.origin;
        Point2::new(dpt.dot(&self.axes[0]), dpt.dot(&self.axes[1]))
    }

    pub fn from_plane_uv(&self, uv: &Point2<Real>) -> Point<Real> {
        self.origin + self.axes[0] * uv.x + self.axes[1] * uv.y
    }
}
