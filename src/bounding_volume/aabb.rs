//! Axis Aligned Bounding Box.

use crate::bounding_volume::BoundingVolume;
use crate::math::{Point, Real, Vector};
use num::Bounded;

/// An Axis-Aligned Bounding Box (AABB).
///
/// Fractured pieces, cutting cells and triangles are all bounded by AABBs to quickly reject
/// pairs that cannot intersect before running any exact geometric test.
///
/// - **mins**: the point with the smallest coordinates on each axis.
/// - **maxs**: the point with the largest coordinates on each axis.
///
/// An AABB built with [`Aabb::new_invalid`] has `mins > maxs` and is the neutral element of
/// [`BoundingVolume::merge`].
///
/// # Example
///
/// ```
/// use fracture3d::bounding_volume::Aabb;
/// use fracture3d::math::Point;
///
/// let aabb = Aabb::from_points([Point::new(1.0, 2.0, 3.0), Point::new(-1.0, 4.0, 2.0)]);
/// assert_eq!(aabb.mins, Point::new(-1.0, 2.0, 2.0));
/// assert_eq!(aabb.max_dim(), 2.0);
/// ```
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Aabb {
    /// The point with minimum coordinates.
    pub mins: Point<Real>,
    /// The point with maximum coordinates.
    pub maxs: Point<Real>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new_invalid()
    }
}

impl Aabb {
    /// Creates a new AABB.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Aabb {
        Aabb { mins, maxs }
    }

    /// An empty `Aabb`, with `mins` at `Real::max_value()` and `maxs` at `-Real::max_value()`.
    ///
    /// Merging anything into it gives that thing back.
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::max_value()).into(),
            Vector::repeat(-Real::max_value()).into(),
        )
    }

    /// Creates a new `Aabb` from its center and its half-extents.
    #[inline]
    pub fn from_half_extents(center: Point<Real>, half_extents: Vector<Real>) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Creates a new `Aabb` enclosing a set of points.
    pub fn from_points<I>(pts: I) -> Self
    where
        I: IntoIterator<Item = Point<Real>>,
    {
        let mut result = Self::new_invalid();
        for pt in pts {
            result.take_point(pt);
        }
        result
    }

    /// Is this AABB the result of merging at least one point or non-empty AABB?
    #[inline]
    pub fn is_valid(&self) -> bool {
        na::partial_le(&self.mins, &self.maxs)
    }

    /// The center of this `Aabb`.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// The half extents of this `Aabb`.
    #[inline]
    pub fn half_extents(&self) -> Vector<Real> {
        (self.maxs - self.mins) * 0.5
    }

    /// The extents of this `Aabb`.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// The largest extent of this `Aabb`, or zero if it is invalid.
    #[inline]
    pub fn max_dim(&self) -> Real {
        if self.is_valid() {
            self.extents().max()
        } else {
            0.0
        }
    }

    /// Enlarges this `Aabb` so it also contains the point `pt`.
    pub fn take_point(&mut self, pt: Point<Real>) {
        self.mins = self.mins.coords.inf(&pt.coords).into();
        self.maxs = self.maxs.coords.sup(&pt.coords).into();
    }

    /// Checks if this `Aabb` has vertices strictly on both sides of the plane with the given
    /// normal and offset (the plane contains the points `x` such that `normal.dot(x) == w`).
    pub fn straddles_plane(&self, normal: &Vector<Real>, w: Real) -> bool {
        let mut has_positive = false;
        let mut has_negative = false;

        for pt in self.vertices() {
            let dist = normal.dot(&pt.coords) - w;
            has_positive |= dist > 0.0;
            has_negative |= dist < 0.0;

            if has_positive && has_negative {
                return true;
            }
        }

        false
    }

    /// Computes the vertices of this `Aabb`.
    ///
    /// ```text
    ///    y             3 - 2
    ///    |           7 − 6 |
    ///    ___ x       |   | 1  (the zero is below 3 and on the left of 1,
    ///   /            4 - 5     hidden by the 4-5-6-7 face.)
    ///  z
    /// ```
    #[inline]
    pub fn vertices(&self) -> [Point<Real>; 8] {
        [
            Point::new(self.mins.x, self.mins.y, self.mins.z),
            Point::new(self.maxs.x, self.mins.y, self.mins.z),
            Point::new(self.maxs.x, self.maxs.y, self.mins.z),
            Point::new(self.mins.x, self.maxs.y, self.mins.z),
            Point::new(self.mins.x, self.mins.y, self.maxs.z),
            Point::new(self.maxs.x, self.mins.y, self.maxs.z),
            Point::new(self.maxs.x, self.maxs.y, self.maxs.z),
            Point::new(self.mins.x, self.maxs.y, self.maxs.z),
        ]
    }
}

impl BoundingVolume for Aabb {
    #[inline]
    fn center(&self) -> Point<Real> {
        self.center()
    }

    #[inline]
    fn intersects(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    #[inline]
    fn contains(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.mins) && na::partial_ge(&self.maxs, &other.maxs)
    }

    #[inline]
    fn merge(&mut self, other: &Aabb) {
        self.mins = self.mins.inf(&other.mins);
        self.maxs = self.maxs.sup(&other.maxs);
    }

    #[inline]
    fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    #[inline]
    fn loosened(&self, amount: Real) -> Aabb {
        assert!(amount >= 0.0, "The loosening margin must be positive.");
        Aabb {
            mins: self.mins + Vector::repeat(-amount),
            maxs: self.maxs + Vector::repeat(amount),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_aabb_is_merge_neutral() {
        let mut aabb = Aabb::new_invalid();
        assert!(!aabb.is_valid());
        assert_eq!(aabb.max_dim(), 0.0);

        let other = Aabb::new(Point::new(-1.0, 0.0, 0.0), Point::new(1.0, 2.0, 0.5));
        aabb.merge(&other);
        assert_eq!(aabb, other);
        assert_eq!(aabb.max_dim(), 2.0);
    }

    #[test]
    fn straddles_plane() {
        let aabb = Aabb::new(Point::new(-0.5, -0.5, -0.5), Point::new(0.5, 0.5, 0.5));
        assert!(aabb.straddles_plane(&Vector::z(), 0.0));
        assert!(!aabb.straddles_plane(&Vector::z(), 0.5));
        assert!(!aabb.straddles_plane(&Vector::x(), -2.0));
    }
}
