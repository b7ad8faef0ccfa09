use crate::math::{Point, Real};

/// A coarse volume enclosing some geometry, used to skip the exact tests that can't succeed.
pub trait BoundingVolume {
    /// A point inside of this volume, ideally its center.
    fn center(&self) -> Point<Real>;

    /// Do this volume and `other` overlap?
    fn intersects(&self, other: &Self) -> bool;

    /// Is `other` entirely inside of this volume?
    fn contains(&self, other: &Self) -> bool;

    /// Grows this volume so it also encloses `other`.
    fn merge(&mut self, other: &Self);

    /// The smallest volume enclosing both this volume and `other`.
    fn merged(&self, other: &Self) -> Self;

    /// This volume grown by `amount` in every direction.
    fn loosened(&self, amount: Real) -> Self;
}
