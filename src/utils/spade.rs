use crate::math::Real;
use na::Point2;

// Clamps a coordinate to the range of values spade accepts, flushing tiny values to zero.
fn sanitize_spade_coord(coord: Real) -> Real {
    let abs = coord.abs();
    if abs <= spade::MIN_ALLOWED_VALUE {
        0.0
    } else if abs > spade::MAX_ALLOWED_VALUE {
        spade::MAX_ALLOWED_VALUE * coord.signum()
    } else {
        coord
    }
}

/// The spade point of a 2D point of a cell boundary, with its coordinates clamped to what the
/// triangulation supports.
pub fn to_spade_point(point: &Point2<Real>) -> spade::Point2<Real> {
    spade::Point2::new(sanitize_spade_coord(point.x), sanitize_spade_coord(point.y))
}
