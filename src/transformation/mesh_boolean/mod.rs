//! Boolean operations between closed augmented meshes.

pub use self::mesh_boolean::{mesh_boolean, BooleanOp, MeshBooleanResult};
pub use self::mesh_boolean_error::MeshBooleanError;
pub use self::winding_number::winding_number;
use self::winding_number::triangles_winding_number;
pub(crate) use self::triangle_triangle_intersection::{
    triangle_triangle_intersection, TriangleTriangleIntersection,
};

use crate::math::Real;

mod mesh_boolean;
mod mesh_boolean_error;
mod triangle_triangle_intersection;
mod winding_number;

const EPS: Real = 1.0e-6;
