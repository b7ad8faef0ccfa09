//! Transformation, triangulation and boolean combination of meshes.

pub use self::ear_clipping::{polygon_normal, triangulate_ear_clipping, triangulate_simple_polygon};
pub use self::mesh_boolean::{
    mesh_boolean, winding_number, BooleanOp, MeshBooleanError, MeshBooleanResult,
};
pub use self::noise::{perlin_noise3, NoiseField, NoiseSettings};
pub use self::polygon_triangulation::triangulate_polygon_cdt;
pub use self::remesh::split_long_edges;

mod ear_clipping;
pub mod mesh_boolean;
mod noise;
mod polygon_triangulation;
mod remesh;
