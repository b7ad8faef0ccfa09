//! The editable triangle mesh used by every fracturing operation, and the processing passes
//! applied to it.

pub use self::attributes::{MeshAttributes, VertexInfo};
pub use self::dynamic_mesh::DynamicMesh;
pub use self::fan::{contiguous_fan_groups, FanGroup, FanStep, TriangleFan};
pub use self::fill_holes::{fill_holes, FillHolesOptions};
pub use self::mesh_error::MeshError;
pub use self::normals::{compute_tangents, initialize_overlay_to_crease_normals, recompute_normals};
pub use self::overlay::{MeshOverlays, Overlay};

mod attributes;
mod collision_samples;
mod dynamic_mesh;
mod fan;
mod fill_holes;
mod mesh_error;
mod normals;
mod overlay;
