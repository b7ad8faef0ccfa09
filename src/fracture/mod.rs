//! Fracturing operations on a geometry collection: cutting pieces by cells, planes or meshes,
//! merging small pieces into their neighbors, and attribute passes on the pieces.

pub use self::attributes::{add_collision_sample_vertices, recompute_normals_and_tangents};
pub use self::auto_uv::{
    box_project_uvs, set_active_triangles, texture_internal_surfaces, uv_layout, BakeAttribute,
    TextureAttributeSettings, TextureImage, UseMaterials,
};
pub use self::bones::{find_bone_volumes, find_small_bones, merge_bones};
pub use self::cut::{
    cut_multiple_with_multiple_planes, cut_multiple_with_planar_cells, cut_with_mesh,
    cut_with_planar_cells,
};
pub use self::export::convert_to_mesh_description;
pub use self::fracture_error::FractureError;
pub use self::options::{
    CutFlags, CutOptions, MergeBonesOptions, NeighborSelectionMethod, SupersededGeometry,
};

mod attributes;
mod auto_uv;
mod bones;
mod cut;
mod cut_cells;
mod cut_planes;
mod export;
mod fracture_error;
mod options;
