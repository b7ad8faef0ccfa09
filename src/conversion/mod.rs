//! Conversion of the pieces of a geometry collection to editable meshes and back, and the
//! connectivity tests run on the converted meshes.

pub use self::dynamic_mesh_collection::{bone_name, DynamicMeshCollection};
pub use self::islands::{split_islands, ISLAND_SNAP_DISTANCE};
pub use self::mesh_data::MeshData;
pub use self::neighbors::{
    fill_vertex_hash, is_neighboring, MeshVertexHash, NEIGHBOR_DISTANCE, NEIGHBOR_HASH_CELL_SIZE,
};
pub(crate) use self::neighbors::VertexHashCache;

mod dynamic_mesh_collection;
mod islands;
mod mesh_data;
mod neighbors;
