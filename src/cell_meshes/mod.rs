//! Closed augmented meshes of the cells of a cut, ready to be intersected with the pieces of a
//! geometry collection.

pub use self::cell_meshes::{material_to_plane, plane_to_material, CellMeshes};
pub use self::cell_meshes_error::CellMeshesError;
pub(crate) use self::plane_frame::PlaneFrame;

mod cell_meshes;
mod cell_meshes_error;
mod noisy_cells;
mod plane_frame;
mod single_plane;
