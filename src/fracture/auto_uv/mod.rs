//! Automatic UVs for the faces of a geometry collection: box projection, packing of the UV
//! islands in the unit square, and baking of attributes of the internal faces into a texture.

pub use self::active_triangles::{set_active_triangles, UseMaterials};
pub use self::box_projection::box_project_uvs;
pub use self::texture::{
    texture_internal_surfaces, BakeAttribute, TextureAttributeSettings, TextureImage,
};
pub use self::uv_layout::uv_layout;

use super::FractureError;
use crate::collection::GeometryCollection;
use crate::math::{Point, Real};

mod active_triangles;
mod box_projection;
mod texture;
mod uv_layout;

fn check_uv_channel(collection: &GeometryCollection, channel: usize) -> Result<(), FractureError> {
    let num_channels = collection.num_uv_layers();
    if channel < num_channels {
        Ok(())
    } else {
        Err(FractureError::InvalidUvChannel {
            channel,
            num_channels,
        })
    }
}

// The vertices of the collection, in the frame of its root.
fn global_vertices(collection: &GeometryCollection) -> Vec<Point<Real>> {
    let transforms: Vec<_> = (0..collection.transform.len()).collect();
    let globals = collection.global_transforms(&transforms);
    collection
        .vertex
        .iter()
        .zip(&collection.bone_map)
        .map(|(pt, bone)| globals[*bone] * pt)
        .collect()
}
