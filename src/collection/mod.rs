//! The geometry collection: rigid pieces organized in a transform hierarchy, with their
//! triangle geometry stored as flat parallel arrays.

pub use self::collection_error::CollectionError;
pub use self::geometry_collection::{
    GeometryCollection, GeometryIndex, Group, MaterialSection, SimulationType, TransformIndex,
};

mod collection_error;
mod geometry_collection;
