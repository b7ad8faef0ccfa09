/// Errors that can occur when editing a [`GeometryCollection`](super::GeometryCollection).
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum CollectionError {
    /// A per-geometry array doesn't have one entry per geometry.
    #[error("expected one entry per geometry ({expected}), found {actual}")]
    MismatchedGeometryCount {
        /// The number of geometries of the collection.
        expected: usize,
        /// The number of entries provided.
        actual: usize,
    },

    /// A mesh can't overwrite a geometry with a different number of vertices or faces.
    #[error(
        "the geometry {geometry} has {expected_vertices} vertices and {expected_faces} faces, \
         but the mesh has {actual_vertices} vertices and {actual_faces} faces"
    )]
    MismatchedCounts {
        /// The geometry being updated.
        geometry: usize,
        /// The vertex count of the geometry.
        expected_vertices: usize,
        /// The face count of the geometry.
        expected_faces: usize,
        /// The vertex count of the mesh.
        actual_vertices: usize,
        /// The face count of the mesh.
        actual_faces: usize,
    },

    /// The transform index is out of bounds.
    #[error("invalid transform index {0}")]
    InvalidTransform(usize),

    /// The geometry index is out of bounds.
    #[error("invalid geometry index {0}")]
    InvalidGeometry(usize),

    /// A collection invariant doesn't hold.
    #[error("inconsistent collection: {0}")]
    Inconsistent(&'static str),
}
