/// Errors that can occur while editing a [`DynamicMesh`](super::DynamicMesh).
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MeshError {
    /// A vertex index does not refer to a vertex of the mesh.
    #[error("the vertex {0} does not exist")]
    InvalidVertex(u32),
    /// A triangle index does not refer to a triangle of the mesh.
    #[error("the triangle {0} does not exist")]
    InvalidTriangle(u32),
    /// A triangle references the same vertex more than once.
    #[error("the triangle {0:?} references the same vertex twice")]
    DegenerateTriangle([u32; 3]),
    /// Adding the triangle would give one of its edges more than two incident triangles.
    #[error("adding the triangle {0:?} would create a non-manifold edge")]
    NonManifoldEdge([u32; 3]),
}
