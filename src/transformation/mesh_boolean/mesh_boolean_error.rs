use crate::mesh::MeshError;

/// Errors that can occur when computing a boolean operation between two meshes.
///
/// These are numerical failures of the intersection machinery. Callers cutting geometry
/// collections log them and treat the affected branch as empty.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MeshBooleanError {
    /// A point of the intersection curve could not be inserted into the triangulation of the
    /// given triangle (usually because of non-finite coordinates).
    #[error("internal failure while triangulating the triangle {0} along the intersection curve")]
    TriangulationError(u32),

    /// The output mesh could not be assembled.
    #[error("MeshError: {0}")]
    MeshError(MeshError),
}

impl From<MeshError> for MeshBooleanError {
    fn from(value: MeshError) -> Self {
        MeshBooleanError::MeshError(value)
    }
}
