use crate::mesh::MeshError;

/// Errors that can occur while building the meshes of cutting cells.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum CellMeshesError {
    /// A plane separates a cell that doesn't exist.
    #[error("the plane {plane} references the cell {cell}, but there are only {num_cells} cells")]
    InvalidCell {
        /// The plane referencing the cell.
        plane: usize,
        /// The invalid cell index.
        cell: usize,
        /// The number of cells.
        num_cells: usize,
    },

    /// The boundary polygon of a plane could not be triangulated.
    #[error("the boundary of the plane {0} could not be triangulated")]
    TriangulationFailed(usize),

    /// A cell mesh could not be assembled.
    #[error("MeshError: {0}")]
    MeshError(MeshError),
}

impl From<MeshError> for CellMeshesError {
    fn from(value: MeshError) -> Self {
        CellMeshesError::MeshError(value)
    }
}
