use crate::cell_meshes::CellMeshesError;
use crate::collection::CollectionError;

/// Errors that can occur while fracturing a geometry collection.
///
/// Failures of individual boolean operations are not reported here: the affected piece is left
/// uncut and the cut carries on.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum FractureError {
    /// The cutting cells could not be meshed.
    #[error("CellMeshesError: {0}")]
    CellMeshesError(CellMeshesError),

    /// The collection could not be updated.
    #[error("CollectionError: {0}")]
    CollectionError(CollectionError),

    /// The requested UV channel does not exist in the collection.
    #[error("UV channel {channel} is out of range: the collection has {num_channels} channels")]
    InvalidUvChannel {
        /// The requested channel.
        channel: usize,
        /// The number of channels of the collection.
        num_channels: usize,
    },
}

impl From<CellMeshesError> for FractureError {
    fn from(value: CellMeshesError) -> Self {
        FractureError::CellMeshesError(value)
    }
}

impl From<CollectionError> for FractureError {
    fn from(value: CollectionError) -> Self {
        FractureError::CollectionError(value)
    }
}
