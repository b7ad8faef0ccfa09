/// Errors that can occur while building [`PlanarCells`](super::PlanarCells).
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlanarCellsError {
    /// The number of pixels of an image doesn't match its dimensions.
    #[error("the image has {actual} pixels but its dimensions require {expected}")]
    ImageSizeMismatch {
        /// The number of pixels implied by the image width and height.
        expected: usize,
        /// The number of pixels actually provided.
        actual: usize,
    },

    /// The boundary of an image region isn't a single simple loop.
    ///
    /// This happens for regions with holes, and for regions touching themselves at a
    /// pixel corner.
    #[error("the boundary of the image region {0} is not a single simple loop")]
    UnsupportedRegionBoundary(usize),

    /// Two Voronoi sites are at the same position.
    #[error("the Voronoi sites {0} and {1} are coincident")]
    CoincidentSites(usize, usize),
}
