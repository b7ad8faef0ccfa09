use crate::math::{Isometry, Real};

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// Flags controlling how pieces are cut.
pub struct CutFlags(u8);

bitflags::bitflags! {
    impl CutFlags: u8 {
        /// Cut with an extra cell covering everything outside of the cells, so that the parts of
        /// the pieces outside of every cell are kept as pieces too.
        const INCLUDE_OUTSIDE_CELL = 1;
        /// Derive the material of the new internal surfaces from the most common material of the
        /// collection instead of using the material of the cells.
        const DEFAULT_INTERNAL_MATERIALS_FROM_COLLECTION = 1 << 1;
        /// Fill the holes left on the boundary of the pieces by the booleans.
        const FILL_HOLES = 1 << 2;
    }
}

impl Default for CutFlags {
    fn default() -> Self {
        CutFlags::DEFAULT_INTERNAL_MATERIALS_FROM_COLLECTION
    }
}

/// What happens to the geometry of a piece once it has been cut into new pieces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum SupersededGeometry {
    /// The faces of the cut geometry are made invisible, so indices of existing geometries stay
    /// valid.
    #[default]
    Hide,
    /// The cut geometry is removed from the collection.
    Remove,
}

/// Parameters shared by all the cutting operations.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CutOptions {
    /// The width of the gap left between adjacent pieces.
    pub grout: Real,
    /// If positive, the new pieces get collision sample vertices spaced by about this distance.
    pub collision_sample_spacing: Real,
    /// Maps the root of the collection to the frame the cells are expressed in.
    pub collection_to_world: Isometry<Real>,
    /// Cutting flags.
    pub flags: CutFlags,
    /// What happens to the geometry of the pieces that were cut.
    pub superseded_geometry: SupersededGeometry,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            grout: 0.0,
            collision_sample_spacing: 0.0,
            collection_to_world: Isometry::identity(),
            flags: CutFlags::default(),
            superseded_geometry: SupersededGeometry::default(),
        }
    }
}

/// How a piece that is too small picks the neighbor it is merged into.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum NeighborSelectionMethod {
    /// The neighbor with the largest volume.
    #[default]
    LargestNeighbor,
    /// The neighbor whose bounding box center is the closest.
    NearestCenter,
}

/// Parameters of [`merge_bones`](super::merge_bones).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MergeBonesOptions {
    /// Pieces with a volume smaller than this are merged into a neighbor.
    pub min_volume: Real,
    /// Merge the meshes with a boolean union instead of simply appending them.
    pub union_meshes: bool,
    /// How the neighbor a piece is merged into is picked.
    pub neighbor_selection: NeighborSelectionMethod,
}

impl Default for MergeBonesOptions {
    fn default() -> Self {
        Self {
            min_volume: 0.0,
            union_meshes: true,
            neighbor_selection: NeighborSelectionMethod::default(),
        }
    }
}
