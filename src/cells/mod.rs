//! Descriptions of the cells a mesh is cut into, as planar polygons separating pairs of cells.

pub use self::image::OUTSIDE_COLOR;
pub use self::internal_materials::InternalSurfaceMaterials;
pub use self::planar_cells::{PlanarCells, Plane};
pub use self::planar_cells_error::PlanarCellsError;
pub use self::voronoi::{compute_voronoi_cells, VoronoiCell, VoronoiFace};

mod image;
mod internal_materials;
mod planar_cells;
mod planar_cells_error;
mod voronoi;
