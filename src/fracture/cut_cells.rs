use super::{CutFlags, CutOptions, SupersededGeometry};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::cell_meshes::{material_to_plane, CellMeshes};
use crate::cells::InternalSurfaceMaterials;
use crate::collection::{GeometryCollection, GeometryIndex};
use crate::conversion::{
    bone_name, split_islands, DynamicMeshCollection, MeshData, VertexHashCache,
};
use crate::math::Real;
use crate::mesh::{fill_holes, DynamicMesh, FillHolesOptions};
use crate::transformation::{mesh_boolean, BooleanOp};
use std::collections::BTreeSet;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// How much the cells are extended past the bounds of the cut meshes, relative to their size.
pub(super) const DOMAIN_MARGIN: Real = 0.01;

/// The part of `mesh` inside of the cell `cell_id`, or outside of it for the outside cell.
///
/// Boolean failures are logged and give an empty mesh.
pub(super) fn cut_by_cell(
    mesh: &DynamicMesh,
    mesh_bounds: &Aabb,
    cell_meshes: &CellMeshes,
    cell_id: usize,
    fill: bool,
) -> DynamicMesh {
    let cell = &cell_meshes.cells[cell_id];
    if cell.is_empty() || !cell.bounds().intersects(mesh_bounds) {
        return mesh.empty_like();
    }

    let op = if Some(cell_id) == cell_meshes.outside_cell_index {
        BooleanOp::Difference
    } else {
        BooleanOp::Intersect
    };

    match mesh_boolean(mesh, cell, op) {
        Ok(result) => {
            let mut piece = result.mesh;
            if fill && !result.created_boundary_edges.is_empty() {
                let _ = fill_holes(
                    &mut piece,
                    &result.created_boundary_edges,
                    &FillHolesOptions::default(),
                );
            }
            piece
        }
        Err(err) => {
            log::warn!("Boolean with the cell {} failed, skipping it: {}", cell_id, err);
            mesh.empty_like()
        }
    }
}

/// The pieces of `mesh` in each cell of `cell_meshes`.
pub(super) fn cut_by_cells(
    mesh: &MeshData,
    cell_meshes: &CellMeshes,
    fill: bool,
) -> Vec<DynamicMesh> {
    let bounds = mesh.bounds();
    let cut = |cell_id| cut_by_cell(mesh.mesh(), &bounds, cell_meshes, cell_id, fill);

    #[cfg(feature = "parallel")]
    return (0..cell_meshes.num_cells()).into_par_iter().map(cut).collect();
    #[cfg(not(feature = "parallel"))]
    return (0..cell_meshes.num_cells()).map(cut).collect();
}

/// The material of the internal surfaces of the pieces cut from `geometry`.
pub(super) fn internal_material_for(
    materials: &InternalSurfaceMaterials,
    collection: &GeometryCollection,
    geometry: GeometryIndex,
    flags: CutFlags,
) -> i32 {
    if flags.contains(CutFlags::DEFAULT_INTERNAL_MATERIALS_FROM_COLLECTION) {
        materials.default_material_id_for_geometry(collection, Some(geometry))
    } else {
        materials.global_material_id
    }
}

/// Hides or removes the geometries that were cut, updating the index of the first new geometry.
pub(super) fn retire_superseded(
    collection: &mut GeometryCollection,
    mut superseded: Vec<GeometryIndex>,
    policy: SupersededGeometry,
    new_geometry_start: Option<GeometryIndex>,
) -> Option<GeometryIndex> {
    match policy {
        SupersededGeometry::Hide => {
            collection.set_geometry_visibility(&superseded, false);
            new_geometry_start
        }
        SupersededGeometry::Remove => {
            superseded.sort_unstable();
            superseded.dedup();
            collection.remove_geometries(&superseded);
            // New geometries are always after the removed ones.
            new_geometry_start.map(|start| start - superseded.len())
        }
    }
}

impl DynamicMeshCollection {
    /// Cuts every mesh by the cells of `cell_meshes` and adds the resulting pieces to
    /// `collection`.
    ///
    /// `cell_connectivity` gives, for each plane, the pair of cells it separates (`None` for the
    /// outside), and is used to link the new pieces in the proximity graph, if the collection
    /// tracks it. Meshes that end up in fewer than two cells are left untouched.
    ///
    /// Returns the first new geometry, or `None` if nothing was cut.
    pub fn cut_with_cell_meshes(
        &self,
        internal_materials: &InternalSurfaceMaterials,
        cell_connectivity: &[(usize, Option<usize>)],
        cell_meshes: &CellMeshes,
        collection: &mut GeometryCollection,
        options: &CutOptions,
    ) -> Option<GeometryIndex> {
        self.cut_with_cell_meshes_except(
            internal_materials,
            cell_connectivity,
            cell_meshes,
            collection,
            options,
            None,
        )
    }

    // Like `cut_with_cell_meshes`, but the pieces falling in `discarded_cell` are dropped
    // instead of being added to the collection.
    pub(super) fn cut_with_cell_meshes_except(
        &self,
        internal_materials: &InternalSurfaceMaterials,
        cell_connectivity: &[(usize, Option<usize>)],
        cell_meshes: &CellMeshes,
        collection: &mut GeometryCollection,
        options: &CutOptions,
        discarded_cell: Option<usize>,
    ) -> Option<GeometryIndex> {
        let fill = options.flags.contains(CutFlags::FILL_HOLES);
        let mut new_geometry_start = None;
        let mut superseded = vec![];

        for surface in &self.meshes {
            let Some(geometry) = collection.transform_to_geometry_index[surface.transform_index]
            else {
                continue;
            };

            let results = cut_by_cells(surface, cell_meshes, fill);
            if results.iter().filter(|m| m.triangle_count() > 0).count() < 2 {
                continue;
            }

            let mut planes_in_output = BTreeSet::new();
            for mesh in &results {
                for tid in mesh.triangle_ids() {
                    if let Some(plane) = material_to_plane(mesh.material_id(tid)) {
                        let _ = planes_in_output.insert(plane);
                    }
                }
            }

            let internal_material =
                internal_material_for(internal_materials, collection, geometry, options.flags);
            let mut pieces: Vec<DynamicMesh> = vec![];
            let mut piece_geometries = vec![];
            let mut cell_pieces = vec![vec![]; results.len()];
            let mut sub_part = 0;

            for (cell_id, mesh) in results.into_iter().enumerate() {
                if mesh.triangle_count() == 0 || Some(cell_id) == discarded_cell {
                    continue;
                }

                let islands = split_islands(&mesh).unwrap_or_else(|| vec![mesh]);
                for island in islands {
                    let name = bone_name(collection, surface.transform_index, sub_part);
                    sub_part += 1;

                    if let Some(new_geometry) = Self::append_to_collection(
                        &surface.from_collection,
                        &island,
                        options.collision_sample_spacing,
                        surface.transform_index,
                        name,
                        collection,
                        internal_material,
                    ) {
                        let _ = new_geometry_start.get_or_insert(new_geometry);
                        cell_pieces[cell_id].push(pieces.len());
                        piece_geometries.push(new_geometry);
                        pieces.push(island);
                    }
                }
            }

            if collection.proximity.is_some() {
                let mut hashes = VertexHashCache::default();

                for plane in planes_in_output {
                    let Some((cell, other)) = cell_connectivity.get(plane) else {
                        continue;
                    };
                    let Some(other) = cell_meshes.other_cell(*other) else {
                        continue;
                    };
                    let (Some(side_a), Some(side_b)) =
                        (cell_pieces.get(*cell), cell_pieces.get(other))
                    else {
                        continue;
                    };

                    if side_a.len() == 1 && side_b.len() == 1 {
                        collection.link_proximity(
                            piece_geometries[side_a[0]],
                            piece_geometries[side_b[0]],
                        );
                        continue;
                    }

                    for a in side_a {
                        for b in side_b {
                            if hashes.is_neighboring(*a, &pieces[*a], *b, &pieces[*b]) {
                                collection
                                    .link_proximity(piece_geometries[*a], piece_geometries[*b]);
                            }
                        }
                    }
                }
            }

            superseded.push(geometry);
        }

        retire_superseded(
            collection,
            superseded,
            options.superseded_geometry,
            new_geometry_start,
        )
    }
}
