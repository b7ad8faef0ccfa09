use super::cut_cells::{cut_by_cells, internal_material_for, retire_superseded, DOMAIN_MARGIN};
use super::{CutFlags, CutOptions, FractureError};
use crate::bounding_volume::BoundingVolume;
use crate::cell_meshes::CellMeshes;
use crate::cells::{InternalSurfaceMaterials, PlanarCells, Plane};
use crate::collection::{GeometryCollection, GeometryIndex};
use crate::conversion::{
    bone_name, split_islands, DynamicMeshCollection, MeshData, VertexHashCache,
};
use crate::mesh::DynamicMesh;
use crate::transformation::{mesh_boolean, BooleanOp};
use std::collections::BTreeSet;

// Symmetric adjacency between the working meshes of a multi-plane cut.
#[derive(Default)]
struct WorkingProximity {
    links: Vec<BTreeSet<usize>>,
}

impl WorkingProximity {
    fn link(&mut self, a: usize, b: usize) {
        let len = self.links.len().max(a.max(b) + 1);
        self.links.resize(len, BTreeSet::new());
        let _ = self.links[a].insert(b);
        let _ = self.links[b].insert(a);
    }

    fn take_neighbors(&mut self, a: usize) -> BTreeSet<usize> {
        let neighbors = self
            .links
            .get_mut(a)
            .map(std::mem::take)
            .unwrap_or_default();
        for b in &neighbors {
            let _ = self.links[*b].remove(&a);
        }
        neighbors
    }
}

impl DynamicMeshCollection {
    /// Cuts every mesh by each plane of `planes` in turn and adds the resulting pieces to
    /// `collection`.
    ///
    /// Each plane cuts all the pieces produced by the previous ones. If the collection tracks
    /// proximity, the adjacency of the pieces is maintained through the cuts and written once
    /// every plane has been applied. With a positive grout, the grout slabs of all the planes
    /// are merged into a single cell removed from the meshes at once.
    ///
    /// Returns the first new geometry, or `None` if nothing was cut.
    pub fn cut_with_multiple_planes(
        &self,
        planes: &[Plane],
        internal_materials: &InternalSurfaceMaterials,
        collection: &mut GeometryCollection,
        options: &CutOptions,
    ) -> Result<Option<GeometryIndex>, FractureError> {
        if options.grout > 0.0 {
            return self.cut_with_grout_slabs(planes, internal_materials, collection, options);
        }

        let num_uv_layers = collection.num_uv_layers();
        let fill = options.flags.contains(CutFlags::FILL_HOLES);
        let noise_amplitude = internal_materials.noise.map_or(0.0, |n| n.amplitude);
        let track_proximity = collection.proximity.is_some();

        let mut to_cut: Vec<MeshData> = self.meshes.clone();
        let mut proximity = WorkingProximity::default();
        let mut hashes = VertexHashCache::default();

        for plane in planes {
            let mut cells = PlanarCells::from_plane(*plane);
            cells.internal_surface_materials = internal_materials.clone();
            let cell_meshes = CellMeshes::new(
                num_uv_layers,
                &cells,
                &self.bounds,
                0.0,
                self.bounds.max_dim() * DOMAIN_MARGIN,
                false,
            )?;

            for id in 0..to_cut.len() {
                let bounds = to_cut[id].bounds().loosened(noise_amplitude);
                if !bounds.straddles_plane(&plane.normal, plane.w) {
                    continue;
                }

                let results = cut_by_cells(&to_cut[id], &cell_meshes, fill);
                if results.iter().any(|m| m.triangle_count() == 0) {
                    continue;
                }

                let transform_index = to_cut[id].transform_index;
                let from_collection = to_cut[id].from_collection;
                // The id of each new working mesh, with the half-space it comes from.
                let mut new_pieces = vec![];

                for (side, result) in results.into_iter().enumerate() {
                    let islands = split_islands(&result).unwrap_or_else(|| vec![result]);
                    for island in islands {
                        let piece_id = if new_pieces.is_empty() {
                            to_cut[id].set_mesh(island);
                            hashes.invalidate(id);
                            id
                        } else {
                            to_cut.push(MeshData::new(island, transform_index, from_collection));
                            to_cut.len() - 1
                        };
                        new_pieces.push((piece_id, side));
                    }
                }

                if !track_proximity {
                    continue;
                }

                for neighbor in proximity.take_neighbors(id) {
                    for (piece, _) in &new_pieces {
                        if hashes.is_neighboring(
                            *piece,
                            to_cut[*piece].mesh(),
                            neighbor,
                            to_cut[neighbor].mesh(),
                        ) {
                            proximity.link(*piece, neighbor);
                        }
                    }
                }

                if let [(a, _), (b, _)] = new_pieces[..] {
                    proximity.link(a, b);
                } else {
                    for (i, (a, side_a)) in new_pieces.iter().enumerate() {
                        for (b, side_b) in &new_pieces[i + 1..] {
                            // Islands of the same half-space never touch.
                            if side_a != side_b
                                && hashes.is_neighboring(
                                    *a,
                                    to_cut[*a].mesh(),
                                    *b,
                                    to_cut[*b].mesh(),
                                )
                            {
                                proximity.link(*a, *b);
                            }
                        }
                    }
                }
            }
        }

        let mut new_geometry_start = None;
        let mut superseded = vec![];
        let mut piece_geometries = vec![None; to_cut.len()];

        for source in &self.meshes {
            let transform_index = source.transform_index;
            let pieces: Vec<usize> = (0..to_cut.len())
                .filter(|id| to_cut[*id].transform_index == transform_index)
                .collect();
            if pieces.len() <= 1 {
                continue;
            }
            let Some(geometry) = collection.transform_to_geometry_index[transform_index] else {
                continue;
            };

            let internal_material =
                internal_material_for(internal_materials, collection, geometry, options.flags);

            for (sub_part, piece) in pieces.into_iter().enumerate() {
                let name = bone_name(collection, transform_index, sub_part);
                piece_geometries[piece] = Self::append_to_collection(
                    &to_cut[piece].from_collection,
                    to_cut[piece].mesh(),
                    options.collision_sample_spacing,
                    transform_index,
                    name,
                    collection,
                    internal_material,
                );
                if let Some(new_geometry) = piece_geometries[piece] {
                    let _ = new_geometry_start.get_or_insert(new_geometry);
                }
            }

            superseded.push(geometry);
        }

        for (a, neighbors) in proximity.links.iter().enumerate() {
            for b in neighbors.range(a + 1..) {
                if let (Some(ga), Some(gb)) = (piece_geometries[a], piece_geometries[*b]) {
                    collection.link_proximity(ga, gb);
                }
            }
        }

        Ok(retire_superseded(
            collection,
            superseded,
            options.superseded_geometry,
            new_geometry_start,
        ))
    }

    // Removes the union of the grout slabs of every plane from the meshes. The pieces left
    // between the slabs become the new pieces, and the parts inside of the slabs are dropped.
    fn cut_with_grout_slabs(
        &self,
        planes: &[Plane],
        internal_materials: &InternalSurfaceMaterials,
        collection: &mut GeometryCollection,
        options: &CutOptions,
    ) -> Result<Option<GeometryIndex>, FractureError> {
        let num_uv_layers = collection.num_uv_layers();
        let domain = self.bounds.loosened(self.bounds.max_dim() * DOMAIN_MARGIN);
        let mut grout: Option<DynamicMesh> = None;

        for plane in planes {
            let mut cells = PlanarCells::from_plane(*plane);
            cells.internal_surface_materials = internal_materials.clone();
            let slab = CellMeshes::make_only_planar_grout_cell(
                num_uv_layers,
                &cells,
                &domain,
                options.grout,
            )?;

            for slab in slab.cells {
                grout = Some(match grout {
                    None => slab,
                    Some(acc) => match mesh_boolean(&acc, &slab, BooleanOp::Union) {
                        Ok(result) => result.mesh,
                        Err(err) => {
                            log::warn!("Failed to merge a grout slab, appending it: {}", err);
                            let mut acc = acc;
                            let _ = acc.append_mesh(&slab, false);
                            acc
                        }
                    },
                });
            }
        }

        let Some(grout) = grout else {
            return Ok(None);
        };

        let cell_meshes = CellMeshes {
            cells: vec![grout.clone(), grout],
            outside_cell_index: Some(1),
            num_uv_layers,
        };

        Ok(self.cut_with_cell_meshes_except(
            internal_materials,
            &[(0, None)],
            &cell_meshes,
            collection,
            options,
            Some(0),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::WorkingProximity;

    #[test]
    fn working_proximity_stays_symmetric() {
        let mut proximity = WorkingProximity::default();
        proximity.link(0, 3);
        proximity.link(0, 1);
        proximity.link(1, 3);

        let neighbors = proximity.take_neighbors(0);
        assert_eq!(neighbors.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(proximity.links[1].iter().eq([3].iter()));
        assert!(proximity.links[3].iter().eq([1].iter()));
        assert!(proximity.take_neighbors(7).is_empty());
    }
}
