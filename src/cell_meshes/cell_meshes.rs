use super::{CellMeshesError, PlaneFrame};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::cells::PlanarCells;
use crate::math::{Isometry, Point2, Real, ZERO_TOLERANCE};
use crate::mesh::{DynamicMesh, VertexInfo};
use crate::transformation::{triangulate_ear_clipping, triangulate_polygon_cdt, NoiseField};

/// Material id of the cell triangles lying on the plane `plane`.
pub fn plane_to_material(plane: usize) -> i32 {
    -(plane as i32 + 1)
}

/// The plane a cell triangle with the material `material` lies on, if any.
pub fn material_to_plane(material: i32) -> Option<usize> {
    (material < 0).then(|| (-(material + 1)) as usize)
}

/// The target edge length of noisy surfaces, relaxed so that meshing a surface of area
/// `surface_area` doesn't create more than about a million vertices.
pub(crate) fn safe_noise_spacing(surface_area: Real, target_spacing: Real) -> Real {
    const MAX_VERTICES: Real = 1_000_000.0;
    let min_edge_length = (surface_area / MAX_VERTICES).sqrt();
    let spacing = min_edge_length.max(target_spacing).max(0.001);

    if spacing > target_spacing {
        log::warn!(
            "Noise point spacing {} would add too many vertices, using {} instead.",
            target_spacing,
            spacing
        );
    }

    spacing
}

/// One closed augmented mesh per cell of a cut.
///
/// Cell triangles use the material id [`plane_to_material`] of the plane they lie on, so the
/// surfaces created by a cut can be traced back to their plane.
#[derive(Clone, Debug, Default)]
pub struct CellMeshes {
    /// The mesh of each cell.
    pub cells: Vec<DynamicMesh>,
    /// The cell standing for everything outside of the other cells.
    ///
    /// Pieces are subtracted from it instead of intersected with it.
    pub outside_cell_index: Option<usize>,
    /// The number of UV channels of the cell meshes.
    pub num_uv_layers: usize,
}

impl CellMeshes {
    /// Builds the meshes of the cells of `cells`, clipped to `domain` extended by
    /// `extend_domain`.
    ///
    /// If `include_outside_cell` is set (and `cells` isn't a single infinite plane), an extra
    /// outside cell is added. With a positive `grout`, the cells are shrunk to leave a gap of
    /// about `grout` between them.
    pub fn new(
        num_uv_layers: usize,
        cells: &PlanarCells,
        domain: &Aabb,
        grout: Real,
        extend_domain: Real,
        include_outside_cell: bool,
    ) -> Result<Self, CellMeshesError> {
        let materials = &cells.internal_surface_materials;
        let uv_scale = if materials.global_uv_scale > 0.0 {
            materials.global_uv_scale
        } else {
            1.0
        };

        let mut num_cells = cells.num_cells;
        let mut result = Self {
            num_uv_layers,
            ..Default::default()
        };

        if include_outside_cell && !cells.is_infinite_plane() {
            result.outside_cell_index = Some(num_cells);
            num_cells += 1;
        }

        for (plane, (cell, other)) in cells.plane_cells.iter().enumerate() {
            for cell in core::iter::once(*cell).chain(*other) {
                if cell >= cells.num_cells {
                    return Err(CellMeshesError::InvalidCell {
                        plane,
                        cell,
                        num_cells: cells.num_cells,
                    });
                }
            }
        }

        result.cells = (0..num_cells).map(|_| result.empty_cell()).collect();

        let extend_domain = extend_domain + materials.noise.map(|n| n.amplitude).unwrap_or(0.0);
        let domain = domain.loosened(extend_domain);

        if cells.is_infinite_plane() {
            result.create_meshes_for_single_plane(cells, &domain, uv_scale, grout, false)?;
        } else {
            match &materials.noise {
                None => result.create_meshes_for_bounded_planes(cells, uv_scale)?,
                Some(noise) => {
                    let field = NoiseField::new(noise.seed);
                    result.create_noisy_meshes_for_bounded_planes(cells, noise, &field, uv_scale)?
                }
            }
            result.apply_general_grout(grout);
        }

        for cell in &mut result.cells {
            cell.set_default_attributes(materials.global_visibility);
        }

        Ok(result)
    }

    /// Uses a single closed mesh as the cutting cell.
    ///
    /// The cutter is cell 0, and a copy of it is the outside cell 1. It is augmented with
    /// `num_uv_layers` channels if it wasn't already.
    pub fn from_cutter(
        num_uv_layers: usize,
        mut cutter: DynamicMesh,
        transform: Option<&Isometry<Real>>,
    ) -> Self {
        if let Some(transform) = transform {
            cutter.transform_by(transform);
        }

        if !cutter.is_augmented() {
            cutter.augment(num_uv_layers);
        }

        Self {
            cells: vec![cutter.clone(), cutter],
            outside_cell_index: Some(1),
            num_uv_layers,
        }
    }

    /// A single cell: the slab of thickness `grout` centered on the infinite plane of `cells`.
    ///
    /// Returns no cell if `grout` isn't positive or if `cells` isn't a single infinite plane.
    pub fn make_only_planar_grout_cell(
        num_uv_layers: usize,
        cells: &PlanarCells,
        domain: &Aabb,
        grout: Real,
    ) -> Result<Self, CellMeshesError> {
        let mut result = Self {
            num_uv_layers,
            ..Default::default()
        };

        if grout <= 0.0 || !cells.is_infinite_plane() {
            return Ok(result);
        }

        let materials = &cells.internal_surface_materials;
        let uv_scale = if materials.global_uv_scale > 0.0 {
            materials.global_uv_scale
        } else {
            1.0
        };
        let extend_domain = materials.noise.map(|n| n.amplitude).unwrap_or(0.0);
        let domain = domain.loosened(extend_domain);

        result.cells = vec![result.empty_cell()];
        result.create_meshes_for_single_plane(cells, &domain, uv_scale, grout, true)?;

        for cell in &mut result.cells {
            cell.set_default_attributes(materials.global_visibility);
        }

        Ok(result)
    }

    /// The number of cells, including the outside cell.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn empty_cell(&self) -> DynamicMesh {
        let mut mesh = DynamicMesh::new();
        mesh.augment(self.num_uv_layers);
        mesh
    }

    /// Shrinks every cell about its vertex centroid so that it leaves `grout / 2` free along its
    /// longest axis, then rebuilds the outside cell as the union of the shrunk cells.
    ///
    /// Cells too small to be shrunk that much are cleared.
    pub fn apply_general_grout(&mut self, grout: Real) {
        if grout <= 0.0 {
            return;
        }

        for cell_id in 0..self.cells.len() {
            if Some(cell_id) == self.outside_cell_index {
                continue;
            }

            let mesh = &mut self.cells[cell_id];
            let centroid = mesh.vertex_centroid();
            let size = mesh.bounds().max_dim();
            let scale = (size - grout * 0.5) / size;

            if scale.is_nan() || scale < ZERO_TOLERANCE * 1000.0 {
                *mesh = mesh.empty_like();
            } else {
                mesh.scale_about(&centroid, scale);
            }
        }

        if let Some(outside) = self.outside_cell_index {
            let mut outside_mesh = self.empty_cell();
            for (cell_id, mesh) in self.cells.iter().enumerate() {
                if cell_id != outside {
                    let _ = outside_mesh.append_mesh(mesh, false);
                }
            }
            self.cells[outside] = outside_mesh;
        }
    }

    // The cell on the positive side of a plane, with the outside standing for `None`.
    pub(crate) fn other_cell(&self, other: Option<usize>) -> Option<usize> {
        other.or(self.outside_cell_index)
    }

    fn create_meshes_for_bounded_planes(
        &mut self,
        cells: &PlanarCells,
        uv_scale: Real,
    ) -> Result<(), CellMeshesError> {
        for (plane_id, plane) in cells.planes.iter().enumerate() {
            let (cell, other) = cells.plane_cells[plane_id];
            let other_cell = self.other_cell(other);
            // The outside cell is subtracted, so it keeps the orientation of the plane.
            let flip_other = other.is_some();
            let boundary: Vec<_> = cells.plane_boundary(plane_id).collect();
            if boundary.len() < 3 {
                continue;
            }

            let frame = PlaneFrame::axis_aligned(plane);
            let uvs: Vec<_> = boundary.iter().map(|pt| frame.to_plane_uv(pt)).collect();
            let min_uv = uvs.iter().fold(Point2::new(Real::MAX, Real::MAX), |m, uv| {
                Point2::new(m.x.min(uv.x), m.y.min(uv.y))
            });

            let triangles = if cells.assume_convex_cells {
                (1..boundary.len() as u32 - 1)
                    .map(|i| [0, i, i + 1])
                    .collect()
            } else {
                triangulate_polygon_cdt(&uvs)
                    .or_else(|| triangulate_ear_clipping(&uvs))
                    .ok_or(CellMeshesError::TriangulationFailed(plane_id))?
            };

            let material = plane_to_material(plane_id);
            let targets =
                core::iter::once((cell, false)).chain(other_cell.map(|c| (c, flip_other)));

            for (target, flipped) in targets {
                let mesh = &mut self.cells[target];
                let normal = if flipped { -plane.normal } else { plane.normal };
                let vids: Vec<u32> = boundary
                    .iter()
                    .zip(uvs.iter())
                    .map(|(pt, uv)| {
                        let vid = mesh.append_vertex_info(&VertexInfo::with_normal(*pt, normal));
                        let uv = Point2::from((uv - min_uv) * uv_scale);
                        mesh.set_all_uv(vid, uv, self.num_uv_layers);
                        vid
                    })
                    .collect();

                for tri in &triangles {
                    let mut tri = tri.map(|i| vids[i as usize]);
                    if flipped {
                        tri.swap(1, 2);
                    }
                    let tid = mesh.append_triangle(tri)?;
                    mesh.set_material_id(tid, material);
                }
            }
        }

        Ok(())
    }
}
