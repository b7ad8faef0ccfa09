use super::cell_meshes::{plane_to_material, safe_noise_spacing};
use super::{CellMeshes, CellMeshesError, PlaneFrame};
use crate::bounding_volume::Aabb;
use crate::cells::{PlanarCells, Plane};
use crate::math::{Point, Point2, Real, Vector, KINDA_SMALL_NUMBER};
use crate::mesh::{recompute_normals, DynamicMesh, MeshError, VertexInfo};
use crate::transformation::{split_long_edges, NoiseField};
use crate::utils::hashmap::HashMap;

// UV layout of the surfaces and caps of a single-plane cut.
struct PlaneUvs {
    frame: PlaneFrame,
    min: Point2<Real>,
    scale: Real,
    num_layers: usize,
}

impl PlaneUvs {
    fn append_vertex(&self, mesh: &mut DynamicMesh, info: &VertexInfo) -> u32 {
        let vid = mesh.append_vertex_info(info);
        let uv = Point2::from((self.frame.to_plane_uv(&info.position) - self.min) * self.scale);
        mesh.set_all_uv(vid, uv, self.num_layers);
        vid
    }
}

impl CellMeshes {
    /// Meshes the two half-spaces separated by the infinite plane of `cells`, clipped to
    /// `domain`, or only the slab of thickness `grout` around it if `only_grout` is set.
    ///
    /// With a positive `grout` and without `only_grout`, both half-spaces are pulled away from
    /// the plane by `grout / 2`.
    pub(super) fn create_meshes_for_single_plane(
        &mut self,
        cells: &PlanarCells,
        domain: &Aabb,
        uv_scale: Real,
        grout: Real,
        only_grout: bool,
    ) -> Result<(), CellMeshesError> {
        let plane = cells.planes[0];
        let normal = plane.normal;
        let materials = &cells.internal_surface_materials;
        let frame = PlaneFrame::axis_aligned(&plane);
        let corners = domain.vertices();

        let mut min_uv = Point2::new(Real::MAX, Real::MAX);
        let mut max_uv = Point2::new(-Real::MAX, -Real::MAX);
        let mut z_range = [-KINDA_SMALL_NUMBER, KINDA_SMALL_NUMBER];
        for corner in &corners {
            let uv = frame.to_plane_uv(corner);
            min_uv = min_uv.inf(&uv);
            max_uv = max_uv.sup(&uv);
            let z = plane.signed_distance(corner);
            z_range = [z_range[0].min(z), z_range[1].max(z)];
        }

        let amplitude = materials.noise.map(|n| n.amplitude.abs()).unwrap_or(0.0);
        let z_range = [z_range[0] - amplitude - grout, z_range[1] + amplitude + grout];

        let uvs = PlaneUvs {
            frame,
            min: min_uv,
            scale: uv_scale,
            num_layers: self.num_uv_layers,
        };

        let mut surface = self.empty_cell();
        let quad = [
            min_uv,
            Point2::new(max_uv.x, min_uv.y),
            max_uv,
            Point2::new(min_uv.x, max_uv.y),
        ];
        for uv in &quad {
            let _ = uvs.append_vertex(
                &mut surface,
                &VertexInfo::with_normal(frame.from_plane_uv(uv), normal),
            );
        }
        let _ = surface.append_triangle([0, 1, 2])?;
        let _ = surface.append_triangle([0, 2, 3])?;

        if let Some(noise) = &materials.noise {
            let extents = max_uv - min_uv;
            let spacing = safe_noise_spacing(extents.x * extents.y, noise.point_spacing);
            let _ = split_long_edges(&mut surface, spacing);
            NoiseField::new(noise.seed).apply(&mut surface, &normal, noise, true);
            recompute_normals(&mut surface);
        }

        if only_grout {
            let half_grout = normal * (grout * 0.5);
            let mut slab = surface.clone();
            slab.translate(&half_grout);
            let top_boundary = slab.boundary_edges();
            surface.translate(&-half_grout);
            let vmap = slab.append_mesh(&surface, true);

            for [p, q] in top_boundary {
                let [p2, q2] = [vmap[p as usize], vmap[q as usize]];
                let _ = slab.append_triangle([q, p, p2])?;
                let _ = slab.append_triangle([q, p2, q2])?;
            }

            set_all_materials(&mut slab, plane_to_material(0));
            self.cells[0] = slab;
            return Ok(());
        }

        let (cell, other) = cells.plane_cells[0];
        let other = other.unwrap_or(if cell == 0 { 1 } else { 0 });

        let mut below = surface.clone();
        extrude_boundary(&mut below, &plane, z_range[0], &uvs)?;

        let mut above = surface;
        above.reverse_orientation(true);
        extrude_boundary(&mut above, &plane, z_range[1], &uvs)?;

        if grout > 0.0 {
            below.translate(&(normal * (-grout * 0.5)));
            above.translate(&(normal * (grout * 0.5)));
        }

        set_all_materials(&mut below, plane_to_material(0));
        set_all_materials(&mut above, plane_to_material(0));
        self.cells[cell] = below;
        self.cells[other] = above;

        Ok(())
    }
}

fn set_all_materials(mesh: &mut DynamicMesh, material: i32) {
    let tids: Vec<_> = mesh.triangle_ids().collect();
    for tid in tids {
        mesh.set_material_id(tid, material);
    }
}

/// Closes the open surface `mesh` into a solid, with walls joining its boundary to a cap at the
/// signed distance `z` from `plane`.
///
/// The boundary of `mesh` must project onto a convex polygon of `plane`, and every vertex of
/// `mesh` must be on the other side of the cap than the one the surface faces.
fn extrude_boundary(
    mesh: &mut DynamicMesh,
    plane: &Plane,
    z: Real,
    uvs: &PlaneUvs,
) -> Result<(), MeshError> {
    let cap_normal: Vector<Real> = plane.normal * z.signum();
    let boundary = mesh.boundary_edges();
    let mut projections: HashMap<u32, u32> = HashMap::default();
    let mut center = Vector::zeros();

    for [p, _] in &boundary {
        let pt = mesh.vertex(*p);
        let projected = pt + plane.normal * (z - plane.signed_distance(&pt));
        center += projected.coords;
        let vid = uvs.append_vertex(mesh, &VertexInfo::with_normal(projected, cap_normal));
        let _ = projections.insert(*p, vid);
    }

    center /= boundary.len().max(1) as Real;
    let center = uvs.append_vertex(mesh, &VertexInfo::with_normal(Point::from(center), cap_normal));

    for [p, q] in boundary {
        let (p2, q2) = (projections[&p], projections[&q]);
        let _ = mesh.append_triangle([q, p, p2])?;
        let _ = mesh.append_triangle([q, p2, q2])?;
        let _ = mesh.append_triangle([center, q2, p2])?;
    }

    Ok(())
}
