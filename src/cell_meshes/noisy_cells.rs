use super::cell_meshes::{material_to_plane, plane_to_material, safe_noise_spacing};
use super::{CellMeshes, CellMeshesError, PlaneFrame};
use crate::cells::PlanarCells;
use crate::math::{Point, Point2, Real, ZERO_TOLERANCE};
use crate::mesh::{recompute_normals, DynamicMesh, VertexInfo};
use crate::partitioning::Bvh;
use crate::transformation::mesh_boolean::{
    triangle_triangle_intersection, TriangleTriangleIntersection,
};
use crate::transformation::{
    polygon_normal, split_long_edges, triangulate_ear_clipping, triangulate_polygon_cdt,
    NoiseField, NoiseSettings,
};
use crate::utils::PointHashGrid;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const MAX_RESOLVE_ITERATIONS: usize = 10;
const RESOLVE_SEARCH_STEPS: usize = 4;

/// A vertex of one of the cell meshes, as `(cell, vertex id)`.
type CellVertex = (usize, u32);

// The surface of a single plane, with the position of each vertex before noise was applied.
struct NoisyPlane {
    mesh: DynamicMesh,
    original_positions: Vec<Point<Real>>,
}

// A pair of intersecting triangles of a cell, and every vertex (of any cell) located at one of
// their corners.
struct Collision {
    triangles: [u32; 2],
    vertices: Vec<CellVertex>,
}

fn noisy_plane(
    cells: &PlanarCells,
    plane_id: usize,
    num_uv_layers: usize,
    noise: &NoiseSettings,
    field: &NoiseField,
    spacing: Real,
) -> Result<NoisyPlane, CellMeshesError> {
    let plane = &cells.planes[plane_id];
    let mut mesh = DynamicMesh::new();
    mesh.augment(num_uv_layers);

    let boundary: Vec<_> = cells.plane_boundary(plane_id).collect();
    if boundary.len() < 3 {
        return Ok(NoisyPlane {
            mesh,
            original_positions: vec![],
        });
    }

    let frame = PlaneFrame::axis_aligned(plane);
    let polygon: Vec<_> = boundary.iter().map(|pt| frame.to_plane_uv(pt)).collect();
    let vids: Vec<_> = boundary
        .iter()
        .map(|pt| mesh.append_vertex_info(&VertexInfo::with_normal(*pt, plane.normal)))
        .collect();

    let triangles = triangulate_polygon_cdt(&polygon)
        .or_else(|| triangulate_ear_clipping(&polygon))
        .ok_or(CellMeshesError::TriangulationFailed(plane_id))?;
    let material = plane_to_material(plane_id);
    for tri in triangles {
        let tid = mesh.append_triangle(tri.map(|i| vids[i as usize]))?;
        mesh.set_material_id(tid, material);
    }

    let _ = split_long_edges(&mut mesh, spacing);

    let mut original_positions = vec![Point::origin(); mesh.max_vertex_id() as usize];
    for vid in mesh.vertex_ids() {
        original_positions[vid as usize] = mesh.vertex(vid);
    }

    field.apply(&mut mesh, &plane.normal, noise, false);
    recompute_normals(&mut mesh);

    Ok(NoisyPlane {
        mesh,
        original_positions,
    })
}

fn crosses(
    mesh: &DynamicMesh,
    triangles: [u32; 2],
    position: impl Fn(u32) -> Point<Real>,
) -> bool {
    let [a, b] = triangles.map(|tid| mesh.triangle(tid));
    matches!(
        triangle_triangle_intersection(&a.map(&position), a, &b.map(&position), b),
        Some(TriangleTriangleIntersection::Segment(_))
    )
}

fn lerp(a: &Point<Real>, b: &Point<Real>, t: Real) -> Point<Real> {
    a + (b - a) * t
}

impl CellMeshes {
    /// Builds the cell meshes from the displaced surfaces of every plane.
    ///
    /// Each plane is refined and displaced independently. Since displacements only depend on
    /// positions, surfaces sharing a boundary stay geometrically connected, but the cells are
    /// not welded. Crossings created by the noise are then undone by moving the offending
    /// vertices back toward their original positions.
    pub(super) fn create_noisy_meshes_for_bounded_planes(
        &mut self,
        cells: &PlanarCells,
        noise: &NoiseSettings,
        field: &NoiseField,
        uv_scale: Real,
    ) -> Result<(), CellMeshesError> {
        let num_cells = self.cells.len();
        let num_planes = cells.planes.len();

        let mut cell_planes = vec![vec![]; num_cells];
        for (plane_id, (cell, other)) in cells.plane_cells.iter().enumerate() {
            cell_planes[*cell].push((plane_id, false));
            if let Some(other) = self.other_cell(*other) {
                cell_planes[other].push((plane_id, true));
            }
        }

        let total_area: Real = (0..num_planes)
            .map(|plane_id| {
                let boundary: Vec<_> = cells.plane_boundary(plane_id).collect();
                polygon_normal(&boundary).norm() * 0.5
            })
            .sum();
        let spacing = safe_noise_spacing(total_area, noise.point_spacing);

        let num_uv_layers = self.num_uv_layers;
        let build = |plane_id| noisy_plane(cells, plane_id, num_uv_layers, noise, field, spacing);
        #[cfg(feature = "parallel")]
        let planes: Vec<_> = (0..num_planes)
            .into_par_iter()
            .map(build)
            .collect::<Result<_, _>>()?;
        #[cfg(not(feature = "parallel"))]
        let planes: Vec<_> = (0..num_planes).map(build).collect::<Result<_, _>>()?;

        let mut original_positions = Vec::with_capacity(num_cells);
        for (cell_id, mesh) in self.cells.iter_mut().enumerate() {
            // The outside cell is subtracted, so it needs every plane flipped.
            let flip_outside = Some(cell_id) == self.outside_cell_index;
            let mut originals = vec![];

            for (plane_id, flipped) in &cell_planes[cell_id] {
                let plane = &planes[*plane_id];
                let vmap = mesh.append_mesh(&plane.mesh, *flipped ^ flip_outside);
                originals.extend(
                    vmap.iter()
                        .zip(plane.original_positions.iter())
                        .filter(|(vid, _)| **vid != u32::MAX)
                        .map(|(vid, pt)| (*vid, *pt)),
                );
            }

            // Vertices duplicated on non-manifold edges keep their displaced position.
            let mut positions = vec![Point::origin(); mesh.max_vertex_id() as usize];
            for vid in mesh.vertex_ids() {
                positions[vid as usize] = mesh.vertex(vid);
            }
            for (vid, pt) in originals {
                positions[vid as usize] = pt;
            }
            original_positions.push(positions);
        }

        self.resolve_noise_crossings(&original_positions);
        self.recompute_plane_uvs(cells, uv_scale);

        Ok(())
    }

    fn resolve_noise_crossings(&mut self, original_positions: &[Vec<Point<Real>>]) {
        let num_cells = self.cells.len();
        let mut grid = PointHashGrid::new(ZERO_TOLERANCE * 1000.0);
        for (cell_id, mesh) in self.cells.iter().enumerate() {
            for vid in mesh.vertex_ids() {
                grid.insert((cell_id, vid), mesh.vertex(vid));
            }
        }

        let mut cell_unmoved = vec![false; num_cells];

        for _ in 0..MAX_RESOLVE_ITERATIONS {
            let mut collisions: Vec<Vec<Collision>> = (0..num_cells).map(|_| vec![]).collect();
            let mut any_collision = false;

            for (cell_id, mesh) in self.cells.iter().enumerate() {
                if cell_unmoved[cell_id] {
                    continue;
                }

                let leaves = mesh
                    .triangle_ids()
                    .map(|tid| (tid as usize, mesh.triangle_aabb(tid)));
                let bvh = Bvh::from_iter(leaves);
                let mut pairs = vec![];
                bvh.self_leaf_pairs(&mut |a, b| pairs.push([a, b]));

                for triangles in pairs {
                    if !crosses(mesh, triangles, |vid| mesh.vertex(vid)) {
                        continue;
                    }

                    // Surfaces of different planes are not welded: compare positions to detect
                    // triangles sharing a corner.
                    let [pa, pb] = triangles.map(|tid| mesh.triangle_points(tid));
                    if share_a_corner(&pa, &pb) {
                        continue;
                    }

                    any_collision = true;
                    let mut vertices = vec![];
                    for pt in pa.iter().chain(pb.iter()) {
                        grid.find_points_in_ball(pt, ZERO_TOLERANCE, &mut vertices);
                    }
                    vertices.sort_unstable();
                    vertices.dedup();
                    collisions[cell_id].push(Collision {
                        triangles,
                        vertices,
                    });
                }
            }

            if !any_collision {
                break;
            }

            cell_unmoved.fill(true);

            for (cell_id, cell_collisions) in collisions.iter().enumerate() {
                for collision in cell_collisions {
                    let mesh = &self.cells[cell_id];
                    let originals = &original_positions[cell_id];
                    let crosses_at = |t: Real| {
                        crosses(mesh, collision.triangles, |vid| {
                            lerp(&originals[vid as usize], &mesh.vertex(vid), t)
                        })
                    };

                    if !crosses_at(1.0) {
                        continue;
                    }

                    let (mut t_safe, mut t_bad) = (0.0, 1.0);
                    for _ in 0..RESOLVE_SEARCH_STEPS {
                        let t_mid = (t_safe + t_bad) * 0.5;
                        if crosses_at(t_mid) {
                            t_bad = t_mid;
                        } else {
                            t_safe = t_mid;
                        }
                    }

                    for (other_cell, vid) in &collision.vertices {
                        let other_mesh = &mut self.cells[*other_cell];
                        let old_pt = other_mesh.vertex(*vid);
                        let original = &original_positions[*other_cell][*vid as usize];
                        let new_pt = lerp(original, &old_pt, t_safe);
                        other_mesh.set_vertex(*vid, new_pt);
                        grid.update_point((*other_cell, *vid), &old_pt, new_pt);
                        cell_unmoved[*other_cell] = false;
                    }
                    cell_unmoved[cell_id] = false;
                }
            }
        }
    }

    /// Recomputes the UVs of every plane surface from the final vertex positions, so that
    /// each plane's UVs start at zero.
    fn recompute_plane_uvs(&mut self, cells: &PlanarCells, uv_scale: Real) {
        let frames: Vec<_> = cells.planes.iter().map(PlaneFrame::axis_aligned).collect();
        let mut min_uvs = vec![Point2::new(Real::MAX, Real::MAX); frames.len()];
        let surface_plane = |mesh: &DynamicMesh, tid: u32| {
            material_to_plane(mesh.material_id(tid)).filter(|plane_id| *plane_id < frames.len())
        };

        for mesh in &self.cells {
            for tid in mesh.triangle_ids() {
                if let Some(plane_id) = surface_plane(mesh, tid) {
                    for pt in mesh.triangle_points(tid) {
                        let uv = frames[plane_id].to_plane_uv(&pt);
                        min_uvs[plane_id] = min_uvs[plane_id].inf(&uv);
                    }
                }
            }
        }

        for mesh in &mut self.cells {
            let tids: Vec<_> = mesh.triangle_ids().collect();
            for tid in tids {
                if let Some(plane_id) = surface_plane(&*mesh, tid) {
                    for vid in mesh.triangle(tid) {
                        let uv = frames[plane_id].to_plane_uv(&mesh.vertex(vid));
                        let uv = Point2::from((uv - min_uvs[plane_id]) * uv_scale);
                        mesh.set_all_uv(vid, uv, self.num_uv_layers);
                    }
                }
            }
        }
    }
}

fn share_a_corner(a: &[Point<Real>; 3], b: &[Point<Real>; 3]) -> bool {
    a.iter().any(|p| {
        b.iter()
            .any(|q| na::distance_squared(p, q) < ZERO_TOLERANCE * ZERO_TOLERANCE)
    })
}

#[cfg(test)]
mod test {
    use super::{crosses, share_a_corner};
    use crate::bounding_volume::Aabb;
    use crate::cell_meshes::{material_to_plane, CellMeshes};
    use crate::cells::PlanarCells;
    use crate::math::{Point, ZERO_TOLERANCE};
    use crate::mesh::DynamicMesh;
    use crate::partitioning::Bvh;
    use crate::transformation::NoiseSettings;

    fn count_crossings(mesh: &DynamicMesh) -> usize {
        let leaves = mesh
            .triangle_ids()
            .map(|tid| (tid as usize, mesh.triangle_aabb(tid)));
        let bvh = Bvh::from_iter(leaves);
        let mut count = 0;
        bvh.self_leaf_pairs(&mut |a, b| {
            let [pa, pb] = [a, b].map(|tid| mesh.triangle_points(tid));
            let touching = pa
                .iter()
                .any(|p| pb.iter().any(|q| na::distance_squared(p, q) < ZERO_TOLERANCE));
            if !touching && crosses(mesh, [a, b], |vid| mesh.vertex(vid)) {
                count += 1;
            }
        });
        count
    }

    #[test]
    fn corners_are_shared_within_the_weld_distance() {
        let a = [
            Point::origin(),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ];
        let near = [Point::new(0.5 * ZERO_TOLERANCE, 0.0, 0.0), a[1] * 3.0, a[2] * 3.0];
        assert!(share_a_corner(&a, &near));

        // Its squared distance is below the tolerance, but the distance is not.
        let far = [Point::new(0.0, 0.0, 1.0e-4), a[1] * 3.0, a[2] * 3.0];
        assert!(!share_a_corner(&a, &far));
    }

    #[test]
    fn noisy_grid_cells() {
        let region = Aabb::new(Point::origin(), Point::new(2.0, 1.0, 1.0));
        let mut cells = PlanarCells::from_grid(&region, [2, 1, 1]);
        cells.internal_surface_materials.noise = Some(NoiseSettings {
            amplitude: 0.01,
            frequency: 3.0,
            octaves: 2,
            point_spacing: 0.1,
            seed: 11,
        });
        cells.internal_surface_materials.global_uv_scale = 2.0;

        let meshes = CellMeshes::new(1, &cells, &region, 0.0, 0.0, true).unwrap();
        assert_eq!(meshes.num_cells(), 3);

        for (cell_id, mesh) in meshes.cells.iter().enumerate() {
            assert!(mesh.triangle_count() > 12);
            assert_eq!(count_crossings(mesh), 0);

            let expected = if cell_id == 2 { 2.0 } else { 1.0 };
            assert_relative_eq!(mesh.signed_volume(), expected, epsilon = 0.05);

            for tid in mesh.triangle_ids() {
                let plane = material_to_plane(mesh.material_id(tid)).unwrap();
                assert!(plane < cells.planes.len());
                for vid in mesh.triangle(tid) {
                    let uv = mesh.uv(vid, 0);
                    assert!(uv.x >= -1.0e-9 && uv.y >= -1.0e-9);
                }
            }
        }
    }
}
