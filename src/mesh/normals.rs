use super::{DynamicMesh, Overlay};
use crate::math::{Point, Real, Vector};
use crate::utils::orthonormal_basis;
use na::Point2;

fn corner_angle(a: &Point<Real>, b: &Point<Real>, c: &Point<Real>) -> Real {
    let ab = b - a;
    let ac = c - a;
    ab.angle(&ac)
}

/// Recomputes the per-vertex normals of `mesh` as the area-weighted average of the normals of
/// their incident triangles.
pub fn recompute_normals(mesh: &mut DynamicMesh) {
    mesh.enable_vertex_normals();
    let mut accumulated = vec![Vector::zeros(); mesh.max_vertex_id() as usize];

    for tid in mesh.triangle_ids() {
        let [a, b, c] = mesh.triangle_points(tid);
        let weighted_normal = (b - a).cross(&(c - a));
        for vid in mesh.triangle(tid) {
            accumulated[vid as usize] += weighted_normal;
        }
    }

    let vids: Vec<_> = mesh.vertex_ids().collect();
    for vid in vids {
        if let Some(normal) = accumulated[vid as usize].try_normalize(1.0e-12) {
            mesh.set_vertex_normal(vid, normal);
        }
    }
}

/// Rebuilds the normal overlay of `mesh` from its face normals.
///
/// Around each vertex, triangles share a normal element only if their face normals are less than
/// `crease_angle` apart. The shared normal is the area-weighted average of their face normals.
pub fn initialize_overlay_to_crease_normals(mesh: &mut DynamicMesh, crease_angle: Real) {
    let cos_crease = crease_angle.cos();
    let mut overlay = Overlay::new();
    let mut corners = vec![[u32::MAX; 3]; mesh.max_triangle_id() as usize];

    for vid in mesh.vertex_ids() {
        // (Normal of the first triangle, accumulated normal, triangles) of each group.
        let mut groups: Vec<(Vector<Real>, Vector<Real>, Vec<u32>)> = vec![];

        for tid in mesh.vertex_triangles(vid) {
            let [a, b, c] = mesh.triangle_points(*tid);
            let area_normal = (b - a).cross(&(c - a));
            let normal = area_normal.try_normalize(1.0e-12);
            let group = groups.iter_mut().find(|(first, _, _)| {
                normal.map_or(true, |n| first.dot(&n) >= cos_crease)
            });

            match group {
                Some((_, acc, tids)) => {
                    *acc += area_normal;
                    tids.push(*tid);
                }
                None => groups.push((normal.unwrap_or_else(Vector::z), area_normal, vec![*tid])),
            }
        }

        for (first, acc, tids) in groups {
            let eid = overlay.append_element(acc.try_normalize(1.0e-12).unwrap_or(first));
            for tid in tids {
                if let Some(k) = mesh.triangle(tid).iter().position(|v| *v == vid) {
                    corners[tid as usize][k] = eid;
                }
            }
        }
    }

    for tid in mesh.triangle_ids() {
        overlay.set_triangle(tid, corners[tid as usize]);
    }

    mesh.overlays_mut().normals = Some(overlay);
}

/// Computes the tangent frames of `mesh` from its vertex normals and first UV channel.
///
/// Per-triangle tangents are averaged per vertex with angle weights, then made orthogonal to the
/// vertex normal. Vertices are only updated if they belong to a triangle whose material passes the
/// filter: triangles with an even material id are skipped if `only_odd_materials` is `true`, and
/// triangles with a material in `skipped_materials` are always skipped. If `recompute_normals` is
/// `true`, normals are recomputed first.
pub fn compute_tangents(
    mesh: &mut DynamicMesh,
    only_odd_materials: bool,
    skipped_materials: &[i32],
    recompute_vertex_normals: bool,
) {
    assert!(mesh.is_augmented(), "The mesh must be augmented.");

    if recompute_vertex_normals {
        recompute_normals(mesh);
    }

    let num_vertices = mesh.max_vertex_id() as usize;
    let mut acc_u = vec![Vector::zeros(); num_vertices];
    let mut acc_v = vec![Vector::zeros(); num_vertices];
    let has_uvs = mesh.num_enabled_uv_channels() > 0;

    for tid in mesh.triangle_ids() {
        let tri = mesh.triangle(tid);
        let pts = mesh.triangle_points(tid);
        let uvs: [Point2<Real>; 3] = if has_uvs {
            tri.map(|vid| mesh.uv(vid, 0))
        } else {
            [Point2::origin(); 3]
        };

        let e1 = pts[1] - pts[0];
        let e2 = pts[2] - pts[0];
        let d1 = uvs[1] - uvs[0];
        let d2 = uvs[2] - uvs[0];
        let det = d1.x * d2.y - d2.x * d1.y;

        if det.abs() < 1.0e-12 {
            continue;
        }

        let tangent_u = (e1 * d2.y - e2 * d1.y) / det;
        let tangent_v = (e2 * d1.x - e1 * d2.x) / det;

        for k in 0..3 {
            let angle = corner_angle(&pts[k], &pts[(k + 1) % 3], &pts[(k + 2) % 3]);
            acc_u[tri[k] as usize] += tangent_u * angle;
            acc_v[tri[k] as usize] += tangent_v * angle;
        }
    }

    let tids: Vec<_> = mesh.triangle_ids().collect();
    for tid in tids {
        let material = mesh.material_id(tid);
        if only_odd_materials && material % 2 == 0 {
            continue;
        } else if skipped_materials.contains(&material) {
            continue;
        }

        for vid in mesh.triangle(tid) {
            let normal = mesh
                .vertex_normal(vid)
                .try_normalize(1.0e-12)
                .unwrap_or_else(Vector::z);
            let u = acc_u[vid as usize];
            let v = acc_v[vid as usize];

            let projected_u = u - normal * normal.dot(&u);
            let (tangent_u, tangent_v) = match projected_u.try_normalize(1.0e-12) {
                Some(tangent_u) => {
                    let bitangent = normal.cross(&tangent_u);
                    let sign = if bitangent.dot(&v) < 0.0 { -1.0 } else { 1.0 };
                    (tangent_u, bitangent * sign)
                }
                None => {
                    let [tu, tv] = orthonormal_basis(&normal);
                    (tu, tv)
                }
            };

            mesh.set_tangent(vid, tangent_u, tangent_v);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{compute_tangents, initialize_overlay_to_crease_normals, recompute_normals};
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;
    use na::Point2;

    fn planar_square() -> DynamicMesh {
        let vertices = [
            Point::origin(),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = DynamicMesh::from_buffers(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
        mesh.augment(1);
        for vid in 0..4 {
            let pt = mesh.vertex(vid);
            mesh.set_uv(vid, Point2::new(pt.x, pt.y), 0);
        }
        mesh
    }

    #[test]
    fn tangents_follow_uvs() {
        let mut mesh = planar_square();
        compute_tangents(&mut mesh, false, &[], true);

        for vid in 0..4 {
            assert_relative_eq!(mesh.vertex_normal(vid), Vector::z(), epsilon = 1.0e-12);
            let (u, v) = mesh.tangent(vid);
            assert_relative_eq!(u, Vector::x(), epsilon = 1.0e-12);
            assert_relative_eq!(v, Vector::y(), epsilon = 1.0e-12);
        }
    }

    #[test]
    fn material_filter() {
        let mut mesh = planar_square();
        mesh.set_material_id(0, 2);
        mesh.set_material_id(1, 2);
        recompute_normals(&mut mesh);
        mesh.set_tangent(1, Vector::z(), Vector::z());

        compute_tangents(&mut mesh, true, &[], false);
        assert_eq!(mesh.tangent(1), (Vector::z(), Vector::z()));

        mesh.set_material_id(0, 3);
        mesh.set_material_id(1, 3);
        compute_tangents(&mut mesh, true, &[3], false);
        assert_eq!(mesh.tangent(1), (Vector::z(), Vector::z()));

        compute_tangents(&mut mesh, true, &[], false);
        assert_relative_eq!(mesh.tangent(1).0, Vector::x(), epsilon = 1.0e-12);
    }

    #[test]
    fn box_corners_keep_their_face_normals() {
        let mut cube =
            DynamicMesh::from_aabb(&Aabb::from_half_extents(Point::origin(), Vector::repeat(0.5)));
        initialize_overlay_to_crease_normals(&mut cube, core::f64::consts::FRAC_PI_4);

        let normals = cube.overlays().normals.as_ref().unwrap();
        // Three faces meet at each of the 8 corners.
        assert_eq!(normals.elements().len(), 24);
        for tid in cube.triangle_ids() {
            let face_normal = cube.triangle_normal(tid).unwrap();
            for eid in normals.triangle(tid).unwrap() {
                assert_relative_eq!(normals.element(eid), *face_normal, epsilon = 1.0e-12);
            }
        }
    }
}
