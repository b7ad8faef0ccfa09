use crate::collection::{GeometryCollection, TransformIndex};
use crate::conversion::DynamicMeshCollection;
use crate::math::{Isometry, Real, ZERO_TOLERANCE};
use crate::mesh::{DynamicMesh, Overlay};
use crate::utils::PointHashGrid;

// Appends the elements of `src` to `dst`, and the corners of the triangles of `src` to the
// triangles they were copied to.
fn append_overlay<T: Copy>(dst: &mut Overlay<T>, src: &Overlay<T>, triangle_map: &[(u32, u32)]) {
    let offset = dst.elements().len() as u32;
    for element in src.elements() {
        let _ = dst.append_element(*element);
    }

    for (src_tid, dst_tid) in triangle_map {
        if let Some(elements) = src.triangle(*src_tid) {
            dst.set_triangle(*dst_tid, elements.map(|e| e + offset));
        }
    }
}

// Appends `mesh` to `combined`, merging its coincident vertices. Attribute seams are kept by the
// overlays.
fn append_welded(combined: &mut DynamicMesh, mesh: &DynamicMesh) {
    let mut grid = PointHashGrid::new(ZERO_TOLERANCE * 10.0);
    let mut vmap = vec![u32::MAX; mesh.max_vertex_id() as usize];

    for vid in mesh.vertex_ids() {
        let pt = mesh.vertex(vid);
        vmap[vid as usize] = match grid.find_nearest_in_radius(&pt, ZERO_TOLERANCE, |_| false) {
            Some((welded, _)) => welded,
            None => {
                let new_vid = combined.append_vertex_info(&mesh.vertex_info(vid));
                grid.insert(new_vid, pt);
                new_vid
            }
        };
    }

    let mut triangle_map = vec![];
    for tid in mesh.triangle_ids() {
        let tri = mesh.triangle(tid).map(|vid| vmap[vid as usize]);
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            continue;
        }

        match combined.append_triangle_or_duplicate(tri) {
            Ok((new_tid, _)) => {
                combined.set_material_id(new_tid, mesh.material_id(tid));
                combined.set_visibility(new_tid, mesh.visibility(tid));
                triangle_map.push((tid, new_tid));
            }
            Err(err) => log::debug!("Skipped a triangle while welding an exported mesh: {}", err),
        }
    }

    let src = mesh.overlays();
    let dst = combined.overlays_mut();
    if let (Some(dst), Some(src)) = (&mut dst.normals, &src.normals) {
        append_overlay(dst, src, &triangle_map);
    }
    if let (Some(dst), Some(src)) = (&mut dst.tangents, &src.tangents) {
        append_overlay(&mut dst[0], &src[0], &triangle_map);
        append_overlay(&mut dst[1], &src[1], &triangle_map);
    }
    for (dst, src) in dst.uvs.iter_mut().zip(&src.uvs) {
        append_overlay(dst, src, &triangle_map);
    }
}

/// Merges the geometry of `transforms` into a single mesh, expressed in the frame of the root of
/// the collection.
///
/// Pieces are placed by `bone_transforms` if it is given and not empty, and by the transforms
/// of the collection otherwise. The coincident vertices of each piece are merged, the split
/// per-vertex normals, tangents and UVs being kept as overlays. If `center_pivot` is `true`, the
/// mesh is moved so that its bounds are centered at the origin.
///
/// Returns the mesh and the transform mapping it back to its place in the collection.
pub fn convert_to_mesh_description(
    collection: &GeometryCollection,
    bone_transforms: Option<&[Isometry<Real>]>,
    transforms: &[TransformIndex],
    center_pivot: bool,
) -> (DynamicMesh, Isometry<Real>) {
    let identity = Isometry::identity();
    let meshes = match bone_transforms {
        Some(locals) if !locals.is_empty() => DynamicMeshCollection::with_local_transforms(
            collection,
            locals,
            transforms,
            &identity,
            false,
        ),
        _ => DynamicMeshCollection::new(collection, transforms, &identity, false),
    };

    let num_uv_layers = collection.num_uv_layers();
    let mut combined = DynamicMesh::new();
    combined.augment(num_uv_layers);
    {
        let overlays = combined.overlays_mut();
        overlays.normals = Some(Overlay::new());
        overlays.tangents = Some([Overlay::new(), Overlay::new()]);
        overlays.uvs = vec![Overlay::new(); num_uv_layers];
    }

    for data in &meshes.meshes {
        let mut mesh = data.mesh().clone();
        mesh.initialize_overlay_to_per_vertex_normals();
        mesh.initialize_overlay_to_per_vertex_uvs(num_uv_layers, 0);
        mesh.initialize_overlay_to_per_vertex_tangents();
        append_welded(&mut combined, &mesh);
    }

    if center_pivot && !combined.is_empty() {
        let center = combined.bounds().center();
        combined.translate(&-center.coords);
        (combined, Isometry::translation(center.x, center.y, center.z))
    } else {
        (combined, identity)
    }
}

#[cfg(test)]
mod test {
    use super::convert_to_mesh_description;
    use crate::bounding_volume::Aabb;
    use crate::collection::GeometryCollection;
    use crate::math::{Isometry, Point, Vector};
    use crate::mesh::DynamicMesh;

    // A cube whose triangles don't share any vertex, each corner with its face normal.
    fn unwelded_cube(collection: &mut GeometryCollection, transform: Isometry<f64>) {
        let cube = DynamicMesh::from_aabb(&Aabb::new(
            Point::new(-0.5, -0.5, -0.5),
            Point::new(0.5, 0.5, 0.5),
        ));
        let (vertices, indices) = cube.to_buffers();
        let soup: Vec<_> = indices
            .iter()
            .flat_map(|tri| tri.map(|v| vertices[v as usize]))
            .collect();
        let soup_indices: Vec<_> = (0..indices.len() as u32)
            .map(|k| [3 * k, 3 * k + 1, 3 * k + 2])
            .collect();

        // Each vertex gets the normal of its only triangle.
        let _ = collection.append_rigid_mesh(&soup, &soup_indices, transform, "cube");
    }

    #[test]
    fn coincident_vertices_are_welded() {
        let mut collection = GeometryCollection::new();
        unwelded_cube(&mut collection, Isometry::identity());
        let (mesh, pivot) = convert_to_mesh_description(&collection, None, &[0], false);

        assert_eq!(pivot, Isometry::identity());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_closed());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1.0e-9);

        // Corners keep the normal of their face.
        let normals = mesh.overlays().normals.as_ref().unwrap();
        for tid in mesh.triangle_ids() {
            let face_normal = mesh.triangle_normal(tid).unwrap();
            for eid in normals.triangle(tid).unwrap() {
                assert_relative_eq!(normals.element(eid), *face_normal, epsilon = 1.0e-9);
            }
        }
    }

    #[test]
    fn pieces_are_placed_and_centered() {
        let mut collection = GeometryCollection::new();
        unwelded_cube(&mut collection, Isometry::translation(2.0, 3.0, 4.0));
        unwelded_cube(&mut collection, Isometry::translation(3.0, 3.0, 4.0));

        let (mesh, pivot) = convert_to_mesh_description(&collection, None, &[0, 1], true);
        assert_eq!(mesh.triangle_count(), 24);
        assert_eq!(mesh.vertex_count(), 16);
        assert_relative_eq!(pivot.translation.vector, Vector::new(2.5, 3.0, 4.0));
        assert_relative_eq!(mesh.bounds().center(), Point::origin(), epsilon = 1.0e-9);

        let moved = [Isometry::identity(), Isometry::translation(0.0, 0.0, 10.0)];
        let (mesh, _) = convert_to_mesh_description(&collection, Some(&moved[..]), &[0, 1], false);
        assert_relative_eq!(mesh.bounds().maxs, Point::new(0.5, 0.5, 10.5), epsilon = 1.0e-9);
    }
}
