use crate::collection::{CollectionError, GeometryCollection, TransformIndex};
use crate::conversion::DynamicMeshCollection;
use crate::math::{Isometry, Real};
use crate::mesh::compute_tangents;

/// Recomputes the tangents of the geometry of `transforms`, and their normals too unless
/// `only_tangents` is `true`.
///
/// Only the vertices of triangles passing the material filter are updated: triangles with an even
/// material are skipped if `only_odd_materials` is `true`, and triangles with a material in
/// `skipped_materials` are always skipped.
pub fn recompute_normals_and_tangents(
    only_tangents: bool,
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
    only_odd_materials: bool,
    skipped_materials: &[i32],
) -> Result<(), CollectionError> {
    let mut meshes =
        DynamicMeshCollection::new(collection, transforms, &Isometry::identity(), true);

    for data in &mut meshes.meshes {
        compute_tangents(
            data.mesh_mut(),
            only_odd_materials,
            skipped_materials,
            !only_tangents,
        );
    }

    meshes.update_all_collections(collection)?;
    collection.reindex_materials();
    Ok(())
}

/// Adds vertices to the geometry of `transforms` so that every connected component has
/// collision samples roughly `spacing` apart.
///
/// Returns the number of vertices added.
pub fn add_collision_sample_vertices(
    spacing: Real,
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
) -> Result<usize, CollectionError> {
    let mut meshes =
        DynamicMeshCollection::new(collection, transforms, &Isometry::identity(), false);
    let num_added = meshes.add_collision_samples(spacing);
    if num_added == 0 {
        return Ok(0);
    }

    meshes.update_all_collections(collection)?;
    collection.reindex_materials();
    Ok(num_added)
}

#[cfg(test)]
mod test {
    use super::{add_collision_sample_vertices, recompute_normals_and_tangents};
    use crate::bounding_volume::Aabb;
    use crate::collection::GeometryCollection;
    use crate::math::{Isometry, Point, Vector};
    use crate::mesh::DynamicMesh;

    fn flat_box() -> GeometryCollection {
        let aabb = Aabb::new(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 0.1));
        let (vertices, indices) = DynamicMesh::from_aabb(&aabb).to_buffers();
        let mut collection = GeometryCollection::new();
        let _ = collection.append_rigid_mesh(
            &vertices,
            &indices,
            Isometry::translation(1.0, 2.0, 3.0),
            "box",
        );
        collection
    }

    #[test]
    fn normals_point_outward() {
        let mut collection = flat_box();
        collection.normal.fill(Vector::zeros());
        recompute_normals_and_tangents(false, &mut collection, &[0], false, &[]).unwrap();

        let center = Point::new(5.0, 5.0, 0.05);
        for (pt, normal) in collection.vertex.iter().zip(&collection.normal) {
            assert_relative_eq!(normal.norm(), 1.0, epsilon = 1.0e-6);
            assert!(normal.dot(&(pt - center)) > 0.0);
        }
    }

    #[test]
    fn only_tangents_keeps_normals() {
        let mut collection = flat_box();
        collection.normal.fill(Vector::x());
        recompute_normals_and_tangents(true, &mut collection, &[0], false, &[]).unwrap();
        assert!(collection.normal.iter().all(|n| *n == Vector::x()));
    }

    #[test]
    fn collision_samples_are_added_to_large_faces() {
        let mut collection = flat_box();
        let num_vertices = collection.vertex.len();
        let added = add_collision_sample_vertices(1.0, &mut collection, &[0]).unwrap();

        assert!(added > 0);
        assert_eq!(collection.vertex.len(), num_vertices + added);
        assert_eq!(collection.vertex_count[0], collection.vertex.len());
        collection.validate().unwrap();
    }
}
