use super::MeshData;
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::collection::{
    CollectionError, GeometryCollection, GeometryIndex, Group, SimulationType, TransformIndex,
};
use crate::math::{Isometry, Real};
use crate::mesh::{DynamicMesh, VertexInfo};

/// The meshes of some pieces of a geometry collection, in a common cutting frame.
///
/// Each mesh is augmented with the attributes of the collection: normals, tangents, colors, UV
/// channels, material ids and visibility.
#[derive(Clone, Debug, Default)]
pub struct DynamicMeshCollection {
    /// The mesh of each converted piece.
    pub meshes: Vec<MeshData>,
    /// The bounds of all the meshes.
    pub bounds: Aabb,
}

/// The name of the `sub_part`-th piece cut from the transform `parent`.
pub fn bone_name(
    collection: &GeometryCollection,
    parent: TransformIndex,
    sub_part: usize,
) -> String {
    format!("{}_{}", collection.bone_name[parent], sub_part)
}

impl DynamicMeshCollection {
    /// Converts the geometry of `transforms` to meshes.
    ///
    /// Each mesh is expressed in the frame mapped from the root of the collection by
    /// `collection_to_world`. Transforms without geometry are skipped. Vertices not referenced by
    /// any face are dropped unless `save_isolated_vertices` is set.
    pub fn new(
        collection: &GeometryCollection,
        transforms: &[TransformIndex],
        collection_to_world: &Isometry<Real>,
        save_isolated_vertices: bool,
    ) -> Self {
        Self::with_local_transforms(
            collection,
            &collection.transform,
            transforms,
            collection_to_world,
            save_isolated_vertices,
        )
    }

    /// Like [`Self::new`], but uses `local_transforms` instead of the local transforms stored in
    /// the collection.
    pub fn with_local_transforms(
        collection: &GeometryCollection,
        local_transforms: &[Isometry<Real>],
        transforms: &[TransformIndex],
        collection_to_world: &Isometry<Real>,
        save_isolated_vertices: bool,
    ) -> Self {
        let mut result = Self::default();

        for transform in transforms {
            let Some(geometry) = collection.transform_to_geometry_index[*transform] else {
                continue;
            };

            let to_collection = collection.global_transform_with(local_transforms, *transform);
            let from_collection = collection_to_world * to_collection;
            let mut mesh = geometry_to_mesh(collection, geometry, &from_collection);
            if !save_isolated_vertices {
                mesh.remove_isolated_vertices();
            }

            let data = MeshData::new(mesh, *transform, from_collection);
            result.bounds.merge(&data.bounds());
            result.meshes.push(data);
        }

        result
    }

    /// Adds collision sample vertices to every mesh (see
    /// [`DynamicMesh::add_collision_samples_per_component`]).
    ///
    /// Returns the number of vertices added.
    pub fn add_collision_samples(&mut self, spacing: Real) -> usize {
        self.meshes
            .iter_mut()
            .map(|data| data.mesh_mut().add_collision_samples_per_component(spacing))
            .sum()
    }

    /// Writes every mesh back to the geometry it was converted from, resizing the geometries
    /// first.
    ///
    /// Every mesh is written even if one fails.
    pub fn update_all_collections(
        &self,
        collection: &mut GeometryCollection,
    ) -> Result<(), CollectionError> {
        let mut face_counts = collection.face_count.clone();
        let mut vertex_counts = collection.vertex_count.clone();
        let mut geometries = Vec::with_capacity(self.meshes.len());

        for data in &self.meshes {
            let geometry = collection
                .transform_to_geometry_index
                .get(data.transform_index)
                .copied()
                .flatten()
                .ok_or(CollectionError::InvalidTransform(data.transform_index))?;
            face_counts[geometry] = data.mesh().triangle_count();
            vertex_counts[geometry] = data.mesh().vertex_count();
            geometries.push(geometry);
        }

        collection.resize_geometries(&face_counts, &vertex_counts)?;

        let mut result = Ok(());
        for (data, geometry) in self.meshes.iter().zip(geometries) {
            if let Err(err) = Self::update_collection(
                &data.from_collection,
                data.mesh(),
                geometry,
                collection,
                None,
            ) {
                result = Err(err);
            }
        }

        result
    }

    /// Overwrites the geometry `geometry` with `mesh`, mapped back to the local frame of its
    /// transform by the inverse of `from_collection`.
    ///
    /// The geometry must already have as many vertices and faces as `mesh`. Faces with a
    /// negative material get `internal_material` if it is set.
    pub fn update_collection(
        from_collection: &Isometry<Real>,
        mesh: &DynamicMesh,
        geometry: GeometryIndex,
        collection: &mut GeometryCollection,
        internal_material: Option<i32>,
    ) -> Result<(), CollectionError> {
        if geometry >= collection.num_elements(Group::Geometry) {
            return Err(CollectionError::InvalidGeometry(geometry));
        }

        let expected_vertices = collection.vertex_count[geometry];
        let expected_faces = collection.face_count[geometry];
        if expected_vertices != mesh.vertex_count() || expected_faces != mesh.triangle_count() {
            return Err(CollectionError::MismatchedCounts {
                geometry,
                expected_vertices,
                expected_faces,
                actual_vertices: mesh.vertex_count(),
                actual_faces: mesh.triangle_count(),
            });
        }

        write_mesh(collection, geometry, mesh, from_collection, internal_material);
        Ok(())
    }

    /// Adds `mesh` to the collection as a new rigid piece, child of the transform `parent`.
    ///
    /// The mesh is mapped back to the local frame of `parent` by the inverse of
    /// `from_collection`, its negative materials are replaced by `internal_material`, and
    /// collision samples are added first if `collision_sample_spacing` is positive. The parent
    /// becomes a cluster.
    ///
    /// Returns the new geometry, or `None` if `mesh` has no triangle.
    pub fn append_to_collection(
        from_collection: &Isometry<Real>,
        mesh: &DynamicMesh,
        collision_sample_spacing: Real,
        parent: TransformIndex,
        bone_name: String,
        collection: &mut GeometryCollection,
        internal_material: i32,
    ) -> Option<GeometryIndex> {
        if mesh.triangle_count() == 0 {
            return None;
        }

        let sampled;
        let mesh = if collision_sample_spacing > 0.0 {
            let mut copy = mesh.clone();
            let _ = copy.add_collision_samples_per_component(collision_sample_spacing);
            sampled = copy;
            &sampled
        } else {
            mesh
        };

        let geometry = collection.add_elements(1, Group::Geometry);
        let transform = collection.add_elements(1, Group::Transform);

        collection.bone_name[transform] = bone_name;
        collection.bone_color[transform] = collection.bone_color[parent];
        collection.parent[transform] = Some(parent);
        let _ = collection.children[parent].insert(transform);
        collection.simulation_type[parent] = SimulationType::Clustered;
        collection.simulation_type[transform] = SimulationType::Rigid;
        collection.transform_to_geometry_index[transform] = Some(geometry);
        collection.transform_index[geometry] = transform;

        collection.vertex_start[geometry] =
            collection.add_elements(mesh.vertex_count(), Group::Vertices);
        collection.vertex_count[geometry] = mesh.vertex_count();
        collection.face_start[geometry] =
            collection.add_elements(mesh.triangle_count(), Group::Faces);
        collection.face_count[geometry] = mesh.triangle_count();

        write_mesh(
            collection,
            geometry,
            mesh,
            from_collection,
            Some(internal_material),
        );
        Some(geometry)
    }
}

fn collection_vertex(
    collection: &GeometryCollection,
    vid: usize,
    from_collection: &Isometry<Real>,
) -> VertexInfo {
    let rotation = &from_collection.rotation;
    VertexInfo {
        position: from_collection * collection.vertex[vid],
        normal: rotation * collection.normal[vid],
        color: collection.color[vid],
        tangent_u: rotation * collection.tangent_u[vid],
        tangent_v: rotation * collection.tangent_v[vid],
        uvs: collection.uvs.iter().map(|channel| channel[vid]).collect(),
    }
}

// Copies a geometry of `collection` into an augmented mesh, mapped by `from_collection`.
fn geometry_to_mesh(
    collection: &GeometryCollection,
    geometry: GeometryIndex,
    from_collection: &Isometry<Real>,
) -> DynamicMesh {
    let mut mesh = DynamicMesh::new();
    mesh.augment(collection.num_uv_layers());

    let vertices = collection.vertex_range(geometry);
    let vids: Vec<_> = vertices
        .clone()
        .map(|vid| mesh.append_vertex_info(&collection_vertex(collection, vid, from_collection)))
        .collect();
    let local = |vid: u32| {
        (vid as usize)
            .checked_sub(vertices.start)
            .and_then(|i| vids.get(i))
            .copied()
    };

    for face in collection.face_range(geometry) {
        let [a, b, c] = collection.indices[face];
        let (Some(a), Some(b), Some(c)) = (local(a), local(b), local(c)) else {
            log::debug!("Skipping the face {} referencing vertices of another geometry.", face);
            continue;
        };

        // Non-manifold faces get their own copies of their vertices.
        match mesh.append_triangle_or_duplicate([a, b, c]) {
            Ok((tid, _)) => {
                mesh.set_material_id(tid, collection.material_id[face]);
                mesh.set_visibility(tid, collection.visible[face]);
            }
            Err(err) => log::debug!("Skipping the face {}: {}", face, err),
        }
    }

    mesh
}

// Writes `mesh` over the vertex and face ranges of `geometry`, which must have the right sizes.
fn write_mesh(
    collection: &mut GeometryCollection,
    geometry: GeometryIndex,
    mesh: &DynamicMesh,
    from_collection: &Isometry<Real>,
    internal_material: Option<i32>,
) {
    let num_uv_layers = mesh.num_enabled_uv_channels();
    if num_uv_layers > collection.num_uv_layers() {
        collection.set_num_uv_layers(num_uv_layers);
    }

    let vertex_start = collection.vertex_start[geometry];
    let face_start = collection.face_start[geometry];
    let transform = collection.transform_index[geometry];
    let to_collection = from_collection.inverse();
    let mut vmap = vec![u32::MAX; mesh.max_vertex_id() as usize];

    for (k, vid) in mesh.vertex_ids().enumerate() {
        let dst = vertex_start + k;
        let (tangent_u, tangent_v) = mesh.tangent(vid);
        vmap[vid as usize] = dst as u32;

        collection.vertex[dst] = to_collection * mesh.vertex(vid);
        collection.normal[dst] = to_collection.rotation * mesh.vertex_normal(vid);
        collection.tangent_u[dst] = to_collection.rotation * tangent_u;
        collection.tangent_v[dst] = to_collection.rotation * tangent_v;
        collection.color[dst] = mesh.vertex_color(vid);
        for channel in 0..num_uv_layers {
            collection.uvs[channel][dst] = mesh.uv(vid, channel);
        }
        collection.bone_map[dst] = transform;
    }

    for (k, tid) in mesh.triangle_ids().enumerate() {
        let dst = face_start + k;
        let material = mesh.material_id(tid);

        collection.indices[dst] = mesh.triangle(tid).map(|vid| vmap[vid as usize]);
        collection.material_id[dst] = match internal_material {
            Some(internal) if material < 0 => internal,
            _ => material,
        };
        collection.visible[dst] = mesh.visibility(tid);
    }

    collection.update_bounding_box(geometry);
}

#[cfg(test)]
mod test {
    use super::{bone_name, DynamicMeshCollection};
    use crate::bounding_volume::Aabb;
    use crate::collection::{CollectionError, GeometryCollection, SimulationType};
    use crate::math::{Isometry, Point, Real, Vector};
    use crate::mesh::DynamicMesh;

    fn cube_collection(transform: Isometry<Real>) -> GeometryCollection {
        let cube = DynamicMesh::from_aabb(&Aabb::new(
            Point::new(-0.5, -0.5, -0.5),
            Point::new(0.5, 0.5, 0.5),
        ));
        let (vertices, indices) = cube.to_buffers();
        let mut collection = GeometryCollection::new();
        let _ = collection.append_rigid_mesh(&vertices, &indices, transform, "cube");
        collection
    }

    #[test]
    fn meshes_are_expressed_in_world_frame() {
        let transform = Isometry::translation(10.0, 0.0, 0.0);
        let collection = cube_collection(transform);
        let world = Isometry::translation(0.0, 5.0, 0.0);
        let meshes = DynamicMeshCollection::new(&collection, &[0], &world, false);

        assert_eq!(meshes.meshes.len(), 1);
        let mesh = meshes.meshes[0].mesh();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_augmented());
        assert_relative_eq!(meshes.bounds.center(), Point::new(10.0, 5.0, 0.0));
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1.0e-9);
    }

    #[test]
    fn update_round_trip() {
        let transform = Isometry::new(Vector::new(1.0, 2.0, 3.0), Vector::new(0.0, 0.3, 0.0));
        let mut collection = cube_collection(transform);
        let original = collection.clone();
        let world = Isometry::translation(0.0, 0.0, -4.0);

        let meshes = DynamicMeshCollection::new(&collection, &[0], &world, false);
        meshes.update_all_collections(&mut collection).unwrap();

        assert_eq!(collection.indices, original.indices);
        assert_eq!(collection.material_id, original.material_id);
        for (a, b) in collection.vertex.iter().zip(&original.vertex) {
            assert_relative_eq!(a, b, epsilon = 1.0e-9);
        }
        for (a, b) in collection.normal.iter().zip(&original.normal) {
            assert_relative_eq!(a, b, epsilon = 1.0e-9);
        }
        collection.validate().unwrap();
    }

    #[test]
    fn update_requires_matching_counts() {
        let mut collection = cube_collection(Isometry::identity());
        let unit_box = Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0));
        let mut mesh = DynamicMesh::from_aabb(&unit_box);
        mesh.augment(1);
        let _ = mesh.append_vertex(Point::origin());

        let err = DynamicMeshCollection::update_collection(
            &Isometry::identity(),
            &mesh,
            0,
            &mut collection,
            None,
        );
        assert!(matches!(err, Err(CollectionError::MismatchedCounts { .. })));
    }

    #[test]
    fn appended_pieces_are_children() {
        let mut collection = cube_collection(Isometry::translation(0.0, 0.0, 2.0));
        let meshes = DynamicMeshCollection::new(&collection, &[0], &Isometry::identity(), false);
        let data = &meshes.meshes[0];

        let mut piece = data.mesh().clone();
        let tids: Vec<_> = piece.triangle_ids().collect();
        piece.set_material_id(tids[0], -1);

        let name = bone_name(&collection, 0, 3);
        assert_eq!(name, "cube_3");
        let geometry = DynamicMeshCollection::append_to_collection(
            &data.from_collection,
            &piece,
            0.0,
            0,
            name,
            &mut collection,
            7,
        )
        .unwrap();

        assert_eq!(geometry, 1);
        assert_eq!(collection.parent[1], Some(0));
        assert!(collection.children[0].contains(&1));
        assert_eq!(collection.simulation_type[0], SimulationType::Clustered);
        assert_eq!(collection.bone_name[1], "cube_3");
        assert_eq!(collection.material_id[collection.face_start[1]], 7);
        for (a, b) in collection.vertex_range(0).zip(collection.vertex_range(1)) {
            assert_relative_eq!(collection.vertex[a], collection.vertex[b], epsilon = 1.0e-9);
        }
        collection.validate().unwrap();

        let empty = DynamicMesh::new();
        assert!(DynamicMeshCollection::append_to_collection(
            &data.from_collection,
            &empty,
            0.0,
            0,
            String::new(),
            &mut collection,
            7,
        )
        .is_none());
    }
}
