use super::CollectionError;
use crate::bounding_volume::Aabb;
use crate::math::{Color, Isometry, Point, Point2, Real, Vector, MAX_UV_CHANNELS};
use crate::utils::orthonormal_basis;
use std::collections::BTreeSet;
use std::ops::Range;

/// The index of an element of the transform group of a [`GeometryCollection`].
pub type TransformIndex = usize;
/// The index of an element of the geometry group of a [`GeometryCollection`].
pub type GeometryIndex = usize;

/// How a transform of a geometry collection is simulated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum SimulationType {
    /// Not simulated.
    None,
    /// A rigid body with its own geometry.
    #[default]
    Rigid,
    /// A cluster of its children.
    Clustered,
}

/// The groups of parallel arrays of a [`GeometryCollection`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    /// The transform hierarchy.
    Transform,
    /// The geometry attached to transforms.
    Geometry,
    /// The vertices of every geometry.
    Vertices,
    /// The triangles of every geometry.
    Faces,
}

/// A range of faces sharing the same material, in the order given by
/// [`GeometryCollection::material_index`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MaterialSection {
    /// The material of the faces of this section.
    pub material_id: i32,
    /// The position of the first face of this section in `material_index`.
    pub first_index: usize,
    /// The number of faces of this section.
    pub num_triangles: usize,
    /// The smallest vertex index referenced by this section.
    pub min_vertex_index: usize,
    /// The largest vertex index referenced by this section.
    pub max_vertex_index: usize,
}

/// A hierarchy of rigid pieces with their triangle geometry, stored as parallel arrays.
///
/// Elements of each [`Group`] are referenced by index only. Each transform has at most one
/// geometry, and the vertices and faces of a geometry are contiguous ranges of the vertex and
/// face groups. Face indices are absolute indices into the vertex group.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GeometryCollection {
    /// The transform of each piece relative to its parent.
    pub transform: Vec<Isometry<Real>>,
    /// The parent of each transform.
    pub parent: Vec<Option<TransformIndex>>,
    /// The children of each transform.
    pub children: Vec<BTreeSet<TransformIndex>>,
    /// How each transform is simulated.
    pub simulation_type: Vec<SimulationType>,
    /// The name of each transform.
    pub bone_name: Vec<String>,
    /// The debug color of each transform.
    pub bone_color: Vec<Color>,
    /// The geometry attached to each transform.
    pub transform_to_geometry_index: Vec<Option<GeometryIndex>>,

    /// The transform each geometry is attached to.
    pub transform_index: Vec<TransformIndex>,
    /// The first vertex of each geometry.
    pub vertex_start: Vec<usize>,
    /// The number of vertices of each geometry.
    pub vertex_count: Vec<usize>,
    /// The first face of each geometry.
    pub face_start: Vec<usize>,
    /// The number of faces of each geometry.
    pub face_count: Vec<usize>,
    /// The local bounding box of each geometry.
    pub bounding_box: Vec<Aabb>,
    /// The geometries touching each geometry, if tracked.
    pub proximity: Option<Vec<BTreeSet<GeometryIndex>>>,

    /// The vertex positions.
    pub vertex: Vec<Point<Real>>,
    /// The vertex normals.
    pub normal: Vec<Vector<Real>>,
    /// The first tangent of each vertex.
    pub tangent_u: Vec<Vector<Real>>,
    /// The second tangent of each vertex.
    pub tangent_v: Vec<Vector<Real>>,
    /// The vertex colors.
    pub color: Vec<Color>,
    /// The UV coordinates of each vertex, one array per channel.
    pub uvs: Vec<Vec<Point2<Real>>>,
    /// The transform owning each vertex.
    pub bone_map: Vec<TransformIndex>,

    /// The vertex indices of each face.
    pub indices: Vec<[u32; 3]>,
    /// The material of each face.
    pub material_id: Vec<i32>,
    /// The visibility of each face.
    pub visible: Vec<bool>,
    /// The faces sorted by material, see [`Self::reindex_materials`].
    pub material_index: Vec<usize>,
    /// The material sections, see [`Self::reindex_materials`].
    pub sections: Vec<MaterialSection>,
}

// Concatenates the given ranges of `src`, each truncated or padded with `default` to its new
// length.
fn gather<T: Clone>(src: &[T], ranges: &[(Range<usize>, usize)], default: T) -> Vec<T> {
    let mut result = Vec::with_capacity(ranges.iter().map(|r| r.1).sum());
    for (range, new_len) in ranges {
        let kept = range.len().min(*new_len);
        result.extend_from_slice(&src[range.start..range.start + kept]);
        result.resize(result.len() + new_len - kept, default.clone());
    }
    result
}

fn retain_indices<T>(src: &mut Vec<T>, keep: impl Fn(&usize) -> bool) {
    let mut i = 0;
    src.retain(|_| {
        i += 1;
        keep(&(i - 1))
    });
}

impl GeometryCollection {
    /// An empty collection with one UV channel.
    pub fn new() -> Self {
        Self {
            uvs: vec![vec![]],
            ..Default::default()
        }
    }

    /// The number of elements of `group`.
    pub fn num_elements(&self, group: Group) -> usize {
        match group {
            Group::Transform => self.transform.len(),
            Group::Geometry => self.transform_index.len(),
            Group::Vertices => self.vertex.len(),
            Group::Faces => self.indices.len(),
        }
    }

    /// The number of UV channels.
    pub fn num_uv_layers(&self) -> usize {
        self.uvs.len()
    }

    /// Adds or removes UV channels. New channels are zero.
    pub fn set_num_uv_layers(&mut self, num_layers: usize) {
        assert!(
            num_layers <= MAX_UV_CHANNELS,
            "At most {} UV channels are supported.",
            MAX_UV_CHANNELS
        );
        let num_vertices = self.vertex.len();
        self.uvs
            .resize_with(num_layers, || vec![Point2::origin(); num_vertices]);
    }

    /// Appends `count` default elements to `group`, returning the index of the first one.
    ///
    /// New geometries start with empty vertex and face ranges located at the end of their
    /// groups, and must be attached to a transform by the caller.
    pub fn add_elements(&mut self, count: usize, group: Group) -> usize {
        let first = self.num_elements(group);
        let new_len = first + count;

        match group {
            Group::Transform => {
                self.transform.resize(new_len, Isometry::identity());
                self.parent.resize(new_len, None);
                self.children.resize(new_len, BTreeSet::new());
                self.simulation_type.resize(new_len, SimulationType::Rigid);
                self.bone_name.resize(new_len, String::new());
                self.bone_color.resize(new_len, Color::repeat(1.0));
                self.transform_to_geometry_index.resize(new_len, None);
            }
            Group::Geometry => {
                self.transform_index.resize(new_len, 0);
                self.vertex_start.resize(new_len, self.vertex.len());
                self.vertex_count.resize(new_len, 0);
                self.face_start.resize(new_len, self.indices.len());
                self.face_count.resize(new_len, 0);
                self.bounding_box.resize(new_len, Aabb::new_invalid());
                if let Some(proximity) = &mut self.proximity {
                    proximity.resize(new_len, BTreeSet::new());
                }
            }
            Group::Vertices => {
                self.vertex.resize(new_len, Point::origin());
                self.normal.resize(new_len, Vector::z());
                self.tangent_u.resize(new_len, Vector::x());
                self.tangent_v.resize(new_len, Vector::y());
                self.color.resize(new_len, Color::repeat(1.0));
                for channel in &mut self.uvs {
                    channel.resize(new_len, Point2::origin());
                }
                self.bone_map.resize(new_len, 0);
            }
            Group::Faces => {
                self.indices.resize(new_len, [0; 3]);
                self.material_id.resize(new_len, 0);
                self.visible.resize(new_len, true);
                self.material_index.extend(first..new_len);
            }
        }

        first
    }

    /// The range of vertices of the geometry `geometry`.
    pub fn vertex_range(&self, geometry: GeometryIndex) -> Range<usize> {
        self.vertex_start[geometry]..self.vertex_start[geometry] + self.vertex_count[geometry]
    }

    /// The range of faces of the geometry `geometry`.
    pub fn face_range(&self, geometry: GeometryIndex) -> Range<usize> {
        self.face_start[geometry]..self.face_start[geometry] + self.face_count[geometry]
    }

    /// The transform of `transform` relative to the root of its hierarchy.
    pub fn global_transform(&self, transform: TransformIndex) -> Isometry<Real> {
        self.global_transform_with(&self.transform, transform)
    }

    /// The transform of `transform` relative to the root of its hierarchy, using `local` instead
    /// of [`Self::transform`] as the local transform of each element of the hierarchy.
    pub fn global_transform_with(
        &self,
        local: &[Isometry<Real>],
        transform: TransformIndex,
    ) -> Isometry<Real> {
        let mut result = local[transform];
        let mut parent = self.parent[transform];

        while let Some(p) = parent {
            result = local[p] * result;
            parent = self.parent[p];
        }

        result
    }

    /// The global transforms of `transforms`.
    pub fn global_transforms(&self, transforms: &[TransformIndex]) -> Vec<Isometry<Real>> {
        transforms
            .iter()
            .map(|t| self.global_transform(*t))
            .collect()
    }

    /// Shows or hides every face of `geometries`.
    pub fn set_geometry_visibility(&mut self, geometries: &[GeometryIndex], visible: bool) {
        for geometry in geometries {
            let range = self.face_range(*geometry);
            self.visible[range].fill(visible);
        }
    }

    /// Recomputes the bounding box of `geometry` from its vertices.
    pub fn update_bounding_box(&mut self, geometry: GeometryIndex) {
        let range = self.vertex_range(geometry);
        self.bounding_box[geometry] = Aabb::from_points(self.vertex[range].iter().copied());
    }

    /// Resizes the vertex and face ranges of every geometry.
    ///
    /// The first vertices and faces of each geometry are kept, new ones have default values.
    /// Face indices are shifted with the vertex range of their geometry.
    pub fn resize_geometries(
        &mut self,
        face_counts: &[usize],
        vertex_counts: &[usize],
    ) -> Result<(), CollectionError> {
        let num_geometries = self.num_elements(Group::Geometry);
        for counts in [face_counts, vertex_counts] {
            if counts.len() != num_geometries {
                return Err(CollectionError::MismatchedGeometryCount {
                    expected: num_geometries,
                    actual: counts.len(),
                });
            }
        }

        let kept: Vec<_> = (0..num_geometries).collect();
        self.rebuild_geometry_ranges(&kept, vertex_counts, face_counts);
        Ok(())
    }

    /// Removes `geometries` along with their vertices and faces.
    ///
    /// Their transforms are kept without geometry, and the remaining geometries are renumbered.
    pub fn remove_geometries(&mut self, geometries: &[GeometryIndex]) {
        let removed: BTreeSet<_> = geometries.iter().copied().collect();
        let kept: Vec<_> = (0..self.num_elements(Group::Geometry))
            .filter(|g| !removed.contains(g))
            .collect();
        let vertex_counts: Vec<_> = kept.iter().map(|g| self.vertex_count[*g]).collect();
        let face_counts: Vec<_> = kept.iter().map(|g| self.face_count[*g]).collect();
        self.rebuild_geometry_ranges(&kept, &vertex_counts, &face_counts);
    }

    // Rebuilds the geometry, vertex and face groups so that they only contain the geometries
    // `kept`, in this order, with the given vertex and face counts.
    fn rebuild_geometry_ranges(
        &mut self,
        kept: &[GeometryIndex],
        vertex_counts: &[usize],
        face_counts: &[usize],
    ) {
        let vertex_ranges: Vec<_> = kept
            .iter()
            .zip(vertex_counts)
            .map(|(g, n)| (self.vertex_range(*g), *n))
            .collect();
        let face_ranges: Vec<_> = kept
            .iter()
            .zip(face_counts)
            .map(|(g, n)| (self.face_range(*g), *n))
            .collect();

        self.vertex = gather(&self.vertex, &vertex_ranges, Point::origin());
        self.normal = gather(&self.normal, &vertex_ranges, Vector::z());
        self.tangent_u = gather(&self.tangent_u, &vertex_ranges, Vector::x());
        self.tangent_v = gather(&self.tangent_v, &vertex_ranges, Vector::y());
        self.color = gather(&self.color, &vertex_ranges, Color::repeat(1.0));
        for channel in &mut self.uvs {
            *channel = gather(channel, &vertex_ranges, Point2::origin());
        }
        self.bone_map = gather(&self.bone_map, &vertex_ranges, 0);
        self.indices = gather(&self.indices, &face_ranges, [u32::MAX; 3]);
        self.material_id = gather(&self.material_id, &face_ranges, 0);
        self.visible = gather(&self.visible, &face_ranges, true);

        let mut old_to_new = vec![None; self.num_elements(Group::Geometry)];
        let mut vertex_start = 0;
        let mut face_start = 0;

        for (new_id, old_id) in kept.iter().enumerate() {
            old_to_new[*old_id] = Some(new_id);
            let old_vertex_start = self.vertex_start[*old_id];
            let transform = self.transform_index[*old_id];

            for face in &mut self.indices[face_start..face_start + face_counts[new_id]] {
                for vid in face.iter_mut() {
                    *vid = if *vid == u32::MAX {
                        vertex_start as u32
                    } else {
                        (*vid as usize + vertex_start - old_vertex_start) as u32
                    };
                }
            }

            self.bone_map[vertex_start..vertex_start + vertex_counts[new_id]].fill(transform);
            self.vertex_start[*old_id] = vertex_start;
            self.face_start[*old_id] = face_start;
            self.vertex_count[*old_id] = vertex_counts[new_id];
            self.face_count[*old_id] = face_counts[new_id];
            vertex_start += vertex_counts[new_id];
            face_start += face_counts[new_id];
        }

        let select = |src: &[usize]| -> Vec<usize> { kept.iter().map(|g| src[*g]).collect() };
        self.transform_index = select(&self.transform_index);
        self.vertex_start = select(&self.vertex_start);
        self.vertex_count = select(&self.vertex_count);
        self.face_start = select(&self.face_start);
        self.face_count = select(&self.face_count);
        self.bounding_box = kept.iter().map(|g| self.bounding_box[*g]).collect();

        for geometry in &mut self.transform_to_geometry_index {
            *geometry = geometry.and_then(|g| old_to_new[g]);
        }

        if let Some(proximity) = &mut self.proximity {
            *proximity = kept
                .iter()
                .map(|g| {
                    proximity[*g]
                        .iter()
                        .filter_map(|other| old_to_new[*other])
                        .collect()
                })
                .collect();
        }

        self.material_index = (0..self.indices.len()).collect();
    }

    /// Removes `transforms` and their geometry.
    ///
    /// The children of a removed transform are attached to its closest remaining ancestor, and
    /// the remaining transforms are renumbered.
    pub fn remove_transforms(&mut self, transforms: &[TransformIndex]) {
        let removed: BTreeSet<_> = transforms.iter().copied().collect();
        let num_transforms = self.num_elements(Group::Transform);

        let removed_geometries: Vec<_> = removed
            .iter()
            .filter_map(|t| self.transform_to_geometry_index[*t])
            .collect();
        self.remove_geometries(&removed_geometries);

        let mut old_to_new = vec![None; num_transforms];
        let mut num_kept = 0;
        for (old_id, new_id) in old_to_new.iter_mut().enumerate() {
            if !removed.contains(&old_id) {
                *new_id = Some(num_kept);
                num_kept += 1;
            }
        }

        // Re-attach orphans to their closest remaining ancestor, keeping their global transform.
        let global: Vec<_> = (0..num_transforms)
            .map(|t| self.global_transform(t))
            .collect();
        let mut new_parent = vec![None; num_transforms];
        for t in 0..num_transforms {
            let mut ancestor = self.parent[t];
            while let Some(a) = ancestor {
                if !removed.contains(&a) {
                    break;
                }
                ancestor = self.parent[a];
            }
            new_parent[t] = ancestor;

            if ancestor != self.parent[t] && !removed.contains(&t) {
                self.transform[t] = match ancestor {
                    Some(a) => global[a].inv_mul(&global[t]),
                    None => global[t],
                };
            }
        }

        let keep = |t: &usize| !removed.contains(t);
        retain_indices(&mut self.transform, keep);
        retain_indices(&mut self.simulation_type, keep);
        retain_indices(&mut self.bone_name, keep);
        retain_indices(&mut self.bone_color, keep);
        retain_indices(&mut self.transform_to_geometry_index, keep);

        self.parent = (0..num_transforms)
            .filter(keep)
            .map(|t| new_parent[t].and_then(|p| old_to_new[p]))
            .collect();
        self.children = vec![BTreeSet::new(); num_kept];
        for (child, parent) in self.parent.iter().enumerate() {
            if let Some(parent) = parent {
                let _ = self.children[*parent].insert(child);
            }
        }

        for t in &mut self.transform_index {
            *t = old_to_new[*t].unwrap_or(0);
        }
        for t in &mut self.bone_map {
            *t = old_to_new[*t].unwrap_or(0);
        }
    }

    /// Attaches `children` to `parent`, keeping their global transforms.
    pub fn reparent_transforms(&mut self, parent: TransformIndex, children: &[TransformIndex]) {
        let parent_global = self.global_transform(parent);
        for child in children {
            assert_ne!(*child, parent, "A transform can't be its own parent.");
            let global = self.global_transform(*child);
            if let Some(old_parent) = self.parent[*child] {
                let _ = self.children[old_parent].remove(child);
            }
            self.parent[*child] = Some(parent);
            let _ = self.children[parent].insert(*child);
            self.transform[*child] = parent_global.inv_mul(&global);
        }
    }

    /// Makes sure the proximity of geometries is tracked, and returns it.
    pub fn ensure_proximity(&mut self) -> &mut Vec<BTreeSet<GeometryIndex>> {
        let num_geometries = self.num_elements(Group::Geometry);
        let proximity = self.proximity.get_or_insert_with(Vec::new);
        proximity.resize(num_geometries, BTreeSet::new());
        proximity
    }

    /// Marks `a` and `b` as touching each other.
    ///
    /// Does nothing if proximity isn't tracked.
    pub fn link_proximity(&mut self, a: GeometryIndex, b: GeometryIndex) {
        assert_ne!(a, b, "A geometry can't be its own neighbor.");
        if let Some(proximity) = &mut self.proximity {
            let _ = proximity[a].insert(b);
            let _ = proximity[b].insert(a);
        }
    }

    /// Sorts the faces by material into [`Self::material_index`], and rebuilds the material
    /// [`Self::sections`].
    pub fn reindex_materials(&mut self) {
        let mut material_index: Vec<_> = (0..self.indices.len()).collect();
        material_index.sort_by_key(|f| self.material_id[*f]);

        let mut sections: Vec<MaterialSection> = vec![];
        for (position, face) in material_index.iter().enumerate() {
            let material_id = self.material_id[*face];
            let [a, b, c] = self.indices[*face].map(|v| v as usize);
            let (min_vertex, max_vertex) = (a.min(b).min(c), a.max(b).max(c));

            match sections.last_mut() {
                Some(section) if section.material_id == material_id => {
                    section.num_triangles += 1;
                    section.min_vertex_index = section.min_vertex_index.min(min_vertex);
                    section.max_vertex_index = section.max_vertex_index.max(max_vertex);
                }
                _ => sections.push(MaterialSection {
                    material_id,
                    first_index: position,
                    num_triangles: 1,
                    min_vertex_index: min_vertex,
                    max_vertex_index: max_vertex,
                }),
            }
        }

        self.material_index = material_index;
        self.sections = sections;
    }

    /// Appends a rigid root piece with the given triangle mesh, in the local frame of
    /// `transform`.
    ///
    /// Vertex normals are computed from the faces, UVs are zero, and every face uses the
    /// material 0. Returns the new transform.
    pub fn append_rigid_mesh(
        &mut self,
        vertices: &[Point<Real>],
        indices: &[[u32; 3]],
        transform: Isometry<Real>,
        name: &str,
    ) -> TransformIndex {
        if self.num_uv_layers() == 0 {
            self.set_num_uv_layers(1);
        }

        let transform_id = self.add_elements(1, Group::Transform);
        let geometry = self.add_elements(1, Group::Geometry);
        let vertex_start = self.add_elements(vertices.len(), Group::Vertices);
        let face_start = self.add_elements(indices.len(), Group::Faces);

        self.transform[transform_id] = transform;
        self.bone_name[transform_id] = name.to_string();
        self.transform_to_geometry_index[transform_id] = Some(geometry);
        self.transform_index[geometry] = transform_id;
        self.vertex_start[geometry] = vertex_start;
        self.vertex_count[geometry] = vertices.len();
        self.face_start[geometry] = face_start;
        self.face_count[geometry] = indices.len();

        let mut normals = vec![Vector::zeros(); vertices.len()];
        for (k, tri) in indices.iter().enumerate() {
            let [a, b, c] = tri.map(|v| vertices[v as usize]);
            let weighted_normal = (b - a).cross(&(c - a));
            for v in tri {
                normals[*v as usize] += weighted_normal;
            }
            self.indices[face_start + k] = tri.map(|v| v + vertex_start as u32);
        }

        for (k, (pt, normal)) in vertices.iter().zip(normals).enumerate() {
            let normal = normal.try_normalize(1.0e-12).unwrap_or_else(Vector::z);
            let [tangent_u, tangent_v] = orthonormal_basis(&normal);
            let vid = vertex_start + k;
            self.vertex[vid] = *pt;
            self.normal[vid] = normal;
            self.tangent_u[vid] = tangent_u;
            self.tangent_v[vid] = tangent_v;
            self.bone_map[vid] = transform_id;
        }

        self.update_bounding_box(geometry);
        transform_id
    }

    /// Checks the consistency of the groups, ranges, indices and proximity of this collection.
    pub fn validate(&self) -> Result<(), CollectionError> {
        use CollectionError::Inconsistent;

        let num_transforms = self.num_elements(Group::Transform);
        let num_geometries = self.num_elements(Group::Geometry);
        let num_vertices = self.num_elements(Group::Vertices);
        let num_faces = self.num_elements(Group::Faces);

        if [
            self.parent.len(),
            self.children.len(),
            self.simulation_type.len(),
            self.bone_name.len(),
            self.bone_color.len(),
            self.transform_to_geometry_index.len(),
        ]
        .iter()
        .any(|len| *len != num_transforms)
            || [
                self.vertex_start.len(),
                self.vertex_count.len(),
                self.face_start.len(),
                self.face_count.len(),
                self.bounding_box.len(),
            ]
            .iter()
            .any(|len| *len != num_geometries)
            || [
                self.normal.len(),
                self.tangent_u.len(),
                self.tangent_v.len(),
                self.color.len(),
                self.bone_map.len(),
            ]
            .into_iter()
            .chain(self.uvs.iter().map(Vec::len))
            .any(|len| len != num_vertices)
            || [self.material_id.len(), self.visible.len()]
                .iter()
                .any(|len| *len != num_faces)
        {
            return Err(Inconsistent("group arrays have different lengths"));
        }

        if let Some(t) = self
            .transform_index
            .iter()
            .chain(&self.bone_map)
            .find(|t| **t >= num_transforms)
        {
            return Err(CollectionError::InvalidTransform(*t));
        }

        for (t, geometry) in self.transform_to_geometry_index.iter().enumerate() {
            if let Some(g) = geometry {
                if *g >= num_geometries {
                    return Err(CollectionError::InvalidGeometry(*g));
                }
                if self.transform_index[*g] != t {
                    return Err(Inconsistent("transform and geometry don't reference each other"));
                }
            }
            if let Some(p) = self.parent[t] {
                if p >= num_transforms {
                    return Err(CollectionError::InvalidTransform(p));
                }
                if !self.children[p].contains(&t) {
                    return Err(Inconsistent("parent and children don't match"));
                }
            }
        }

        let mut vertex_ranges: Vec<_> = (0..num_geometries).map(|g| self.vertex_range(g)).collect();
        let mut face_ranges: Vec<_> = (0..num_geometries).map(|g| self.face_range(g)).collect();
        for ranges in [&mut vertex_ranges, &mut face_ranges] {
            ranges.sort_by_key(|r| r.start);
            if ranges.windows(2).any(|w| w[0].end > w[1].start) {
                return Err(Inconsistent("overlapping geometry ranges"));
            }
        }
        if vertex_ranges.last().is_some_and(|r| r.end > num_vertices)
            || face_ranges.last().is_some_and(|r| r.end > num_faces)
        {
            return Err(Inconsistent("geometry range out of bounds"));
        }

        for g in 0..num_geometries {
            let vertices = self.vertex_range(g);
            for face in &self.indices[self.face_range(g)] {
                if face.iter().any(|v| !vertices.contains(&(*v as usize))) {
                    return Err(Inconsistent("face referencing a vertex of another geometry"));
                }
            }
        }

        if let Some(proximity) = &self.proximity {
            if proximity.len() != num_geometries {
                return Err(Inconsistent("proximity doesn't have one entry per geometry"));
            }
            for (a, neighbors) in proximity.iter().enumerate() {
                if neighbors.iter().any(|b| !proximity[*b].contains(&a)) {
                    return Err(Inconsistent("asymmetric proximity"));
                }
            }
        }

        Ok(())
    }
}
