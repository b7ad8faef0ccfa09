use super::{MeshAttributes, MeshError, MeshOverlays, VertexInfo};
use crate::bounding_volume::Aabb;
use crate::math::{Isometry, Point, Real, UnitVector, Vector};
use crate::utils::hashmap::{Entry, HashMap};
use crate::utils::{self, SortedPair};
use slab::Slab;
use smallvec::SmallVec;

const NO_TRIANGLE: u32 = u32::MAX;

#[derive(Clone, Debug)]
struct MeshVertex {
    position: Point<Real>,
    triangles: SmallVec<[u32; 8]>,
}

/// An editable indexed triangle mesh with stable, possibly sparse, vertex and triangle ids.
///
/// Each vertex knows its incident triangles and each undirected edge knows its (at most two)
/// incident triangles, so the mesh is always edge-manifold: inserting a triangle that would
/// give an edge a third triangle fails with [`MeshError::NonManifoldEdge`].
///
/// Removing elements leaves holes in the id ranges; [`DynamicMesh::max_vertex_id`] and
/// [`DynamicMesh::max_triangle_id`] bound the ids currently in use.
///
/// Per-vertex and per-triangle attribute layers are stored in [`MeshAttributes`]; a mesh with
/// every layer attached is said to be augmented (see [`DynamicMesh::is_augmented`]).
#[derive(Clone, Debug, Default)]
pub struct DynamicMesh {
    vertices: Slab<MeshVertex>,
    triangles: Slab<[u32; 3]>,
    edges: HashMap<SortedPair<u32>, [u32; 2]>,
    vertex_id_bound: u32,
    triangle_id_bound: u32,
    pub(crate) attributes: MeshAttributes,
    pub(crate) overlays: MeshOverlays,
}

impl DynamicMesh {
    /// Creates an empty mesh without any attribute layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mesh from a vertex buffer and an index buffer.
    pub fn from_buffers(vertices: &[Point<Real>], indices: &[[u32; 3]]) -> Result<Self, MeshError> {
        let mut result = Self::new();

        for pt in vertices {
            let _ = result.append_vertex(*pt);
        }

        for idx in indices {
            let _ = result.append_triangle(*idx)?;
        }

        Ok(result)
    }

    /// A closed, outward-oriented box mesh with 8 vertices and 12 triangles.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        const INDICES: [[u32; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];

        let mut result = Self::new();
        for pt in aabb.vertices() {
            let _ = result.append_vertex(pt);
        }
        for tri in INDICES {
            let _ = result.link_new_triangle(tri);
        }
        result
    }

    /// A mesh with the same attribute layers as `self`, but no vertex or triangle.
    pub fn empty_like(&self) -> Self {
        let mut result = Self::new();
        result.attributes = self.attributes.cleared();
        result
    }

    /// The attribute layers of this mesh.
    pub fn attributes(&self) -> &MeshAttributes {
        &self.attributes
    }

    /// The topological attribute overlays of this mesh.
    pub fn overlays(&self) -> &MeshOverlays {
        &self.overlays
    }

    /// The topological attribute overlays of this mesh.
    pub fn overlays_mut(&mut self) -> &mut MeshOverlays {
        &mut self.overlays
    }

    /// The number of vertices of this mesh.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// The number of triangles of this mesh.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Does this mesh contain no triangle?
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// An upper bound (exclusive) of the vertex ids of this mesh.
    pub fn max_vertex_id(&self) -> u32 {
        self.vertex_id_bound
    }

    /// An upper bound (exclusive) of the triangle ids of this mesh.
    pub fn max_triangle_id(&self) -> u32 {
        self.triangle_id_bound
    }

    /// The ids of the vertices of this mesh, in increasing order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.vertices.iter().map(|(id, _)| id as u32)
    }

    /// The ids of the triangles of this mesh, in increasing order.
    pub fn triangle_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.triangles.iter().map(|(id, _)| id as u32)
    }

    /// Is `vid` the id of a vertex of this mesh?
    pub fn is_vertex(&self, vid: u32) -> bool {
        self.vertices.contains(vid as usize)
    }

    /// Is `tid` the id of a triangle of this mesh?
    pub fn is_triangle(&self, tid: u32) -> bool {
        self.triangles.contains(tid as usize)
    }

    /// The position of the vertex `vid`.
    ///
    /// Panics if `vid` isn’t a vertex of this mesh.
    pub fn vertex(&self, vid: u32) -> Point<Real> {
        self.vertices[vid as usize].position
    }

    /// Moves the vertex `vid`.
    pub fn set_vertex(&mut self, vid: u32, position: Point<Real>) {
        self.vertices[vid as usize].position = position;
    }

    /// The vertex ids of the triangle `tid`.
    ///
    /// Panics if `tid` isn’t a triangle of this mesh.
    pub fn triangle(&self, tid: u32) -> [u32; 3] {
        self.triangles[tid as usize]
    }

    /// The vertex positions of the triangle `tid`.
    pub fn triangle_points(&self, tid: u32) -> [Point<Real>; 3] {
        self.triangle(tid).map(|vid| self.vertex(vid))
    }

    /// The triangles incident to the vertex `vid`.
    pub fn vertex_triangles(&self, vid: u32) -> &[u32] {
        &self.vertices[vid as usize].triangles
    }

    /// Iterates through all the vertex positions of this mesh.
    pub fn positions(&self) -> impl Iterator<Item = Point<Real>> + '_ {
        self.vertices.iter().map(|(_, v)| v.position)
    }

    /// Adds an isolated vertex to this mesh and returns its id.
    ///
    /// Every enabled attribute layer receives its default value for this vertex.
    pub fn append_vertex(&mut self, position: Point<Real>) -> u32 {
        let id = self.vertices.insert(MeshVertex {
            position,
            triangles: SmallVec::new(),
        }) as u32;
        self.vertex_id_bound = self.vertex_id_bound.max(id + 1);
        self.attributes.reset_vertex(id as usize);
        id
    }

    /// Adds a vertex with all its attributes.
    ///
    /// Attributes of `info` for layers that are not enabled on this mesh are ignored.
    pub fn append_vertex_info(&mut self, info: &VertexInfo) -> u32 {
        let id = self.append_vertex(info.position);
        self.attributes.set_vertex_info(id as usize, info);
        id
    }

    /// Adds a copy of the vertex `vid` (with its attributes) and returns the id of the copy.
    pub fn duplicate_vertex(&mut self, vid: u32) -> u32 {
        let info = self.vertex_info(vid);
        self.append_vertex_info(&info)
    }

    /// The position and attributes of the vertex `vid`.
    ///
    /// Attributes for layers that are not enabled are set to their defaults.
    pub fn vertex_info(&self, vid: u32) -> VertexInfo {
        self.attributes
            .vertex_info(vid as usize, self.vertices[vid as usize].position)
    }

    /// Sets the position and the attributes of the vertex `vid`.
    pub fn set_vertex_info(&mut self, vid: u32, info: &VertexInfo) {
        self.vertices[vid as usize].position = info.position;
        self.attributes.set_vertex_info(vid as usize, info);
    }

    /// Adds a triangle to this mesh and returns its id.
    ///
    /// Fails if any vertex doesn’t exist, if the triangle is degenerate, or if one of its
    /// edges already has two incident triangles. The mesh is left unchanged on failure.
    pub fn append_triangle(&mut self, tri: [u32; 3]) -> Result<u32, MeshError> {
        for vid in tri {
            if !self.is_vertex(vid) {
                return Err(MeshError::InvalidVertex(vid));
            }
        }

        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            return Err(MeshError::DegenerateTriangle(tri));
        }

        for k in 0..3 {
            let key = SortedPair::new(tri[k], tri[(k + 1) % 3]);
            if let Some(incident) = self.edges.get(&key) {
                if incident[1] != NO_TRIANGLE {
                    return Err(MeshError::NonManifoldEdge(tri));
                }
            }
        }

        Ok(self.link_new_triangle(tri))
    }

    /// Adds a triangle, duplicating its vertices first if it would create a non-manifold edge.
    ///
    /// Returns the id of the new triangle and the (possibly new) vertices it references.
    pub fn append_triangle_or_duplicate(
        &mut self,
        tri: [u32; 3],
    ) -> Result<(u32, [u32; 3]), MeshError> {
        match self.append_triangle(tri) {
            Ok(tid) => Ok((tid, tri)),
            Err(MeshError::NonManifoldEdge(_)) => {
                let copy = tri.map(|vid| self.duplicate_vertex(vid));
                let tid = self.append_triangle(copy)?;
                Ok((tid, copy))
            }
            Err(e) => Err(e),
        }
    }

    // Inserts a triangle known to be valid.
    fn link_new_triangle(&mut self, tri: [u32; 3]) -> u32 {
        let tid = self.triangles.insert(tri) as u32;
        self.triangle_id_bound = self.triangle_id_bound.max(tid + 1);
        self.link_triangle(tid, tri);
        self.attributes.reset_triangle(tid as usize);
        self.overlays.reset_triangle(tid as usize);
        tid
    }

    fn link_triangle(&mut self, tid: u32, tri: [u32; 3]) {
        for k in 0..3 {
            self.vertices[tri[k] as usize].triangles.push(tid);
            let key = SortedPair::new(tri[k], tri[(k + 1) % 3]);
            match self.edges.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut()[1] = tid,
                Entry::Vacant(entry) => {
                    let _ = entry.insert([tid, NO_TRIANGLE]);
                }
            }
        }
    }

    fn unlink_triangle(&mut self, tid: u32, tri: [u32; 3]) {
        for k in 0..3 {
            let vtris = &mut self.vertices[tri[k] as usize].triangles;
            if let Some(pos) = vtris.iter().position(|t| *t == tid) {
                let _ = vtris.remove(pos);
            }

            let key = SortedPair::new(tri[k], tri[(k + 1) % 3]);
            let mut now_empty = false;
            if let Some(incident) = self.edges.get_mut(&key) {
                if incident[0] == tid {
                    incident[0] = incident[1];
                }
                incident[1] = NO_TRIANGLE;
                now_empty = incident[0] == NO_TRIANGLE;
            }

            if now_empty {
                let _ = crate::utils::hashmap::remove_entry(&mut self.edges, &key);
            }
        }
    }

    /// Removes the triangle `tid`.
    ///
    /// If `remove_isolated_vertices` is `true`, its vertices that are no longer referenced by
    /// any triangle are removed too.
    pub fn remove_triangle(
        &mut self,
        tid: u32,
        remove_isolated_vertices: bool,
    ) -> Result<(), MeshError> {
        if !self.is_triangle(tid) {
            return Err(MeshError::InvalidTriangle(tid));
        }

        let tri = self.triangles.remove(tid as usize);
        self.unlink_triangle(tid, tri);

        if remove_isolated_vertices {
            for vid in tri {
                if self.vertices[vid as usize].triangles.is_empty() {
                    let _ = self.vertices.remove(vid as usize);
                }
            }
        }

        Ok(())
    }

    /// Removes an isolated vertex. Fails if the vertex still has incident triangles.
    pub fn remove_vertex(&mut self, vid: u32) -> Result<(), MeshError> {
        match self.vertices.get(vid as usize) {
            Some(v) if v.triangles.is_empty() => {
                let _ = self.vertices.remove(vid as usize);
                Ok(())
            }
            _ => Err(MeshError::InvalidVertex(vid)),
        }
    }

    /// Removes every vertex without incident triangle.
    pub fn remove_isolated_vertices(&mut self) {
        self.vertices.retain(|_, v| !v.triangles.is_empty());
    }

    /// Replaces the vertex `old` by `new` in the triangle `tid`.
    ///
    /// This doesn’t check manifoldness and must only be used when `new` has no incident
    /// triangle sharing an edge with `tid`.
    pub(crate) fn replace_triangle_vertex(&mut self, tid: u32, old: u32, new: u32) {
        let tri = self.triangles[tid as usize];
        self.unlink_triangle(tid, tri);
        let new_tri = tri.map(|v| if v == old { new } else { v });
        self.triangles[tid as usize] = new_tri;
        self.link_triangle(tid, new_tri);
    }

    /// Moves the given triangles from the vertex `vid` to a new copy of `vid`.
    ///
    /// Returns the id of the new vertex.
    pub fn split_vertex(&mut self, vid: u32, triangles: &[u32]) -> u32 {
        let new_vid = self.duplicate_vertex(vid);
        for tid in triangles {
            self.replace_triangle_vertex(*tid, vid, new_vid);
        }
        new_vid
    }

    /// Splits the edge `(a, b)` at the parameter `t` (0 at `a`, 1 at `b`).
    ///
    /// The new vertex attributes are linearly interpolated, and each triangle incident to the edge
    /// is replaced by two triangles keeping its material and visibility.
    pub fn split_edge(&mut self, a: u32, b: u32, t: Real) -> Result<u32, MeshError> {
        let Some(incident) = self.edge_triangles(a, b) else {
            return Err(MeshError::InvalidVertex(a));
        };

        let info = VertexInfo::lerp(&self.vertex_info(a), &self.vertex_info(b), t);
        let mid = self.append_vertex_info(&info);

        for tid in incident.into_iter().flatten() {
            let tri = self.triangle(tid);
            let k = (0..3)
                .find(|k| SortedPair::new(tri[*k], tri[(k + 1) % 3]) == SortedPair::new(a, b))
                .ok_or(MeshError::InvalidTriangle(tid))?;
            let (p, q, r) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
            let material = self.attributes.triangle_material(tid as usize);
            let visible = self.attributes.triangle_visibility(tid as usize);

            self.remove_triangle(tid, false)?;
            for new_tri in [[p, mid, r], [mid, q, r]] {
                let new_tid = self.append_triangle(new_tri)?;
                self.attributes
                    .set_triangle_layers(new_tid as usize, material, visible);
            }
        }

        Ok(mid)
    }

    /// The (one or two) triangles incident to the undirected edge `(a, b)`.
    pub fn edge_triangles(&self, a: u32, b: u32) -> Option<[Option<u32>; 2]> {
        self.edges.get(&SortedPair::new(a, b)).map(|incident| {
            incident.map(|tid| (tid != NO_TRIANGLE).then_some(tid))
        })
    }

    /// Is `(a, b)` an edge with a single incident triangle?
    pub fn is_boundary_edge(&self, a: u32, b: u32) -> bool {
        self.edges
            .get(&SortedPair::new(a, b))
            .map(|incident| incident[1] == NO_TRIANGLE)
            .unwrap_or(false)
    }

    /// The triangle sharing the `k`-th edge (from `tri[k]` to `tri[(k + 1) % 3]`) of `tid`.
    pub fn triangle_edge_neighbor(&self, tid: u32, k: usize) -> Option<u32> {
        let tri = self.triangle(tid);
        let incident = self.edges.get(&SortedPair::new(tri[k], tri[(k + 1) % 3]))?;
        let other = if incident[0] == tid {
            incident[1]
        } else {
            incident[0]
        };
        (other != NO_TRIANGLE).then_some(other)
    }

    /// All the edges with a single incident triangle, oriented like in their triangle.
    pub fn boundary_edges(&self) -> Vec<[u32; 2]> {
        let mut result = vec![];

        for (_, tri) in self.triangles.iter() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if self.is_boundary_edge(a, b) {
                    result.push([a, b]);
                }
            }
        }

        result
    }

    /// Does every edge of this mesh have two incident triangles?
    pub fn is_closed(&self) -> bool {
        self.edges.values().all(|incident| incident[1] != NO_TRIANGLE)
    }

    /// Groups the triangles of this mesh into edge-connected components.
    ///
    /// Components are sorted by their smallest triangle id, and each lists its triangles in
    /// breadth-first order.
    pub fn connected_components(&self) -> Vec<Vec<u32>> {
        let mut visited = vec![false; self.triangle_id_bound as usize];
        let mut components = vec![];
        let mut queue = vec![];

        for seed in self.triangle_ids() {
            if visited[seed as usize] {
                continue;
            }

            visited[seed as usize] = true;
            let mut component = vec![seed];
            queue.push(seed);

            while let Some(tid) = queue.pop() {
                for k in 0..3 {
                    if let Some(nbh) = self.triangle_edge_neighbor(tid, k) {
                        if !visited[nbh as usize] {
                            visited[nbh as usize] = true;
                            component.push(nbh);
                            queue.push(nbh);
                        }
                    }
                }
            }

            components.push(component);
        }

        components
    }

    /// The AABB of all the vertices of this mesh.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    /// The AABB of the triangle `tid`.
    pub fn triangle_aabb(&self, tid: u32) -> Aabb {
        Aabb::from_points(self.triangle_points(tid))
    }

    /// The unit normal of the triangle `tid`, or `None` if it is degenerate.
    pub fn triangle_normal(&self, tid: u32) -> Option<UnitVector<Real>> {
        let [a, b, c] = self.triangle_points(tid);
        utils::ccw_face_normal([&a, &b, &c])
    }

    /// The area of the triangle `tid`.
    pub fn triangle_area(&self, tid: u32) -> Real {
        let [a, b, c] = self.triangle_points(tid);
        utils::triangle_area([&a, &b, &c])
    }

    /// The centroid of the triangle `tid`.
    pub fn triangle_centroid(&self, tid: u32) -> Point<Real> {
        let [a, b, c] = self.triangle_points(tid);
        Point::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// The signed volume enclosed by this mesh, positive for closed outward-oriented meshes.
    pub fn signed_volume(&self) -> Real {
        self.signed_volume_wrt(&Point::origin())
    }

    /// The signed volume enclosed by this mesh, computed by summing tetrahedra with a common apex
    /// at `reference`.
    pub fn signed_volume_wrt(&self, reference: &Point<Real>) -> Real {
        let mut volume = 0.0;

        for (_, tri) in self.triangles.iter() {
            let a = self.vertex(tri[0]) - reference;
            let b = self.vertex(tri[1]) - reference;
            let c = self.vertex(tri[2]) - reference;
            volume += a.dot(&b.cross(&c));
        }

        volume / 6.0
    }

    /// The average position of the vertices of this mesh.
    pub fn vertex_centroid(&self) -> Point<Real> {
        if self.vertices.is_empty() {
            return Point::origin();
        }

        let sum: Vector<Real> = self.positions().map(|pt| pt.coords).sum();
        Point::from(sum / self.vertices.len() as Real)
    }

    /// Applies the rigid transformation `iso` to the positions, normals and tangents of this mesh.
    pub fn transform_by(&mut self, iso: &Isometry<Real>) {
        for (_, v) in self.vertices.iter_mut() {
            v.position = iso * v.position;
        }

        self.attributes.rotate_vectors(|n| iso.rotation * n);
    }

    /// Translates every vertex of this mesh.
    pub fn translate(&mut self, translation: &Vector<Real>) {
        for (_, v) in self.vertices.iter_mut() {
            v.position += translation;
        }
    }

    /// Uniformly scales the vertex positions of this mesh about `center`.
    pub fn scale_about(&mut self, center: &Point<Real>, scale: Real) {
        for (_, v) in self.vertices.iter_mut() {
            v.position = center + (v.position - center) * scale;
        }
    }

    /// Flips the orientation of every triangle, and negates normals if `flip_normals` is `true`.
    pub fn reverse_orientation(&mut self, flip_normals: bool) {
        for (tid, tri) in self.triangles.iter_mut() {
            tri.swap(1, 2);
            self.overlays.reverse_triangle(tid);
        }

        if flip_normals {
            if let Some(normals) = &mut self.attributes.normals {
                normals.iter_mut().for_each(|n| *n = -*n);
            }
            self.overlays.negate_normals();
        }
    }

    /// Appends a copy of `other` to this mesh.
    ///
    /// If `flip` is `true` the appended triangles have their orientation (and normals) reversed.
    /// Triangles that would make an edge non-manifold get their own copies of their vertices.
    /// Returns the id, in `self`, of each vertex of `other` (`u32::MAX` for unused ids).
    pub fn append_mesh(&mut self, other: &DynamicMesh, flip: bool) -> Vec<u32> {
        let mut vmap = vec![u32::MAX; other.max_vertex_id() as usize];

        for vid in other.vertex_ids() {
            let mut info = other.vertex_info(vid);
            if flip {
                info.normal = -info.normal;
            }
            vmap[vid as usize] = self.append_vertex_info(&info);
        }

        for tid in other.triangle_ids() {
            let mut tri = other.triangle(tid).map(|vid| vmap[vid as usize]);
            if flip {
                tri.swap(1, 2);
            }

            // The vertices exist and are distinct, so this can only fail on non-manifold edges
            // that got duplicated vertices.
            if let Ok((new_tid, _)) = self.append_triangle_or_duplicate(tri) {
                self.attributes.set_triangle_layers(
                    new_tid as usize,
                    other.attributes.triangle_material(tid as usize),
                    other.attributes.triangle_visibility(tid as usize),
                );
            }
        }

        vmap
    }

    /// A new mesh made of copies of the triangles `tids` and of the vertices they reference.
    pub fn extract_triangles(&self, tids: &[u32]) -> DynamicMesh {
        let mut result = self.empty_like();
        let mut vmap = vec![u32::MAX; self.max_vertex_id() as usize];

        for tid in tids {
            let tri = self.triangle(*tid).map(|vid| {
                if vmap[vid as usize] == u32::MAX {
                    vmap[vid as usize] = result.append_vertex_info(&self.vertex_info(vid));
                }
                vmap[vid as usize]
            });

            if let Ok((new_tid, _)) = result.append_triangle_or_duplicate(tri) {
                result.attributes.set_triangle_layers(
                    new_tid as usize,
                    self.attributes.triangle_material(*tid as usize),
                    self.attributes.triangle_visibility(*tid as usize),
                );
            }
        }

        result
    }

    /// A copy of this mesh with contiguous vertex and triangle ids.
    ///
    /// Returns the compacted mesh and the new id of each old vertex (`u32::MAX` for unused ids).
    pub fn compacted(&self) -> (DynamicMesh, Vec<u32>) {
        let mut result = self.empty_like();
        let vmap = result.append_mesh(self, false);
        (result, vmap)
    }

    /// Vertex and index buffers of this mesh, with contiguous ids.
    pub fn to_buffers(&self) -> (Vec<Point<Real>>, Vec<[u32; 3]>) {
        let mut vmap = vec![u32::MAX; self.vertex_id_bound as usize];
        let mut vertices = Vec::with_capacity(self.vertex_count());

        for (vid, v) in self.vertices.iter() {
            vmap[vid] = vertices.len() as u32;
            vertices.push(v.position);
        }

        let indices = self
            .triangles
            .iter()
            .map(|(_, tri)| tri.map(|vid| vmap[vid as usize]))
            .collect();

        (vertices, indices)
    }
}

#[cfg(test)]
mod test {
    use super::DynamicMesh;
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::MeshError;

    fn unit_cube() -> DynamicMesh {
        DynamicMesh::from_aabb(&Aabb::from_half_extents(Point::origin(), Vector::repeat(0.5)))
    }

    #[test]
    fn cube_topology_and_volume() {
        let cube = unit_cube();
        assert!(cube.is_closed());
        assert!(cube.boundary_edges().is_empty());
        assert_eq!(cube.connected_components().len(), 1);
        assert_relative_eq!(cube.signed_volume(), 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(
            cube.signed_volume_wrt(&Point::new(3.0, -2.0, 1.0)),
            1.0,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn non_manifold_triangles_are_rejected() {
        let mut cube = unit_cube();
        assert_eq!(
            cube.append_triangle([0, 2, 5]),
            Err(MeshError::NonManifoldEdge([0, 2, 5]))
        );
        assert_eq!(
            cube.append_triangle([0, 0, 5]),
            Err(MeshError::DegenerateTriangle([0, 0, 5]))
        );
        assert_eq!(cube.triangle_count(), 12);

        let (_, tri) = cube.append_triangle_or_duplicate([0, 2, 5]).unwrap();
        assert!(tri.iter().all(|vid| *vid >= 8));
        assert_eq!(cube.vertex_count(), 11);
    }

    #[test]
    fn remove_and_reuse_ids() {
        let mut cube = unit_cube();
        cube.remove_triangle(3, false).unwrap();
        assert!(!cube.is_closed());
        assert_eq!(cube.boundary_edges().len(), 3);
        assert_eq!(cube.max_triangle_id(), 12);

        let tid = cube.append_triangle([4, 6, 7]).unwrap();
        assert_eq!(tid, 3);
        assert!(cube.is_closed());
    }

    #[test]
    fn split_edge_keeps_volume() {
        let mut cube = unit_cube();
        let mid = cube.split_edge(0, 2, 0.5).unwrap();
        assert_eq!(cube.vertex(mid), Point::new(0.0, 0.0, -0.5));
        assert_eq!(cube.triangle_count(), 14);
        assert!(cube.is_closed());
        assert_relative_eq!(cube.signed_volume(), 1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn reverse_and_transform() {
        let mut cube = unit_cube();
        cube.reverse_orientation(true);
        assert_relative_eq!(cube.signed_volume(), -1.0, epsilon = 1.0e-12);

        cube.translate(&Vector::new(2.0, 0.0, 0.0));
        assert_relative_eq!(cube.vertex_centroid(), Point::new(2.0, 0.0, 0.0));
        assert_relative_eq!(cube.bounds().mins, Point::new(1.5, -0.5, -0.5));
    }
}
