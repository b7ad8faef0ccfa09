use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Real, ZERO_TOLERANCE};
use crate::mesh::DynamicMesh;
use crate::utils::PointHashGrid;

/// The cell size of the vertex hashes used to test whether two pieces touch.
pub const NEIGHBOR_HASH_CELL_SIZE: Real = ZERO_TOLERANCE * 1000.0;
/// Two pieces touch if they have vertices closer than this.
pub const NEIGHBOR_DISTANCE: Real = ZERO_TOLERANCE * 10.0;

/// Inserts every vertex of `mesh` into `hash`.
pub fn fill_vertex_hash(mesh: &DynamicMesh, hash: &mut PointHashGrid<u32>) {
    for vid in mesh.vertex_ids() {
        hash.insert(vid, mesh.vertex(vid));
    }
}

/// The vertices and bounds of a mesh, indexed for neighbor tests.
#[derive(Clone, Debug)]
pub struct MeshVertexHash {
    grid: PointHashGrid<u32>,
    bounds: Aabb,
}

impl MeshVertexHash {
    /// Indexes the vertices of `mesh`.
    pub fn new(mesh: &DynamicMesh) -> Self {
        let mut grid = PointHashGrid::new(NEIGHBOR_HASH_CELL_SIZE);
        fill_vertex_hash(mesh, &mut grid);
        Self {
            grid,
            bounds: mesh.bounds(),
        }
    }

    /// The bounds of the indexed mesh.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }
}

/// Do `mesh_a` and `mesh_b` have vertices closer than [`NEIGHBOR_DISTANCE`]?
///
/// `hash_a` and `hash_b` must index `mesh_a` and `mesh_b`. The vertices of the mesh with the
/// fewest vertices are looked up in the hash of the other.
pub fn is_neighboring(
    mesh_a: &DynamicMesh,
    hash_a: &MeshVertexHash,
    mesh_b: &DynamicMesh,
    hash_b: &MeshVertexHash,
) -> bool {
    if !hash_a.bounds.intersects(&hash_b.bounds) {
        return false;
    }

    let (mesh, other_hash) = if mesh_a.vertex_count() > mesh_b.vertex_count() {
        (mesh_b, hash_a)
    } else {
        (mesh_a, hash_b)
    };

    mesh.positions().any(|pt| {
        other_hash
            .grid
            .find_nearest_in_radius(&pt, NEIGHBOR_DISTANCE, |_| false)
            .is_some()
    })
}

/// Lazily built vertex hashes of a growing list of meshes.
#[derive(Clone, Debug, Default)]
pub(crate) struct VertexHashCache {
    hashes: Vec<Option<MeshVertexHash>>,
}

impl VertexHashCache {
    /// Makes sure the mesh `id` is hashed.
    pub fn build(&mut self, id: usize, mesh: &DynamicMesh) {
        if id >= self.hashes.len() {
            self.hashes.resize(id + 1, None);
        }
        if self.hashes[id].is_none() {
            self.hashes[id] = Some(MeshVertexHash::new(mesh));
        }
    }

    /// Drops the hash of the mesh `id`, which changed.
    pub fn invalidate(&mut self, id: usize) {
        if let Some(hash) = self.hashes.get_mut(id) {
            *hash = None;
        }
    }

    /// Tests whether the meshes `a` and `b` touch, hashing them first if needed.
    pub fn is_neighboring(
        &mut self,
        a: usize,
        mesh_a: &DynamicMesh,
        b: usize,
        mesh_b: &DynamicMesh,
    ) -> bool {
        self.build(a, mesh_a);
        self.build(b, mesh_b);
        match (&self.hashes[a], &self.hashes[b]) {
            (Some(hash_a), Some(hash_b)) => is_neighboring(mesh_a, hash_a, mesh_b, hash_b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{is_neighboring, MeshVertexHash, VertexHashCache};
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;

    fn cube(x: f64) -> DynamicMesh {
        let mins = Point::new(x, 0.0, 0.0);
        DynamicMesh::from_aabb(&Aabb::new(mins, mins + Vector::repeat(1.0)))
    }

    #[test]
    fn touching_cubes_are_neighbors() {
        let (a, b, c) = (cube(0.0), cube(1.0), cube(1.01));
        let (ha, hb, hc) = (
            MeshVertexHash::new(&a),
            MeshVertexHash::new(&b),
            MeshVertexHash::new(&c),
        );

        assert!(is_neighboring(&a, &ha, &b, &hb));
        assert!(is_neighboring(&b, &hb, &a, &ha));
        assert!(!is_neighboring(&a, &ha, &c, &hc));
    }

    #[test]
    fn cache_rebuilds_invalidated_hashes() {
        let (a, b, far) = (cube(0.0), cube(1.0), cube(5.0));
        let mut cache = VertexHashCache::default();
        assert!(cache.is_neighboring(0, &a, 1, &b));

        cache.invalidate(1);
        assert!(!cache.is_neighboring(0, &a, 1, &far));
    }
}
