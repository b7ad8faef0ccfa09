use crate::bounding_volume::Aabb;
use crate::collection::TransformIndex;
use crate::math::{Isometry, Real};
use crate::mesh::DynamicMesh;
use std::sync::OnceLock;

/// The mesh of a piece of a geometry collection, expressed in the cutting frame.
///
/// The bounding box of the mesh is computed lazily and cached until the mesh is modified.
#[derive(Clone, Debug)]
pub struct MeshData {
    mesh: DynamicMesh,
    /// The transform of the collection this mesh comes from.
    pub transform_index: TransformIndex,
    /// Maps the local frame of the geometry to the frame of the mesh.
    pub from_collection: Isometry<Real>,
    bounds: OnceLock<Aabb>,
}

impl MeshData {
    /// Wraps `mesh`, coming from the geometry of `transform_index`.
    pub fn new(
        mesh: DynamicMesh,
        transform_index: TransformIndex,
        from_collection: Isometry<Real>,
    ) -> Self {
        Self {
            mesh,
            transform_index,
            from_collection,
            bounds: OnceLock::new(),
        }
    }

    /// The mesh.
    #[inline]
    pub fn mesh(&self) -> &DynamicMesh {
        &self.mesh
    }

    /// Mutable access to the mesh, which invalidates the cached bounds.
    pub fn mesh_mut(&mut self) -> &mut DynamicMesh {
        self.bounds = OnceLock::new();
        &mut self.mesh
    }

    /// Replaces the mesh.
    pub fn set_mesh(&mut self, mesh: DynamicMesh) {
        self.mesh = mesh;
        self.bounds = OnceLock::new();
    }

    /// Consumes `self`, returning the mesh.
    pub fn into_mesh(self) -> DynamicMesh {
        self.mesh
    }

    /// The bounding box of the mesh.
    pub fn bounds(&self) -> Aabb {
        *self.bounds.get_or_init(|| self.mesh.bounds())
    }
}

#[cfg(test)]
mod test {
    use super::MeshData;
    use crate::bounding_volume::Aabb;
    use crate::math::{Isometry, Point, Vector};
    use crate::mesh::DynamicMesh;

    #[test]
    fn bounds_follow_the_mesh() {
        let cube = Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0));
        let mut data = MeshData::new(DynamicMesh::from_aabb(&cube), 0, Isometry::identity());
        assert_eq!(data.bounds(), cube);

        data.mesh_mut().translate(&Vector::x());
        assert_eq!(data.bounds().mins, Point::new(1.0, 0.0, 0.0));

        data.set_mesh(DynamicMesh::new());
        assert!(!data.bounds().is_valid());
    }
}
