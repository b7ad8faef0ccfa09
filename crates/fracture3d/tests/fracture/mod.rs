use fracture3d::bounding_volume::Aabb;
use fracture3d::collection::GeometryCollection;
use fracture3d::math::{Isometry, Point, Real};
use fracture3d::mesh::DynamicMesh;

mod auto_uv;
mod grout_cells;
mod grout_planes;
mod merge_small_bones;
mod mesh_cut;
mod planar_cut;
mod voronoi_cut;

pub fn cube_collection(half_extent: Real) -> GeometryCollection {
    let cube = DynamicMesh::from_aabb(&Aabb::new(
        Point::new(-half_extent, -half_extent, -half_extent),
        Point::new(half_extent, half_extent, half_extent),
    ));
    let (vertices, indices) = cube.to_buffers();
    let mut collection = GeometryCollection::new();
    let _ = collection.append_rigid_mesh(&vertices, &indices, Isometry::identity(), "cube");
    collection
}

// The transforms created by a cut, which are all after the source transform 0.
pub fn new_pieces(collection: &GeometryCollection) -> Vec<usize> {
    (1..collection.transform.len())
        .filter(|t| collection.transform_to_geometry_index[*t].is_some())
        .collect()
}

pub fn assert_symmetric_proximity(collection: &GeometryCollection) {
    let proximity = collection.proximity.as_ref().expect("proximity isn't tracked");
    for (a, neighbors) in proximity.iter().enumerate() {
        assert!(!neighbors.contains(&a));
        for b in neighbors {
            assert!(proximity[*b].contains(&a), "{} -> {} isn't symmetric", a, b);
        }
    }
}
