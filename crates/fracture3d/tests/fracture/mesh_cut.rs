use super::{assert_symmetric_proximity, cube_collection, new_pieces};
use fracture3d::bounding_volume::Aabb;
use fracture3d::cells::InternalSurfaceMaterials;
use fracture3d::collection::GeometryCollection;
use fracture3d::fracture::{cut_with_mesh, find_bone_volumes, CutOptions};
use fracture3d::math::{Isometry, Point, Real, Vector};
use fracture3d::mesh::DynamicMesh;

fn center_y(collection: &GeometryCollection, geometry: usize) -> Real {
    let range = collection.vertex_range(geometry);
    collection.vertex[range.clone()].iter().map(|p| p.y).sum::<Real>() / range.len() as Real
}

#[test]
fn rotated_box_cutter_faces_point_out_of_their_piece() {
    let mut collection = cube_collection(0.5);
    let cutter = DynamicMesh::from_aabb(&Aabb::new(
        Point::new(0.0, -1.0, -1.0),
        Point::new(1.0, 1.0, 1.0),
    ));
    // Turns the cutter into the half-space y >= 0.
    let cutter_transform = Isometry::rotation(Vector::z() * core::f64::consts::FRAC_PI_2);

    let first = cut_with_mesh(
        &cutter,
        &cutter_transform,
        &InternalSurfaceMaterials::default(),
        &mut collection,
        &[0],
        &CutOptions::default(),
    )
    .unwrap();
    assert_eq!(first, Some(1));

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 2);
    for volume in find_bone_volumes(&collection, &pieces, 1.0) {
        assert_relative_eq!(volume, 0.5, epsilon = 1.0e-6);
    }

    let mut num_internal = 0;
    for geometry in [1, 2] {
        let outward = Vector::y() * -center_y(&collection, geometry).signum();
        for face in collection.face_range(geometry) {
            let tri = collection.indices[face];
            if tri.iter().all(|v| collection.vertex[*v as usize].y.abs() < 1.0e-9) {
                num_internal += 1;
                for v in tri {
                    assert_relative_eq!(collection.normal[v as usize], outward, epsilon = 1.0e-6);
                    let tangent = collection.tangent_u[v as usize];
                    assert_relative_eq!(tangent.dot(&outward), 0.0, epsilon = 1.0e-6);
                }
            }
        }
    }
    assert!(num_internal >= 4);
    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}
