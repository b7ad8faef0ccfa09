use super::{assert_symmetric_proximity, cube_collection, new_pieces};
use fracture3d::bounding_volume::Aabb;
use fracture3d::cells::{PlanarCells, Plane};
use fracture3d::conversion::{split_islands, DynamicMeshCollection};
use fracture3d::fracture::{cut_with_planar_cells, find_bone_volumes, CutFlags, CutOptions};
use fracture3d::math::{Isometry, Point, Vector};

#[test]
fn unit_cube_split_in_two_halves() {
    let mut collection = cube_collection(0.5);
    let cells = PlanarCells::from_plane(Plane::new(Vector::z(), 0.0));
    let first = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();
    assert_eq!(first, Some(1));

    let pieces = new_pieces(&collection);
    assert_eq!(pieces, vec![1, 2]);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    assert_relative_eq!(volumes[0], 0.5, epsilon = 1.0e-6);
    assert_relative_eq!(volumes[1], 0.5, epsilon = 1.0e-6);

    assert_eq!(collection.bone_name[1], "cube_0");
    assert_eq!(collection.bone_name[2], "cube_1");
    assert!(collection.proximity.as_ref().unwrap()[1].contains(&2));
    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}

#[test]
fn grid_cells_conserve_volume() {
    let mut collection = cube_collection(0.5);
    let region = Aabb::new(Point::new(-0.6, -0.6, -0.6), Point::new(0.6, 0.6, 0.6));
    let cells = PlanarCells::from_grid(&region, [2, 2, 2]);
    let first = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();
    assert_eq!(first, Some(1));

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 8);
    for volume in find_bone_volumes(&collection, &pieces, 1.0) {
        assert_relative_eq!(volume, 0.125, epsilon = 1.0e-6);
    }

    // Each octant touches the three octants it shares a face with.
    let proximity = collection.proximity.as_ref().unwrap();
    for geometry in 1..9 {
        assert!(proximity[geometry].len() >= 3);
    }
    assert_symmetric_proximity(&collection);
}

#[test]
fn written_pieces_convert_back_unchanged() {
    let mut collection = cube_collection(0.5);
    let cells = PlanarCells::from_plane(Plane::new(Vector::new(1.0, 1.0, 0.0).normalize(), 0.1));
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();
    let before = collection.clone();

    let pieces = new_pieces(&collection);
    let meshes = DynamicMeshCollection::new(&collection, &pieces, &Isometry::identity(), true);
    meshes.update_all_collections(&mut collection).unwrap();

    assert_eq!(collection.indices, before.indices);
    assert_eq!(collection.material_id, before.material_id);
    assert_eq!(collection.visible, before.visible);
    for (a, b) in collection.vertex.iter().zip(&before.vertex) {
        assert_relative_eq!(a, b, epsilon = 1.0e-9);
    }
    for (a, b) in collection.normal.iter().zip(&before.normal) {
        assert_relative_eq!(a, b, epsilon = 1.0e-9);
    }
    for (a, b) in collection.tangent_u.iter().zip(&before.tangent_u) {
        assert_relative_eq!(a, b, epsilon = 1.0e-9);
    }
    for (a, b) in collection.tangent_v.iter().zip(&before.tangent_v) {
        assert_relative_eq!(a, b, epsilon = 1.0e-9);
    }
    assert_eq!(collection.uvs.len(), before.uvs.len());
    for (layer, before_layer) in collection.uvs.iter().zip(&before.uvs) {
        for (a, b) in layer.iter().zip(before_layer) {
            assert_relative_eq!(a, b, epsilon = 1.0e-9);
        }
    }

    // Pieces are already split into islands.
    for data in &meshes.meshes {
        assert!(split_islands(data.mesh()).is_none());
    }
}

#[test]
fn filling_holes_keeps_halves_closed() {
    let mut collection = cube_collection(0.5);
    let cells = PlanarCells::from_plane(Plane::new(Vector::y(), 0.0));
    let options = CutOptions {
        flags: CutOptions::default().flags | CutFlags::FILL_HOLES,
        ..CutOptions::default()
    };
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &options).unwrap();

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 2);
    for volume in find_bone_volumes(&collection, &pieces, 1.0) {
        assert_relative_eq!(volume, 0.5, epsilon = 1.0e-6);
    }
    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}
