use super::{assert_symmetric_proximity, cube_collection, new_pieces};
use fracture3d::cells::{InternalSurfaceMaterials, PlanarCells, Plane};
use fracture3d::fracture::{
    cut_multiple_with_multiple_planes, cut_with_planar_cells, find_bone_volumes, find_small_bones,
    merge_bones, CutOptions, MergeBonesOptions, SupersededGeometry,
};
use fracture3d::math::Vector;

#[test]
fn thin_sliver_is_merged_back() {
    let mut collection = cube_collection(0.5);
    let cells = PlanarCells::from_plane(Plane::new(Vector::x(), 0.45));
    let options = CutOptions {
        superseded_geometry: SupersededGeometry::Remove,
        ..CutOptions::default()
    };
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &options).unwrap();

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 2);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    let small = find_small_bones(&collection, &pieces, &volumes, 0.1);
    assert_eq!(small.len(), 1);
    let small_volume = volumes[pieces.iter().position(|p| *p == small[0]).unwrap()];
    assert_relative_eq!(small_volume, 0.05, epsilon = 1.0e-6);

    let merge_options = MergeBonesOptions {
        min_volume: 0.1,
        union_meshes: false,
        ..MergeBonesOptions::default()
    };
    merge_bones(&mut collection, &pieces, &volumes, &small, &merge_options).unwrap();

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 1);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    assert_relative_eq!(volumes[0], 1.0, epsilon = 1.0e-6);
    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}

#[test]
fn sliver_is_unioned_into_its_only_neighbor() {
    let mut collection = cube_collection(0.5);
    // Ten slabs, the last one leaving a sliver on the face of the cube.
    let planes: Vec<_> = [-0.4, -0.3, -0.2, -0.1, 0.0, 0.1, 0.2, 0.3, 0.4, 0.49]
        .into_iter()
        .map(|w| Plane::new(Vector::x(), w))
        .collect();
    let _ = cut_multiple_with_multiple_planes(
        &planes,
        &InternalSurfaceMaterials::default(),
        &mut collection,
        &[0],
        &CutOptions::default(),
    )
    .unwrap();

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 11);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    let small = find_small_bones(&collection, &pieces, &volumes, 0.05);
    assert_eq!(small.len(), 1);

    let volume_of =
        |transform: usize| volumes[pieces.iter().position(|p| *p == transform).unwrap()];
    assert_relative_eq!(volume_of(small[0]), 0.01, epsilon = 1.0e-6);

    let sliver = collection.transform_to_geometry_index[small[0]].unwrap();
    let neighbors = &collection.proximity.as_ref().unwrap()[sliver];
    assert_eq!(neighbors.len(), 1);
    let neighbor = collection.transform_index[*neighbors.iter().next().unwrap()];
    assert_relative_eq!(volume_of(neighbor), 0.09, epsilon = 1.0e-6);

    let merge_options = MergeBonesOptions {
        min_volume: 0.05,
        ..MergeBonesOptions::default()
    };
    assert!(merge_options.union_meshes);
    merge_bones(&mut collection, &pieces, &volumes, &small, &merge_options).unwrap();

    // Every remaining slab, the merged one included, is a tenth of the cube.
    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 10);
    for volume in find_bone_volumes(&collection, &pieces, 1.0) {
        assert_relative_eq!(volume, 0.1, epsilon = 1.0e-6);
    }
    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}
