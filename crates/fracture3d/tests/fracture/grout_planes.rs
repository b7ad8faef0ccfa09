use super::{cube_collection, new_pieces};
use fracture3d::cells::{InternalSurfaceMaterials, Plane};
use fracture3d::fracture::{cut_multiple_with_multiple_planes, find_bone_volumes, CutOptions};
use fracture3d::math::Vector;

#[test]
fn parallel_planes_with_grout_make_separate_slabs() {
    let mut collection = cube_collection(0.5);
    let planes: Vec<_> = [-0.25, 0.0, 0.25]
        .into_iter()
        .map(|w| Plane::new(Vector::x(), w))
        .collect();
    let options = CutOptions {
        grout: 0.05,
        ..CutOptions::default()
    };

    let first = cut_multiple_with_multiple_planes(
        &planes,
        &InternalSurfaceMaterials::default(),
        &mut collection,
        &[0],
        &options,
    )
    .unwrap();
    assert_eq!(first, Some(1));

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 4);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    let total: f64 = volumes.iter().sum();
    assert_relative_eq!(total, 1.0 - 3.0 * 0.05, epsilon = 1.0e-6);

    // The grout keeps the slabs apart.
    let proximity = collection.proximity.as_ref().unwrap();
    for geometry in 1..5 {
        assert!(proximity[geometry].is_empty());
    }
}

#[test]
fn successive_planes_without_grout_keep_pieces_linked() {
    let mut collection = cube_collection(0.5);
    let planes = [Plane::new(Vector::x(), 0.2), Plane::new(Vector::x(), -0.2)];

    let _ = cut_multiple_with_multiple_planes(
        &planes,
        &InternalSurfaceMaterials::default(),
        &mut collection,
        &[0],
        &CutOptions::default(),
    )
    .unwrap();

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 3);
    let mut volumes = find_bone_volumes(&collection, &pieces, 1.0);
    volumes.sort_by(|a, b| a.total_cmp(b));
    assert_relative_eq!(volumes[0], 0.3, epsilon = 1.0e-6);
    assert_relative_eq!(volumes[1], 0.3, epsilon = 1.0e-6);
    assert_relative_eq!(volumes[2], 0.4, epsilon = 1.0e-6);

    // Only the middle slab touches both others.
    let proximity = collection.proximity.as_ref().unwrap();
    let degrees: Vec<_> = (1..4).map(|g| proximity[g].len()).collect();
    assert_eq!(degrees.iter().sum::<usize>(), 4);
    assert!(degrees.contains(&2));
}
