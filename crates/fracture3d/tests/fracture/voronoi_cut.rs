use super::{assert_symmetric_proximity, cube_collection, new_pieces};
use fracture3d::bounding_volume::Aabb;
use fracture3d::cells::PlanarCells;
use fracture3d::collection::GeometryCollection;
use fracture3d::fracture::{cut_with_planar_cells, find_bone_volumes, CutOptions};
use fracture3d::math::Point;
use fracture3d::transformation::NoiseSettings;

fn random_sites(seed: u64, count: usize) -> Vec<Point<f64>> {
    let mut rng = oorandom::Rand64::new(seed as u128);
    (0..count)
        .map(|_| {
            Point::new(
                rng.rand_float() - 0.5,
                rng.rand_float() - 0.5,
                rng.rand_float() - 0.5,
            )
        })
        .collect()
}

fn voronoi_fracture(seed: u64) -> GeometryCollection {
    let mut collection = cube_collection(0.5);
    let bounds = Aabb::new(Point::new(-0.6, -0.6, -0.6), Point::new(0.6, 0.6, 0.6));
    let cells = PlanarCells::from_voronoi(&random_sites(seed, 12), &bounds).unwrap();
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();
    collection
}

#[test]
fn voronoi_pieces_conserve_volume() {
    let collection = voronoi_fracture(42);
    let pieces = new_pieces(&collection);
    assert!(pieces.len() >= 12);

    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    assert!(volumes.iter().all(|v| *v > 0.0));
    assert_relative_eq!(volumes.iter().sum::<f64>(), 1.0, epsilon = 1.0e-5);

    assert_symmetric_proximity(&collection);
    let proximity = collection.proximity.as_ref().unwrap();
    for piece in &pieces {
        let geometry = collection.transform_to_geometry_index[*piece].unwrap();
        assert!(!proximity[geometry].is_empty());
    }
    collection.validate().unwrap();
}

#[test]
fn voronoi_fracture_is_deterministic() {
    let a = voronoi_fracture(7);
    let b = voronoi_fracture(7);

    assert_eq!(a.bone_name, b.bone_name);
    assert_eq!(a.indices, b.indices);
    assert_eq!(a.vertex, b.vertex);
    assert_eq!(a.proximity, b.proximity);
}

#[test]
fn noisy_voronoi_pieces_conserve_volume() {
    let mut collection = cube_collection(0.5);
    let bounds = Aabb::new(Point::new(-0.6, -0.6, -0.6), Point::new(0.6, 0.6, 0.6));
    let sites = [
        Point::new(-0.25, -0.2, -0.1),
        Point::new(0.3, -0.15, 0.05),
        Point::new(-0.1, 0.3, 0.2),
        Point::new(0.2, 0.25, -0.3),
    ];
    let mut cells = PlanarCells::from_voronoi(&sites, &bounds).unwrap();
    cells.internal_surface_materials.noise = Some(NoiseSettings {
        amplitude: 0.02,
        frequency: 2.0,
        octaves: 2,
        point_spacing: 0.2,
        seed: 3,
    });
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();

    let pieces = new_pieces(&collection);
    assert!(pieces.len() >= 4);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    assert!(volumes.iter().all(|v| *v > 0.0));
    assert_relative_eq!(volumes.iter().sum::<f64>(), 1.0, epsilon = 1.0e-3);

    assert_symmetric_proximity(&collection);
    collection.validate().unwrap();
}
