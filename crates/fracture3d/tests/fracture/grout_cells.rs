use super::{cube_collection, new_pieces};
use fracture3d::bounding_volume::Aabb;
use fracture3d::cells::PlanarCells;
use fracture3d::collection::GeometryCollection;
use fracture3d::fracture::{cut_multiple_with_planar_cells, find_bone_volumes, CutOptions};
use fracture3d::math::{Point, Real};

fn geometry_bounds(collection: &GeometryCollection, transform: usize) -> Aabb {
    let geometry = collection.transform_to_geometry_index[transform].unwrap();
    let points = &collection.vertex[collection.vertex_range(geometry)];
    let mut bounds = Aabb::new_invalid();
    for pt in points {
        bounds.take_point(*pt);
    }
    bounds
}

#[test]
fn grout_keeps_sibling_cells_apart() {
    let mut collection = cube_collection(0.5);
    let region = Aabb::new(Point::new(-0.6, -0.6, -0.6), Point::new(0.6, 0.6, 0.6));
    let cells = PlanarCells::from_grid(&region, [2, 2, 1]);
    let options = CutOptions {
        grout: 0.1,
        ..CutOptions::default()
    };
    let first = cut_multiple_with_planar_cells(&cells, &mut collection, &[0], &options).unwrap();
    assert_eq!(first, Some(1));

    let pieces = new_pieces(&collection);
    assert_eq!(pieces.len(), 4);
    let volumes = find_bone_volumes(&collection, &pieces, 1.0);
    assert!(volumes.iter().all(|v| *v > 0.2));
    assert!(volumes.iter().sum::<Real>() < 1.0 - 0.05);

    // Every two pieces are separated along x or y.
    for (i, a) in pieces.iter().enumerate() {
        for b in &pieces[i + 1..] {
            let (ba, bb) = (geometry_bounds(&collection, *a), geometry_bounds(&collection, *b));
            let gap = (0..2)
                .map(|k| (bb.mins[k] - ba.maxs[k]).max(ba.mins[k] - bb.maxs[k]))
                .fold(Real::MIN, Real::max);
            assert!(gap > 0.01, "pieces {} and {} overlap", a, b);
        }
    }
    collection.validate().unwrap();
}
