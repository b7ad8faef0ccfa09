use super::Bvh;
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Point, Vector};

fn unit_boxes(origins: &[Point<f64>]) -> Vec<Aabb> {
    origins
        .iter()
        .map(|pt| Aabb::new(*pt, pt + Vector::repeat(1.0)))
        .collect()
}

fn brute_force_pairs(a: &[Aabb], b: &[Aabb]) -> Vec<(u32, u32)> {
    let mut result = vec![];
    for (i, aabb1) in a.iter().enumerate() {
        for (j, aabb2) in b.iter().enumerate() {
            if aabb1.intersects(aabb2) {
                result.push((i as u32, j as u32));
            }
        }
    }
    result
}

#[test]
fn leaf_pairs_matches_brute_force() {
    let mut rng = oorandom::Rand64::new(42);
    let mut random_points = |n: usize| {
        (0..n)
            .map(|_| {
                Point::new(
                    rng.rand_float() * 10.0,
                    rng.rand_float() * 10.0,
                    rng.rand_float() * 10.0,
                )
            })
            .collect::<Vec<_>>()
    };

    let boxes1 = unit_boxes(&random_points(100));
    let boxes2 = unit_boxes(&random_points(57));
    let bvh1 = Bvh::from_leaves(&boxes1);
    let bvh2 = Bvh::from_leaves(&boxes2);

    let mut pairs: Vec<_> = bvh1
        .leaf_pairs(&bvh2, |n1, n2| n1.intersects(n2))
        .collect();
    pairs.sort();

    assert_eq!(pairs, brute_force_pairs(&boxes1, &boxes2));
    assert_eq!(bvh1.leaf_count(), 100);
}

#[test]
fn self_pairs_matches_brute_force() {
    let mut rng = oorandom::Rand64::new(7);
    let origins: Vec<_> = (0..80)
        .map(|_| {
            Point::new(
                rng.rand_float() * 6.0,
                rng.rand_float() * 6.0,
                rng.rand_float() * 6.0,
            )
        })
        .collect();
    let boxes = unit_boxes(&origins);
    let bvh = Bvh::from_leaves(&boxes);

    let mut pairs = vec![];
    bvh.self_leaf_pairs(&mut |a, b| pairs.push((a.min(b), a.max(b))));
    pairs.sort();

    let expected: Vec<_> = brute_force_pairs(&boxes, &boxes)
        .into_iter()
        .filter(|(a, b)| a < b)
        .collect();
    assert_eq!(pairs, expected);
}

#[test]
fn intersect_aabb_small_trees() {
    let boxes = unit_boxes(&[Point::origin()]);
    let bvh = Bvh::from_leaves(&boxes);
    let query = Aabb::new(Point::new(0.5, 0.5, 0.5), Point::new(2.0, 2.0, 2.0));
    assert_eq!(bvh.intersect_aabb(&query).collect::<Vec<_>>(), vec![0]);

    let boxes = unit_boxes(&[Point::origin(), Point::new(5.0, 0.0, 0.0)]);
    let bvh = Bvh::from_leaves(&boxes);
    assert_eq!(bvh.intersect_aabb(&query).collect::<Vec<_>>(), vec![0]);
    assert!(Bvh::new().intersect_aabb(&query).next().is_none());
}

#[test]
fn ray_reaches_boxes_along_its_segment() {
    let origins: Vec<_> = (0..10)
        .map(|i| Point::new(i as f64 * 2.0, 0.0, 0.0))
        .collect();
    let bvh = Bvh::from_leaves(&unit_boxes(&origins));

    let origin = Point::new(-1.0, 0.5, 0.5);
    let mut hits: Vec<_> = bvh.intersect_ray(origin, Vector::x(), 6.5).collect();
    hits.sort();
    assert_eq!(hits, vec![0, 1, 2]);

    let missed = Point::new(-1.0, 1.5, 0.5);
    assert_eq!(bvh.intersect_ray(missed, Vector::x(), 100.0).count(), 0);

    let mut downward: Vec<_> = bvh
        .intersect_ray(Point::new(4.5, 3.0, 0.5), -Vector::y(), 10.0)
        .collect();
    downward.sort();
    assert_eq!(downward, vec![2]);
}
