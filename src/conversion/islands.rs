use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use crate::mesh::DynamicMesh;
use crate::transformation::winding_number;
use crate::utils::hashmap::HashMap;
use crate::utils::{DisjointSet, PointHashGrid};

/// Vertices closer than this are considered connected when splitting islands.
pub const ISLAND_SNAP_DISTANCE: Real = 1.0e-3;

/// Splits `mesh` into its connected components.
///
/// Vertices closer than [`ISLAND_SNAP_DISTANCE`] connect their triangles even if they are
/// distinct vertices, so unwelded cut pieces stay whole. Components enclosed by another
/// component (like the inner wall of a hollow piece) are merged back into the largest
/// enclosing component with a positive volume.
///
/// Returns `None` if `mesh` has a single component.
pub fn split_islands(mesh: &DynamicMesh) -> Option<Vec<DynamicMesh>> {
    let mut grid = PointHashGrid::new(ISLAND_SNAP_DISTANCE * 10.0);
    let mut components = DisjointSet::new(mesh.max_vertex_id() as usize);
    let mut neighbors = vec![];

    for vid in mesh.vertex_ids() {
        let pt = mesh.vertex(vid);
        neighbors.clear();
        grid.find_points_in_ball(&pt, ISLAND_SNAP_DISTANCE, &mut neighbors);
        for nbr in &neighbors {
            components.union(vid as usize, *nbr as usize);
        }
        grid.insert(vid, pt);
    }

    for tid in mesh.triangle_ids() {
        let [a, b, c] = mesh.triangle(tid);
        components.union(a as usize, b as usize);
        components.union(b as usize, c as usize);
    }

    let mut island_of_root: HashMap<usize, usize> = HashMap::default();
    let mut islands: Vec<Vec<u32>> = vec![];

    for tid in mesh.triangle_ids() {
        let root = components.find(mesh.triangle(tid)[0] as usize);
        let island = *island_of_root.entry(root).or_insert_with(|| {
            islands.push(vec![]);
            islands.len() - 1
        });
        islands[island].push(tid);
    }

    if islands.len() < 2 {
        return None;
    }

    let mut meshes: Vec<_> = islands
        .iter()
        .map(|tids| mesh.extract_triangles(tids))
        .collect();
    merge_nested_islands(&mut meshes);
    Some(meshes)
}

// Appends every island enclosed by another one to the largest enclosing island with a positive
// volume, and removes it from `islands`.
fn merge_nested_islands(islands: &mut Vec<DynamicMesh>) {
    let volumes: Vec<Real> = islands.iter().map(|m| m.signed_volume()).collect();
    let bounds: Vec<Aabb> = islands.iter().map(|m| m.bounds()).collect();
    let mut parents: Vec<Option<usize>> = vec![None; islands.len()];

    for (i, island) in islands.iter().enumerate() {
        let Some(sample) = island.positions().next() else {
            continue;
        };

        for j in 0..islands.len() {
            // A parent is always strictly larger than its children, so nesting has no cycle.
            if j == i
                || volumes[j] <= volumes[i].abs()
                || parents[i].is_some_and(|p| volumes[p] >= volumes[j])
                || !bounds[j].contains(&bounds[i])
            {
                continue;
            }

            if winding_number(&islands[j], &sample) > 0.5 {
                parents[i] = Some(j);
            }
        }
    }

    let root = |mut i: usize| {
        while let Some(p) = parents[i] {
            i = p;
        }
        i
    };

    for i in 0..islands.len() {
        if parents[i].is_some() {
            let inner = std::mem::take(&mut islands[i]);
            let _ = islands[root(i)].append_mesh(&inner, false);
        }
    }

    let mut i = 0;
    islands.retain(|_| {
        i += 1;
        parents[i - 1].is_none()
    });
}

#[cfg(test)]
mod test {
    use super::split_islands;
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;

    fn cube(mins: Point<f64>, size: f64) -> DynamicMesh {
        let mut mesh = DynamicMesh::from_aabb(&Aabb::new(mins, mins + Vector::repeat(size)));
        mesh.augment(1);
        mesh
    }

    #[test]
    fn single_component_is_not_split() {
        assert!(split_islands(&cube(Point::origin(), 1.0)).is_none());
        assert!(split_islands(&DynamicMesh::new()).is_none());
    }

    #[test]
    fn disjoint_cubes_are_split() {
        let mut mesh = cube(Point::origin(), 1.0);
        let _ = mesh.append_mesh(&cube(Point::new(2.0, 0.0, 0.0), 1.0), false);
        let _ = mesh.append_mesh(&cube(Point::new(4.0, 0.0, 0.0), 0.5), false);

        let islands = split_islands(&mesh).unwrap();
        assert_eq!(islands.len(), 3);
        for island in &islands {
            assert_eq!(island.triangle_count(), 12);
            assert!(island.is_closed());
            assert!(split_islands(island).is_none());
        }
    }

    #[test]
    fn touching_cubes_stay_together() {
        let mut mesh = cube(Point::origin(), 1.0);
        let _ = mesh.append_mesh(&cube(Point::new(1.0, 0.0, 0.0), 1.0), false);
        assert!(split_islands(&mesh).is_none());
    }

    #[test]
    fn cavities_stay_in_their_shell() {
        let mut mesh = cube(Point::origin(), 3.0);
        let mut cavity = cube(Point::new(1.0, 1.0, 1.0), 1.0);
        cavity.reverse_orientation(true);
        let _ = mesh.append_mesh(&cavity, false);
        let _ = mesh.append_mesh(&cube(Point::new(5.0, 0.0, 0.0), 1.0), false);

        let islands = split_islands(&mesh).unwrap();
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].triangle_count(), 24);
        assert_relative_eq!(islands[0].signed_volume(), 26.0, epsilon = 1.0e-9);
        assert_relative_eq!(islands[1].signed_volume(), 1.0, epsilon = 1.0e-9);
    }
}
