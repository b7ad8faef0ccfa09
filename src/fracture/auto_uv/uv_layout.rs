use super::{check_uv_channel, global_vertices, set_active_triangles, UseMaterials};
use crate::collection::GeometryCollection;
use crate::fracture::FractureError;
use crate::math::{Point, Point2, Real, Vector, Vector2, SMALL_NUMBER, ZERO_TOLERANCE};
use crate::utils::hashmap::HashMap;
use crate::utils::{orthonormal_basis, DisjointSet};

// Padding and layout extent depend on each other: a few passes are enough for them to agree.
const PACKING_PASSES: usize = 3;

/// A set of faces connected through shared vertices, and the vertices they use.
#[derive(Clone, Debug, Default)]
struct Island {
    faces: Vec<usize>,
    vertices: Vec<usize>,
}

/// Lays out the UV islands of the selected faces of `collection` in the unit square of the UV
/// channel `target_uv_channel`.
///
/// Islands are groups of selected faces connected through shared vertices. Each island is scaled
/// so that every island has the same ratio of UV area to area in the frame of the collection
/// root, then islands are placed on shelves, without rotation, and the whole layout is scaled to
/// fit the unit square. Islands are kept about `gutter_size` texels apart on a texture of
/// `resolution` texels.
///
/// With `recreate_degenerate_islands`, islands whose UVs have no area are first given UVs from a
/// projection on the plane orthogonal to their average normal.
pub fn uv_layout(
    target_uv_channel: usize,
    collection: &mut GeometryCollection,
    resolution: usize,
    gutter_size: Real,
    pattern: UseMaterials,
    listed_materials: &[i32],
    recreate_degenerate_islands: bool,
) -> Result<(), FractureError> {
    check_uv_channel(collection, target_uv_channel)?;

    let (active, num_active) = set_active_triangles(collection, true, pattern, listed_materials);
    if num_active == 0 {
        return Ok(());
    }

    let positions = global_vertices(collection);
    let islands = find_islands(&collection.indices, &active, positions.len());
    let indices = &collection.indices;
    let uvs = &mut collection.uvs[target_uv_channel];

    if recreate_degenerate_islands {
        for island in &islands {
            if uv_area(island, indices, uvs) < ZERO_TOLERANCE {
                project_on_average_plane(island, indices, &positions, uvs);
            }
        }
    }

    let texture_resolution = resolution.max(1) as Real / gutter_size.max(1.0);
    pack_islands(&islands, indices, &positions, uvs, texture_resolution);
    Ok(())
}

fn find_islands(indices: &[[u32; 3]], active: &[bool], num_vertices: usize) -> Vec<Island> {
    let mut sets = DisjointSet::new(num_vertices);
    let active_faces = move || {
        indices
            .iter()
            .enumerate()
            .filter(move |(fid, _)| active[*fid])
    };

    for (_, tri) in active_faces() {
        sets.union(tri[0] as usize, tri[1] as usize);
        sets.union(tri[0] as usize, tri[2] as usize);
    }

    let mut island_of_root: HashMap<usize, usize> = HashMap::default();
    let mut islands: Vec<Island> = vec![];
    let mut in_island = vec![false; num_vertices];

    for (fid, tri) in active_faces() {
        let root = sets.find(tri[0] as usize);
        let island_id = *island_of_root.entry(root).or_insert_with(|| {
            islands.push(Island::default());
            islands.len() - 1
        });

        let island = &mut islands[island_id];
        island.faces.push(fid);
        for vid in tri.map(|v| v as usize) {
            if !in_island[vid] {
                in_island[vid] = true;
                island.vertices.push(vid);
            }
        }
    }

    islands
}

fn uv_area(island: &Island, indices: &[[u32; 3]], uvs: &[Point2<Real>]) -> Real {
    island
        .faces
        .iter()
        .map(|fid| {
            let [a, b, c] = indices[*fid].map(|v| uvs[v as usize]);
            (b - a).perp(&(c - a)).abs() * 0.5
        })
        .sum()
}

fn world_area(island: &Island, indices: &[[u32; 3]], positions: &[Point<Real>]) -> Real {
    island
        .faces
        .iter()
        .map(|fid| {
            let [a, b, c] = indices[*fid].map(|v| positions[v as usize]);
            (b - a).cross(&(c - a)).norm() * 0.5
        })
        .sum()
}

fn project_on_average_plane(
    island: &Island,
    indices: &[[u32; 3]],
    positions: &[Point<Real>],
    uvs: &mut [Point2<Real>],
) {
    let weighted_normal = island
        .faces
        .iter()
        .map(|fid| {
            let [a, b, c] = indices[*fid].map(|v| positions[v as usize]);
            (b - a).cross(&(c - a))
        })
        .fold(Vector::zeros(), |acc, n| acc + n);

    let Some(normal) = weighted_normal.try_normalize(SMALL_NUMBER) else {
        return;
    };
    let [u, v] = orthonormal_basis(&normal);
    let origin = positions[island.vertices[0]];

    for vid in &island.vertices {
        let dpt = positions[*vid] - origin;
        uvs[*vid] = Point2::new(dpt.dot(&u), dpt.dot(&v));
    }
}

fn pack_islands(
    islands: &[Island],
    indices: &[[u32; 3]],
    positions: &[Point<Real>],
    uvs: &mut [Point2<Real>],
    texture_resolution: Real,
) {
    let mut scales = Vec::with_capacity(islands.len());
    let mut mins = Vec::with_capacity(islands.len());
    let mut sizes = Vec::with_capacity(islands.len());

    for island in islands {
        let island_uv_area = uv_area(island, indices, uvs);
        let island_world_area = world_area(island, indices, positions);
        let scale = if island_uv_area > SMALL_NUMBER && island_world_area > SMALL_NUMBER {
            (island_world_area / island_uv_area).sqrt()
        } else {
            1.0
        };

        let mut min = Point2::new(Real::MAX, Real::MAX);
        let mut max = Point2::new(-Real::MAX, -Real::MAX);
        for vid in &island.vertices {
            let uv = uvs[*vid] * scale;
            min = min.inf(&uv);
            max = max.sup(&uv);
        }

        scales.push(scale);
        mins.push(min);
        sizes.push(max - min);
    }

    let total_area: Real = sizes.iter().map(|s| s.x * s.y).sum();
    let mut extent = total_area.sqrt().max(SMALL_NUMBER);
    let mut offsets = vec![];
    for _ in 0..PACKING_PASSES {
        let padding = extent / texture_resolution;
        (offsets, extent) = shelf_pack(&sizes, padding);
    }

    for (k, island) in islands.iter().enumerate() {
        for vid in &island.vertices {
            let uv = uvs[*vid] * scales[k] - mins[k] + offsets[k];
            uvs[*vid] = Point2::from(uv / extent);
        }
    }
}

/// Places rectangles of the given `sizes` on horizontal shelves, tallest first, with `padding`
/// around each of them.
///
/// Returns the position of the lower corner of each rectangle, and the side of a square
/// containing all of them.
fn shelf_pack(sizes: &[Vector2<Real>], padding: Real) -> (Vec<Vector2<Real>>, Real) {
    let padded_area: Real = sizes
        .iter()
        .map(|s| (s.x + padding) * (s.y + padding))
        .sum();
    let widest = sizes.iter().map(|s| s.x).fold(0.0, Real::max);
    let shelf_width = padded_area.sqrt().max(widest + padding * 2.0);

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|a, b| sizes[*b].y.total_cmp(&sizes[*a].y));

    let mut offsets = vec![Vector2::zeros(); sizes.len()];
    let (mut x, mut y) = (padding, padding);
    let mut shelf_height: Real = 0.0;
    let mut width: Real = 0.0;

    for k in order {
        let size = sizes[k];
        if x > padding && x + size.x + padding > shelf_width {
            y += shelf_height + padding;
            x = padding;
            shelf_height = 0.0;
        }

        offsets[k] = Vector2::new(x, y);
        x += size.x + padding;
        shelf_height = shelf_height.max(size.y);
        width = width.max(x);
    }

    let height = y + shelf_height + padding;
    (offsets, width.max(height).max(SMALL_NUMBER))
}

#[cfg(test)]
mod test {
    use super::{find_islands, shelf_pack};
    use crate::math::{Real, Vector2};

    #[test]
    fn islands_follow_shared_vertices() {
        // Two quads, the second one only partially active.
        let indices = [[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]];
        let islands = find_islands(&indices, &[true, true, false, true], 8);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].faces, vec![0, 1]);
        assert_eq!(islands[0].vertices, vec![0, 1, 2, 3]);
        assert_eq!(islands[1].faces, vec![3]);
        assert_eq!(islands[1].vertices, vec![4, 6, 7]);
    }

    #[test]
    fn shelves_do_not_overlap() {
        let sizes = [
            Vector2::new(1.0, 2.0),
            Vector2::new(0.5, 0.5),
            Vector2::new(2.0, 1.0),
            Vector2::new(0.3, 1.5),
            Vector2::new(1.0, 1.0),
        ];
        let padding = 0.05;
        let (offsets, extent) = shelf_pack(&sizes, padding);

        let rect = |k: usize| (offsets[k], offsets[k] + sizes[k]);
        for i in 0..sizes.len() {
            let (min, max) = rect(i);
            assert!(min.x >= padding - 1.0e-12 && min.y >= padding - 1.0e-12);
            assert!(max.x <= extent - padding + 1.0e-12);
            assert!(max.y <= extent - padding + 1.0e-12);

            for j in 0..i {
                let (other_min, other_max) = rect(j);
                let gap: Real = (other_min.x - max.x)
                    .max(min.x - other_max.x)
                    .max(other_min.y - max.y)
                    .max(min.y - other_max.y);
                assert!(gap >= padding - 1.0e-12, "{} and {} overlap", i, j);
            }
        }
    }
}
