use crate::math::Real;
use crate::mesh::DynamicMesh;
use crate::utils::hashmap::HashSet;
use crate::utils::SortedPair;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Splits the edges of `mesh` at their midpoint until no edge is longer than
/// `target_edge_length`.
///
/// The longest edges are split first. Vertices are never moved, and an edge of length `l` always
/// ends up split into the same `2^k` segments, so two patches sharing a boundary edge refine it
/// identically. Returns the number of splits.
pub fn split_long_edges(mesh: &mut DynamicMesh, target_edge_length: Real) -> usize {
    assert!(target_edge_length > 0.0, "The target edge length must be positive.");

    let sq_target = target_edge_length * target_edge_length;
    let mut queue = BinaryHeap::new();
    let mut seen = HashSet::default();

    for tid in mesh.triangle_ids() {
        let tri = mesh.triangle(tid);
        for k in 0..3 {
            let edge = SortedPair::new(tri[k], tri[(k + 1) % 3]);
            if seen.insert(edge) {
                let [a, b] = *edge;
                let sq_len = (mesh.vertex(b) - mesh.vertex(a)).norm_squared();
                if sq_len > sq_target {
                    queue.push((OrderedFloat(sq_len), a, b));
                }
            }
        }
    }

    let mut num_splits = 0;

    while let Some((_, a, b)) = queue.pop() {
        if mesh.edge_triangles(a, b).is_none() {
            continue;
        }

        let Ok(mid) = mesh.split_edge(a, b, 0.5) else {
            continue;
        };
        num_splits += 1;

        let mid_pt = mesh.vertex(mid);
        for tid in mesh.vertex_triangles(mid) {
            for vid in mesh.triangle(*tid) {
                if vid == mid {
                    continue;
                }

                let sq_len = (mesh.vertex(vid) - mid_pt).norm_squared();
                if sq_len > sq_target {
                    let [a, b] = *SortedPair::new(vid, mid);
                    queue.push((OrderedFloat(sq_len), a, b));
                }
            }
        }
    }

    num_splits
}
