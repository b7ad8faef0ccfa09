use super::bvh_tree::BvhNodeWide;
use super::{Bvh, BvhNode};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;

#[derive(Copy, Clone)]
struct BvhBin {
    aabb: Aabb,
    leaf_count: u32,
}

impl Default for BvhBin {
    fn default() -> Self {
        Self {
            aabb: Aabb::new_invalid(),
            leaf_count: 0,
        }
    }
}

impl Bvh {
    /// Builds the subtree rooted at `target_node_id` from `leaves`, with binned SAH splits.
    pub(super) fn rebuild_range_binned(&mut self, target_node_id: u32, leaves: &mut [BvhNode]) {
        const NUM_BINS: usize = 8;
        const BIN_EPSILON: Real = 1.0e-5;

        assert!(leaves.len() > 1);

        let centroid_aabb = Aabb::from_points(leaves.iter().map(|node| node.center()));
        let bins_axis = centroid_aabb.extents().imax();
        let bins_range = [centroid_aabb.mins[bins_axis], centroid_aabb.maxs[bins_axis]];
        let mut mid = leaves.len() / 2;

        if bins_range[1] > bins_range[0] {
            let mut bins = [BvhBin::default(); NUM_BINS];
            let k1 = NUM_BINS as Real * (1.0 - BIN_EPSILON) / (bins_range[1] - bins_range[0]);
            let k0 = bins_range[0];
            let bin_id = |node: &BvhNode| {
                ((k1 * (node.center()[bins_axis] - k0)) as usize).min(NUM_BINS - 1)
            };

            for leaf in &*leaves {
                let bin = &mut bins[bin_id(leaf)];
                bin.aabb.merge(&leaf.aabb());
                bin.leaf_count += 1;
            }

            // Select the best of the NUM_BINS - 1 splitting planes with the surface area heuristic.
            let mut right_merges = bins;
            let mut right_acc = bins[NUM_BINS - 1];

            for i in 1..NUM_BINS - 1 {
                right_acc.aabb.merge(&right_merges[NUM_BINS - 1 - i].aabb);
                right_acc.leaf_count += right_merges[NUM_BINS - 1 - i].leaf_count;
                right_merges[NUM_BINS - 1 - i] = right_acc;
            }

            let mut best_cost = Real::MAX;
            let mut best_plane = 0;
            let mut best_leaf_count = bins[0].leaf_count;
            let mut left_merge = bins[0];

            for i in 0..NUM_BINS - 1 {
                let right = &right_merges[i + 1];
                let cost = surface_cost(&left_merge) + surface_cost(right);

                if cost < best_cost {
                    best_cost = cost;
                    best_plane = i;
                    best_leaf_count = left_merge.leaf_count;
                }

                left_merge.aabb.merge(&bins[i + 1].aabb);
                left_merge.leaf_count += bins[i + 1].leaf_count;
            }

            if best_leaf_count != 0 && best_leaf_count as usize != leaves.len() {
                mid = best_leaf_count as usize;
                leaves.sort_by_key(|leaf| bin_id(leaf) > best_plane);
            }
        }

        let (left_leaves, right_leaves) = leaves.split_at_mut(mid);
        let left = self.build_child(left_leaves);
        let right = self.build_child(right_leaves);
        self.nodes[target_node_id as usize] = BvhNodeWide { left, right };
    }

    fn build_child(&mut self, leaves: &mut [BvhNode]) -> BvhNode {
        if leaves.len() == 1 {
            return leaves[0];
        }

        let child_id = self.nodes.len() as u32;
        self.nodes.push(BvhNodeWide::zeros());
        self.rebuild_range_binned(child_id, leaves);
        let wide = &self.nodes[child_id as usize];
        wide.left.merged(&wide.right, child_id)
    }
}

fn surface_cost(bin: &BvhBin) -> Real {
    if bin.leaf_count == 0 {
        return 0.0;
    }

    let extents = bin.aabb.extents();
    let half_area = extents.x * (extents.y + extents.z) + extents.y * extents.z;
    half_area * bin.leaf_count as Real
}
