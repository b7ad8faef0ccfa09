use super::{Bvh, BvhNode};
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use smallvec::SmallVec;

const TRAVERSAL_STACK_SIZE: usize = 32;

impl Bvh {
    /// Iterates through all the leaves with an AABB intersecting the given `aabb`.
    pub fn intersect_aabb<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = u32> + 'a {
        self.leaves(move |node| node.intersects_aabb(aabb))
    }

    /// Iterates through all the leaves with an AABB hit by the segment from `origin` to
    /// `origin + dir * max_toi`.
    pub fn intersect_ray(
        &self,
        origin: Point<Real>,
        dir: Vector<Real>,
        max_toi: Real,
    ) -> impl Iterator<Item = u32> + '_ {
        let inv_dir = dir.map(|d| 1.0 / d);
        self.leaves(move |node| node.intersects_ray(&origin, &inv_dir, max_toi))
    }

    /// Iterates through the leaves reached by a depth-first traversal that only enters nodes
    /// passing `check`.
    pub fn leaves<'a>(
        &'a self,
        check: impl Fn(&BvhNode) -> bool + 'a,
    ) -> impl Iterator<Item = u32> + 'a {
        let mut stack: SmallVec<[&'a BvhNode; TRAVERSAL_STACK_SIZE]> = SmallVec::new();

        if let Some(root) = self.nodes.first() {
            if root.left.leaf_count > 0 {
                stack.push(&root.left);
            }
            if root.right.leaf_count > 0 {
                stack.push(&root.right);
            }
        }

        core::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                if !check(node) {
                    continue;
                }

                if node.is_leaf() {
                    return Some(node.children);
                }

                let children = &self.nodes[node.children as usize];
                stack.push(&children.left);
                stack.push(&children.right);
            }

            None
        })
    }

    /// Performs a simultaneous traversal of the BVHs `self` and `other`, and yields the pairs
    /// of leaves it reached.
    ///
    /// Any node pairs failing the given `check` will be excluded from the traversal.
    pub fn leaf_pairs<'a, F: Fn(&BvhNode, &BvhNode) -> bool>(
        &'a self,
        other: &'a Self,
        check: F,
    ) -> LeafPairs<'a, F> {
        let mut stack = SmallVec::default();

        if let (Some(root1), Some(root2)) = (self.nodes.first(), other.nodes.first()) {
            for node1 in [&root1.left, &root1.right] {
                for node2 in [&root2.left, &root2.right] {
                    if node1.leaf_count > 0 && node2.leaf_count > 0 && check(node1, node2) {
                        stack.push((node1, node2));
                    }
                }
            }
        }

        LeafPairs {
            tree1: self,
            tree2: other,
            stack,
            check,
        }
    }

    /// Calls `f` on every pair of distinct leaves of this tree with intersecting AABBs.
    ///
    /// Each unordered pair is reported once.
    pub fn self_leaf_pairs(&self, f: &mut impl FnMut(u32, u32)) {
        let Some(root) = self.nodes.first() else {
            return;
        };

        if root.right.leaf_count == 0 {
            // A single leaf can’t overlap with anything.
            return;
        }

        self.self_intersect_node(&root.left, f);
        self.self_intersect_node(&root.right, f);
        self.intersect_two_branches(&root.left, &root.right, f);
    }

    fn self_intersect_node(&self, node: &BvhNode, f: &mut impl FnMut(u32, u32)) {
        if node.is_leaf() {
            return;
        }

        let children = &self.nodes[node.children as usize];
        self.self_intersect_node(&children.left, f);
        self.self_intersect_node(&children.right, f);
        self.intersect_two_branches(&children.left, &children.right, f);
    }

    fn intersect_two_branches(
        &self,
        node1: &BvhNode,
        node2: &BvhNode,
        f: &mut impl FnMut(u32, u32),
    ) {
        let mut stack: SmallVec<[(&BvhNode, &BvhNode); TRAVERSAL_STACK_SIZE]> = SmallVec::new();
        stack.push((node1, node2));

        while let Some((a, b)) = stack.pop() {
            if !a.intersects(b) {
                continue;
            }

            match (a.is_leaf(), b.is_leaf()) {
                (true, true) => f(a.children, b.children),
                (true, false) => {
                    let child = &self.nodes[b.children as usize];
                    stack.push((a, &child.left));
                    stack.push((a, &child.right));
                }
                (false, true) => {
                    let child = &self.nodes[a.children as usize];
                    stack.push((&child.left, b));
                    stack.push((&child.right, b));
                }
                (false, false) => {
                    let child1 = &self.nodes[a.children as usize];
                    let child2 = &self.nodes[b.children as usize];
                    stack.push((&child1.left, &child2.left));
                    stack.push((&child1.left, &child2.right));
                    stack.push((&child1.right, &child2.left));
                    stack.push((&child1.right, &child2.right));
                }
            }
        }
    }
}

/// Iterator over the pairs of leaves of two BVHs with intersecting AABBs.
///
/// Created by [`Bvh::leaf_pairs`].
pub struct LeafPairs<'a, Check: Fn(&BvhNode, &BvhNode) -> bool> {
    tree1: &'a Bvh,
    tree2: &'a Bvh,
    stack: SmallVec<[(&'a BvhNode, &'a BvhNode); TRAVERSAL_STACK_SIZE]>,
    check: Check,
}

impl<'a, Check: Fn(&BvhNode, &BvhNode) -> bool> Iterator for LeafPairs<'a, Check> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node1, node2)) = self.stack.pop() {
            match (node1.is_leaf(), node2.is_leaf()) {
                (true, true) => return Some((node1.children, node2.children)),
                (true, false) => {
                    let child2 = &self.tree2.nodes[node2.children as usize];
                    for sub2 in [&child2.left, &child2.right] {
                        if (self.check)(node1, sub2) {
                            self.stack.push((node1, sub2));
                        }
                    }
                }
                (false, true) => {
                    let child1 = &self.tree1.nodes[node1.children as usize];
                    for sub1 in [&child1.left, &child1.right] {
                        if (self.check)(sub1, node2) {
                            self.stack.push((sub1, node2));
                        }
                    }
                }
                (false, false) => {
                    let child1 = &self.tree1.nodes[node1.children as usize];
                    let child2 = &self.tree2.nodes[node2.children as usize];
                    for sub1 in [&child1.left, &child1.right] {
                        for sub2 in [&child2.left, &child2.right] {
                            if (self.check)(sub1, sub2) {
                                self.stack.push((sub1, sub2));
                            }
                        }
                    }
                }
            }
        }

        None
    }
}
