use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Point, Real, Vector};

/// A pair of tree nodes.
///
/// Both `left` and `right` are valid except when the tree contains only a single leaf, in which
/// case only `left` is valid.
#[derive(Copy, Clone, Debug)]
pub(super) struct BvhNodeWide {
    pub(super) left: BvhNode,
    pub(super) right: BvhNode,
}

impl BvhNodeWide {
    #[inline(always)]
    pub(super) fn zeros() -> Self {
        Self {
            left: BvhNode::zeros(),
            right: BvhNode::zeros(),
        }
    }
}

/// The node (internal or leaf) of a BVH.
#[derive(Copy, Clone, Debug)]
pub struct BvhNode {
    /// Mins coordinates of the node’s bounding volume.
    pub(super) mins: Point<Real>,
    /// Index of the children pair of this node, or the leaf data if this is a leaf.
    pub(super) children: u32,
    /// Maxs coordinates of this node’s bounding volume.
    pub(super) maxs: Point<Real>,
    /// Number of leaves in the subtree rooted at this node.
    pub(super) leaf_count: u32,
}

impl BvhNode {
    #[inline(always)]
    pub(super) fn zeros() -> Self {
        Self {
            mins: Point::origin(),
            children: 0,
            maxs: Point::origin(),
            leaf_count: 0,
        }
    }

    /// Initializes a leaf.
    #[inline(always)]
    pub fn leaf(aabb: Aabb, leaf_data: u32) -> BvhNode {
        Self {
            mins: aabb.mins,
            maxs: aabb.maxs,
            children: leaf_data,
            leaf_count: 1,
        }
    }

    /// If this node is a leaf, returns its associated index provided at construction time.
    #[inline(always)]
    pub fn leaf_data(&self) -> Option<u32> {
        self.is_leaf().then_some(self.children)
    }

    /// Is this node a leaf?
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.leaf_count == 1
    }

    #[inline(always)]
    pub(super) fn merged(&self, other: &Self, children: u32) -> Self {
        Self {
            mins: self.mins.inf(&other.mins),
            children,
            maxs: self.maxs.sup(&other.maxs),
            leaf_count: self.leaf_count + other.leaf_count,
        }
    }

    /// The AABB of this node.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.mins, self.maxs)
    }

    /// The center of this node’s AABB.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// Does the AABB of this node intersect the AABB of `other`?
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    /// Does the AABB of this node intersect `aabb`?
    #[inline]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.aabb().intersects(aabb)
    }

    /// Does the segment from `origin` to `origin + dir * max_toi` hit the AABB of this node?
    ///
    /// `inv_dir` is the component-wise inverse of `dir`.
    pub fn intersects_ray(
        &self,
        origin: &Point<Real>,
        inv_dir: &Vector<Real>,
        max_toi: Real,
    ) -> bool {
        let mut tmin: Real = 0.0;
        let mut tmax = max_toi;

        for i in 0..3 {
            let t1 = (self.mins[i] - origin[i]) * inv_dir[i];
            let t2 = (self.maxs[i] - origin[i]) * inv_dir[i];
            // NaN appears when the ray is parallel to, and on, a slab boundary.
            let (near, far) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            if !near.is_nan() {
                tmin = tmin.max(near);
            }
            if !far.is_nan() {
                tmax = tmax.min(far);
            }
        }

        tmin <= tmax
    }
}

/// A static Bounding Volume Hierarchy over a set of AABBs, typically the triangles of a mesh.
///
/// Used to find candidate triangle pairs between two meshes, or within a single mesh, without
/// testing every pair.
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    pub(super) nodes: Vec<BvhNodeWide>,
}

impl Bvh {
    /// An empty BVH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new BVH with a slice of AABBs.
    ///
    /// Each leaf will be associated an index equal to its position into the slice.
    pub fn from_leaves(leaves: &[Aabb]) -> Self {
        Self::from_iter(leaves.iter().copied().enumerate())
    }

    /// Creates a new BVH with leaves given by an iterator of leaf indices and AABBs.
    #[allow(clippy::should_implement_trait)]
    pub fn from_iter<It>(leaves: It) -> Self
    where
        It: IntoIterator<Item = (usize, Aabb)>,
    {
        let mut leaves: Vec<_> = leaves
            .into_iter()
            .map(|(id, aabb)| BvhNode::leaf(aabb, id as u32))
            .collect();
        let mut result = Self::new();

        match leaves.len() {
            0 => {}
            1 => result.nodes.push(BvhNodeWide {
                left: leaves[0],
                right: BvhNode::zeros(),
            }),
            2 => result.nodes.push(BvhNodeWide {
                left: leaves[0],
                right: leaves[1],
            }),
            _ => {
                result.nodes.reserve(leaves.len());
                result.nodes.push(BvhNodeWide::zeros());
                result.rebuild_range_binned(0, &mut leaves);
            }
        }

        result
    }

    /// The AABB bounding everything contained by this BVH.
    pub fn root_aabb(&self) -> Aabb {
        match self.leaf_count() {
            0 => Aabb::new_invalid(),
            1 => self.nodes[0].left.aabb(),
            _ => self.nodes[0]
                .left
                .aabb()
                .merged(&self.nodes[0].right.aabb()),
        }
    }

    /// Does this tree not contain any leaf?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The number of leaves of this tree.
    pub fn leaf_count(&self) -> u32 {
        self.nodes
            .first()
            .map(|root| root.left.leaf_count + root.right.leaf_count)
            .unwrap_or(0)
    }
}
