//! Closes small holes left on the boundary of cut pieces.
//!
//! Boundary vertices are matched within a small tolerance, so holes are found even if the
//! mesh is not welded along them. Each hole is filled by a triangulated patch attached to the
//! connected component whose adjacent triangles best face the hole, using the material of one of
//! its boundary triangles. Holes only bordered by outside (even) materials are left open: they are
//! more likely to be open boundaries than holes.

use super::{DynamicMesh, MeshError, VertexInfo};
use crate::math::{Real, Vector, KINDA_SMALL_NUMBER};
use crate::transformation::triangulate_simple_polygon;
use crate::utils::hashmap::{HashMap, HashSet};
use crate::utils::{DisjointSet, PointHashGrid, SortedPair};
use na::{Point2, Unit, UnitQuaternion};
use smallvec::SmallVec;

const SNAP_DISTANCE: Real = 1.0e-3;
const FOLDED_NORMAL_THRESHOLD: Real = -0.5;

/// Parameters of [`fill_holes`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct FillHolesOptions {
    /// Holes with a smaller triangulated area are left open.
    pub min_hole_area: Real,
}

impl Default for FillHolesOptions {
    fn default() -> Self {
        Self {
            min_hole_area: KINDA_SMALL_NUMBER,
        }
    }
}

// A boundary edge between two canonical vertices, remembering the actual mesh edge (oriented like
// its triangle) it comes from.
#[derive(Copy, Clone, Debug)]
struct OpenEdge {
    end: u32,
    edge: [u32; 2],
}

// Directed open edges, keyed by their canonical start vertex, and visited in insertion order.
#[derive(Default)]
struct OpenEdges {
    edges: Vec<(u32, OpenEdge)>,
    alive: Vec<bool>,
    by_start: HashMap<u32, SmallVec<[usize; 2]>>,
    num_alive: usize,
    cursor: usize,
}

impl OpenEdges {
    fn len(&self) -> usize {
        self.num_alive
    }

    fn add(&mut self, start: u32, end: u32, edge: [u32; 2]) {
        if start == end || self.remove(end, start) {
            return;
        }

        let id = self.edges.len();
        self.edges.push((start, OpenEdge { end, edge }));
        self.alive.push(true);
        self.by_start.entry(start).or_default().push(id);
        self.num_alive += 1;
    }

    fn remove(&mut self, start: u32, end: u32) -> bool {
        let Some(ids) = self.by_start.get_mut(&start) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|id| self.edges[*id].1.end == end) else {
            return false;
        };

        let id = ids.remove(pos);
        self.alive[id] = false;
        self.num_alive -= 1;
        true
    }

    fn first_from(&self, start: u32) -> Option<OpenEdge> {
        let ids = self.by_start.get(&start)?;
        ids.first().map(|id| self.edges[*id].1)
    }

    fn pop_first(&mut self) -> Option<(u32, OpenEdge)> {
        while self.cursor < self.edges.len() && !self.alive[self.cursor] {
            self.cursor += 1;
        }

        let (start, edge) = *self.edges.get(self.cursor)?;
        let _ = self.remove(start, edge.end);
        Some((start, edge))
    }
}

// A closed loop of canonical vertices. `edges[i]` is the mesh edge from `vertices[i]` to
// `vertices[i + 1]`.
struct HoleLoop {
    vertices: Vec<u32>,
    edges: Vec<[u32; 2]>,
}

fn walk_hole_loops(mut open: OpenEdges) -> Vec<HoleLoop> {
    let mut loops = vec![];

    while let Some((start, first)) = open.pop_first() {
        let mut vertices = vec![start];
        let mut edges = vec![first.edge];
        let mut walk = first.end;
        let mut dead_end = false;

        while walk != start {
            vertices.push(walk);
            let Some(next) = open.first_from(walk) else {
                dead_end = true;
                break;
            };

            edges.push(next.edge);
            let _ = open.remove(walk, next.end);
            walk = next.end;
        }

        if !dead_end && vertices.len() >= 3 {
            loops.push(HoleLoop { vertices, edges });
        }
    }

    loops
}

/// Fills the holes of `mesh` touching the given boundary edges.
///
/// Only the `candidate_edges` that are still boundary edges of `mesh` are considered. Returns the
/// number of holes filled.
pub fn fill_holes(
    mesh: &mut DynamicMesh,
    candidate_edges: &[[u32; 2]],
    options: &FillHolesOptions,
) -> usize {
    assert!(mesh.is_augmented(), "The mesh must be augmented.");

    // Keep the candidate boundary edges, oriented like their triangle.
    let mut seen = HashSet::default();
    let mut boundary = vec![];
    for [a, b] in candidate_edges {
        if seen.insert(SortedPair::new(*a, *b)) {
            if let Some(edge) = oriented_boundary_edge(mesh, *a, *b) {
                boundary.push(edge);
            }
        }
    }

    // Snap coincident boundary vertices to a canonical vertex.
    let mut grid = PointHashGrid::new(SNAP_DISTANCE * 10.0);
    let mut canonical: HashMap<u32, u32> = HashMap::default();
    let mut hashed = HashSet::default();

    for vid in boundary.iter().flatten() {
        if !hashed.insert(*vid) {
            continue;
        }

        let pos = mesh.vertex(*vid);
        if let Some((nearest, _)) = grid.find_nearest_in_radius(&pos, SNAP_DISTANCE, |_| false) {
            let target = canonical.get(&nearest).copied().unwrap_or(nearest);
            let _ = canonical.insert(*vid, target);
        }
        grid.insert(*vid, pos);
    }

    let canonical_vid = |vid: u32| canonical.get(&vid).copied().unwrap_or(vid);
    let mut open = OpenEdges::default();
    for edge in &boundary {
        open.add(canonical_vid(edge[0]), canonical_vid(edge[1]), *edge);
    }

    if open.len() < 3 {
        return 0;
    }

    let holes = walk_hole_loops(open);
    if holes.is_empty() {
        return 0;
    }

    let mut components = DisjointSet::new(mesh.max_vertex_id() as usize);
    for tid in mesh.triangle_ids() {
        let [a, b, c] = mesh.triangle(tid);
        components.union(a as usize, b as usize);
        components.union(b as usize, c as usize);
    }

    let num_uvs = mesh.num_enabled_uv_channels();
    let mut num_filled = 0;

    for hole in &holes {
        let Some((component, normal)) = best_component(mesh, &mut components, hole) else {
            continue;
        };

        if fill_hole(mesh, &mut components, hole, component, &normal, num_uvs, options) {
            num_filled += 1;
        }
    }

    num_filled
}

fn oriented_boundary_edge(mesh: &DynamicMesh, a: u32, b: u32) -> Option<[u32; 2]> {
    if !mesh.is_boundary_edge(a, b) {
        return None;
    }

    let tid = mesh.edge_triangles(a, b)?[0]?;
    let tri = mesh.triangle(tid);
    let k = tri.iter().position(|v| *v == a)?;
    if tri[(k + 1) % 3] == b {
        Some([a, b])
    } else {
        Some([b, a])
    }
}

// Picks the connected component, among those adjacent to the hole through a non-outside
// triangle, whose average triangle normal best matches the hole normal.
fn best_component(
    mesh: &DynamicMesh,
    components: &mut DisjointSet,
    hole: &HoleLoop,
) -> Option<(usize, Vector<Real>)> {
    let n = hole.vertices.len();
    let origin = mesh.vertex(hole.vertices[0]);
    let mut hole_normal = Vector::zeros();
    let mut component_normals: Vec<(usize, Vector<Real>)> = vec![];

    for (last, idx) in (0..n).map(|i| ((i + n - 1) % n, i)) {
        if last != 0 && idx != 0 {
            let p0 = mesh.vertex(hole.vertices[last]);
            let p1 = mesh.vertex(hole.vertices[idx]);
            hole_normal += (p1 - p0).cross(&(p0 - origin));
        }

        let edge = hole.edges[last];
        let Some(tid) = mesh.edge_triangles(edge[0], edge[1]).and_then(|incident| incident[0])
        else {
            continue;
        };

        let material = mesh.material_id(tid);
        if material >= 0 && material % 2 == 0 {
            continue;
        }

        let component = components.find(edge[0] as usize);
        let normal = mesh
            .triangle_normal(tid)
            .map(|n| n.into_inner())
            .unwrap_or_else(Vector::zeros);

        match component_normals.iter_mut().find(|(c, _)| *c == component) {
            Some((_, acc)) => *acc += normal,
            None => component_normals.push((component, normal)),
        }
    }

    let hole_normal_dir = hole_normal.try_normalize(Real::EPSILON);
    let mut best: Option<(usize, Vector<Real>)> = None;
    let mut best_score = -2.0;

    for (component, acc) in component_normals {
        let dir = acc.try_normalize(Real::EPSILON);
        let score = match dir {
            Some(dir) => hole_normal_dir.map(|h| h.dot(&dir)).unwrap_or(0.0),
            None => -1.0,
        };

        if score > best_score {
            best_score = score;
            best = Some((component, dir.unwrap_or_else(Vector::zeros)));
        }
    }

    best.map(|(component, component_normal)| {
        (component, hole_normal_dir.unwrap_or(component_normal))
    })
}

fn fill_hole(
    mesh: &mut DynamicMesh,
    components: &mut DisjointSet,
    hole: &HoleLoop,
    component: usize,
    hole_normal: &Vector<Real>,
    num_uvs: usize,
    options: &FillHolesOptions,
) -> bool {
    let n = hole.vertices.len();
    let positions: Vec<_> = hole.vertices.iter().map(|vid| mesh.vertex(*vid)).collect();
    let triangles = triangulate_simple_polygon(&positions);

    let mut hole_area = 0.0;
    let mut last_normal = Vector::zeros();
    for tri in &triangles {
        let [a, b, c] = tri.map(|i| positions[i as usize]);
        let scaled_normal = (b - a).cross(&(c - a));
        let area = scaled_normal.norm() * 0.5;
        let normal = scaled_normal
            .try_normalize(0.0)
            .unwrap_or_else(Vector::zeros);
        hole_area += area;

        if last_normal.dot(&normal) < FOLDED_NORMAL_THRESHOLD {
            return false;
        }
        if area != 0.0 {
            last_normal = normal;
        }
    }

    if hole_area < options.min_hole_area {
        return false;
    }

    let is_attached = |mesh: &DynamicMesh, components: &mut DisjointSet, edge: [u32; 2]| {
        mesh.is_boundary_edge(edge[0], edge[1]) && components.find(edge[0] as usize) == component
    };

    let Some(reference) = hole
        .edges
        .iter()
        .copied()
        .find(|edge| is_attached(mesh, components, *edge))
    else {
        return false;
    };
    let Some(material) = mesh
        .edge_triangles(reference[0], reference[1])
        .and_then(|incident| incident[0])
        .map(|tid| mesh.material_id(tid))
    else {
        return false;
    };

    let uv_frames = uv_projection_frames(mesh, reference, hole_normal, num_uvs);
    let uv_origin = mesh.vertex(reference[0]);

    // Reuse the vertices of the boundary edges attached to the target component.
    let mut hole_vids = vec![u32::MAX; n];
    for (last, idx) in (0..n).map(|i| ((i + n - 1) % n, i)) {
        let edge = hole.edges[last];
        if is_attached(mesh, components, edge) {
            hole_vids[last] = edge[0];
            hole_vids[idx] = edge[1];
        }
    }

    let reference_info = mesh.vertex_info(reference[0]);
    let (tangent_u, tangent_v) = (reference_info.tangent_u, reference_info.tangent_v);
    let prev_max_vid = mesh.max_vertex_id();

    for (c, vid) in hole_vids.iter_mut().enumerate() {
        if *vid != u32::MAX {
            continue;
        }

        let pos = positions[c];
        let mut info = VertexInfo {
            color: reference_info.color,
            tangent_u,
            tangent_v,
            ..VertexInfo::with_normal(pos, *hole_normal)
        };
        let diff = pos - uv_origin;
        info.uvs = uv_frames
            .iter()
            .map(|(base, t, b)| base + na::Vector2::new(diff.dot(t), diff.dot(b)))
            .collect();
        *vid = mesh.append_vertex_info(&info);
    }

    for tri in &triangles {
        let [v0, v1, v2] = tri.map(|i| hole_vids[i as usize]);
        if v0 == v1 || v1 == v2 || v0 == v2 {
            continue;
        }

        let new_tid = match mesh.append_triangle([v0, v2, v1]) {
            Ok(tid) => tid,
            Err(MeshError::NonManifoldEdge(_)) => {
                let separated = [v0, v2, v1].map(|vid| {
                    if vid < prev_max_vid {
                        let mut info = mesh.vertex_info(vid);
                        info.normal = *hole_normal;
                        info.tangent_u = tangent_u;
                        info.tangent_v = tangent_v;
                        mesh.append_vertex_info(&info)
                    } else {
                        vid
                    }
                });

                match mesh.append_triangle(separated) {
                    Ok(tid) => tid,
                    Err(err) => {
                        log::debug!("Skipping a hole-filling triangle: {err}.");
                        continue;
                    }
                }
            }
            Err(err) => {
                log::debug!("Skipping a hole-filling triangle: {err}.");
                continue;
            }
        };

        mesh.set_material_id(new_tid, material);
        mesh.set_visibility(new_tid, true);
    }

    true
}

// Per UV channel: the UV at the reference vertex, and the two 3D axes mapping offsets from the
// reference vertex to UV offsets, so that the reference edge keeps its UV length and direction.
fn uv_projection_frames(
    mesh: &DynamicMesh,
    reference: [u32; 2],
    normal: &Vector<Real>,
    num_uvs: usize,
) -> Vec<(Point2<Real>, Vector<Real>, Vector<Real>)> {
    let edge = mesh.vertex(reference[1]) - mesh.vertex(reference[0]);
    let edge_len = edge.norm();
    let axis = Unit::try_new(*normal, 1.0e-12).unwrap_or_else(Vector::z_axis);

    (0..num_uvs)
        .map(|channel| {
            let uv_a = mesh.uv(reference[0], channel);
            let uv_edge = mesh.uv(reference[1], channel) - uv_a;

            if edge_len <= 1.0e-12 {
                return (uv_a, Vector::zeros(), Vector::zeros());
            }

            let scaled_dir = edge * (uv_edge.norm() / (edge_len * edge_len));
            let angle = uv_edge.y.atan2(uv_edge.x);
            let t = UnitQuaternion::from_axis_angle(&axis, -angle) * scaled_dir;
            let b = UnitQuaternion::from_axis_angle(&axis, core::f64::consts::FRAC_PI_2 - angle)
                * scaled_dir;
            (uv_a, t, b)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::{fill_holes, FillHolesOptions};
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;

    fn open_cube(material: i32) -> DynamicMesh {
        let mut cube =
            DynamicMesh::from_aabb(&Aabb::from_half_extents(Point::origin(), Vector::repeat(0.5)));
        cube.augment(1);
        for tid in 0..12 {
            cube.set_material_id(tid, material);
        }
        // Remove the top face.
        cube.remove_triangle(2, false).unwrap();
        cube.remove_triangle(3, false).unwrap();
        cube
    }

    #[test]
    fn fill_cube_top() {
        let mut cube = open_cube(1);
        let candidates = cube.boundary_edges();
        assert_eq!(candidates.len(), 4);

        assert_eq!(fill_holes(&mut cube, &candidates, &FillHolesOptions::default()), 1);
        assert!(cube.is_closed());
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.triangle_count(), 12);
        assert_relative_eq!(cube.signed_volume(), 1.0, epsilon = 1.0e-12);

        for tid in cube.triangle_ids() {
            assert_eq!(cube.material_id(tid), 1);
            assert!(cube.visibility(tid));
        }
    }

    #[test]
    fn outside_only_holes_stay_open() {
        let mut cube = open_cube(0);
        let candidates = cube.boundary_edges();
        assert_eq!(fill_holes(&mut cube, &candidates, &FillHolesOptions::default()), 0);
        assert!(!cube.is_closed());
    }

    #[test]
    fn tiny_holes_stay_open() {
        let mut cube = open_cube(1);
        let candidates = cube.boundary_edges();
        let options = FillHolesOptions { min_hole_area: 2.0 };
        assert_eq!(fill_holes(&mut cube, &candidates, &options), 0);
        assert_eq!(cube.triangle_count(), 10);
    }

    #[test]
    fn non_candidate_holes_are_ignored() {
        let mut cube = open_cube(1);
        assert_eq!(fill_holes(&mut cube, &[], &FillHolesOptions::default()), 0);
    }
}
