use super::{
    triangle_triangle_intersection, triangles_winding_number, MeshBooleanError,
    TriangleTriangleIntersection, EPS,
};
use crate::bounding_volume::BoundingVolume;
use crate::math::{Point, Real, Vector};
use crate::mesh::{DynamicMesh, MeshError, VertexInfo};
use crate::partitioning::Bvh;
use crate::utils::hashmap::HashMap;
use crate::utils::{to_spade_point, DisjointSet, PointHashGrid};
use na::Point2;
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Triangulation};

// Intersection points closer than this are merged.
const WELD_TOLERANCE: Real = EPS * 10.0;
// Barycentric snapping tolerance for points located on the edges of the triangle they split.
const BARY_SNAP: Real = 1.0e-9;
// Winding numbers closer than this to 0.5 are taken at points lying on the other surface.
const ON_SURFACE_WINDING: Real = 0.4;
// Distance from the surface of the points probing the two sides of a sub-triangle.
const SIDE_OFFSET: Real = WELD_TOLERANCE * 10.0;

/// A boolean operation between two closed meshes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BooleanOp {
    /// Keeps the volume covered by any of the two meshes.
    Union,
    /// Keeps the volume covered by both meshes.
    Intersect,
    /// Keeps the volume of the first mesh that isn’t covered by the second.
    Difference,
}

/// The result of [`mesh_boolean`].
#[derive(Clone, Debug, Default)]
pub struct MeshBooleanResult {
    /// The resulting mesh, with the attributes of the first operand.
    pub mesh: DynamicMesh,
    /// Boundary edges of `mesh` lying on the intersection curve between the operands.
    ///
    /// The surfaces coming from each operand are not welded together so these are the edges
    /// along which the result is open. They are oriented as in their triangle.
    pub created_boundary_edges: Vec<[u32; 2]>,
}

impl MeshBooleanResult {
    fn new(mesh: DynamicMesh) -> Self {
        Self {
            mesh,
            created_boundary_edges: vec![],
        }
    }
}

/// Computes the boolean operation `op` between the closed, outward-oriented meshes `a` and `b`.
///
/// The surface of each mesh is split along the intersection curve, then each piece of surface
/// is kept or discarded depending on its position relative to the other mesh (measured with the
/// generalized winding number). Surfaces of `a` and `b` lying on the same plane are kept only
/// once, from `a`.
///
/// The attributes of new vertices are interpolated from the triangle they split, and new
/// triangles keep the material and visibility of the triangle they come from. The result uses
/// the attribute layout of `a`.
pub fn mesh_boolean(
    a: &DynamicMesh,
    b: &DynamicMesh,
    op: BooleanOp,
) -> Result<MeshBooleanResult, MeshBooleanError> {
    if a.is_empty()
        || b.is_empty()
        || !a
            .bounds()
            .loosened(WELD_TOLERANCE)
            .intersects(&b.bounds().loosened(WELD_TOLERANCE))
    {
        let mesh = match op {
            BooleanOp::Intersect => a.empty_like(),
            BooleanOp::Difference => a.clone(),
            BooleanOp::Union if a.is_empty() => b.clone(),
            BooleanOp::Union => {
                let mut mesh = a.clone();
                let _ = mesh.append_mesh(b, false);
                mesh
            }
        };
        return Ok(MeshBooleanResult::new(mesh));
    }

    let (cuts_a, cuts_b) = collect_cuts(a, b);
    let split_a = SplitMesh::new(a, b, &cuts_a)?;
    let split_b = SplitMesh::new(b, a, &cuts_b)?;

    let triangles_a: Vec<_> = a.triangle_ids().map(|tid| a.triangle_points(tid)).collect();
    let triangles_b: Vec<_> = b.triangle_ids().map(|tid| b.triangle_points(tid)).collect();
    let side_a = split_a.classify(&triangles_b);
    let side_b = split_b.classify(&triangles_a);

    let mut result = a.empty_like();
    let mut on_cut = vec![];

    split_a.emit(a, &mut result, &mut on_cut, false, |k| match side_a[k] {
        Side::OnSurface { same_orientation } => match op {
            BooleanOp::Intersect | BooleanOp::Union => same_orientation,
            BooleanOp::Difference => !same_orientation,
        },
        Side::Inside => op == BooleanOp::Intersect,
        Side::Outside => op != BooleanOp::Intersect,
    })?;

    let flip_b = op == BooleanOp::Difference;
    split_b.emit(b, &mut result, &mut on_cut, flip_b, |k| match side_b[k] {
        Side::OnSurface { .. } => false,
        Side::Inside => op != BooleanOp::Union,
        Side::Outside => op == BooleanOp::Union,
    })?;

    let created_boundary_edges = result
        .boundary_edges()
        .into_iter()
        .filter(|e| on_cut[e[0] as usize] && on_cut[e[1] as usize])
        .collect();

    Ok(MeshBooleanResult {
        mesh: result,
        created_boundary_edges,
    })
}

#[derive(Clone, Debug, Default)]
struct TriangleCuts {
    segments: Vec<[Point<Real>; 2]>,
    // Triangles of the other mesh lying on the same plane.
    coplanar: Vec<u32>,
}

fn collect_cuts(
    a: &DynamicMesh,
    b: &DynamicMesh,
) -> (HashMap<u32, TriangleCuts>, HashMap<u32, TriangleCuts>) {
    let bvh_a = Bvh::from_iter(
        a.triangle_ids()
            .map(|tid| (tid as usize, a.triangle_aabb(tid).loosened(WELD_TOLERANCE))),
    );
    let bvh_b = Bvh::from_iter(
        b.triangle_ids()
            .map(|tid| (tid as usize, b.triangle_aabb(tid).loosened(WELD_TOLERANCE))),
    );

    let mut cuts_a: HashMap<u32, TriangleCuts> = HashMap::default();
    let mut cuts_b: HashMap<u32, TriangleCuts> = HashMap::default();

    for (ta, tb) in bvh_a.leaf_pairs(&bvh_b, |n1, n2| n1.intersects(n2)) {
        let tri_a = a.triangle_points(ta);
        let tri_b = b.triangle_points(tb);

        match triangle_triangle_intersection(&tri_a, a.triangle(ta), &tri_b, b.triangle(tb)) {
            Some(TriangleTriangleIntersection::Segment(seg)) => {
                cuts_a.entry(ta).or_default().segments.push(seg);
                cuts_b.entry(tb).or_default().segments.push(seg);
            }
            Some(TriangleTriangleIntersection::Coplanar) => {
                let entry_a = cuts_a.entry(ta).or_default();
                entry_a.coplanar.push(tb);
                for k in 0..3 {
                    if let Some(seg) = clip_segment(&tri_b[k], &tri_b[(k + 1) % 3], &tri_a) {
                        entry_a.segments.push(seg);
                    }
                }

                let entry_b = cuts_b.entry(tb).or_default();
                entry_b.coplanar.push(ta);
                for k in 0..3 {
                    if let Some(seg) = clip_segment(&tri_a[k], &tri_a[(k + 1) % 3], &tri_b) {
                        entry_b.segments.push(seg);
                    }
                }
            }
            None => {}
        }
    }

    (cuts_a, cuts_b)
}

/// The barycentric parametrization `p = origin + u * e1 + v * e2` of a triangle.
struct TriangleFrame {
    origin: Point<Real>,
    e1: Vector<Real>,
    e2: Vector<Real>,
    d11: Real,
    d12: Real,
    d22: Real,
    inv_denom: Real,
}

impl TriangleFrame {
    fn new(tri: &[Point<Real>; 3]) -> Option<Self> {
        let e1 = tri[1] - tri[0];
        let e2 = tri[2] - tri[0];
        let (d11, d12, d22) = (e1.norm_squared(), e1.dot(&e2), e2.norm_squared());
        let denom = d11 * d22 - d12 * d12;

        if denom <= Real::EPSILON * d11 * d22 {
            return None;
        }

        Some(Self {
            origin: tri[0],
            e1,
            e2,
            d11,
            d12,
            d22,
            inv_denom: 1.0 / denom,
        })
    }

    fn uv(&self, pt: &Point<Real>) -> Point2<Real> {
        let d = pt - self.origin;
        let (d1, d2) = (d.dot(&self.e1), d.dot(&self.e2));
        Point2::new(
            (self.d22 * d1 - self.d12 * d2) * self.inv_denom,
            (self.d11 * d2 - self.d12 * d1) * self.inv_denom,
        )
    }

    fn point(&self, uv: &Point2<Real>) -> Point<Real> {
        self.origin + self.e1 * uv.x + self.e2 * uv.y
    }
}

fn lerp_exact(a: &Point<Real>, b: &Point<Real>, t: Real) -> Point<Real> {
    if t <= 0.0 {
        *a
    } else if t >= 1.0 {
        *b
    } else {
        a + (b - a) * t
    }
}

// Cyrus-Beck clipping of the segment `[p, q]` by the triangle `tri`, in its own plane.
fn clip_segment(
    p: &Point<Real>,
    q: &Point<Real>,
    tri: &[Point<Real>; 3],
) -> Option<[Point<Real>; 2]> {
    let frame = TriangleFrame::new(tri)?;
    let (uv_p, uv_q) = (frame.uv(p), frame.uv(q));
    let half_planes = [
        (uv_p.x, uv_q.x),
        (uv_p.y, uv_q.y),
        (1.0 - uv_p.x - uv_p.y, 1.0 - uv_q.x - uv_q.y),
    ];

    let (mut t_in, mut t_out): (Real, Real) = (0.0, 1.0);
    for (f0, f1) in half_planes {
        if f0 < -BARY_SNAP && f1 < -BARY_SNAP {
            return None;
        }

        if f0 < 0.0 && f1 > 0.0 {
            t_in = t_in.max(f0 / (f0 - f1));
        } else if f0 > 0.0 && f1 < 0.0 {
            t_out = t_out.min(f0 / (f0 - f1));
        }
    }

    if (t_out - t_in) * na::distance(p, q) <= EPS {
        return None;
    }

    Some([lerp_exact(p, q, t_in), lerp_exact(p, q, t_out)])
}

#[derive(Copy, Clone, Debug)]
enum WeldedSource {
    Vertex(u32),
    Interpolated { tid: u32, bary: [Real; 3] },
}

// Position of a sub-triangle relative to the other mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Inside,
    Outside,
    OnSurface { same_orientation: bool },
}

// Locates the triangle `pts` relative to the closed surface made of `other_triangles`.
//
// Triangles lying on the other surface are recognized by probing both of their sides, which
// doesn't depend on how the two surfaces are triangulated.
fn locate(pts: &[Point<Real>; 3], other_triangles: &[[Point<Real>; 3]]) -> Side {
    let winding = |pt: &Point<Real>| triangles_winding_number(other_triangles.iter().copied(), pt);
    let centroid = Point::from((pts[0].coords + pts[1].coords + pts[2].coords) / 3.0);
    let w = winding(&centroid);

    let normal = (pts[1] - pts[0]).cross(&(pts[2] - pts[0])).try_normalize(Real::EPSILON);
    let Some(normal) = normal.filter(|_| (w - 0.5).abs() < ON_SURFACE_WINDING) else {
        return if w > 0.5 { Side::Inside } else { Side::Outside };
    };

    let front = winding(&(centroid + normal * SIDE_OFFSET)) > 0.5;
    let back = winding(&(centroid - normal * SIDE_OFFSET)) > 0.5;
    match (front, back) {
        (false, true) => Side::OnSurface {
            same_orientation: true,
        },
        (true, false) => Side::OnSurface {
            same_orientation: false,
        },
        (true, true) => Side::Inside,
        (false, false) => Side::Outside,
    }
}

#[derive(Copy, Clone, Debug)]
struct SubTriangle {
    vertices: [u32; 3],
    host: u32,
    // Connected group of uncut triangles this one belongs to.
    region: Option<u32>,
    // `Some(same_orientation)` if this lies on a triangle of the other mesh.
    coplanar: Option<bool>,
}

/// The surface of a mesh split along its intersection curve with another mesh.
struct SplitMesh {
    positions: Vec<Point<Real>>,
    sources: Vec<WeldedSource>,
    triangles: Vec<SubTriangle>,
    cut_vertices: Vec<bool>,
}

impl SplitMesh {
    fn new(
        mesh: &DynamicMesh,
        other: &DynamicMesh,
        cuts: &HashMap<u32, TriangleCuts>,
    ) -> Result<Self, MeshBooleanError> {
        let mut result = SplitMesh {
            positions: vec![],
            sources: vec![],
            triangles: vec![],
            cut_vertices: vec![],
        };
        let mut grid = PointHashGrid::new(WELD_TOLERANCE * 4.0);
        let mut vmap = vec![u32::MAX; mesh.max_vertex_id() as usize];

        for vid in mesh.vertex_ids() {
            let pt = mesh.vertex(vid);
            vmap[vid as usize] = result.push_vertex(pt, WeldedSource::Vertex(vid));
            grid.insert(vmap[vid as usize], pt);
        }

        let is_cut = |tid: u32| {
            cuts.get(&tid)
                .is_some_and(|c| !c.segments.is_empty() || !c.coplanar.is_empty())
        };
        let mut regions = DisjointSet::new(mesh.max_triangle_id() as usize);

        for tid in mesh.triangle_ids() {
            if is_cut(tid) {
                continue;
            }

            for k in 0..3 {
                if let Some(neighbor) = mesh.triangle_edge_neighbor(tid, k) {
                    if !is_cut(neighbor) {
                        regions.union(tid as usize, neighbor as usize);
                    }
                }
            }
        }

        for tid in mesh.triangle_ids() {
            match cuts.get(&tid) {
                Some(tri_cuts) if is_cut(tid) => {
                    result.split_triangle(mesh, other, tid, tri_cuts, &vmap, &mut grid)?
                }
                _ => result.triangles.push(SubTriangle {
                    vertices: mesh.triangle(tid).map(|vid| vmap[vid as usize]),
                    host: tid,
                    region: Some(regions.find(tid as usize) as u32),
                    coplanar: None,
                }),
            }
        }

        Ok(result)
    }

    fn push_vertex(&mut self, pt: Point<Real>, source: WeldedSource) -> u32 {
        self.positions.push(pt);
        self.sources.push(source);
        self.cut_vertices.push(false);
        self.positions.len() as u32 - 1
    }

    fn weld(
        &mut self,
        pt: Point<Real>,
        source: WeldedSource,
        grid: &mut PointHashGrid<u32>,
    ) -> u32 {
        if let Some((id, _)) = grid.find_nearest_in_radius(&pt, WELD_TOLERANCE, |_| false) {
            return id;
        }

        let id = self.push_vertex(pt, source);
        grid.insert(id, pt);
        id
    }

    fn split_triangle(
        &mut self,
        mesh: &DynamicMesh,
        other: &DynamicMesh,
        tid: u32,
        cuts: &TriangleCuts,
        vmap: &[u32],
        grid: &mut PointHashGrid<u32>,
    ) -> Result<(), MeshBooleanError> {
        let tri = mesh.triangle_points(tid);
        let corners = mesh.triangle(tid).map(|vid| vmap[vid as usize]);
        let Some(frame) = TriangleFrame::new(&tri) else {
            // Degenerate triangles are kept as-is.
            self.triangles.push(SubTriangle {
                vertices: corners,
                host: tid,
                region: None,
                coplanar: None,
            });
            return Ok(());
        };

        let mut cdt = ConstrainedDelaunayTriangulation::<spade::Point2<Real>>::new();
        let mut welded: Vec<Option<u32>> = vec![];
        let mut corner_handles = Vec::with_capacity(3);

        for (k, uv) in [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)]
            .iter()
            .enumerate()
        {
            let handle = cdt
                .insert(to_spade_point(uv))
                .map_err(|_| MeshBooleanError::TriangulationError(tid))?;
            set_welded(&mut welded, handle, corners[k]);
            corner_handles.push(handle);
        }

        for seg in &cuts.segments {
            let mut handles = [corner_handles[0]; 2];

            for (handle, pt) in handles.iter_mut().zip(seg.iter()) {
                let uv = snap_uv(frame.uv(pt));
                *handle = if let Some(k) = corner_index(&uv) {
                    corner_handles[k]
                } else {
                    let h = cdt
                        .insert(to_spade_point(&uv))
                        .map_err(|_| MeshBooleanError::TriangulationError(tid))?;
                    if welded.get(h.index()).copied().flatten().is_none() {
                        let source = WeldedSource::Interpolated {
                            tid,
                            bary: [1.0 - uv.x - uv.y, uv.x, uv.y],
                        };
                        let id = self.weld(*pt, source, grid);
                        set_welded(&mut welded, h, id);
                    }
                    h
                };
            }

            if handles[0] != handles[1] {
                let _ = cdt.add_constraint_and_split(handles[0], handles[1], |v| v);
            }
        }

        // Steiner points created where constraints cross.
        for vertex in cdt.vertices() {
            let h = vertex.fix();
            if welded.get(h.index()).copied().flatten().is_none() {
                let data = vertex.data();
                let uv = Point2::new(data.x, data.y);
                let source = WeldedSource::Interpolated {
                    tid,
                    bary: [1.0 - uv.x - uv.y, uv.x, uv.y],
                };
                let id = self.weld(frame.point(&uv), source, grid);
                set_welded(&mut welded, h, id);
            }
        }

        let welded_id = |h: FixedVertexHandle| welded[h.index()].unwrap_or(u32::MAX);

        for edge in cdt.undirected_edges() {
            if cdt.is_constraint_edge(edge.fix()) {
                for v in edge.vertices() {
                    let id = welded_id(v.fix());
                    self.cut_vertices[id as usize] = true;
                }
            }
        }

        for face in cdt.inner_faces() {
            let vertices = face.vertices().map(|v| welded_id(v.fix()));
            if vertices[0] == vertices[1]
                || vertices[1] == vertices[2]
                || vertices[2] == vertices[0]
            {
                continue;
            }

            let pts = vertices.map(|id| self.positions[id as usize]);
            let area_normal = (pts[1] - pts[0]).cross(&(pts[2] - pts[0]));
            if area_normal.norm_squared() <= EPS * EPS * EPS * EPS {
                continue;
            }

            let centroid = Point::from((pts[0].coords + pts[1].coords + pts[2].coords) / 3.0);
            let coplanar = cuts.coplanar.iter().find_map(|partner| {
                let partner_tri = other.triangle_points(*partner);
                let partner_frame = TriangleFrame::new(&partner_tri)?;
                let uv = partner_frame.uv(&centroid);
                let inside =
                    uv.x >= -BARY_SNAP && uv.y >= -BARY_SNAP && uv.x + uv.y <= 1.0 + BARY_SNAP;
                let on_plane = na::distance(&partner_frame.point(&uv), &centroid) <= WELD_TOLERANCE;
                let partner_normal =
                    (partner_tri[1] - partner_tri[0]).cross(&(partner_tri[2] - partner_tri[0]));
                (inside && on_plane).then(|| partner_normal.dot(&area_normal) > 0.0)
            });

            self.triangles.push(SubTriangle {
                vertices,
                host: tid,
                region: None,
                coplanar,
            });
        }

        Ok(())
    }

    // Locates each sub-triangle relative to the closed surface made of `other_triangles`.
    fn classify(&self, other_triangles: &[[Point<Real>; 3]]) -> Vec<Side> {
        let mut region_sides: HashMap<u32, Side> = HashMap::default();

        self.triangles
            .iter()
            .map(|sub| {
                if let Some(same_orientation) = sub.coplanar {
                    return Side::OnSurface { same_orientation };
                }

                let pts = sub.vertices.map(|id| self.positions[id as usize]);
                match sub.region {
                    Some(region) => *region_sides
                        .entry(region)
                        .or_insert_with(|| locate(&pts, other_triangles)),
                    None => locate(&pts, other_triangles),
                }
            })
            .collect()
    }

    // Appends to `result` the sub-triangles for which `keep` returns `true`.
    fn emit(
        &self,
        mesh: &DynamicMesh,
        result: &mut DynamicMesh,
        on_cut: &mut Vec<bool>,
        flip: bool,
        keep: impl Fn(usize) -> bool,
    ) -> Result<(), MeshBooleanError> {
        let mut result_ids = vec![u32::MAX; self.positions.len()];

        for (k, sub) in self.triangles.iter().enumerate() {
            if !keep(k) {
                continue;
            }

            let mut tri = sub.vertices.map(|id| {
                if result_ids[id as usize] == u32::MAX {
                    let mut info = self.vertex_info(mesh, id);
                    if flip {
                        info.normal = -info.normal;
                    }
                    let vid = result.append_vertex_info(&info);
                    if on_cut.len() <= vid as usize {
                        on_cut.resize(vid as usize + 1, false);
                    }
                    on_cut[vid as usize] = self.cut_vertices[id as usize];
                    result_ids[id as usize] = vid;
                }
                result_ids[id as usize]
            });

            if flip {
                tri.swap(1, 2);
            }

            match result.append_triangle_or_duplicate(tri) {
                Ok((new_tid, new_tri)) => {
                    for vid in new_tri {
                        if on_cut.len() <= vid as usize {
                            on_cut.resize(vid as usize + 1, false);
                        }
                    }
                    for (old, new) in tri.iter().zip(new_tri.iter()) {
                        on_cut[*new as usize] = on_cut[*old as usize];
                    }

                    let attributes = mesh.attributes();
                    let material = attributes.triangle_material(sub.host as usize);
                    let visible = attributes.triangle_visibility(sub.host as usize);
                    result
                        .attributes
                        .set_triangle_layers(new_tid as usize, material, visible);
                }
                Err(MeshError::DegenerateTriangle(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn vertex_info(&self, mesh: &DynamicMesh, id: u32) -> VertexInfo {
        match self.sources[id as usize] {
            WeldedSource::Vertex(vid) => mesh.vertex_info(vid),
            WeldedSource::Interpolated { tid, bary } => {
                let [i1, i2, i3] = mesh.triangle(tid).map(|vid| mesh.vertex_info(vid));
                let mut info = VertexInfo::barycentric([&i1, &i2, &i3], bary);
                info.position = self.positions[id as usize];
                if let Some(normal) = info.normal.try_normalize(1.0e-12) {
                    info.normal = normal;
                }
                info
            }
        }
    }
}

fn set_welded(welded: &mut Vec<Option<u32>>, handle: FixedVertexHandle, id: u32) {
    if welded.len() <= handle.index() {
        welded.resize(handle.index() + 1, None);
    }
    welded[handle.index()] = Some(id);
}

fn snap_uv(uv: Point2<Real>) -> Point2<Real> {
    let (mut u, mut v) = (uv.x.max(0.0), uv.y.max(0.0));
    if u + v > 1.0 {
        let s = u + v;
        u /= s;
        v /= s;
    }

    if u < BARY_SNAP {
        u = 0.0;
    }
    if v < BARY_SNAP {
        v = 0.0;
    }
    if 1.0 - u - v < BARY_SNAP {
        if u > 1.0 - BARY_SNAP {
            (u, v) = (1.0, 0.0);
        } else if v > 1.0 - BARY_SNAP {
            (u, v) = (0.0, 1.0);
        } else {
            v = 1.0 - u;
        }
    }

    Point2::new(u, v)
}

fn corner_index(uv: &Point2<Real>) -> Option<usize> {
    match (uv.x, uv.y) {
        (u, v) if u == 0.0 && v == 0.0 => Some(0),
        (u, v) if u == 1.0 && v == 0.0 => Some(1),
        (u, v) if u == 0.0 && v == 1.0 => Some(2),
        _ => None,
    }
}
