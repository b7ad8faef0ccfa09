//! Voronoi cells of a set of sites, clipped to a box.
//!
//! Each cell starts as the bounding box and is clipped by the bisector planes of its nearest
//! sites until no remaining site can affect it. Intersection points are computed from a
//! canonical ordering of the clipped edge endpoints, so the faces of a cell sharing an edge get
//! bit-identical vertices, and two constructions from the same sites give the same cells.

use super::planar_cells::{box_corners, face_normal, BOX_FACES};
use super::{PlanarCells, PlanarCellsError, Plane};
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use crate::utils::hashmap::{Entry, HashMap, HashSet};
use crate::utils::orthonormal_basis;
use ordered_float::OrderedFloat;
use rstar::primitives::GeomWithData;
use rstar::RTree;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

type SiteTree = RTree<GeomWithData<[Real; 3], usize>>;

/// A face of a [`VoronoiCell`].
#[derive(Clone, Debug, PartialEq)]
pub struct VoronoiFace {
    /// The cell on the other side of this face, or `None` if it lies on the domain boundary.
    pub neighbor: Option<usize>,
    /// The outward unit normal of the face. May be zero if unknown.
    pub normal: Vector<Real>,
    /// The face loop, counter-clockwise about `normal`, as indices into the cell vertices.
    pub vertices: Vec<u32>,
}

/// A convex Voronoi cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoronoiCell {
    /// The vertices of the cell.
    pub vertices: Vec<Point<Real>>,
    /// The faces of the cell.
    pub faces: Vec<VoronoiFace>,
}

#[derive(Clone, Debug)]
struct ClipFace {
    neighbor: Option<usize>,
    normal: Vector<Real>,
    points: Vec<Point<Real>>,
}

fn lexicographic_key(pt: &Point<Real>) -> [OrderedFloat<Real>; 3] {
    [OrderedFloat(pt.x), OrderedFloat(pt.y), OrderedFloat(pt.z)]
}

fn point_bits(pt: &Point<Real>) -> [u64; 3] {
    [pt.x.to_bits(), pt.y.to_bits(), pt.z.to_bits()]
}

fn edge_plane_intersection(
    a: &Point<Real>,
    b: &Point<Real>,
    normal: &Vector<Real>,
    w: Real,
) -> Point<Real> {
    let (a, b) = if lexicographic_key(a) <= lexicographic_key(b) {
        (a, b)
    } else {
        (b, a)
    };
    let da = normal.dot(&a.coords) - w;
    let db = normal.dot(&b.coords) - w;
    let t = da / (da - db);
    a + (b - a) * t
}

// Clips the convex polyhedron `faces` by the half-space `normal.dot(p) <= w`.
fn clip_polyhedron(
    faces: &mut Vec<ClipFace>,
    normal: &Vector<Real>,
    w: Real,
    neighbor: Option<usize>,
    eps: Real,
) {
    let is_cut = faces
        .iter()
        .flat_map(|f| f.points.iter())
        .any(|pt| normal.dot(&pt.coords) - w > eps);
    if !is_cut {
        return;
    }

    let mut cap_points = vec![];
    let mut cap_seen = HashSet::default();
    let mut push_cap = |pt: Point<Real>, cap_points: &mut Vec<Point<Real>>| {
        if cap_seen.insert(point_bits(&pt)) {
            cap_points.push(pt);
        }
    };

    for face in faces.iter_mut() {
        let mut clipped = Vec::with_capacity(face.points.len() + 1);

        for (i, a) in face.points.iter().enumerate() {
            let b = &face.points[(i + 1) % face.points.len()];
            let da = normal.dot(&a.coords) - w;
            let db = normal.dot(&b.coords) - w;

            if da <= eps {
                clipped.push(*a);
                if da >= -eps {
                    push_cap(*a, &mut cap_points);
                }
            }

            if (da < -eps && db > eps) || (da > eps && db < -eps) {
                let pt = edge_plane_intersection(a, b, normal, w);
                clipped.push(pt);
                push_cap(pt, &mut cap_points);
            }
        }

        face.points = clipped;
    }

    faces.retain(|f| f.points.len() >= 3);

    if cap_points.len() >= 3 {
        let center = cap_points
            .iter()
            .fold(Point::origin(), |acc, pt| acc + pt.coords)
            / cap_points.len() as Real;
        let [u, v] = orthonormal_basis(normal);
        cap_points.sort_by_key(|pt| {
            let dir = pt - center;
            OrderedFloat(dir.dot(&v).atan2(dir.dot(&u)))
        });
        faces.push(ClipFace {
            neighbor,
            normal: *normal,
            points: cap_points,
        });
    }
}

fn max_sq_distance(faces: &[ClipFace], site: &Point<Real>) -> Real {
    faces
        .iter()
        .flat_map(|f| f.points.iter())
        .map(|pt| (pt - site).norm_squared())
        .fold(0.0, Real::max)
}

fn compute_cell(
    site_id: usize,
    sites: &[Point<Real>],
    tree: &SiteTree,
    bounds: &Aabb,
) -> Result<VoronoiCell, PlanarCellsError> {
    let eps = bounds.extents().norm() * 1.0e-10;
    let site = sites[site_id];
    let corners = box_corners(bounds);
    let mut faces: Vec<_> = BOX_FACES
        .iter()
        .map(|(dir, face)| ClipFace {
            neighbor: None,
            normal: face_normal(*dir),
            points: face.iter().map(|k| corners[*k]).collect(),
        })
        .collect();

    let mut max_dist = max_sq_distance(&faces, &site).sqrt();

    for other in tree.nearest_neighbor_iter(&[site.x, site.y, site.z]) {
        let other_id = other.data;
        if other_id == site_id {
            continue;
        }

        let other_site = sites[other_id];
        let dist = (other_site - site).norm();
        if dist <= eps {
            let (a, b) = (site_id.min(other_id), site_id.max(other_id));
            return Err(PlanarCellsError::CoincidentSites(a, b));
        }

        if dist * 0.5 > max_dist {
            break;
        }

        let normal = (other_site - site) / dist;
        let w = normal.dot(&na::center(&site, &other_site).coords);
        clip_polyhedron(&mut faces, &normal, w, Some(other_id), eps);
        max_dist = max_sq_distance(&faces, &site).sqrt();
    }

    let mut cell = VoronoiCell::default();
    let mut vertex_ids = HashMap::default();

    for face in faces {
        let vertices = face
            .points
            .iter()
            .map(|pt| match vertex_ids.entry(point_bits(pt)) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    cell.vertices.push(*pt);
                    *e.insert(cell.vertices.len() as u32 - 1)
                }
            })
            .collect();
        cell.faces.push(VoronoiFace {
            neighbor: face.neighbor,
            normal: face.normal,
            vertices,
        });
    }

    Ok(cell)
}

/// Computes the Voronoi cell of each site, clipped to `bounds`.
///
/// Fails if two sites are coincident.
pub fn compute_voronoi_cells(
    sites: &[Point<Real>],
    bounds: &Aabb,
) -> Result<Vec<VoronoiCell>, PlanarCellsError> {
    let tree = SiteTree::bulk_load(
        sites
            .iter()
            .enumerate()
            .map(|(i, pt)| GeomWithData::new([pt.x, pt.y, pt.z], i))
            .collect(),
    );

    #[cfg(feature = "parallel")]
    let site_ids = (0..sites.len()).into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let site_ids = 0..sites.len();

    site_ids
        .map(|i| compute_cell(i, sites, &tree, bounds))
        .collect()
}

impl PlanarCells {
    /// The Voronoi cells of `sites`, clipped to `bounds`.
    pub fn from_voronoi(sites: &[Point<Real>], bounds: &Aabb) -> Result<Self, PlanarCellsError> {
        let cells = compute_voronoi_cells(sites, bounds)?;
        Ok(Self::from_voronoi_cells(sites, &cells))
    }

    /// Cells from precomputed Voronoi cells of `sites`.
    ///
    /// A face shared by two cells is only added once, from the cell with the largest index.
    /// Faces with a zero normal use the direction between their sites instead, or are skipped if
    /// they lie on the domain boundary.
    pub fn from_voronoi_cells(sites: &[Point<Real>], cells: &[VoronoiCell]) -> Self {
        let mut result = Self {
            num_cells: cells.len(),
            assume_convex_cells: true,
            ..Default::default()
        };

        for (cell_id, cell) in cells.iter().enumerate() {
            let mut vertex_start = None;

            for face in &cell.faces {
                if face.neighbor.is_some_and(|neighbor| cell_id < neighbor)
                    || face.vertices.len() < 3
                {
                    continue;
                }

                let normal = match face.normal.try_normalize(1.0e-12) {
                    Some(normal) => normal,
                    None => match face.neighbor {
                        Some(neighbor) => (sites[neighbor] - sites[cell_id])
                            .try_normalize(1.0e-12)
                            .unwrap_or_else(|| {
                                panic!(
                                    "The Voronoi sites {} and {} are coincident.",
                                    neighbor, cell_id
                                )
                            }),
                        None => continue,
                    },
                };

                let w = normal.dot(&cell.vertices[face.vertices[0] as usize].coords);
                let start = *vertex_start.get_or_insert_with(|| {
                    let start = result.plane_boundary_vertices.len() as u32;
                    result
                        .plane_boundary_vertices
                        .extend_from_slice(&cell.vertices);
                    start
                });

                result.add_plane(
                    Plane { normal, w },
                    cell_id,
                    face.neighbor,
                    face.vertices.iter().map(|i| start + i).collect(),
                );
            }
        }

        result
    }
}
