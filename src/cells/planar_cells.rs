use super::InternalSurfaceMaterials;
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};

/// Corner indices of each face of a box, counter-clockwise about the outward face normal.
///
/// Corner `k` of a box is at the maximum along `x` if `bit0(k) ^ bit1(k)`, along `y` if
/// `bit1(k)`, and along `z` if `bit2(k)`.
pub(crate) const BOX_FACES: [([i32; 3], [usize; 4]); 6] = [
    ([0, 0, -1], [0, 3, 2, 1]),
    ([0, 0, 1], [4, 5, 6, 7]),
    ([0, -1, 0], [0, 1, 5, 4]),
    ([0, 1, 0], [3, 7, 6, 2]),
    ([-1, 0, 0], [0, 4, 7, 3]),
    ([1, 0, 0], [1, 2, 6, 5]),
];

/// The offset, in `{0, 1}³`, of the corner `k` of a box.
pub(crate) fn box_corner_offset(k: usize) -> [usize; 3] {
    [(k & 1) ^ ((k >> 1) & 1), (k >> 1) & 1, (k >> 2) & 1]
}

/// The corners of `aabb`, numbered like [`BOX_FACES`].
pub(crate) fn box_corners(aabb: &Aabb) -> [Point<Real>; 8] {
    [0, 1, 2, 3, 4, 5, 6, 7].map(|k| {
        let offset = box_corner_offset(k);
        Point::new(
            if offset[0] == 0 { aabb.mins.x } else { aabb.maxs.x },
            if offset[1] == 0 { aabb.mins.y } else { aabb.maxs.y },
            if offset[2] == 0 { aabb.mins.z } else { aabb.maxs.z },
        )
    })
}

pub(crate) fn face_normal(dir: [i32; 3]) -> Vector<Real> {
    Vector::new(dir[0] as Real, dir[1] as Real, dir[2] as Real)
}

/// An oriented plane: the set of points `p` such that `normal.dot(p) == w`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Plane {
    /// The unit normal of the plane.
    pub normal: Vector<Real>,
    /// The signed distance of the plane from the origin, along `normal`.
    pub w: Real,
}

impl Plane {
    /// Creates a plane from its normal and signed distance from the origin.
    ///
    /// The normal is normalized.
    pub fn new(normal: Vector<Real>, w: Real) -> Self {
        let norm = normal.norm();
        Self {
            normal: normal / norm,
            w: w / norm,
        }
    }

    /// The plane with normal `normal` passing through `point`.
    pub fn from_point_normal(point: &Point<Real>, normal: Vector<Real>) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            w: normal.dot(&point.coords),
        }
    }

    /// The point of the plane closest to the origin.
    pub fn origin(&self) -> Point<Real> {
        Point::from(self.normal * self.w)
    }

    /// The signed distance of `pt` to this plane, positive on the side of the normal.
    pub fn signed_distance(&self, pt: &Point<Real>) -> Real {
        self.normal.dot(&pt.coords) - self.w
    }
}

/// A partition of space into cells separated by planar polygons.
///
/// Each plane separates two cells: the first one, on the negative side of the plane, and the
/// second one on its positive side, or the outside of every cell if `None`. The boundary loop
/// of a plane is wound counter-clockwise about its normal. A single plane with an empty boundary
/// is infinite and separates space into two half-spaces.
#[derive(Clone, Debug, Default)]
pub struct PlanarCells {
    /// The number of cells.
    pub num_cells: usize,
    /// Whether every cell is convex, so that its faces can be fan-triangulated.
    pub assume_convex_cells: bool,
    /// The cutting planes.
    pub planes: Vec<Plane>,
    /// The cells on the negative and positive side of each plane.
    pub plane_cells: Vec<(usize, Option<usize>)>,
    /// The boundary loop of each plane, as indices into `plane_boundary_vertices`.
    pub plane_boundaries: Vec<Vec<u32>>,
    /// The vertices shared by all the plane boundaries.
    pub plane_boundary_vertices: Vec<Point<Real>>,
    /// Materials, UVs and noise of the surfaces created by the cut.
    pub internal_surface_materials: InternalSurfaceMaterials,
}

impl PlanarCells {
    /// Two cells separated by the infinite plane `plane`.
    ///
    /// Cell 0 is on the negative side of the plane.
    pub fn from_plane(plane: Plane) -> Self {
        let mut result = Self {
            num_cells: 2,
            ..Default::default()
        };
        result.add_plane(plane, 0, Some(1), vec![]);
        result
    }

    /// One cell per box.
    ///
    /// Every face of every box separates it from the outside, even if boxes touch.
    pub fn from_boxes(boxes: &[Aabb]) -> Self {
        let mut result = Self {
            num_cells: boxes.len(),
            assume_convex_cells: true,
            ..Default::default()
        };

        for (box_id, aabb) in boxes.iter().enumerate() {
            let base = result.plane_boundary_vertices.len() as u32;
            let corners = box_corners(aabb);
            result.plane_boundary_vertices.extend_from_slice(&corners);

            for (dir, face) in BOX_FACES {
                let normal = face_normal(dir);
                let w = normal.dot(&corners[face[0]].coords);
                result.add_plane(
                    Plane { normal, w },
                    box_id,
                    None,
                    face.iter().map(|k| base + *k as u32).collect(),
                );
            }
        }

        result
    }

    /// A regular grid of `cubes_per_axis` boxes covering `region`.
    ///
    /// The cell of the cube `(i, j, k)` is `i + j * nx + k * nx * ny`. The face between two
    /// adjacent cubes is added once, by the cube with the greater cell index. Only the faces on
    /// the border of `region` are adjacent to the outside.
    pub fn from_grid(region: &Aabb, cubes_per_axis: [usize; 3]) -> Self {
        let [nx, ny, nz] = cubes_per_axis;
        let mut result = Self {
            num_cells: nx * ny * nz,
            assume_convex_cells: true,
            ..Default::default()
        };

        let cell_id = |i: i64, j: i64, k: i64| -> Option<usize> {
            if i < 0 || j < 0 || k < 0 || i >= nx as i64 || j >= ny as i64 || k >= nz as i64 {
                None
            } else {
                Some(i as usize + j as usize * nx + k as usize * nx * ny)
            }
        };

        let verts_per_axis = [nx + 1, ny + 1, nz + 1];
        let cell_size = region
            .extents()
            .component_div(&Vector::new(nx as Real, ny as Real, nz as Real));

        for k in 0..verts_per_axis[2] {
            for j in 0..verts_per_axis[1] {
                for i in 0..verts_per_axis[0] {
                    let offset = Vector::new(i as Real, j as Real, k as Real);
                    result
                        .plane_boundary_vertices
                        .push(region.mins + offset.component_mul(&cell_size));
                }
            }
        }

        let vertex_id = |i: usize, j: usize, k: usize| -> u32 {
            (i + j * verts_per_axis[0] + k * verts_per_axis[0] * verts_per_axis[1]) as u32
        };

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let cell = i + j * nx + k * nx * ny;

                    for (dir, face) in BOX_FACES {
                        let boundary: Vec<u32> = face
                            .iter()
                            .map(|corner| {
                                let [di, dj, dk] = box_corner_offset(*corner);
                                vertex_id(i + di, j + dj, k + dk)
                            })
                            .collect();
                        let normal = face_normal(dir);
                        let w = normal
                            .dot(&result.plane_boundary_vertices[boundary[0] as usize].coords);
                        let neighbor = cell_id(
                            i as i64 + dir[0] as i64,
                            j as i64 + dir[1] as i64,
                            k as i64 + dir[2] as i64,
                        );
                        if neighbor.is_some_and(|neighbor| cell < neighbor) {
                            continue;
                        }
                        result.add_plane(Plane { normal, w }, cell, neighbor, boundary);
                    }
                }
            }
        }

        result
    }

    /// Is this a single plane without boundary, splitting space in two half-spaces?
    pub fn is_infinite_plane(&self) -> bool {
        self.planes.len() == 1 && self.plane_boundaries[0].is_empty()
    }

    /// Adds a plane separating `cell` (on its negative side) from `other_cell`.
    ///
    /// The `boundary` loop indexes `plane_boundary_vertices` and must be wound
    /// counter-clockwise about the plane normal.
    pub fn add_plane(
        &mut self,
        plane: Plane,
        cell: usize,
        other_cell: Option<usize>,
        boundary: Vec<u32>,
    ) {
        self.planes.push(plane);
        self.plane_cells.push((cell, other_cell));
        self.plane_boundaries.push(boundary);
    }

    /// The vertices of the boundary of the plane `plane_id`.
    pub fn plane_boundary(&self, plane_id: usize) -> impl Iterator<Item = Point<Real>> + '_ {
        self.plane_boundaries[plane_id]
            .iter()
            .map(|i| self.plane_boundary_vertices[*i as usize])
    }
}

#[cfg(test)]
mod test {
    use super::{Plane, PlanarCells};
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::transformation::polygon_normal;

    fn check_loops_wind_about_normals(cells: &PlanarCells) {
        for (plane_id, plane) in cells.planes.iter().enumerate() {
            let pts: Vec<_> = cells.plane_boundary(plane_id).collect();
            let normal = polygon_normal(&pts).normalize();
            assert_relative_eq!(normal, plane.normal, epsilon = 1.0e-9);
            for pt in &pts {
                assert_relative_eq!(plane.signed_distance(pt), 0.0, epsilon = 1.0e-9);
            }
        }
    }

    #[test]
    fn box_faces_point_outward() {
        let aabb = Aabb::new(Point::new(-1.0, 0.0, 2.0), Point::new(1.0, 3.0, 2.5));
        let cells = PlanarCells::from_boxes(&[aabb]);
        assert_eq!(cells.num_cells, 1);
        assert_eq!(cells.planes.len(), 6);
        check_loops_wind_about_normals(&cells);

        for plane in &cells.planes {
            assert!(plane.signed_distance(&aabb.center()) < 0.0);
        }
        assert!(cells.plane_cells.iter().all(|(c, other)| *c == 0 && other.is_none()));
    }

    #[test]
    fn grid_neighbors() {
        let region = Aabb::new(Point::origin(), Point::new(3.0, 2.0, 1.0));
        let cells = PlanarCells::from_grid(&region, [3, 2, 1]);
        assert_eq!(cells.num_cells, 6);
        assert_eq!(cells.planes.len(), 22 + 7);
        assert_eq!(cells.plane_boundary_vertices.len(), 4 * 3 * 2);
        check_loops_wind_about_normals(&cells);

        let neighbors = |cell: usize| -> Vec<Option<usize>> {
            cells
                .plane_cells
                .iter()
                .filter(|(c, _)| *c == cell)
                .map(|(_, other)| *other)
                .collect()
        };

        // Faces: -z, +z, -y, +y, -x, +x.
        assert_eq!(neighbors(0), vec![None, None, None, None]);
        assert_eq!(neighbors(4), vec![None, None, Some(1), None, Some(3)]);

        // Interior faces are listed once, and point toward the lower cell.
        for (plane_id, (cell, other)) in cells.plane_cells.iter().enumerate() {
            if let Some(other) = other {
                assert!(other < cell);
                assert!(!cells
                    .plane_cells
                    .iter()
                    .any(|pair| *pair == (*other, Some(*cell))));
                let normal = cells.planes[plane_id].normal;
                assert!(normal.x + normal.y + normal.z < 0.0);
            }
        }
    }

    #[test]
    fn single_plane_is_infinite() {
        let cells = PlanarCells::from_plane(Plane::new(Vector::new(0.0, 0.0, 2.0), 1.0));
        assert!(cells.is_infinite_plane());
        assert_eq!(cells.plane_cells, vec![(0, Some(1))]);
        assert_relative_eq!(cells.planes[0].w, 0.5);
        assert_relative_eq!(cells.planes[0].origin(), Point::new(0.0, 0.0, 0.5));
    }
}
