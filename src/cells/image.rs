use super::{PlanarCells, PlanarCellsError, Plane};
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use crate::utils::hashmap::{remove_entry, HashMap};
use crate::utils::DisjointSet;
use na::Point2;

/// The color of the pixels outside of every cell.
pub const OUTSIDE_COLOR: [u8; 3] = [0, 0, 0];

// Offsets of the 4-connected neighbors of a pixel: below, left, right, above.
const NEIGHBOR_X: [i64; 4] = [0, -1, 1, 0];
const NEIGHBOR_Y: [i64; 4] = [-1, 0, 0, 1];

// Corners of the pixel edge shared with each neighbor, oriented so that the boundary of a region
// is counter-clockwise.
const EDGE_START_X: [usize; 4] = [0, 0, 1, 1];
const EDGE_START_Y: [usize; 4] = [0, 1, 0, 1];
const EDGE_END_X: [usize; 4] = [1, 0, 1, 0];
const EDGE_END_Y: [usize; 4] = [0, 0, 1, 1];

impl PlanarCells {
    /// One cell per connected region of same-colored pixels of an image, extruded along `z`
    /// through `region`.
    ///
    /// The image is `width` pixels wide and `height` pixels tall, stored row by row, and maps to
    /// the `xy` extents of `region`. Pixels of color [`OUTSIDE_COLOR`] don't belong to any cell.
    /// Cells are numbered in the order of their first pixel. Only regions bounded by a single
    /// loop, without holes, are supported.
    pub fn from_image(
        region: &Aabb,
        image: &[[u8; 3]],
        width: usize,
        height: usize,
    ) -> Result<Self, PlanarCellsError> {
        let num_pixels = width * height;
        if image.len() != num_pixels {
            return Err(PlanarCellsError::ImageSizeMismatch {
                expected: num_pixels,
                actual: image.len(),
            });
        }

        let neighbor = |x: usize, y: usize, k: usize| -> Option<usize> {
            let xn = x as i64 + NEIGHBOR_X[k];
            let yn = y as i64 + NEIGHBOR_Y[k];
            if xn < 0 || yn < 0 || xn >= width as i64 || yn >= height as i64 {
                None
            } else {
                Some(xn as usize + yn as usize * width)
            }
        };

        let is_outside = |pixel: usize| image[pixel] == OUTSIDE_COLOR;
        let mut groups = DisjointSet::new(num_pixels);

        for y in 0..height {
            for x in 0..width {
                let pixel = x + y * width;
                if is_outside(pixel) {
                    continue;
                }

                for k in 0..4 {
                    if let Some(other) = neighbor(x, y, k) {
                        if !is_outside(other) {
                            groups.union(pixel, other);
                        }
                    }
                }
            }
        }

        let (pixel_cells, num_cells) = groups.compact_groups(|pixel| !is_outside(pixel));

        // Link the boundary edges of each cell into loops of pixel corners.
        let corners_width = width + 1;
        let mut open_chains: Vec<HashMap<usize, Vec<usize>>> = vec![HashMap::default(); num_cells];
        let mut loops: Vec<Vec<Vec<usize>>> = vec![vec![]; num_cells];

        for y in 0..height {
            for x in 0..width {
                let pixel = x + y * width;
                let cell = pixel_cells[pixel];
                if cell == usize::MAX {
                    continue;
                }

                for k in 0..4 {
                    if neighbor(x, y, k).is_some_and(|other| pixel_cells[other] == cell) {
                        continue;
                    }

                    let c0 = x + EDGE_START_X[k] + corners_width * (y + EDGE_START_Y[k]);
                    let c1 = x + EDGE_END_X[k] + corners_width * (y + EDGE_END_Y[k]);
                    let mut chain = vec![c0, c1];

                    loop {
                        let last = chain[chain.len() - 1];
                        if last == c0 {
                            loops[cell].push(chain);
                            break;
                        }

                        if let Some(next) = remove_entry(&mut open_chains[cell], &last) {
                            let _ = chain.pop();
                            chain.extend(next);
                        } else {
                            if open_chains[cell].insert(chain[0], chain).is_some() {
                                // Two boundary edges leave the same corner.
                                return Err(PlanarCellsError::UnsupportedRegionBoundary(cell));
                            }
                            break;
                        }
                    }
                }
            }
        }

        let mut result = Self {
            num_cells,
            assume_convex_cells: false,
            ..Default::default()
        };

        let extents = region.extents();
        let corner_position = |corner: usize| {
            let x = corner % corners_width;
            let y = corner / corners_width;
            Point2::new(
                region.mins.x + x as Real * extents.x / width as Real,
                region.mins.y + y as Real * extents.y / height as Real,
            )
        };

        for (cell, (cell_loops, chains)) in loops.iter().zip(open_chains.iter()).enumerate() {
            if cell_loops.len() != 1 || !chains.is_empty() {
                return Err(PlanarCellsError::UnsupportedRegionBoundary(cell));
            }

            result.add_image_region(cell, &cell_loops[0], region, &corner_position);
        }

        Ok(result)
    }

    // Adds the prism bounded by the corner loop `corners` (which ends with its first corner).
    fn add_image_region(
        &mut self,
        cell: usize,
        corners: &[usize],
        region: &Aabb,
        corner_position: impl Fn(usize) -> Point2<Real>,
    ) {
        let start = self.plane_boundary_vertices.len() as u32;
        let mut front_loop = vec![];
        let mut last_pt = corner_position(corners[0]);
        let mut i = 1;

        let add_side = |this: &mut Self,
                        dir: Vector<Real>,
                        back: u32,
                        front: u32,
                        prev_front: u32| {
            let normal = Vector::new(dir.y, -dir.x, 0.0);
            let anchor = this.plane_boundary_vertices[back as usize];
            this.add_plane(
                Plane::from_point_normal(&anchor, normal),
                cell,
                None,
                vec![prev_front + 1, prev_front, front, back],
            );
        };

        while i < corners.len() {
            let mut next_pt = corner_position(corners[i]);
            let dir = (next_pt - last_pt).normalize();

            // Merge collinear corners.
            let mut skip = i + 1;
            while skip < corners.len() {
                let skip_pt = corner_position(corners[skip]);
                if (skip_pt - next_pt).dot(&dir) < 1.0e-6 {
                    break;
                }
                next_pt = skip_pt;
                i = skip;
                skip += 1;
            }

            let front = self.plane_boundary_vertices.len() as u32;
            self.plane_boundary_vertices
                .push(Point::new(next_pt.x, next_pt.y, region.mins.z));
            self.plane_boundary_vertices
                .push(Point::new(next_pt.x, next_pt.y, region.maxs.z));

            if !front_loop.is_empty() {
                add_side(self, Vector::new(dir.x, dir.y, 0.0), front + 1, front, front - 2);
            }

            front_loop.push(front);
            last_pt = next_pt;
            i += 1;
        }

        // Close the loop between the last and the first vertices.
        let first_front = start;
        let last_front = start + 2 * (front_loop.len() as u32 - 1);
        let dir = (corner_position(corners[1]) - last_pt).normalize();
        add_side(
            self,
            Vector::new(dir.x, dir.y, 0.0),
            first_front + 1,
            first_front,
            last_front,
        );

        // Front cap, facing -z, then back cap facing +z.
        let front_cap = front_loop.iter().rev().copied().collect();
        self.add_plane(
            Plane::new(-Vector::z(), -region.mins.z),
            cell,
            None,
            front_cap,
        );
        let back_cap = front_loop.iter().map(|i| i + 1).collect();
        self.add_plane(Plane::new(Vector::z(), region.maxs.z), cell, None, back_cap);
    }
}
