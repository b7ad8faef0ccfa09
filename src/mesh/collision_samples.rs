use super::{DynamicMesh, VertexInfo};
use crate::math::{Point, Real, Vector};
use crate::utils::PointHashGrid;

fn barycentric_point(tri: &[Point<Real>; 3], bary: &Vector<Real>) -> Point<Real> {
    Point::from(tri[0].coords * bary[0] + tri[1].coords * bary[1] + tri[2].coords * bary[2])
}

impl DynamicMesh {
    /// Adds isolated sample vertices on the triangles of this mesh so that, within each connected
    /// component, no point of a triangle with an edge longer than `spacing` is much farther than
    /// `spacing` from a vertex.
    ///
    /// Samples are placed on a barycentric lattice spanned by the two longest edges of each
    /// triangle, and skipped if a vertex of the same component lies within `spacing / 2`.
    /// New vertices get the normal of the triangle they sample. Returns the number of samples
    /// added.
    pub fn add_collision_samples_per_component(&mut self, spacing: Real) -> usize {
        assert!(self.is_augmented(), "The mesh must be augmented.");

        if spacing <= 0.0 {
            return 0;
        }

        let components = self.connected_components();
        let cell_size = 0.5 * spacing * Real::sqrt(3.0);
        let mut known_samples: Vec<PointHashGrid<u32>> = Vec::with_capacity(components.len());
        let mut already_seen = vec![usize::MAX; self.max_vertex_id() as usize];

        for (component_id, component) in components.iter().enumerate() {
            let mut grid = PointHashGrid::new(cell_size);
            for tid in component {
                for vid in self.triangle(*tid) {
                    if already_seen[vid as usize] != component_id {
                        already_seen[vid as usize] = component_id;
                        grid.insert(vid, self.vertex(vid));
                    }
                }
            }
            known_samples.push(grid);
        }

        let spacing_sq = spacing * spacing;
        let mut num_added = 0;

        for (component, samples) in components.iter().zip(known_samples.iter_mut()) {
            for tid in component {
                let tri = self.triangle_points(*tid);
                let mut edge_lens_sq = [0.0; 3];
                let mut max_edge = 0;
                let mut max_edge_len_sq = 0.0;

                for i in 0..3 {
                    let len_sq = na::distance_squared(&tri[i], &tri[(i + 1) % 3]);
                    if len_sq > max_edge_len_sq {
                        max_edge = i;
                        max_edge_len_sq = len_sq;
                    }
                    edge_lens_sq[i] = len_sq;
                }

                if max_edge_len_sq <= spacing_sq {
                    continue;
                }

                let normal = (tri[1] - tri[0])
                    .cross(&(tri[2] - tri[0]))
                    .try_normalize(1.0e-12)
                    .unwrap_or_else(Vector::z);
                let divisions = (max_edge_len_sq.sqrt() / spacing).floor() as usize;
                let factor = 1.0 / (divisions + 1) as Real;
                let second = (max_edge + 1) % 3;
                let third = (max_edge + 2) % 3;
                let second_longest = if edge_lens_sq[second] < edge_lens_sq[third] {
                    third
                } else {
                    second
                };
                let second_longest_end = (second_longest + 1) % 3;

                for div_i in 0..divisions {
                    let along = (div_i + 1) as Real * factor;
                    let mut e1_bary = Vector::zeros();
                    let mut e2_bary = Vector::zeros();
                    e1_bary[max_edge] = along;
                    e1_bary[second] = 1.0 - along;
                    e2_bary[second_longest] = 1.0 - along;
                    e2_bary[second_longest_end] = along;

                    let across_dist = na::distance(
                        &barycentric_point(&tri, &e1_bary),
                        &barycentric_point(&tri, &e2_bary),
                    );
                    let divisions_across = (across_dist / spacing).ceil() as usize;
                    let factor_across = 1.0 / (divisions_across + 1) as Real;

                    for div_j in 0..divisions_across {
                        let along_across = (div_j + 1) as Real * factor_across;
                        let bary = e1_bary.lerp(&e2_bary, along_across);
                        let sample = barycentric_point(&tri, &bary);

                        // Fast early-out: a non-empty cell always has a point within the radius.
                        if !samples.is_cell_empty(&sample) {
                            continue;
                        }

                        if samples
                            .find_nearest_in_radius(&sample, spacing * 0.5, |_| false)
                            .is_none()
                        {
                            let info = VertexInfo::with_normal(sample, normal);
                            let vid = self.append_vertex_info(&info);
                            samples.insert(vid, sample);
                            num_added += 1;
                        }
                    }
                }
            }
        }

        num_added
    }
}
