//! Perlin noise displacement of cutting surfaces.

use crate::math::{Point, Real, Vector};
use crate::mesh::DynamicMesh;
use crate::utils::hashmap::HashSet;

#[rustfmt::skip]
const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Distance between the noise sampling offsets and the origin.
const OFFSET_RADIUS: Real = 100.0;

/// Parameters of the noise displacement applied to cutting surfaces.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NoiseSettings {
    /// The maximum displacement of each coordinate.
    pub amplitude: Real,
    /// The spatial frequency of the first octave.
    pub frequency: Real,
    /// The number of octaves summed, each with twice the frequency and half the amplitude of the
    /// previous one.
    pub octaves: u32,
    /// The target edge length of the cutting surfaces before displacement.
    pub point_spacing: Real,
    /// Seed of the random offsets decorrelating the displacement of each coordinate.
    pub seed: u64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            amplitude: 0.0,
            frequency: 0.1,
            octaves: 4,
            point_spacing: 1.0,
            seed: 0,
        }
    }
}

fn fade(t: Real) -> Real {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: Real, a: Real, b: Real) -> Real {
    a + t * (b - a)
}

fn grad(hash: u8, x: Real, y: Real, z: Real) -> Real {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

fn perm(i: usize) -> usize {
    PERMUTATION[i & 255] as usize
}

/// Improved Perlin noise at `pt`, in `[-1, 1]`.
pub fn perlin_noise3(pt: &Point<Real>) -> Real {
    let floor = pt.map(Real::floor);
    let [xi, yi, zi] = [floor.x, floor.y, floor.z].map(|f| (f as i64 & 255) as usize);
    let local = pt - floor;
    let (x, y, z) = (local.x, local.y, local.z);
    let (u, v, w) = (fade(x), fade(y), fade(z));

    let a = perm(xi) + yi;
    let aa = perm(a) + zi;
    let ab = perm(a + 1) + zi;
    let b = perm(xi + 1) + yi;
    let ba = perm(b) + zi;
    let bb = perm(b + 1) + zi;
    let h = |i: usize| perm(i) as u8;

    lerp(
        w,
        lerp(
            v,
            lerp(u, grad(h(aa), x, y, z), grad(h(ba), x - 1.0, y, z)),
            lerp(u, grad(h(ab), x, y - 1.0, z), grad(h(bb), x - 1.0, y - 1.0, z)),
        ),
        lerp(
            v,
            lerp(
                u,
                grad(h(aa + 1), x, y, z - 1.0),
                grad(h(ba + 1), x - 1.0, y, z - 1.0),
            ),
            lerp(
                u,
                grad(h(ab + 1), x, y - 1.0, z - 1.0),
                grad(h(bb + 1), x - 1.0, y - 1.0, z - 1.0),
            ),
        ),
    )
}

/// A vector noise field: three decorrelated octave noises, one per coordinate.
///
/// Each coordinate samples the same scalar noise at a different random offset, so two fields
/// built with different seeds displace surfaces differently.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoiseField {
    offsets: [Vector<Real>; 3],
}

impl NoiseField {
    /// A noise field with sampling offsets drawn from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = oorandom::Rand64::new(seed as u128);
        let mut random_unit = || loop {
            let v = Vector::new(
                rng.rand_float() * 2.0 - 1.0,
                rng.rand_float() * 2.0 - 1.0,
                rng.rand_float() * 2.0 - 1.0,
            );
            let sq_norm = v.norm_squared();
            if sq_norm > 1.0e-4 && sq_norm <= 1.0 {
                return v / sq_norm.sqrt();
            }
        };

        Self {
            offsets: [
                random_unit() * OFFSET_RADIUS,
                random_unit() * OFFSET_RADIUS,
                random_unit() * OFFSET_RADIUS,
            ],
        }
    }

    /// Sums `octaves` octaves of Perlin noise at `pt`.
    pub fn octave_noise(pt: &Point<Real>, octaves: u32) -> Real {
        let mut result = 0.0;
        let mut scale = 1.0;

        for _ in 0..octaves {
            result += perlin_noise3(&(pt * scale)) / scale;
            scale *= 2.0;
        }

        result
    }

    /// The displacement of a point at `pos`.
    pub fn displacement(&self, pos: &Point<Real>, settings: &NoiseSettings) -> Vector<Real> {
        let base = pos * settings.frequency;
        Vector::new(
            Self::octave_noise(&(base + self.offsets[0]), settings.octaves),
            Self::octave_noise(&(base + self.offsets[1]), settings.octaves),
            Self::octave_noise(&(base + self.offsets[2]), settings.octaves),
        ) * settings.amplitude
    }

    /// Displaces every vertex of `mesh`.
    ///
    /// Interior vertices only move along `normal`. Boundary vertices move freely, unless
    /// `project_boundaries` is set: since the displacement only depends on the position, two
    /// patches sharing a boundary then stay connected.
    pub fn apply(
        &self,
        mesh: &mut DynamicMesh,
        normal: &Vector<Real>,
        settings: &NoiseSettings,
        project_boundaries: bool,
    ) {
        let boundary: HashSet<u32> = if project_boundaries {
            HashSet::default()
        } else {
            mesh.boundary_edges().into_iter().flatten().collect()
        };

        let vids: Vec<_> = mesh.vertex_ids().collect();
        for vid in vids {
            let pos = mesh.vertex(vid);
            let mut displacement = self.displacement(&pos, settings);
            if project_boundaries || !boundary.contains(&vid) {
                displacement = normal * displacement.dot(normal);
            }
            mesh.set_vertex(vid, pos + displacement);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{perlin_noise3, NoiseField, NoiseSettings};
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;

    #[test]
    fn perlin_is_zero_on_lattice_and_bounded() {
        assert_eq!(perlin_noise3(&Point::new(3.0, -7.0, 12.0)), 0.0);

        let mut rng = oorandom::Rand64::new(42);
        for _ in 0..1000 {
            let pt = Point::new(
                rng.rand_float() * 50.0 - 25.0,
                rng.rand_float() * 50.0 - 25.0,
                rng.rand_float() * 50.0 - 25.0,
            );
            let n = perlin_noise3(&pt);
            assert!(n.abs() <= 1.1);
        }
    }

    #[test]
    fn seeded_fields_are_deterministic() {
        let settings = NoiseSettings {
            amplitude: 0.5,
            frequency: 0.3,
            ..NoiseSettings::default()
        };
        let pos = Point::new(0.3, 1.7, -2.2);
        let a = NoiseField::new(7).displacement(&pos, &settings);
        let b = NoiseField::new(7).displacement(&pos, &settings);
        let c = NoiseField::new(8).displacement(&pos, &settings);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn interior_vertices_move_along_normal() {
        let mut patch = DynamicMesh::from_buffers(
            &[
                Point::new(-1.0, -1.0, 0.0),
                Point::new(1.0, -1.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(-1.0, 1.0, 0.0),
                Point::new(0.1, 0.2, 0.0),
            ],
            &[[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
        )
        .unwrap();
        let settings = NoiseSettings {
            amplitude: 1.0,
            frequency: 1.3,
            ..NoiseSettings::default()
        };

        NoiseField::new(3).apply(&mut patch, &Vector::z(), &settings, true);
        for vid in patch.vertex_ids() {
            let pt = patch.vertex(vid);
            assert!(pt.x.abs() <= 1.0 && pt.y.abs() <= 1.0);
        }
        assert_relative_eq!(patch.vertex(4).x, 0.1);
        assert_relative_eq!(patch.vertex(4).y, 0.2);
    }
}
