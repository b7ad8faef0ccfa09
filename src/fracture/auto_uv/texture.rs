use super::{check_uv_channel, global_vertices, set_active_triangles, UseMaterials};
use crate::bounding_volume::Aabb;
use crate::collection::GeometryCollection;
use crate::fracture::FractureError;
use crate::math::{Point, Point2, Real, Vector, KINDA_SMALL_NUMBER, SMALL_NUMBER};
use crate::partitioning::Bvh;
use crate::utils::{closest_point_on_triangle, orthonormal_basis, ray_triangle_toi};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const INSIDE_TOLERANCE: Real = 1.0e-6;
// Golden angle, in radians, between consecutive ambient occlusion rays.
const GOLDEN_ANGLE: Real = 2.399_963_229_728_653;

/// An attribute of the internal surfaces that can be baked into a texture channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BakeAttribute {
    /// The channel is left unchanged.
    #[default]
    None,
    /// Distance to the closest external face, relative to
    /// [`TextureAttributeSettings::to_external_max_distance`] and clamped to 1.
    DistanceToExternal,
    /// Fraction of the rays leaving the surface that escape its piece.
    AmbientOcclusion,
    /// Not supported: the channel keeps the value 1.
    Curvature,
    /// The `z` component of the normal.
    NormalZ,
    /// The `x` coordinate, relative to the bounds of the external faces.
    PositionX,
    /// The `y` coordinate, relative to the bounds of the external faces.
    PositionY,
    /// The `z` coordinate, relative to the bounds of the external faces.
    PositionZ,
}

/// Parameters of [`texture_internal_surfaces`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TextureAttributeSettings {
    /// The distance to the external faces mapped to 1.
    pub to_external_max_distance: Real,
    /// The number of rays cast from each texel for ambient occlusion.
    pub ao_rays: usize,
    /// Rays closer than this angle, in degrees, to the surface are not cast.
    pub ao_bias_angle_deg: Real,
    /// Occluders farther than this distance are ignored. Zero means no limit.
    pub ao_max_distance: Real,
    /// Bake `|n.z|` instead of `(1 + n.z) / 2`.
    pub normal_z_take_abs: bool,
    /// If set, this channel is zeroed in the gutter texels. Otherwise gutter texels copy the
    /// closest texel inside the islands.
    pub clear_gutter_channel: Option<usize>,
}

impl Default for TextureAttributeSettings {
    fn default() -> Self {
        Self {
            to_external_max_distance: 100.0,
            ao_rays: 32,
            ao_bias_angle_deg: 15.0,
            ao_max_distance: 0.0,
            normal_z_take_abs: false,
            clear_gutter_channel: None,
        }
    }
}

/// A four-channel floating point image.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
}

impl TextureImage {
    /// A black, transparent image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width * height],
        }
    }

    /// The number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The pixel at column `x` and row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.pixels[y * self.width + x]
    }

    /// Sets the pixel at column `x` and row `y`.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: [f32; 4]) {
        self.pixels[y * self.width + x] = value;
    }

    /// All the pixels, row by row.
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }
}

// The texels covered by the UV triangles of some faces.
struct OccupancyMap {
    // The face and barycentric coordinates sampled by each texel inside a UV triangle.
    samples: Vec<Option<(usize, [Real; 3])>>,
    // Texels near the islands, with the interior texel they copy.
    gutter: Vec<(usize, usize)>,
}

impl OccupancyMap {
    fn new(
        width: usize,
        height: usize,
        gutter_size: usize,
        indices: &[[u32; 3]],
        uvs: &[Point2<Real>],
        active: &[bool],
    ) -> Self {
        let mut samples = vec![None; width * height];
        let to_texels = |uv: &Point2<Real>| {
            Point2::new(uv.x * width as Real - 0.5, uv.y * height as Real - 0.5)
        };

        for (fid, tri) in indices.iter().enumerate().filter(|(fid, _)| active[*fid]) {
            let [a, b, c] = tri.map(|v| to_texels(&uvs[v as usize]));
            let area = (b - a).perp(&(c - a));
            if area.abs() <= SMALL_NUMBER {
                continue;
            }

            let min = a.inf(&b).inf(&c);
            let max = a.sup(&b).sup(&c);
            let range = |lo: Real, hi: Real, len: usize| {
                let lo = lo.ceil().max(0.0) as usize;
                let hi = (hi.floor().min(len as Real - 1.0)).max(-1.0);
                lo..(hi + 1.0) as usize
            };

            for y in range(min.y, max.y, height) {
                for x in range(min.x, max.x, width) {
                    let texel = y * width + x;
                    if samples[texel].is_some() {
                        continue;
                    }

                    let p = Point2::new(x as Real, y as Real);
                    let wb = (p - a).perp(&(c - a)) / area;
                    let wc = (b - a).perp(&(p - a)) / area;
                    let wa = 1.0 - wb - wc;
                    let bary = [wa, wb, wc];
                    if bary.iter().all(|w| *w >= -INSIDE_TOLERANCE) {
                        samples[texel] = Some((fid, bary));
                    }
                }
            }
        }

        let gutter = find_gutter(&samples, width, height, gutter_size);
        Self { samples, gutter }
    }
}

fn find_gutter(
    samples: &[Option<(usize, [Real; 3])>],
    width: usize,
    height: usize,
    gutter_size: usize,
) -> Vec<(usize, usize)> {
    let mut gutter = vec![];
    if gutter_size == 0 {
        return gutter;
    }

    let radius = gutter_size as isize;
    for y in 0..height as isize {
        for x in 0..width as isize {
            if samples[y as usize * width + x as usize].is_some() {
                continue;
            }

            let mut closest = None;
            let mut closest_dist = isize::MAX;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let neighbor = ny as usize * width + nx as usize;
                    let dist = dx * dx + dy * dy;
                    if samples[neighbor].is_some() && dist < closest_dist {
                        closest = Some(neighbor);
                        closest_dist = dist;
                    }
                }
            }

            if let Some(inside) = closest {
                gutter.push((y as usize * width + x as usize, inside));
            }
        }
    }

    gutter
}

// The geometry of the collection in the frame of its root.
struct GlobalGeometry<'a> {
    indices: &'a [[u32; 3]],
    positions: Vec<Point<Real>>,
    normals: Vec<Vector<Real>>,
}

impl GlobalGeometry<'_> {
    fn triangle(&self, fid: usize) -> [Point<Real>; 3] {
        self.indices[fid].map(|v| self.positions[v as usize])
    }

    fn bvh(&self, faces: impl Iterator<Item = usize>) -> Bvh {
        Bvh::from_iter(faces.map(|fid| (fid, Aabb::from_points(self.triangle(fid)))))
    }

    fn interpolated_normal(&self, fid: usize, bary: &[Real; 3]) -> Vector<Real> {
        let tri = self.indices[fid];
        let normal: Vector<Real> = (0..3)
            .map(|k| self.normals[tri[k] as usize] * bary[k])
            .sum();
        normal.try_normalize(SMALL_NUMBER).unwrap_or_else(Vector::z)
    }

    fn interpolated_point(&self, fid: usize, bary: &[Real; 3]) -> Point<Real> {
        let [a, b, c] = self.triangle(fid);
        Point::from(a.coords * bary[0] + b.coords * bary[1] + c.coords * bary[2])
    }

    fn distance_to_faces(&self, bvh: &Bvh, pt: &Point<Real>, max_distance: Real) -> Real {
        let query = Aabb::from_half_extents(*pt, Vector::repeat(max_distance));
        bvh.intersect_aabb(&query)
            .map(|fid| {
                let (closest, _) = closest_point_on_triangle(pt, &self.triangle(fid as usize));
                na::distance(pt, &closest)
            })
            .fold(max_distance, Real::min)
    }

    fn ambient_occlusion(
        &self,
        bvh: &Bvh,
        pt: &Point<Real>,
        normal: &Vector<Real>,
        settings: &TextureAttributeSettings,
    ) -> Real {
        let num_rays = settings.ao_rays.max(1);
        let max_toi = if settings.ao_max_distance > 0.0 {
            settings.ao_max_distance
        } else {
            Real::MAX
        };
        let max_angle = (90.0 - settings.ao_bias_angle_deg).clamp(0.0, 90.0).to_radians();
        let min_z = max_angle.cos();
        let [u, v] = orthonormal_basis(normal);
        let origin = pt + normal * KINDA_SMALL_NUMBER;

        // Directions on a spiral covering the cap of directions allowed around the normal.
        let occluded = (0..num_rays)
            .filter(|k| {
                let z = 1.0 - (*k as Real + 0.5) / num_rays as Real * (1.0 - min_z);
                let r = (1.0 - z * z).max(0.0).sqrt();
                let phi = *k as Real * GOLDEN_ANGLE;
                let dir = u * (r * phi.cos()) + v * (r * phi.sin()) + normal * z;

                bvh.intersect_ray(origin, dir, max_toi).any(|fid| {
                    let tri = self.triangle(fid as usize);
                    ray_triangle_toi(&origin, &dir, &tri, 0.0, max_toi).is_some()
                })
            })
            .count();

        1.0 - occluded as Real / num_rays as Real
    }
}

/// Bakes attributes of the selected faces of `collection` into `texture`, following the UVs of
/// the channel `target_uv_channel`.
///
/// Channel `k` of each texel covered by a selected face receives `bake_attributes[k]`, computed
/// at the point of the face the texel maps to. Channels of unsupported or degenerate attributes
/// are set to 1. Texels within `gutter_size` texels of the islands copy the closest covered
/// texel. Faces are selected as with [`set_active_triangles`](super::set_active_triangles), with
/// `activate_inside` set. The external faces are the visible faces with an even material.
pub fn texture_internal_surfaces(
    target_uv_channel: usize,
    collection: &GeometryCollection,
    gutter_size: usize,
    bake_attributes: &[BakeAttribute; 4],
    settings: &TextureAttributeSettings,
    texture: &mut TextureImage,
    pattern: UseMaterials,
    listed_materials: &[i32],
) -> Result<(), FractureError> {
    check_uv_channel(collection, target_uv_channel)?;

    let (to_texture, _) = set_active_triangles(collection, true, pattern, listed_materials);
    let (width, height) = (texture.width, texture.height);
    let occupancy = OccupancyMap::new(
        width,
        height,
        gutter_size,
        &collection.indices,
        &collection.uvs[target_uv_channel],
        &to_texture,
    );

    let transforms: Vec<_> = (0..collection.transform.len()).collect();
    let globals = collection.global_transforms(&transforms);
    let geometry = GlobalGeometry {
        indices: &collection.indices,
        positions: global_vertices(collection),
        normals: collection
            .normal
            .iter()
            .zip(&collection.bone_map)
            .map(|(n, bone)| globals[*bone] * n)
            .collect(),
    };

    let (outside, _) = set_active_triangles(collection, false, UseMaterials::Odd, &[]);
    let outside = &outside;
    let outside_faces = move || (0..outside.len()).filter(move |fid| outside[*fid]);
    let outside_bvh = geometry.bvh(outside_faces());
    let outside_bounds = Aabb::from_points(outside_faces().flat_map(|fid| geometry.triangle(fid)));

    let channel = |attribute| bake_attributes.iter().position(|a| *a == attribute);
    let distance_channel = channel(BakeAttribute::DistanceToExternal);
    let ao_channel = channel(BakeAttribute::AmbientOcclusion);
    let normal_z_channel = channel(BakeAttribute::NormalZ);
    let extents = outside_bounds.extents();
    let position_channels = [
        BakeAttribute::PositionX,
        BakeAttribute::PositionY,
        BakeAttribute::PositionZ,
    ]
    .map(channel);
    let position_channels: Vec<_> = (0..3)
        .filter_map(|dim| position_channels[dim].map(|c| (c, dim)))
        .filter(|(_, dim)| outside_bounds.is_valid() && extents[*dim] > 0.0)
        .collect();
    if channel(BakeAttribute::Curvature).is_some() {
        log::warn!("Curvature baking is not supported, its channel is set to 1.");
    }

    // Occlusion only comes from the faces of the same piece.
    let mut face_geometry = vec![0; collection.indices.len()];
    let piece_bvhs: Vec<Bvh> = if ao_channel.is_some() {
        (0..collection.transform_index.len())
            .map(|g| {
                let faces = collection.face_range(g);
                face_geometry[faces.clone()].fill(g);
                geometry.bvh(faces)
            })
            .collect()
    } else {
        vec![]
    };

    let max_distance = settings.to_external_max_distance.max(SMALL_NUMBER);
    let bake_texel = |texel: usize| -> Option<[f32; 4]> {
        let (fid, bary) = occupancy.samples[texel]?;
        let mut color = [1.0f32; 4];
        let normal = geometry.interpolated_normal(fid, &bary);
        let pt = geometry.interpolated_point(fid, &bary);

        if let Some(c) = distance_channel {
            let distance = geometry.distance_to_faces(&outside_bvh, &pt, max_distance);
            color[c] = (distance / max_distance).min(1.0) as f32;
        }
        for (c, dim) in &position_channels {
            let t = (pt[*dim] - outside_bounds.mins[*dim]) / extents[*dim];
            color[*c] = t as f32;
        }
        if let Some(c) = normal_z_channel {
            color[c] = if settings.normal_z_take_abs {
                normal.z.abs() as f32
            } else {
                ((1.0 + normal.z) * 0.5) as f32
            };
        }
        if let Some(c) = ao_channel {
            let bvh = &piece_bvhs[face_geometry[fid]];
            color[c] = geometry.ambient_occlusion(bvh, &pt, &normal, settings) as f32;
        }

        Some(color)
    };

    #[cfg(feature = "parallel")]
    let rows = texture.pixels.par_chunks_mut(width.max(1));
    #[cfg(not(feature = "parallel"))]
    let rows = texture.pixels.chunks_mut(width.max(1));

    rows.enumerate().for_each(|(y, row)| {
        for (x, pixel) in row.iter_mut().enumerate() {
            if let Some(color) = bake_texel(y * width + x) {
                *pixel = color;
            }
        }
    });

    for (gutter, inside) in &occupancy.gutter {
        let mut pixel = texture.pixels[*inside];
        if let Some(c) = settings.clear_gutter_channel.filter(|c| *c < 4) {
            pixel[c] = 0.0;
        }
        texture.pixels[*gutter] = pixel;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{find_gutter, OccupancyMap};
    use crate::math::Point2;

    #[test]
    fn triangle_covers_half_of_the_texels() {
        let uvs = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let map = OccupancyMap::new(8, 8, 0, &[[0, 1, 2]], &uvs, &[true]);

        // Texel centers on the diagonal are inside: 8 * 9 / 2 of them.
        let covered = map.samples.iter().filter(|s| s.is_some()).count();
        assert_eq!(covered, 36);
        assert!(map.samples[0].is_some());
        assert!(map.samples[63].is_none());

        let (fid, bary) = map.samples[0].unwrap();
        assert_eq!(fid, 0);
        assert_relative_eq!(bary.iter().sum::<f64>(), 1.0);

        let inactive = OccupancyMap::new(8, 8, 0, &[[0, 1, 2]], &uvs, &[false]);
        assert!(inactive.samples.iter().all(|s| s.is_none()));
    }

    #[test]
    fn gutter_copies_the_closest_covered_texel() {
        let mut samples = vec![None; 5 * 5];
        samples[12] = Some((0, [1.0, 0.0, 0.0]));

        let gutter = find_gutter(&samples, 5, 5, 1);
        assert_eq!(gutter.len(), 8);
        assert!(gutter.iter().all(|(_, inside)| *inside == 12));
        assert!(find_gutter(&samples, 5, 5, 0).is_empty());
    }
}
