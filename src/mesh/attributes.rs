//! Per-vertex and per-triangle attribute layers of a [`DynamicMesh`].
//!
//! A mesh carrying every layer a geometry collection piece needs (normals, colors, tangent
//! frames, UV channels, material ids and visibility) is called *augmented*. Plain meshes only
//! carry positions and get augmented with [`DynamicMesh::augment`].

use super::DynamicMesh;
use crate::math::{Color, Point, Real, Vector, MAX_UV_CHANNELS};
use arrayvec::ArrayVec;
use na::Point2;

/// The position and per-vertex attributes of a single vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexInfo {
    /// The vertex position.
    pub position: Point<Real>,
    /// The vertex normal.
    pub normal: Vector<Real>,
    /// The vertex color.
    pub color: Color,
    /// The first tangent direction.
    pub tangent_u: Vector<Real>,
    /// The second tangent direction.
    pub tangent_v: Vector<Real>,
    /// One UV coordinate per enabled channel.
    pub uvs: ArrayVec<Point2<Real>, MAX_UV_CHANNELS>,
}

impl VertexInfo {
    /// A vertex at `position` with default attributes.
    pub fn new(position: Point<Real>) -> Self {
        Self {
            position,
            normal: Vector::z(),
            color: Color::repeat(1.0),
            tangent_u: Vector::x(),
            tangent_v: Vector::y(),
            uvs: ArrayVec::new(),
        }
    }

    /// A vertex at `position` with the given normal and default attributes otherwise.
    pub fn with_normal(position: Point<Real>, normal: Vector<Real>) -> Self {
        Self {
            normal,
            ..Self::new(position)
        }
    }

    /// Linear interpolation between `a` (at `t = 0`) and `b` (at `t = 1`).
    pub fn lerp(a: &Self, b: &Self, t: Real) -> Self {
        Self::barycentric([a, b, b], [1.0 - t, t, 0.0])
    }

    /// Interpolates three vertices with the barycentric coordinates `bary`.
    ///
    /// Interpolated normals are renormalized; only the UV channels present on all three vertices
    /// are kept.
    pub fn barycentric(vtx: [&Self; 3], bary: [Real; 3]) -> Self {
        let position = Point::from(
            vtx[0].position.coords * bary[0]
                + vtx[1].position.coords * bary[1]
                + vtx[2].position.coords * bary[2],
        );
        let normal = vtx[0].normal * bary[0] + vtx[1].normal * bary[1] + vtx[2].normal * bary[2];
        let normal = normal.try_normalize(1.0e-12).unwrap_or(vtx[0].normal);
        let color = vtx[0].color * bary[0] as f32
            + vtx[1].color * bary[1] as f32
            + vtx[2].color * bary[2] as f32;
        let tangent_u =
            vtx[0].tangent_u * bary[0] + vtx[1].tangent_u * bary[1] + vtx[2].tangent_u * bary[2];
        let tangent_v =
            vtx[0].tangent_v * bary[0] + vtx[1].tangent_v * bary[1] + vtx[2].tangent_v * bary[2];
        let num_uvs = vtx.iter().map(|v| v.uvs.len()).min().unwrap_or(0);
        let uvs = (0..num_uvs)
            .map(|i| {
                Point2::from(
                    vtx[0].uvs[i].coords * bary[0]
                        + vtx[1].uvs[i].coords * bary[1]
                        + vtx[2].uvs[i].coords * bary[2],
                )
            })
            .collect();

        Self {
            position,
            normal,
            color,
            tangent_u,
            tangent_v,
            uvs,
        }
    }
}

/// The optional attribute layers of a [`DynamicMesh`], indexed by vertex or triangle id.
#[derive(Clone, Debug, Default)]
pub struct MeshAttributes {
    pub(crate) normals: Option<Vec<Vector<Real>>>,
    pub(crate) colors: Option<Vec<Color>>,
    pub(crate) tangents_u: Option<Vec<Vector<Real>>>,
    pub(crate) tangents_v: Option<Vec<Vector<Real>>>,
    pub(crate) uvs: Vec<Vec<Point2<Real>>>,
    pub(crate) material_ids: Option<Vec<i32>>,
    pub(crate) visibility: Option<Vec<bool>>,
}

fn reset_at<T: Clone>(layer: &mut Option<Vec<T>>, id: usize, value: T) {
    if let Some(layer) = layer {
        if layer.len() <= id {
            layer.resize(id + 1, value);
        } else {
            layer[id] = value;
        }
    }
}

fn set_at<T: Copy>(layer: &mut Option<Vec<T>>, id: usize, value: T) {
    if let Some(layer) = layer {
        layer[id] = value;
    }
}

fn get_at<T: Copy>(layer: &Option<Vec<T>>, id: usize, default: T) -> T {
    layer
        .as_ref()
        .and_then(|layer| layer.get(id).copied())
        .unwrap_or(default)
}

impl MeshAttributes {
    /// The same set of enabled layers, all empty.
    pub(crate) fn cleared(&self) -> Self {
        Self {
            normals: self.normals.as_ref().map(|_| vec![]),
            colors: self.colors.as_ref().map(|_| vec![]),
            tangents_u: self.tangents_u.as_ref().map(|_| vec![]),
            tangents_v: self.tangents_v.as_ref().map(|_| vec![]),
            uvs: self.uvs.iter().map(|_| vec![]).collect(),
            material_ids: self.material_ids.as_ref().map(|_| vec![]),
            visibility: self.visibility.as_ref().map(|_| vec![]),
        }
    }

    /// The number of UV channels enabled.
    pub fn num_uv_channels(&self) -> usize {
        self.uvs.len()
    }

    /// Are per-vertex normals enabled?
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Are per-vertex tangent frames enabled?
    pub fn has_tangents(&self) -> bool {
        self.tangents_u.is_some() && self.tangents_v.is_some()
    }

    /// Are per-triangle material ids enabled?
    pub fn has_material_ids(&self) -> bool {
        self.material_ids.is_some()
    }

    pub(crate) fn reset_vertex(&mut self, id: usize) {
        reset_at(&mut self.normals, id, Vector::z());
        reset_at(&mut self.colors, id, Color::repeat(1.0));
        reset_at(&mut self.tangents_u, id, Vector::x());
        reset_at(&mut self.tangents_v, id, Vector::y());

        for channel in &mut self.uvs {
            if channel.len() <= id {
                channel.resize(id + 1, Point2::origin());
            } else {
                channel[id] = Point2::origin();
            }
        }
    }

    pub(crate) fn reset_triangle(&mut self, id: usize) {
        reset_at(&mut self.material_ids, id, 0);
        reset_at(&mut self.visibility, id, true);
    }

    pub(crate) fn vertex_info(&self, id: usize, position: Point<Real>) -> VertexInfo {
        let default = VertexInfo::new(position);
        VertexInfo {
            position,
            normal: get_at(&self.normals, id, default.normal),
            color: get_at(&self.colors, id, default.color),
            tangent_u: get_at(&self.tangents_u, id, default.tangent_u),
            tangent_v: get_at(&self.tangents_v, id, default.tangent_v),
            uvs: self
                .uvs
                .iter()
                .map(|channel| channel.get(id).copied().unwrap_or_else(Point2::origin))
                .collect(),
        }
    }

    pub(crate) fn set_vertex_info(&mut self, id: usize, info: &VertexInfo) {
        set_at(&mut self.normals, id, info.normal);
        set_at(&mut self.colors, id, info.color);
        set_at(&mut self.tangents_u, id, info.tangent_u);
        set_at(&mut self.tangents_v, id, info.tangent_v);

        for (channel, uv) in self.uvs.iter_mut().zip(info.uvs.iter()) {
            channel[id] = *uv;
        }
    }

    pub(crate) fn triangle_material(&self, id: usize) -> i32 {
        get_at(&self.material_ids, id, 0)
    }

    pub(crate) fn triangle_visibility(&self, id: usize) -> bool {
        get_at(&self.visibility, id, true)
    }

    pub(crate) fn set_triangle_layers(&mut self, id: usize, material: i32, visible: bool) {
        set_at(&mut self.material_ids, id, material);
        set_at(&mut self.visibility, id, visible);
    }

    pub(crate) fn rotate_vectors(&mut self, f: impl Fn(Vector<Real>) -> Vector<Real>) {
        for layer in [&mut self.normals, &mut self.tangents_u, &mut self.tangents_v]
            .into_iter()
            .flatten()
        {
            layer.iter_mut().for_each(|v| *v = f(*v));
        }
    }
}

impl DynamicMesh {
    fn vertex_layer_len(&self) -> usize {
        self.max_vertex_id() as usize
    }

    fn triangle_layer_len(&self) -> usize {
        self.max_triangle_id() as usize
    }

    /// Enables per-vertex normals (initialized to `+Z`) if they aren’t already.
    pub fn enable_vertex_normals(&mut self) {
        if self.attributes.normals.is_none() {
            self.attributes.normals = Some(vec![Vector::z(); self.vertex_layer_len()]);
        }
    }

    /// Enables per-vertex colors (initialized to white) if they aren’t already.
    pub fn enable_vertex_colors(&mut self) {
        if self.attributes.colors.is_none() {
            self.attributes.colors = Some(vec![Color::repeat(1.0); self.vertex_layer_len()]);
        }
    }

    /// Enables the per-vertex tangent frames if they aren’t already.
    pub fn enable_tangents(&mut self) {
        let len = self.vertex_layer_len();
        if self.attributes.tangents_u.is_none() {
            self.attributes.tangents_u = Some(vec![Vector::x(); len]);
        }
        if self.attributes.tangents_v.is_none() {
            self.attributes.tangents_v = Some(vec![Vector::y(); len]);
        }
    }

    /// Enables per-triangle material ids (initialized to 0) if they aren’t already.
    pub fn enable_material_ids(&mut self) {
        if self.attributes.material_ids.is_none() {
            self.attributes.material_ids = Some(vec![0; self.triangle_layer_len()]);
        }
    }

    /// Enables the per-triangle visibility flags (initialized to `true`) if they aren’t already.
    pub fn enable_visibility(&mut self) {
        if self.attributes.visibility.is_none() {
            self.attributes.visibility = Some(vec![true; self.triangle_layer_len()]);
        }
    }

    /// Ensures the first `num_channels` UV channels exist.
    ///
    /// Existing channels are zeroed if `reset_existing` is `true`. Channels beyond
    /// `num_channels` are removed if `disable_others` is `true`.
    pub fn enable_uv_channels(
        &mut self,
        num_channels: usize,
        reset_existing: bool,
        disable_others: bool,
    ) {
        let num_channels = num_channels.min(MAX_UV_CHANNELS);
        let len = self.vertex_layer_len();

        for (i, channel) in self.attributes.uvs.iter_mut().enumerate() {
            if i < num_channels && reset_existing {
                *channel = vec![Point2::origin(); len];
            }
        }

        while self.attributes.uvs.len() < num_channels {
            self.attributes.uvs.push(vec![Point2::origin(); len]);
        }

        if disable_others {
            self.attributes.uvs.truncate(num_channels);
        }
    }

    /// The number of UV channels enabled on this mesh.
    pub fn num_enabled_uv_channels(&self) -> usize {
        self.attributes.uvs.len()
    }

    /// Enables all the attribute layers a geometry collection piece needs, with
    /// `num_uv_channels` UV channels.
    ///
    /// Layers that already exist are kept as-is.
    pub fn augment(&mut self, num_uv_channels: usize) {
        self.enable_vertex_colors();
        self.enable_vertex_normals();
        self.enable_material_ids();
        self.enable_tangents();
        self.enable_visibility();
        self.enable_uv_channels(num_uv_channels, false, true);
    }

    /// Does this mesh carry every attribute layer enabled by [`DynamicMesh::augment`]?
    pub fn is_augmented(&self) -> bool {
        let attrs = &self.attributes;
        attrs.normals.is_some()
            && attrs.colors.is_some()
            && attrs.tangents_u.is_some()
            && attrs.tangents_v.is_some()
            && attrs.material_ids.is_some()
            && attrs.visibility.is_some()
    }

    /// Sets each vertex tangent frame to an arbitrary frame orthogonal to its normal, and every
    /// triangle visibility to `visible`.
    pub fn set_default_attributes(&mut self, visible: bool) {
        assert!(self.is_augmented(), "The mesh must be augmented.");

        let ids: Vec<_> = self.vertex_ids().collect();
        for vid in ids {
            let normal = self.vertex_normal(vid);
            let [u, v] = crate::utils::orthonormal_basis(
                &normal.try_normalize(1.0e-12).unwrap_or_else(Vector::z),
            );
            self.set_tangent(vid, u, v);
        }

        if let Some(visibility) = &mut self.attributes.visibility {
            visibility.iter_mut().for_each(|v| *v = visible);
        }
    }

    /// The normal of the vertex `vid`.
    pub fn vertex_normal(&self, vid: u32) -> Vector<Real> {
        let normals = self.attributes.normals.as_ref();
        normals.expect("The mesh has no vertex normals.")[vid as usize]
    }

    /// Sets the normal of the vertex `vid`.
    pub fn set_vertex_normal(&mut self, vid: u32, normal: Vector<Real>) {
        let normals = self.attributes.normals.as_mut();
        normals.expect("The mesh has no vertex normals.")[vid as usize] = normal;
    }

    /// The color of the vertex `vid`.
    pub fn vertex_color(&self, vid: u32) -> Color {
        let colors = self.attributes.colors.as_ref();
        colors.expect("The mesh has no vertex colors.")[vid as usize]
    }

    /// Sets the color of the vertex `vid`.
    pub fn set_vertex_color(&mut self, vid: u32, color: Color) {
        let colors = self.attributes.colors.as_mut();
        colors.expect("The mesh has no vertex colors.")[vid as usize] = color;
    }

    /// The UV coordinates of the vertex `vid` on the given channel.
    pub fn uv(&self, vid: u32, channel: usize) -> Point2<Real> {
        assert!(channel < MAX_UV_CHANNELS, "Invalid UV channel index.");
        let uvs = self.attributes.uvs.get(channel);
        uvs.expect("The UV channel is not enabled.")[vid as usize]
    }

    /// Sets the UV coordinates of the vertex `vid` on the given channel.
    pub fn set_uv(&mut self, vid: u32, uv: Point2<Real>, channel: usize) {
        assert!(channel < MAX_UV_CHANNELS, "Invalid UV channel index.");
        let uvs = self.attributes.uvs.get_mut(channel);
        uvs.expect("The UV channel is not enabled.")[vid as usize] = uv;
    }

    /// Sets the UV coordinates of the vertex `vid` on its first `num_channels` channels.
    pub fn set_all_uv(&mut self, vid: u32, uv: Point2<Real>, num_channels: usize) {
        for channel in 0..num_channels.min(MAX_UV_CHANNELS) {
            self.set_uv(vid, uv, channel);
        }
    }

    /// The tangent frame `(u, v)` of the vertex `vid`.
    pub fn tangent(&self, vid: u32) -> (Vector<Real>, Vector<Real>) {
        assert!(self.is_augmented(), "The mesh must be augmented.");
        let (us, vs) = (&self.attributes.tangents_u, &self.attributes.tangents_v);
        (
            get_at(us, vid as usize, Vector::x()),
            get_at(vs, vid as usize, Vector::y()),
        )
    }

    /// Sets the tangent frame of the vertex `vid`.
    pub fn set_tangent(&mut self, vid: u32, tangent_u: Vector<Real>, tangent_v: Vector<Real>) {
        assert!(self.is_augmented(), "The mesh must be augmented.");
        set_at(&mut self.attributes.tangents_u, vid as usize, tangent_u);
        set_at(&mut self.attributes.tangents_v, vid as usize, tangent_v);
    }

    /// Is the triangle `tid` visible?
    pub fn visibility(&self, tid: u32) -> bool {
        let visibility = self.attributes.visibility.as_ref();
        visibility.expect("The mesh has no visibility layer.")[tid as usize]
    }

    /// Sets the visibility of the triangle `tid`.
    pub fn set_visibility(&mut self, tid: u32, visible: bool) {
        let visibility = self.attributes.visibility.as_mut();
        visibility.expect("The mesh has no visibility layer.")[tid as usize] = visible;
    }

    /// The material id of the triangle `tid`.
    pub fn material_id(&self, tid: u32) -> i32 {
        let ids = self.attributes.material_ids.as_ref();
        ids.expect("The mesh has no material ids.")[tid as usize]
    }

    /// Sets the material id of the triangle `tid`.
    pub fn set_material_id(&mut self, tid: u32, material_id: i32) {
        let ids = self.attributes.material_ids.as_mut();
        ids.expect("The mesh has no material ids.")[tid as usize] = material_id;
    }
}

#[cfg(test)]
mod test {
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Vector};
    use crate::mesh::{DynamicMesh, VertexInfo};
    use na::Point2;

    #[test]
    fn augment_is_idempotent() {
        let unit_box = Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0));
        let mut mesh = DynamicMesh::from_aabb(&unit_box);
        assert!(!mesh.is_augmented());

        mesh.augment(2);
        assert!(mesh.is_augmented());
        assert_eq!(mesh.num_enabled_uv_channels(), 2);
        assert!(mesh.visibility(3));

        mesh.set_uv(1, Point2::new(0.25, 0.5), 1);
        mesh.set_material_id(4, 7);
        mesh.augment(2);
        assert_eq!(mesh.uv(1, 1), Point2::new(0.25, 0.5));
        assert_eq!(mesh.material_id(4), 7);

        let vid = mesh.append_vertex(Point::origin());
        assert_eq!(mesh.uv(vid, 1), Point2::origin());
        assert_eq!(mesh.vertex_normal(vid), Vector::z());
    }

    #[test]
    #[should_panic]
    fn uv_channel_out_of_range() {
        let mut mesh = DynamicMesh::new();
        mesh.augment(8);
        let vid = mesh.append_vertex(Point::origin());
        let _ = mesh.uv(vid, 8);
    }

    #[test]
    fn default_attributes_are_orthogonal_frames() {
        let mut mesh = DynamicMesh::new();
        mesh.augment(1);
        let vid = mesh.append_vertex(Point::origin());
        mesh.set_vertex_normal(vid, Vector::new(0.0, 1.0, 1.0).normalize());
        mesh.set_default_attributes(false);

        let (u, v) = mesh.tangent(vid);
        assert_relative_eq!(u.dot(&mesh.vertex_normal(vid)), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(v.dot(&mesh.vertex_normal(vid)), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn interpolated_vertices() {
        let mut a = VertexInfo::new(Point::origin());
        let mut b = VertexInfo::new(Point::new(2.0, 0.0, 0.0));
        a.uvs.push(Point2::new(0.0, 0.0));
        b.uvs.push(Point2::new(1.0, 1.0));
        b.normal = Vector::x();

        let mid = VertexInfo::lerp(&a, &b, 0.5);
        assert_eq!(mid.position, Point::new(1.0, 0.0, 0.0));
        assert_eq!(mid.uvs[0], Point2::new(0.5, 0.5));
        assert_relative_eq!(mid.normal.norm(), 1.0, epsilon = 1.0e-12);
    }
}
