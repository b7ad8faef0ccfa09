//! Per-triangle-corner attribute overlays.
//!
//! An overlay stores attribute *elements* and, for each triangle, the element used by each of its
//! three corners. Two triangles sharing a vertex may use different elements, which models seams
//! (UV island borders, hard edges). Fracturing works on per-vertex attributes instead, so meshes
//! coming with overlays are converted with
//! [`DynamicMesh::split_overlay_attributes_to_per_vertex`].

use super::{contiguous_fan_groups, DynamicMesh};
use crate::math::{Real, Vector, ZERO_TOLERANCE};
use na::Point2;

const UNSET: u32 = u32::MAX;

/// Attribute elements referenced by triangle corners.
#[derive(Clone, Debug)]
pub struct Overlay<T> {
    elements: Vec<T>,
    triangles: Vec<[u32; 3]>,
}

impl<T> Default for Overlay<T> {
    fn default() -> Self {
        Self {
            elements: vec![],
            triangles: vec![],
        }
    }
}

impl<T: Copy> Overlay<T> {
    /// An overlay without any element.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element and returns its id.
    pub fn append_element(&mut self, value: T) -> u32 {
        self.elements.push(value);
        self.elements.len() as u32 - 1
    }

    /// The value of the element `eid`.
    pub fn element(&self, eid: u32) -> T {
        self.elements[eid as usize]
    }

    /// All the elements of this overlay.
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// Sets the elements used by the corners of the triangle `tid`.
    pub fn set_triangle(&mut self, tid: u32, elements: [u32; 3]) {
        let tid = tid as usize;
        if self.triangles.len() <= tid {
            self.triangles.resize(tid + 1, [UNSET; 3]);
        }
        self.triangles[tid] = elements;
    }

    /// The elements used by the corners of the triangle `tid`, if they were set.
    pub fn triangle(&self, tid: u32) -> Option<[u32; 3]> {
        self.triangles
            .get(tid as usize)
            .copied()
            .filter(|tri| tri[0] != UNSET)
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.triangles.clear();
    }

    fn reset_triangle(&mut self, tid: usize) {
        if tid < self.triangles.len() {
            self.triangles[tid] = [UNSET; 3];
        }
    }

    fn reverse_triangle(&mut self, tid: usize) {
        if let Some(tri) = self.triangles.get_mut(tid) {
            tri.swap(1, 2);
        }
    }
}

/// The overlays a [`DynamicMesh`] may carry.
#[derive(Clone, Debug, Default)]
pub struct MeshOverlays {
    /// Per-corner normals.
    pub normals: Option<Overlay<Vector<Real>>>,
    /// Per-corner tangent frames (tangent, bitangent), sharing element ids.
    pub tangents: Option<[Overlay<Vector<Real>>; 2]>,
    /// Per-corner UV coordinates, one overlay per channel.
    pub uvs: Vec<Overlay<Point2<Real>>>,
}

impl MeshOverlays {
    /// Does this mesh carry at least one overlay?
    pub fn is_empty(&self) -> bool {
        self.normals.is_none() && self.tangents.is_none() && self.uvs.is_empty()
    }

    fn for_each_vector_overlay(&mut self, mut f: impl FnMut(&mut Overlay<Vector<Real>>)) {
        if let Some(normals) = &mut self.normals {
            f(normals);
        }
        if let Some(tangents) = &mut self.tangents {
            tangents.iter_mut().for_each(&mut f);
        }
    }

    pub(crate) fn reset_triangle(&mut self, tid: usize) {
        self.for_each_vector_overlay(|o| o.reset_triangle(tid));
        self.uvs.iter_mut().for_each(|o| o.reset_triangle(tid));
    }

    pub(crate) fn reverse_triangle(&mut self, tid: usize) {
        self.for_each_vector_overlay(|o| o.reverse_triangle(tid));
        self.uvs.iter_mut().for_each(|o| o.reverse_triangle(tid));
    }

    pub(crate) fn negate_normals(&mut self) {
        if let Some(normals) = &mut self.normals {
            normals.elements.iter_mut().for_each(|n| *n = -*n);
        }
    }
}

fn corner_element<T: Copy>(
    mesh: &DynamicMesh,
    overlay: &Overlay<T>,
    vid: u32,
    tid: u32,
) -> Option<u32> {
    let k = mesh.triangle(tid).iter().position(|v| *v == vid)?;
    overlay.triangle(tid).map(|elts| elts[k])
}

impl DynamicMesh {
    fn split_overlay_seams<T: Copy>(
        &mut self,
        overlay: &Overlay<T>,
        same: impl Fn(&T, &T) -> bool,
    ) {
        for vid in 0..self.max_vertex_id() {
            if !self.is_vertex(vid) {
                continue;
            }

            for group in contiguous_fan_groups(self, vid, |_, _| true) {
                let Some(eid0) = corner_element(self, overlay, vid, group.triangles[0]) else {
                    continue;
                };

                let mut last_eid = eid0;
                let mut last_value = overlay.element(eid0);
                let mut past_first_run = false;
                let mut to_split = vec![];

                for &tid in &group.triangles[1..] {
                    let Some(eid) = corner_element(self, overlay, vid, tid) else {
                        continue;
                    };
                    let value = overlay.element(eid);

                    if eid != last_eid && !same(&value, &last_value) {
                        if !to_split.is_empty() {
                            let _ = self.split_vertex(vid, &to_split);
                            to_split.clear();
                        }
                        last_eid = eid;
                        last_value = value;
                        past_first_run = true;
                    }

                    if past_first_run {
                        to_split.push(tid);
                    }
                }

                // The last run joins the first one if the fan is closed and they match.
                if past_first_run && !to_split.is_empty() && (!group.is_loop || last_eid != eid0) {
                    let _ = self.split_vertex(vid, &to_split);
                }
            }
        }
    }

    /// Duplicates vertices wherever their incident triangles disagree on overlay elements, then
    /// splits bowtie vertices, and finally copies the overlay values to the per-vertex attributes.
    ///
    /// After this, dropping the overlays loses no information.
    pub fn split_overlay_attributes_to_per_vertex(
        &mut self,
        split_uvs: bool,
        split_normals_tangents: bool,
    ) {
        let overlays = self.overlays.clone();
        let num_uv_layers = self.num_enabled_uv_channels().min(overlays.uvs.len());
        let close_vectors = |a: &Vector<Real>, b: &Vector<Real>| (a - b).amax() <= ZERO_TOLERANCE;
        let close_points = |a: &Point2<Real>, b: &Point2<Real>| (a - b).amax() <= ZERO_TOLERANCE;

        if split_uvs {
            for overlay in &overlays.uvs[..num_uv_layers] {
                self.split_overlay_seams(overlay, close_points);
            }
        }

        if split_normals_tangents {
            if let Some(normals) = &overlays.normals {
                self.split_overlay_seams(normals, close_vectors);
            }
            if let Some(tangents) = &overlays.tangents {
                for overlay in tangents {
                    self.split_overlay_seams(overlay, close_vectors);
                }
            }
        }

        let _ = self.split_bowties();

        // Copy the corner values back to the (now split) vertices.
        let tids: Vec<_> = self.triangle_ids().collect();
        for tid in tids {
            let tri = self.triangle(tid);
            for k in 0..3 {
                let vid = tri[k];

                for (channel, overlay) in overlays.uvs[..num_uv_layers].iter().enumerate() {
                    if let Some(elts) = overlay.triangle(tid) {
                        self.set_uv(vid, overlay.element(elts[k]), channel);
                    }
                }

                if self.attributes.has_normals() {
                    if let Some(elts) = overlays.normals.as_ref().and_then(|o| o.triangle(tid)) {
                        let normal = overlays.normals.as_ref().map(|o| o.element(elts[k]));
                        self.set_vertex_normal(vid, normal.unwrap_or_else(Vector::z));
                    }
                }

                if self.is_augmented() {
                    if let Some([tu, tv]) = &overlays.tangents {
                        if let (Some(eu), Some(ev)) = (tu.triangle(tid), tv.triangle(tid)) {
                            self.set_tangent(vid, tu.element(eu[k]), tv.element(ev[k]));
                        }
                    }
                }
            }
        }
    }

    /// Rebuilds the UV overlays from the per-vertex UV channels `first_channel..first_channel +
    /// num_layers`, with one element per vertex.
    pub fn initialize_overlay_to_per_vertex_uvs(
        &mut self,
        num_layers: usize,
        first_channel: usize,
    ) {
        let mut uvs = vec![];

        for layer in 0..num_layers {
            let mut overlay = Overlay::new();
            let mut vmap = vec![UNSET; self.max_vertex_id() as usize];

            for vid in self.vertex_ids() {
                vmap[vid as usize] = overlay.append_element(self.uv(vid, layer + first_channel));
            }
            for tid in self.triangle_ids() {
                overlay.set_triangle(tid, self.triangle(tid).map(|vid| vmap[vid as usize]));
            }

            uvs.push(overlay);
        }

        self.overlays.uvs = uvs;
    }

    /// Rebuilds the normal overlay from the per-vertex normals, with one element per vertex.
    pub fn initialize_overlay_to_per_vertex_normals(&mut self) {
        let mut overlay = self.overlays.normals.take().unwrap_or_default();
        overlay.clear();
        let mut vmap = vec![UNSET; self.max_vertex_id() as usize];

        for vid in self.vertex_ids() {
            vmap[vid as usize] = overlay.append_element(self.vertex_normal(vid));
        }
        for tid in self.triangle_ids() {
            overlay.set_triangle(tid, self.triangle(tid).map(|vid| vmap[vid as usize]));
        }

        self.overlays.normals = Some(overlay);
    }

    /// Rebuilds the tangent overlays from the per-vertex tangent frames, with one element per
    /// vertex.
    pub fn initialize_overlay_to_per_vertex_tangents(&mut self) {
        let mut tangents = [Overlay::new(), Overlay::new()];
        let mut vmap = vec![UNSET; self.max_vertex_id() as usize];

        for vid in self.vertex_ids() {
            let (u, v) = self.tangent(vid);
            let eid = tangents[0].append_element(u);
            let _ = tangents[1].append_element(v);
            vmap[vid as usize] = eid;
        }
        for tid in self.triangle_ids() {
            let elts = self.triangle(tid).map(|vid| vmap[vid as usize]);
            tangents[0].set_triangle(tid, elts);
            tangents[1].set_triangle(tid, elts);
        }

        self.overlays.tangents = Some(tangents);
    }
}

#[cfg(test)]
mod test {
    use super::Overlay;
    use crate::math::{Point, Vector};
    use crate::mesh::DynamicMesh;
    use na::Point2;

    // Two triangles sharing the edge (1, 2), forming a quad.
    fn quad() -> DynamicMesh {
        let vertices = [
            Point::origin(),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
        ];
        let mut mesh = DynamicMesh::from_buffers(&vertices, &[[0, 1, 2], [2, 1, 3]]).unwrap();
        mesh.augment(1);
        mesh
    }

    #[test]
    fn uv_seam_is_split() {
        let mut mesh = quad();
        let mut uvs = Overlay::new();
        let e: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0], [6.0, 5.0], [5.0, 6.0]]
            .into_iter()
            .map(|uv| uvs.append_element(Point2::from(uv)))
            .collect();
        uvs.set_triangle(0, [e[0], e[1], e[2]]);
        uvs.set_triangle(1, [e[5], e[4], e[3]]);
        mesh.overlays_mut().uvs.push(uvs);

        mesh.split_overlay_attributes_to_per_vertex(true, true);

        // The shared vertices 1 and 2 are duplicated.
        assert_eq!(mesh.vertex_count(), 6);
        for tid in mesh.triangle_ids() {
            for vid in mesh.triangle(tid) {
                let uv = mesh.uv(vid, 0);
                if tid == 0 {
                    assert!(uv.x <= 1.0);
                } else {
                    assert!(uv.x >= 5.0);
                }
            }
        }
    }

    #[test]
    fn matching_elements_are_not_split() {
        let mut mesh = quad();
        let mut normals = Overlay::new();
        let a = normals.append_element(Vector::z());
        let b = normals.append_element(Vector::z());
        normals.set_triangle(0, [a, a, a]);
        normals.set_triangle(1, [b, b, b]);
        mesh.overlays_mut().normals = Some(normals);

        mesh.split_overlay_attributes_to_per_vertex(true, true);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn per_vertex_overlays() {
        let mut mesh = quad();
        mesh.set_uv(3, Point2::new(1.0, 1.0), 0);
        mesh.initialize_overlay_to_per_vertex_uvs(1, 0);
        mesh.initialize_overlay_to_per_vertex_normals();
        mesh.initialize_overlay_to_per_vertex_tangents();

        let overlay = &mesh.overlays().uvs[0];
        let elts = overlay.triangle(1).unwrap();
        assert_eq!(overlay.element(elts[2]), Point2::new(1.0, 1.0));
        assert_eq!(mesh.overlays().normals.as_ref().unwrap().elements().len(), 4);
    }
}
