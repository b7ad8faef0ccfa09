use crate::collection::{GeometryCollection, GeometryIndex};
use crate::math::Real;
use crate::transformation::NoiseSettings;
use crate::utils::hashmap::HashMap;
use std::ops::Range;

/// Settings of the surfaces created inside of the cut pieces.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct InternalSurfaceMaterials {
    /// The material of the internal surfaces.
    pub global_material_id: i32,
    /// The number of UV units per world unit on the internal surfaces.
    pub global_uv_scale: Real,
    /// Whether the internal surfaces are visible.
    pub global_visibility: bool,
    /// Displacement applied to the internal surfaces. Flat surfaces if `None`.
    pub noise: Option<NoiseSettings>,
}

impl Default for InternalSurfaceMaterials {
    fn default() -> Self {
        Self {
            global_material_id: 0,
            global_uv_scale: 1.0,
            global_visibility: true,
            noise: None,
        }
    }
}

fn face_range(collection: &GeometryCollection, geometry: Option<GeometryIndex>) -> Range<usize> {
    match geometry {
        Some(geometry) => collection.face_range(geometry),
        None => 0..collection.indices.len(),
    }
}

impl InternalSurfaceMaterials {
    /// The internal material matching the most common material of `geometry`, or of the whole
    /// collection if `geometry` is `None`.
    ///
    /// Materials come in pairs: the external material `2k` goes with the internal material
    /// `2k + 1`. Without faces, the internal material is 1.
    pub fn default_material_id_for_geometry(
        &self,
        collection: &GeometryCollection,
        geometry: Option<GeometryIndex>,
    ) -> i32 {
        let mut counts: HashMap<i32, usize> = HashMap::default();
        let mut max_count = 0;
        let mut most_common = 0;

        for material in &collection.material_id[face_range(collection, geometry)] {
            let count = counts.entry(*material).or_insert(0);
            *count += 1;

            if *count > max_count {
                max_count = *count;
                most_common = *material;
            }
        }

        if most_common % 2 == 0 {
            most_common + 1
        } else {
            most_common
        }
    }

    /// Sets [`Self::global_uv_scale`] to the ratio between the UV and world lengths of the edges
    /// of `geometry`, or of the whole collection if `geometry` is `None`.
    ///
    /// Only the first UV channel is considered. Falls back to 1 if the ratio is not positive.
    pub fn set_uv_scale_from_collection(
        &mut self,
        collection: &GeometryCollection,
        geometry: Option<GeometryIndex>,
    ) {
        let mut uv_distance = 0.0;
        let mut world_distance = 0.0;

        if let Some(uvs) = collection.uvs.first() {
            for face in &collection.indices[face_range(collection, geometry)] {
                for k in 0..3 {
                    let a = face[k] as usize;
                    let b = face[(k + 1) % 3] as usize;
                    world_distance += na::distance(&collection.vertex[a], &collection.vertex[b]);
                    uv_distance += na::distance(&uvs[a], &uvs[b]);
                }
            }
        }

        if world_distance > 0.0 {
            self.global_uv_scale = uv_distance / world_distance;
        }
        if self.global_uv_scale <= 0.0 {
            self.global_uv_scale = 1.0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::InternalSurfaceMaterials;
    use crate::collection::GeometryCollection;
    use crate::math::{Isometry, Point, Point2};

    fn quad_collection() -> GeometryCollection {
        let vertices = [
            Point::origin(),
            Point::new(2.0, 0.0, 0.0),
            Point::new(2.0, 2.0, 0.0),
            Point::new(0.0, 2.0, 0.0),
        ];
        let mut collection = GeometryCollection::new();
        let _ = collection.append_rigid_mesh(
            &vertices,
            &[[0, 1, 2], [0, 2, 3]],
            Isometry::identity(),
            "quad",
        );
        let _ = collection.append_rigid_mesh(&vertices, &[], Isometry::identity(), "empty");
        collection
    }

    #[test]
    fn default_material_ids() {
        let materials = InternalSurfaceMaterials::default();
        let mut collection = quad_collection();
        assert_eq!(
            materials.default_material_id_for_geometry(&collection, Some(0)),
            1
        );
        assert_eq!(
            materials.default_material_id_for_geometry(&collection, Some(1)),
            1
        );

        collection.material_id = vec![4, 4];
        assert_eq!(materials.default_material_id_for_geometry(&collection, None), 5);
        collection.material_id = vec![3, 2];
        assert_eq!(materials.default_material_id_for_geometry(&collection, None), 3);
    }

    #[test]
    fn uv_scale_default() {
        let mut materials = InternalSurfaceMaterials {
            global_uv_scale: 0.0,
            ..Default::default()
        };
        let mut collection = quad_collection();

        // All UVs are zero.
        materials.set_uv_scale_from_collection(&collection, Some(0));
        assert_eq!(materials.global_uv_scale, 1.0);

        // No faces: the previous scale is kept.
        materials.global_uv_scale = 3.0;
        materials.set_uv_scale_from_collection(&collection, Some(1));
        assert_eq!(materials.global_uv_scale, 3.0);

        for (vtx, uv) in collection.vertex.iter().zip(collection.uvs[0].iter_mut()) {
            *uv = Point2::new(vtx.x * 0.25, vtx.y * 0.25);
        }
        materials.set_uv_scale_from_collection(&collection, None);
        assert_relative_eq!(materials.global_uv_scale, 0.25, epsilon = 1.0e-12);
    }
}
