use super::active_triangles::{is_triangle_active, UseMaterials};
use super::check_uv_channel;
use crate::collection::GeometryCollection;
use crate::conversion::DynamicMeshCollection;
use crate::fracture::FractureError;
use crate::math::{Isometry, Point, Point2, Real, Vector, SMALL_NUMBER};
use crate::mesh::DynamicMesh;
use crate::utils::hashmap::{HashMap, HashSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sets the UVs of the selected faces of every piece from a box projection.
///
/// Each face is projected along the coordinate axis closest to its normal, in the frame of the
/// root of the collection, and its coordinates are divided by `box_dimensions`. Faces projected
/// along the same axis and sharing vertices share UVs, so every projection direction forms its own
/// UV islands. Faces are selected as with [`set_active_triangles`](super::set_active_triangles),
/// with `activate_inside` set. Vertices are split along the new UV seams.
pub fn box_project_uvs(
    target_uv_channel: usize,
    collection: &mut GeometryCollection,
    box_dimensions: &Vector<Real>,
    pattern: UseMaterials,
    listed_materials: &[i32],
) -> Result<(), FractureError> {
    check_uv_channel(collection, target_uv_channel)?;

    let num_uv_layers = collection.num_uv_layers();
    let transforms = collection.transform_index.clone();
    let listed: HashSet<i32> = listed_materials.iter().copied().collect();
    let dimensions = box_dimensions.map(|d| if d.abs() > SMALL_NUMBER { d } else { 1.0 });
    let mut meshes =
        DynamicMeshCollection::new(collection, &transforms, &Isometry::identity(), false);

    for data in &mut meshes.meshes {
        let mesh = data.mesh_mut();
        mesh.initialize_overlay_to_per_vertex_normals();
        mesh.initialize_overlay_to_per_vertex_tangents();
        mesh.initialize_overlay_to_per_vertex_uvs(num_uv_layers, 0);

        let targets: Vec<u32> = mesh
            .triangle_ids()
            .filter(|tid| {
                is_triangle_active(
                    mesh.visibility(*tid),
                    mesh.material_id(*tid),
                    &listed,
                    true,
                    pattern,
                )
            })
            .collect();
        if targets.is_empty() {
            continue;
        }

        let projections = project_triangles(mesh, &targets, &dimensions);
        set_projected_uvs(mesh, target_uv_channel, &targets, &projections);
        mesh.split_overlay_attributes_to_per_vertex(true, true);
    }

    meshes.update_all_collections(collection)?;
    collection.reindex_materials();
    Ok(())
}

// The projection of a face: its direction (axis and sign) and the UV of each corner.
#[derive(Copy, Clone, Debug)]
struct BoxProjection {
    direction: usize,
    uvs: [Point2<Real>; 3],
}

fn project_triangles(
    mesh: &DynamicMesh,
    targets: &[u32],
    dimensions: &Vector<Real>,
) -> Vec<BoxProjection> {
    let project = |tid: &u32| {
        let normal = mesh.triangle_normal(*tid).map(|n| n.into_inner());
        let (axis, positive) = dominant_axis(&normal.unwrap_or_else(Vector::z));
        let uvs = mesh
            .triangle_points(*tid)
            .map(|pt| box_uv(&pt, axis, positive, dimensions));
        BoxProjection {
            direction: axis * 2 + positive as usize,
            uvs,
        }
    };

    #[cfg(feature = "parallel")]
    return targets.par_iter().map(project).collect();
    #[cfg(not(feature = "parallel"))]
    return targets.iter().map(project).collect();
}

fn dominant_axis(normal: &Vector<Real>) -> (usize, bool) {
    let axis = normal.iamax();
    (axis, normal[axis] >= 0.0)
}

// The UV frame of each face of the box is right-handed around its outward normal, so projected
// textures are not mirrored.
fn box_uv(
    pt: &Point<Real>,
    axis: usize,
    positive: bool,
    dimensions: &Vector<Real>,
) -> Point2<Real> {
    let (b, c) = ((axis + 1) % 3, (axis + 2) % 3);
    let u = pt[b] / dimensions[b];
    let v = pt[c] / dimensions[c];
    Point2::new(if positive { u } else { -u }, v)
}

fn set_projected_uvs(
    mesh: &mut DynamicMesh,
    channel: usize,
    targets: &[u32],
    projections: &[BoxProjection],
) {
    let triangles: Vec<[u32; 3]> = targets.iter().map(|tid| mesh.triangle(*tid)).collect();
    let overlay = &mut mesh.overlays_mut().uvs[channel];
    let mut elements: HashMap<(u32, usize), u32> = HashMap::default();

    for ((tid, tri), projection) in targets.iter().zip(triangles).zip(projections) {
        let mut corners = [0; 3];
        for k in 0..3 {
            let key = (tri[k], projection.direction);
            corners[k] = *elements
                .entry(key)
                .or_insert_with(|| overlay.append_element(projection.uvs[k]));
        }
        overlay.set_triangle(*tid, corners);
    }
}

#[cfg(test)]
mod test {
    use super::{box_uv, dominant_axis};
    use crate::math::{Point, Vector, Vector2};
    use crate::utils::orthonormal_basis;

    #[test]
    fn faces_are_projected_along_their_dominant_axis() {
        assert_eq!(dominant_axis(&Vector::new(0.1, -0.9, 0.3)), (1, false));
        assert_eq!(dominant_axis(&Vector::new(0.7, 0.1, -0.6)), (0, true));

        let dimensions = Vector::new(2.0, 4.0, 0.5);
        let pt = Point::new(1.0, 2.0, 0.25);
        assert_relative_eq!(box_uv(&pt, 2, true, &dimensions).coords, Vector2::new(0.5, 0.5));
        assert_relative_eq!(box_uv(&pt, 2, false, &dimensions).x, -0.5);
        assert_relative_eq!(box_uv(&pt, 0, true, &dimensions).coords.x, 0.5);
        assert_relative_eq!(box_uv(&pt, 0, true, &dimensions).coords.y, 0.5);
    }

    #[test]
    fn projection_frames_are_not_mirrored() {
        let dimensions = Vector::repeat(1.0);
        for axis in 0..3 {
            for positive in [true, false] {
                let mut normal = Vector::zeros();
                normal[axis] = if positive { 1.0 } else { -1.0 };
                let [u, v] = orthonormal_basis(&normal);
                let o = Point::origin();
                let uv_u = box_uv(&(o + u), axis, positive, &dimensions).coords;
                let uv_v = box_uv(&(o + v), axis, positive, &dimensions).coords;
                // The projection of a right-handed tangent frame stays counterclockwise.
                assert!(uv_u.perp(&uv_v) > 0.0);
            }
        }
    }
}
