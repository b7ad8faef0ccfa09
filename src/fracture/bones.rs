use super::{MergeBonesOptions, NeighborSelectionMethod};
use crate::collection::{CollectionError, GeometryCollection, GeometryIndex, Group, TransformIndex};
use crate::conversion::DynamicMeshCollection;
use crate::math::{Isometry, Point, Real, SMALL_NUMBER};
use crate::transformation::{mesh_boolean, BooleanOp};
use crate::utils::hashmap::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

fn all_transforms_if_empty(
    collection: &GeometryCollection,
    transforms: &[TransformIndex],
) -> Vec<TransformIndex> {
    if transforms.is_empty() {
        (0..collection.num_elements(Group::Transform)).collect()
    } else {
        transforms.to_vec()
    }
}

// The volume of the geometry of `transform`, in its global frame scaled by `scale`.
fn bone_volume(collection: &GeometryCollection, transform: TransformIndex, scale: Real) -> Real {
    let Some(geometry) = collection.transform_to_geometry_index[transform] else {
        return 0.0;
    };

    let vertices = collection.vertex_range(geometry);
    if vertices.is_empty() {
        return 0.0;
    }

    let global = collection.global_transform(transform);
    let points: Vec<Point<Real>> = collection.vertex[vertices.clone()]
        .iter()
        .map(|pt| global * pt)
        .collect();
    let center = points.iter().fold(Point::origin(), |acc, pt| acc + pt.coords)
        / points.len() as Real;

    let volume: Real = collection.indices[collection.face_range(geometry)]
        .iter()
        .map(|face| {
            let [a, b, c] = face.map(|v| (points[v as usize - vertices.start] - center) * scale);
            a.dot(&b.cross(&c))
        })
        .sum();

    volume / 6.0
}

/// The volume of the geometry of each of `transforms`, or of every transform if `transforms` is
/// empty.
///
/// Each geometry is placed by its global transform and scaled by `scale_per_dimension` about its
/// vertex centroid. Transforms without geometry have a zero volume.
pub fn find_bone_volumes(
    collection: &GeometryCollection,
    transforms: &[TransformIndex],
    scale_per_dimension: Real,
) -> Vec<Real> {
    let transforms = all_transforms_if_empty(collection, transforms);
    let volume = |t: &TransformIndex| bone_volume(collection, *t, scale_per_dimension);

    #[cfg(feature = "parallel")]
    return transforms.par_iter().map(volume).collect();
    #[cfg(not(feature = "parallel"))]
    return transforms.iter().map(volume).collect();
}

/// The transforms among `transforms` (or every transform if it is empty) that have a geometry
/// with a volume smaller than `min_volume`.
///
/// `volumes` gives the volume of each of these transforms, as computed by [`find_bone_volumes`].
pub fn find_small_bones(
    collection: &GeometryCollection,
    transforms: &[TransformIndex],
    volumes: &[Real],
    min_volume: Real,
) -> Vec<TransformIndex> {
    let transforms = all_transforms_if_empty(collection, transforms);
    assert_eq!(
        transforms.len(),
        volumes.len(),
        "There must be one volume per transform."
    );

    transforms
        .into_iter()
        .zip(volumes)
        .filter(|(t, volume)| {
            collection.transform_to_geometry_index[*t].is_some() && **volume < min_volume
        })
        .map(|(t, _)| t)
        .collect()
}

// Geometries merged together into one of them.
#[derive(Clone, Debug, Default)]
struct MergeGroup {
    merge_to: Option<GeometryIndex>,
    merge_target_volume: Real,
    total_volume: Real,
    // Set while every member of the group is too small: the target is then the largest of
    // them, and is listed in `to_remove` too.
    remove_merge_target: bool,
    to_remove: Vec<GeometryIndex>,
}

impl MergeGroup {
    fn new(
        volumes: &HashMap<GeometryIndex, Real>,
        min_volume: Real,
        small: GeometryIndex,
        big: GeometryIndex,
    ) -> Self {
        let big_volume = volumes[&big];
        let mut to_remove = vec![small];
        let remove_merge_target = big_volume < min_volume;
        if remove_merge_target {
            to_remove.push(big);
        }

        Self {
            merge_to: Some(big),
            merge_target_volume: big_volume,
            total_volume: big_volume + volumes[&small],
            remove_merge_target,
            to_remove,
        }
    }

    fn update_merge_target(&mut self, geometry: GeometryIndex, volume: Real) {
        if self.remove_merge_target && volume > self.merge_target_volume {
            self.merge_to = Some(geometry);
            self.merge_target_volume = volume;
        }
    }

    fn add_small(&mut self, volumes: &HashMap<GeometryIndex, Real>, small: GeometryIndex) {
        let volume = volumes[&small];
        self.total_volume += volume;
        self.update_merge_target(small, volume);
        self.to_remove.push(small);
    }

    fn add_big(
        &mut self,
        volumes: &HashMap<GeometryIndex, Real>,
        min_volume: Real,
        big: GeometryIndex,
    ) {
        let volume = volumes[&big];
        self.total_volume += volume;
        self.update_merge_target(big, volume);
        if volume < min_volume {
            self.to_remove.push(big);
        } else {
            self.remove_merge_target = false;
        }
    }

    // Moves every member of `other` into `self`, which has the index `self_id`.
    fn absorb(
        &mut self,
        other: MergeGroup,
        group_of: &mut HashMap<GeometryIndex, usize>,
        self_id: usize,
    ) {
        let target = other.merge_to.filter(|_| !other.remove_merge_target);

        for geometry in other.to_remove.into_iter().chain(target) {
            self.to_remove.push(geometry);
            let _ = group_of.insert(geometry, self_id);
        }
        self.total_volume += other.total_volume;
    }
}

/// Merges the geometry of the small transforms `small_transforms` into one of their neighbors in
/// the proximity graph.
///
/// `volumes` gives the volume of each of `transforms` (or of every transform if it is empty),
/// which are the transforms that can be merged together. Small pieces sharing a neighbor are
/// grouped until their group is large enough, and each group is merged into its largest member
/// (or into the neighbor it picked). The merged transforms are removed, and their children are
/// attached to the transform they were merged into.
pub fn merge_bones(
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
    volumes: &[Real],
    small_transforms: &[TransformIndex],
    options: &MergeBonesOptions,
) -> Result<(), CollectionError> {
    let transforms = all_transforms_if_empty(collection, transforms);
    assert_eq!(
        transforms.len(),
        volumes.len(),
        "There must be one volume per transform."
    );
    let min_volume = options.min_volume;
    let _ = collection.ensure_proximity();

    let mut geometry_volume: HashMap<GeometryIndex, Real> = HashMap::default();
    for (t, volume) in transforms.iter().zip(volumes) {
        if let Some(geometry) = collection.transform_to_geometry_index[*t] {
            let _ = geometry_volume.insert(geometry, *volume);
        }
    }

    let mut too_small = vec![];
    for t in small_transforms {
        match collection.transform_to_geometry_index[*t] {
            Some(geometry) if geometry_volume.contains_key(&geometry) => {
                if !too_small.contains(&geometry) {
                    too_small.push(geometry);
                }
            }
            _ => log::debug!("The transform {} has no geometry that can be merged.", t),
        }
    }

    let centers: Vec<Point<Real>> = (0..collection.num_elements(Group::Geometry))
        .map(|g| {
            let global = collection.global_transform(collection.transform_index[g]);
            global * collection.bounding_box[g].center()
        })
        .collect();
    let neighbor_score = |small: GeometryIndex, neighbor: GeometryIndex| match options
        .neighbor_selection
    {
        NeighborSelectionMethod::LargestNeighbor => geometry_volume[&neighbor],
        NeighborSelectionMethod::NearestCenter => {
            1.0 / (SMALL_NUMBER + na::distance_squared(&centers[neighbor], &centers[small]))
        }
    };

    let mut groups: Vec<MergeGroup> = vec![];
    let mut group_of: HashMap<GeometryIndex, usize> = HashMap::default();
    let proximity = collection.proximity.clone().unwrap_or_default();

    for small in too_small {
        let small_group = group_of.get(&small).copied();
        if small_group.is_some_and(|g| groups[g].total_volume >= min_volume) {
            continue;
        }

        let best = proximity[small]
            .iter()
            .filter(|n| **n != small && geometry_volume.contains_key(*n))
            .map(|n| (*n, neighbor_score(small, *n)))
            .fold(None, |best: Option<(usize, Real)>, (n, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((n, score)),
            });

        let Some((best, _)) = best else {
            log::warn!(
                "Couldn't merge the geometry {}: it has no neighbor in the proximity graph.",
                small
            );
            continue;
        };

        match (small_group, group_of.get(&best).copied()) {
            (Some(small_group), Some(big_group)) => {
                if small_group != big_group {
                    let absorbed = std::mem::take(&mut groups[small_group]);
                    groups[big_group].absorb(absorbed, &mut group_of, big_group);
                }
            }
            (Some(small_group), None) => {
                groups[small_group].add_big(&geometry_volume, min_volume, best);
                let _ = group_of.insert(best, small_group);
            }
            (None, Some(big_group)) => {
                groups[big_group].add_small(&geometry_volume, small);
                let _ = group_of.insert(small, big_group);
            }
            (None, None) => {
                let _ = group_of.insert(small, groups.len());
                let _ = group_of.insert(best, groups.len());
                groups.push(MergeGroup::new(&geometry_volume, min_volume, small, best));
            }
        }
    }

    // The target of a group is merged into, not removed.
    let groups: Vec<(GeometryIndex, Vec<GeometryIndex>)> = groups
        .into_iter()
        .filter_map(|group| {
            let target = group.merge_to?;
            let to_remove = group.to_remove.into_iter().filter(|g| *g != target).collect();
            Some((target, to_remove))
        })
        .collect();

    let mut removed_transforms: Vec<_> = groups
        .iter()
        .flat_map(|(_, to_remove)| to_remove.iter().map(|g| collection.transform_index[*g]))
        .collect();
    let mut updated_transforms: Vec<_> = groups
        .iter()
        .map(|(target, _)| collection.transform_index[*target])
        .collect();
    removed_transforms.sort_unstable();
    updated_transforms.sort_unstable();

    let identity = Isometry::identity();
    let removed_meshes =
        DynamicMeshCollection::new(collection, &removed_transforms, &identity, true);
    let mut updated_meshes =
        DynamicMeshCollection::new(collection, &updated_transforms, &identity, true);

    let mut mesh_of_geometry: HashMap<GeometryIndex, usize> = HashMap::default();
    for (id, data) in removed_meshes.meshes.iter().enumerate() {
        if let Some(geometry) = collection.transform_to_geometry_index[data.transform_index] {
            let _ = mesh_of_geometry.insert(geometry, id);
        }
    }
    let group_of_target: HashMap<GeometryIndex, usize> = groups
        .iter()
        .enumerate()
        .map(|(id, (target, _))| (*target, id))
        .collect();

    for data in &mut updated_meshes.meshes {
        let Some(group) = collection.transform_to_geometry_index[data.transform_index]
            .and_then(|g| group_of_target.get(&g))
        else {
            continue;
        };

        // Both meshes are expressed in the frame of the root of the collection.
        for removed in &groups[*group].1 {
            let Some(removed) = mesh_of_geometry.get(removed) else {
                continue;
            };
            let removed = removed_meshes.meshes[*removed].mesh();

            if options.union_meshes {
                match mesh_boolean(data.mesh(), removed, BooleanOp::Union) {
                    Ok(result) => data.set_mesh(result.mesh),
                    Err(err) => {
                        log::warn!("Failed to union merged pieces, appending them: {}", err);
                        let _ = data.mesh_mut().append_mesh(removed, false);
                    }
                }
            } else {
                let _ = data.mesh_mut().append_mesh(removed, false);
            }
        }
    }

    updated_meshes.update_all_collections(collection)?;

    for (target, to_remove) in &groups {
        // The merged piece touches everything its parts touched.
        for removed in to_remove {
            let neighbors = collection
                .proximity
                .as_ref()
                .map(|p| p[*removed].clone())
                .unwrap_or_default();
            for neighbor in neighbors {
                if neighbor != *target && !to_remove.contains(&neighbor) {
                    collection.link_proximity(*target, neighbor);
                }
            }
        }

        let target_transform = collection.transform_index[*target];
        let children: Vec<_> = to_remove
            .iter()
            .flat_map(|g| collection.children[collection.transform_index[*g]].iter().copied())
            .filter(|child| *child != target_transform)
            .collect();
        if !children.is_empty() {
            collection.reparent_transforms(target_transform, &children);
        }
    }

    collection.remove_transforms(&removed_transforms);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{find_bone_volumes, find_small_bones, merge_bones};
    use crate::bounding_volume::Aabb;
    use crate::collection::{GeometryCollection, Group};
    use crate::fracture::{MergeBonesOptions, NeighborSelectionMethod};
    use crate::math::{Isometry, Point};
    use crate::mesh::DynamicMesh;

    // A row of boxes along x, each touching the next one.
    fn row_of_boxes(widths: &[f64]) -> GeometryCollection {
        let mut collection = GeometryCollection::new();
        let mut x = 0.0;
        for (k, width) in widths.iter().enumerate() {
            let aabb = Aabb::new(Point::new(x, 0.0, 0.0), Point::new(x + width, 1.0, 1.0));
            let (vertices, indices) = DynamicMesh::from_aabb(&aabb).to_buffers();
            let _ = collection.append_rigid_mesh(
                &vertices,
                &indices,
                Isometry::identity(),
                &format!("box{}", k),
            );
            x += width;
        }

        let _ = collection.ensure_proximity();
        for k in 1..widths.len() {
            collection.link_proximity(k - 1, k);
        }
        collection
    }

    #[test]
    fn volumes_and_small_bones() {
        let mut collection = row_of_boxes(&[1.0, 0.1, 2.0]);
        collection.transform[2] = Isometry::translation(5.0, 0.0, 0.0);

        let volumes = find_bone_volumes(&collection, &[], 1.0);
        assert_eq!(volumes.len(), 3);
        assert_relative_eq!(volumes[0], 1.0, epsilon = 1.0e-9);
        assert_relative_eq!(volumes[1], 0.1, epsilon = 1.0e-9);
        assert_relative_eq!(volumes[2], 2.0, epsilon = 1.0e-9);

        let scaled = find_bone_volumes(&collection, &[2], 2.0);
        assert_relative_eq!(scaled[0], 16.0, epsilon = 1.0e-9);

        assert_eq!(find_small_bones(&collection, &[], &volumes, 0.5), vec![1]);
    }

    #[test]
    fn small_bone_merges_into_largest_neighbor() {
        let mut collection = row_of_boxes(&[1.0, 0.1, 2.0]);
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        let small = find_small_bones(&collection, &[], &volumes, 0.5);
        let options = MergeBonesOptions {
            min_volume: 0.5,
            union_meshes: false,
            ..MergeBonesOptions::default()
        };

        merge_bones(&mut collection, &[], &volumes, &small, &options).unwrap();

        assert_eq!(collection.num_elements(Group::Transform), 2);
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        assert_relative_eq!(volumes[0], 1.0, epsilon = 1.0e-9);
        assert_relative_eq!(volumes[1], 2.1, epsilon = 1.0e-9);
        assert_eq!(collection.bone_name[1], "box2");
        collection.validate().unwrap();
    }

    #[test]
    fn nearest_center_picks_the_closest_neighbor() {
        let mut collection = row_of_boxes(&[1.0, 0.1, 4.0]);
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        let options = MergeBonesOptions {
            min_volume: 0.5,
            union_meshes: false,
            neighbor_selection: NeighborSelectionMethod::NearestCenter,
        };

        merge_bones(&mut collection, &[], &volumes, &[1], &options).unwrap();

        assert_eq!(collection.num_elements(Group::Transform), 2);
        assert_eq!(collection.bone_name[0], "box0");
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        assert_relative_eq!(volumes[0], 1.1, epsilon = 1.0e-9);
        assert!(collection.proximity.as_ref().unwrap()[0].contains(&1));
    }

    #[test]
    fn small_neighbors_are_grouped() {
        let mut collection = row_of_boxes(&[0.1, 0.1, 3.0]);
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        let options = MergeBonesOptions {
            min_volume: 0.5,
            union_meshes: false,
            ..MergeBonesOptions::default()
        };

        merge_bones(&mut collection, &[], &volumes, &[0, 1], &options).unwrap();

        assert_eq!(collection.num_elements(Group::Transform), 1);
        let volumes = find_bone_volumes(&collection, &[], 1.0);
        assert_relative_eq!(volumes[0], 3.2, epsilon = 1.0e-9);
        assert_eq!(collection.vertex.len(), 24);
        assert!(collection.validate().is_ok());
    }
}
