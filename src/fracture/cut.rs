use super::cut_cells::DOMAIN_MARGIN;
use super::{CutFlags, CutOptions, FractureError};
use crate::cell_meshes::CellMeshes;
use crate::cells::{InternalSurfaceMaterials, PlanarCells, Plane};
use crate::collection::{GeometryCollection, GeometryIndex, TransformIndex};
use crate::conversion::DynamicMeshCollection;
use crate::math::{Isometry, Real, Vector};
use crate::mesh::{compute_tangents, initialize_overlay_to_crease_normals, DynamicMesh};

// Faces of a cutter without normals meeting at a sharper angle get separate normals.
const CUTTER_CREASE_ANGLE: Real = core::f64::consts::FRAC_PI_4;

// Tracks proximity and infers the UV scale of the internal surfaces if requested.
fn prepare_collection(
    collection: &mut GeometryCollection,
    materials: &mut InternalSurfaceMaterials,
    options: &CutOptions,
) {
    let _ = collection.ensure_proximity();
    if options
        .flags
        .contains(CutFlags::DEFAULT_INTERNAL_MATERIALS_FROM_COLLECTION)
    {
        materials.set_uv_scale_from_collection(collection, None);
    }
}

// Whether `mesh` carries unit normals, per corner or per vertex.
fn has_valid_normals(mesh: &DynamicMesh) -> bool {
    let is_unit = |n: &Vector<Real>| (n.norm_squared() - 1.0).abs() <= 1.0e-3;
    match &mesh.overlays().normals {
        Some(normals) => normals.elements().iter().all(is_unit),
        None => {
            mesh.attributes().has_normals()
                && mesh.vertex_ids().all(|vid| is_unit(&mesh.vertex_normal(vid)))
        }
    }
}

/// Cuts the geometry of the transform `transform` by the cells of `cells`.
///
/// See [`cut_multiple_with_planar_cells`].
pub fn cut_with_planar_cells(
    cells: &PlanarCells,
    collection: &mut GeometryCollection,
    transform: TransformIndex,
    options: &CutOptions,
) -> Result<Option<GeometryIndex>, FractureError> {
    cut_multiple_with_planar_cells(cells, collection, &[transform], options)
}

/// Cuts the geometry of `transforms` by the cells of `cells`.
///
/// The cells are expressed in the frame mapped from the root of the collection by
/// `options.collection_to_world`. Each piece that ends up in at least two cells is replaced by
/// one child piece per cell and connected component, linked to its neighbors in the proximity
/// graph of the collection. Pieces in the outside cell are kept too if
/// [`CutFlags::INCLUDE_OUTSIDE_CELL`] is set.
///
/// Returns the first new geometry, or `None` if nothing was cut.
pub fn cut_multiple_with_planar_cells(
    cells: &PlanarCells,
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
    options: &CutOptions,
) -> Result<Option<GeometryIndex>, FractureError> {
    let mut cells = cells.clone();
    prepare_collection(collection, &mut cells.internal_surface_materials, options);

    let meshes =
        DynamicMeshCollection::new(collection, transforms, &options.collection_to_world, false);
    if meshes.meshes.is_empty() {
        return Ok(None);
    }

    let cell_meshes = CellMeshes::new(
        collection.num_uv_layers(),
        &cells,
        &meshes.bounds,
        options.grout,
        meshes.bounds.max_dim() * DOMAIN_MARGIN,
        options.flags.contains(CutFlags::INCLUDE_OUTSIDE_CELL),
    )?;

    let result = meshes.cut_with_cell_meshes(
        &cells.internal_surface_materials,
        &cells.plane_cells,
        &cell_meshes,
        collection,
        options,
    );
    collection.reindex_materials();
    Ok(result)
}

/// Cuts the geometry of `transforms` by each of `planes` in turn.
///
/// Each plane also cuts the pieces created by the previous ones. With a positive
/// `options.grout`, a slab of that width is removed around every plane instead, and the pieces
/// left between the slabs don't touch each other.
///
/// Returns the first new geometry, or `None` if nothing was cut.
pub fn cut_multiple_with_multiple_planes(
    planes: &[Plane],
    internal_materials: &InternalSurfaceMaterials,
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
    options: &CutOptions,
) -> Result<Option<GeometryIndex>, FractureError> {
    let mut materials = internal_materials.clone();
    prepare_collection(collection, &mut materials, options);

    let meshes =
        DynamicMeshCollection::new(collection, transforms, &options.collection_to_world, false);
    if meshes.meshes.is_empty() {
        return Ok(None);
    }

    let result = meshes.cut_with_multiple_planes(planes, &materials, collection, options)?;
    collection.reindex_materials();
    Ok(result)
}

/// Cuts the geometry of `transforms` by a closed mesh.
///
/// `cutter` is placed by `cutter_transform` in the frame of the cut. Each piece is split into
/// its parts inside and outside of the cutter. Seams of the overlays of `cutter` are split into
/// per-vertex attributes first, and all its triangles become internal surfaces. A cutter without
/// normals gets face normals split at sharp edges, and tangents are computed if it has none.
/// Noise isn't supported on mesh cutters.
///
/// Returns the first new geometry, or `None` if nothing was cut.
pub fn cut_with_mesh(
    cutter: &DynamicMesh,
    cutter_transform: &Isometry<Real>,
    internal_materials: &InternalSurfaceMaterials,
    collection: &mut GeometryCollection,
    transforms: &[TransformIndex],
    options: &CutOptions,
) -> Result<Option<GeometryIndex>, FractureError> {
    let num_uv_layers = collection.num_uv_layers();
    let mut cutter = cutter.clone();
    let valid_normals = has_valid_normals(&cutter);
    let valid_tangents = cutter.overlays().tangents.is_some() || cutter.attributes().has_tangents();
    if !cutter.is_augmented() {
        cutter.augment(num_uv_layers);
    }
    if !valid_normals {
        initialize_overlay_to_crease_normals(&mut cutter, CUTTER_CREASE_ANGLE);
    }
    cutter.split_overlay_attributes_to_per_vertex(true, true);
    if !valid_normals || !valid_tangents {
        compute_tangents(&mut cutter, false, &[], false);
    }

    let tids: Vec<_> = cutter.triangle_ids().collect();
    for tid in tids {
        cutter.set_material_id(tid, -1);
        cutter.set_visibility(tid, internal_materials.global_visibility);
    }

    if internal_materials.noise.is_some() {
        log::warn!("Noise is not supported when cutting with a mesh, ignoring it.");
    }

    let mut materials = internal_materials.clone();
    prepare_collection(collection, &mut materials, options);

    let meshes =
        DynamicMeshCollection::new(collection, transforms, &options.collection_to_world, false);
    if meshes.meshes.is_empty() {
        return Ok(None);
    }

    let cell_meshes = CellMeshes::from_cutter(num_uv_layers, cutter, Some(cutter_transform));
    let result = meshes.cut_with_cell_meshes(
        &materials,
        &[(0, None)],
        &cell_meshes,
        collection,
        options,
    );
    collection.reindex_materials();
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::{cut_multiple_with_multiple_planes, cut_with_mesh, cut_with_planar_cells};
    use crate::bounding_volume::Aabb;
    use crate::cells::{InternalSurfaceMaterials, PlanarCells, Plane};
    use crate::collection::{GeometryCollection, Group, SimulationType};
    use crate::fracture::{CutFlags, CutOptions, SupersededGeometry};
    use crate::math::{Isometry, Point, Real, Vector};
    use crate::mesh::DynamicMesh;

    fn unit_cube() -> GeometryCollection {
        let cube = DynamicMesh::from_aabb(&Aabb::new(
            Point::new(-0.5, -0.5, -0.5),
            Point::new(0.5, 0.5, 0.5),
        ));
        let (vertices, indices) = cube.to_buffers();
        let mut collection = GeometryCollection::new();
        let _ = collection.append_rigid_mesh(&vertices, &indices, Isometry::identity(), "cube");
        collection
    }

    fn geometry_volume(collection: &GeometryCollection, geometry: usize) -> Real {
        collection
            .face_range(geometry)
            .map(|face| {
                let [a, b, c] = collection.indices[face].map(|v| collection.vertex[v as usize]);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    #[test]
    fn plane_through_cube_makes_two_linked_halves() {
        let mut collection = unit_cube();
        let cells = PlanarCells::from_plane(Plane::new(Vector::z(), 0.0));
        let first = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(collection.num_elements(Group::Geometry), 3);
        assert_eq!(collection.simulation_type[0], SimulationType::Clustered);
        assert!(collection.visible[collection.face_range(0)].iter().all(|v| !v));

        for geometry in [1, 2] {
            assert_relative_eq!(geometry_volume(&collection, geometry), 0.5, epsilon = 1.0e-6);
            assert_eq!(collection.parent[collection.transform_index[geometry]], Some(0));
        }

        let proximity = collection.proximity.as_ref().unwrap();
        assert!(proximity[1].contains(&2));
        assert!(proximity[2].contains(&1));
        collection.validate().unwrap();
    }

    #[test]
    fn missed_plane_cuts_nothing() {
        let mut collection = unit_cube();
        let cells = PlanarCells::from_plane(Plane::new(Vector::z(), 2.0));
        let result = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default());

        assert_eq!(result, Ok(None));
        assert_eq!(collection.num_elements(Group::Geometry), 1);
        assert!(collection.visible.iter().all(|v| *v));
    }

    #[test]
    fn removed_geometry_shifts_first_index() {
        let mut collection = unit_cube();
        let cells = PlanarCells::from_plane(Plane::new(Vector::x(), 0.1));
        let options = CutOptions {
            superseded_geometry: SupersededGeometry::Remove,
            ..CutOptions::default()
        };
        let first = cut_with_planar_cells(&cells, &mut collection, 0, &options).unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(collection.num_elements(Group::Geometry), 2);
        assert_eq!(collection.transform_to_geometry_index[0], None);
        let total = geometry_volume(&collection, 0) + geometry_volume(&collection, 1);
        assert_relative_eq!(total, 1.0, epsilon = 1.0e-6);
        collection.validate().unwrap();
    }

    #[test]
    fn internal_material_comes_from_the_collection() {
        let mut collection = unit_cube();
        collection.material_id.fill(4);
        let cells = PlanarCells::from_plane(Plane::new(Vector::y(), 0.0));
        let _ = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();

        let new_faces = collection.face_start[1]..collection.indices.len();
        assert!(collection.material_id[new_faces.clone()].contains(&5));
        assert!(collection.material_id[new_faces].iter().all(|m| *m == 4 || *m == 5));

        let mut collection = unit_cube();
        let options = CutOptions {
            flags: CutFlags::empty(),
            ..CutOptions::default()
        };
        let mut cells = PlanarCells::from_plane(Plane::new(Vector::y(), 0.0));
        cells.internal_surface_materials.global_material_id = 9;
        let _ = cut_with_planar_cells(&cells, &mut collection, 0, &options).unwrap();
        assert!(collection.material_id.contains(&9));
    }

    #[test]
    fn multiple_planes_cut_the_pieces_of_previous_planes() {
        let mut collection = unit_cube();
        let planes = [
            Plane::new(Vector::x(), 0.0),
            Plane::new(Vector::y(), 0.0),
        ];
        let first = cut_multiple_with_multiple_planes(
            &planes,
            &InternalSurfaceMaterials::default(),
            &mut collection,
            &[0],
            &CutOptions::default(),
        )
        .unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(collection.num_elements(Group::Geometry), 5);
        for geometry in 1..5 {
            assert_relative_eq!(geometry_volume(&collection, geometry), 0.25, epsilon = 1.0e-6);
        }

        // Quarters share a face with two others and an edge with the diagonal one.
        let proximity = collection.proximity.as_ref().unwrap();
        for geometry in 1..5 {
            assert!(proximity[geometry].len() >= 2);
        }
        collection.validate().unwrap();
    }

    #[test]
    fn mesh_cutter_splits_inside_and_outside() {
        let mut collection = unit_cube();
        let cutter = DynamicMesh::from_aabb(&Aabb::new(
            Point::new(0.0, -1.0, -1.0),
            Point::new(1.0, 1.0, 1.0),
        ));
        let first = cut_with_mesh(
            &cutter,
            &Isometry::identity(),
            &InternalSurfaceMaterials::default(),
            &mut collection,
            &[0],
            &CutOptions::default(),
        )
        .unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(collection.num_elements(Group::Geometry), 3);
        for geometry in [1, 2] {
            assert_relative_eq!(geometry_volume(&collection, geometry), 0.5, epsilon = 1.0e-6);
        }
        assert!(collection.proximity.as_ref().unwrap()[1].contains(&2));
    }

    #[test]
    fn mesh_cutter_faces_get_face_normals() {
        let mut collection = unit_cube();
        let cutter = DynamicMesh::from_aabb(&Aabb::new(
            Point::new(0.0, -1.0, -1.0),
            Point::new(1.0, 1.0, 1.0),
        ));
        let _ = cut_with_mesh(
            &cutter,
            &Isometry::identity(),
            &InternalSurfaceMaterials::default(),
            &mut collection,
            &[0],
            &CutOptions::default(),
        )
        .unwrap();

        // The internal faces lie on x = 0, facing away from their piece.
        let mut num_internal = 0;
        for geometry in [1, 2] {
            let range = collection.vertex_range(geometry);
            let center_x: Real = collection.vertex[range.clone()].iter().map(|p| p.x).sum::<Real>()
                / range.len() as Real;
            let sign = -center_x.signum();

            for face in collection.face_range(geometry) {
                let tri = collection.indices[face];
                if tri.iter().all(|v| collection.vertex[*v as usize].x.abs() < 1.0e-9) {
                    num_internal += 1;
                    for v in tri {
                        let normal = collection.normal[v as usize];
                        assert_relative_eq!(normal, Vector::x() * sign, epsilon = 1.0e-6);
                    }
                }
            }
        }
        assert!(num_internal >= 4);
    }
}
