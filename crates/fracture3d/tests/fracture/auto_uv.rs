use super::{cube_collection, new_pieces};
use fracture3d::cells::{PlanarCells, Plane};
use fracture3d::collection::GeometryCollection;
use fracture3d::fracture::{
    box_project_uvs, cut_with_planar_cells, set_active_triangles, texture_internal_surfaces,
    uv_layout, BakeAttribute, CutOptions, FractureError, TextureAttributeSettings, TextureImage,
    UseMaterials,
};
use fracture3d::math::{Point, Point2, Real, Vector};

// A unit cube cut in two halves by the plane z = 0.
fn cut_cube() -> GeometryCollection {
    let mut collection = cube_collection(0.5);
    let cells = PlanarCells::from_plane(Plane::new(Vector::z(), 0.0));
    let _ = cut_with_planar_cells(&cells, &mut collection, 0, &CutOptions::default()).unwrap();
    collection
}

fn global_vertex(collection: &GeometryCollection, vid: usize) -> Point<Real> {
    collection.global_transform(collection.bone_map[vid]) * collection.vertex[vid]
}

fn uv_triangle(collection: &GeometryCollection, fid: usize) -> [Point2<Real>; 3] {
    collection.indices[fid].map(|v| collection.uvs[0][v as usize])
}

// Do the two UV triangles overlap by more than a shared edge?
fn overlap(a: &[Point2<Real>; 3], b: &[Point2<Real>; 3]) -> bool {
    let separated_by_edge_of = |tri: &[Point2<Real>; 3], other: &[Point2<Real>; 3]| {
        let orientation = (tri[1] - tri[0]).perp(&(tri[2] - tri[0])).signum();
        (0..3).any(|k| {
            let (p, q) = (tri[k], tri[(k + 1) % 3]);
            other
                .iter()
                .all(|pt| (q - p).perp(&(pt - p)) * orientation <= 1.0e-9)
        })
    };
    !separated_by_edge_of(a, b) && !separated_by_edge_of(b, a)
}

#[test]
fn internal_faces_are_box_projected() {
    let mut collection = cut_cube();
    let num_faces = collection.indices.len();
    box_project_uvs(0, &mut collection, &Vector::repeat(2.0), UseMaterials::Odd, &[]).unwrap();
    collection.validate().unwrap();

    let (internal, num_internal) = set_active_triangles(&collection, true, UseMaterials::Odd, &[]);
    assert!(num_internal >= 4);
    assert!(collection.indices.len() >= num_faces);

    for (fid, tri) in collection.indices.iter().enumerate() {
        for vid in tri.map(|v| v as usize) {
            let uv = collection.uvs[0][vid];
            if !internal[fid] {
                // External faces keep the zero UVs of the original cube.
                if collection.visible[fid] {
                    assert_relative_eq!(uv, Point2::origin());
                }
                continue;
            }

            let pt = global_vertex(&collection, vid);
            assert_relative_eq!(pt.z, 0.0, epsilon = 1.0e-9);
            let to_root = collection.global_transform(collection.bone_map[vid]);
            let normal = to_root * collection.normal[vid];
            let u = if normal.z > 0.0 { pt.x } else { -pt.x };
            assert_relative_eq!(uv, Point2::new(u, pt.y) / 2.0, epsilon = 1.0e-9);
        }
    }
}

#[test]
fn layout_packs_islands_in_the_unit_square() {
    let mut collection = cut_cube();
    box_project_uvs(0, &mut collection, &Vector::repeat(1.0), UseMaterials::All, &[]).unwrap();
    uv_layout(0, &mut collection, 256, 2.0, UseMaterials::All, &[], false).unwrap();
    collection.validate().unwrap();

    let (active, _) = set_active_triangles(&collection, true, UseMaterials::All, &[]);
    let faces: Vec<usize> = (0..collection.indices.len()).filter(|f| active[*f]).collect();
    assert!(!faces.is_empty());

    let mut texel_ratio = None;
    for fid in &faces {
        let uv = uv_triangle(&collection, *fid);
        for pt in &uv {
            assert!(pt.x >= 0.0 && pt.x <= 1.0 && pt.y >= 0.0 && pt.y <= 1.0);
        }

        let [a, b, c] = collection.indices[*fid].map(|v| global_vertex(&collection, v as usize));
        let area = (b - a).cross(&(c - a)).norm();
        let uv_area = (uv[1] - uv[0]).perp(&(uv[2] - uv[0])).abs();
        if area > 1.0e-9 {
            let ratio = *texel_ratio.get_or_insert(uv_area / area);
            assert_relative_eq!(uv_area / area, ratio, max_relative = 1.0e-6);
        }
    }

    for (i, fi) in faces.iter().enumerate() {
        for fj in &faces[..i] {
            let (a, b) = (uv_triangle(&collection, *fi), uv_triangle(&collection, *fj));
            assert!(!overlap(&a, &b), "faces {} and {} overlap in UV space", fi, fj);
        }
    }
}

#[test]
fn internal_surfaces_are_baked() {
    let mut collection = cut_cube();
    box_project_uvs(0, &mut collection, &Vector::repeat(1.0), UseMaterials::Odd, &[]).unwrap();
    uv_layout(0, &mut collection, 64, 1.0, UseMaterials::Odd, &[], false).unwrap();

    let attributes = [
        BakeAttribute::DistanceToExternal,
        BakeAttribute::AmbientOcclusion,
        BakeAttribute::NormalZ,
        BakeAttribute::PositionX,
    ];
    let settings = TextureAttributeSettings {
        to_external_max_distance: 1.0,
        ao_rays: 8,
        ao_bias_angle_deg: 60.0,
        ..TextureAttributeSettings::default()
    };
    let mut texture = TextureImage::new(64, 64);
    texture_internal_surfaces(
        0,
        &collection,
        2,
        &attributes,
        &settings,
        &mut texture,
        UseMaterials::Odd,
        &[],
    )
    .unwrap();

    let baked: Vec<_> = texture.pixels().iter().filter(|p| p[1] != 0.0).collect();
    assert!(baked.len() > 100);
    for [distance, occlusion, normal_z, x] in baked {
        // The cut faces are at most half the cube away from the outside.
        assert!(*distance <= 0.5 + 1.0e-4);
        // Nothing of a piece is in front of its own cut face.
        assert_relative_eq!(*occlusion, 1.0);
        // Cut faces look straight up or down.
        assert!((normal_z - 0.5).abs() > 0.25);
        assert!((0.0..=1.0).contains(x));
    }

    let mut wrong_channel = TextureImage::new(4, 4);
    let err = texture_internal_surfaces(
        3,
        &collection,
        0,
        &attributes,
        &settings,
        &mut wrong_channel,
        UseMaterials::Odd,
        &[],
    );
    assert_eq!(
        err,
        Err(FractureError::InvalidUvChannel {
            channel: 3,
            num_channels: 1
        })
    );
    assert_eq!(new_pieces(&collection).len(), 2);
}
