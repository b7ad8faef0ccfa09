use crate::math::Real;
use crate::utils::{point_in_poly2d, to_spade_point};
use na::Point2;
use spade::{ConstrainedDelaunayTriangulation, Triangulation};

/// Constrained Delaunay triangulation of a simple polygon.
///
/// Returns triangles indexing `polygon`, counter-clockwise in the plane of the polygon whatever
/// the orientation of the polygon itself. Returns `None` if the polygon self-intersects (the
/// triangulation would need new vertices), or has repeated vertices.
pub fn triangulate_polygon_cdt(polygon: &[Point2<Real>]) -> Option<Vec<[u32; 3]>> {
    if polygon.len() < 3 {
        return None;
    }

    let mut cdt = ConstrainedDelaunayTriangulation::<spade::Point2<Real>>::new();
    let mut handles = Vec::with_capacity(polygon.len());

    for pt in polygon {
        handles.push(cdt.insert(to_spade_point(pt)).ok()?);
    }

    let mut handle_to_idx = vec![None; cdt.num_vertices()];
    for (i, handle) in handles.iter().enumerate() {
        if handle_to_idx[handle.index()].is_some() {
            // Two polygon vertices at the same position.
            return None;
        }
        handle_to_idx[handle.index()] = Some(i as u32);
    }

    for ia in 0..handles.len() {
        let ib = (ia + 1) % handles.len();
        let _ = cdt.add_constraint_and_split(handles[ia], handles[ib], |v| v);
    }

    if cdt.num_vertices() != polygon.len() {
        // Crossing constraints were split.
        return None;
    }

    let mut result = vec![];
    for face in cdt.inner_faces() {
        let tri = face.vertices().map(|v| handle_to_idx[v.fix().index()]);
        let [Some(a), Some(b), Some(c)] = tri else {
            return None;
        };

        let center = Point2::from(
            (polygon[a as usize].coords + polygon[b as usize].coords + polygon[c as usize].coords)
                / 3.0,
        );
        if point_in_poly2d(&center, polygon) {
            result.push([a, b, c]);
        }
    }

    Some(result)
}

#[cfg(test)]
mod test {
    use super::triangulate_polygon_cdt;
    use crate::math::Real;
    use na::Point2;

    fn area(poly: &[Point2<Real>], tris: &[[u32; 3]]) -> Real {
        tris.iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| poly[i as usize]);
                (b - a).perp(&(c - a)) / 2.0
            })
            .sum()
    }

    #[test]
    fn concave_polygon_either_orientation() {
        let mut poly = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 4.0),
        ];
        let tris = triangulate_polygon_cdt(&poly).unwrap();
        assert_eq!(tris.len(), 3);
        assert_relative_eq!(area(&poly, &tris), 10.0, epsilon = 1.0e-9);

        poly.reverse();
        let tris = triangulate_polygon_cdt(&poly).unwrap();
        assert_relative_eq!(area(&poly, &tris), 10.0, epsilon = 1.0e-9);
    }

    #[test]
    fn self_intersecting_polygon() {
        let bowtie = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(triangulate_polygon_cdt(&bowtie).is_none());
    }
}
