//! Various unsorted geometrical and logical operators.

pub use self::basis::orthonormal_basis;
pub use self::ccw_face_normal::{ccw_face_normal, triangle_area};
pub use self::closest_point_on_triangle::closest_point_on_triangle;
pub use self::disjoint_set::DisjointSet;
pub use self::fx_hasher::FxHasher32;
pub use self::point_hash_grid::PointHashGrid;
pub use self::point_in_poly2d::point_in_poly2d;
pub use self::point_in_triangle::{corner_direction, is_point_in_triangle, Orientation};
pub use self::ray_triangle::ray_triangle_toi;
pub use self::sorted_pair::SortedPair;
pub use self::spade::to_spade_point;

mod basis;
mod ccw_face_normal;
mod closest_point_on_triangle;
mod disjoint_set;
mod fx_hasher;
pub mod hashmap;
mod point_hash_grid;
mod point_in_poly2d;
mod point_in_triangle;
mod ray_triangle;
mod sorted_pair;
mod spade;
