/*!
fracture3d
==========

**fracture3d** fractures 3-dimensional geometry collections with planar, Voronoi, image and
mesh-based cutting surfaces. It is written with the rust programming language.

*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::too_many_arguments)] // Maybe revisit this one later.
#![allow(clippy::module_inception)]
#![allow(clippy::manual_range_contains)] // This usually makes it way more verbose that it could be.
#![allow(clippy::type_complexity)] // Complains about closures that are fairly simple.

#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;
#[macro_use]
extern crate approx;
extern crate num_traits as num;

pub extern crate nalgebra as na;

pub mod bounding_volume;
pub mod cell_meshes;
pub mod cells;
pub mod collection;
pub mod conversion;
pub mod fracture;
pub mod mesh;
pub mod partitioning;
pub mod transformation;
pub mod utils;

mod real {
    /// The scalar type used throughout this crate.
    #[cfg(feature = "f64")]
    pub use f64 as Real;
}

/// Compilation flags dependent aliases for mathematical types.
#[cfg(feature = "dim3")]
pub mod math {
    pub use super::real::*;
    pub use na::{
        Isometry3, Matrix3, Point2, Point3, Translation3, UnitQuaternion, UnitVector3, Vector2,
        Vector3, Vector4,
    };

    /// The default tolerance used for geometric operations.
    pub const DEFAULT_EPSILON: Real = Real::EPSILON;

    /// Tolerance under which lengths, areas and dot products are considered zero.
    pub const ZERO_TOLERANCE: Real = 1.0e-6;

    /// A small number used to avoid divisions by zero in distance-based scores.
    pub const SMALL_NUMBER: Real = 1.0e-8;

    /// A small, but not tiny, number used as the default minimum area of filled holes.
    pub const KINDA_SMALL_NUMBER: Real = 1.0e-4;

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The maximum number of UV channels a mesh or a collection can carry.
    pub const MAX_UV_CHANNELS: usize = 8;

    /// The point type.
    pub use Point3 as Point;

    /// The vector type.
    pub use Vector3 as Vector;

    /// The unit vector type.
    pub use UnitVector3 as UnitVector;

    /// The matrix type.
    pub use Matrix3 as Matrix;

    /// The transformation matrix type.
    pub use Isometry3 as Isometry;

    /// The rotation matrix type.
    pub type Rotation<N> = UnitQuaternion<N>;

    /// The translation type.
    pub use Translation3 as Translation;

    /// A linear RGBA color.
    pub type Color = Vector4<f32>;
}
