// Copyright voxel-core contributors, MIT License.

//! Numeric and geometric primitives shared across the core: coordinate
//! types, colors, axis-aligned boxes, and the [`Face6`]/[`Face7`] direction
//! enums.

use cgmath::{Point3, Vector3};
pub use ordered_float::NotNan;

mod face;
pub use face::{Face6, Face7, Neighbor26};

mod aab;
pub use aab::{Aab, GridAab};

mod color;
pub use color::{Rgb, Rgba};

/// Integer coordinate used for all block/chunk-space arithmetic.
///
/// Per the wire contract (see `vox` module) shape-space coordinates fit in
/// `i16` and chunk-local coordinates fit in `i8`, but we compute with a
/// wider type throughout to avoid casting at every intermediate step;
/// narrowing happens only at serialization/vertex-packing boundaries.
pub type GridCoordinate = i32;

/// Floating point coordinate used for model-space positions (pivot
/// transforms, points of interest, mesh vertex positions).
pub type FreeCoordinate = f64;

/// A point in integer grid space.
pub type GridPoint = Point3<GridCoordinate>;

/// A displacement in integer grid space.
pub type GridVector = Vector3<GridCoordinate>;

/// Squared Euclidean magnitude of an integer vector, staying in integer
/// arithmetic as long as possible.
pub fn int_magnitude_squared(v: GridVector) -> GridCoordinate {
    v.x * v.x + v.y * v.y + v.z * v.z
}

/// Clamps `value` into `[0, max]`, used when narrowing light channels etc.
pub fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}
