//! Geometry primitives shared by the index, stroke generator and renderer.

pub mod bounds;
pub mod point;
pub mod transform;

pub use bounds::{BoundingBox, GeometryError};
pub use point::Point;
pub use transform::{CameraTransform, Extent};
