//! Camera transform between world space and view (pixel) space.

use super::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Size of a render target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Uniform scale followed by a translation: `view = world * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CameraTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    pub fn apply(&self, world: Point) -> Point {
        Point::new(
            world.x * self.scale + self.offset_x,
            world.y * self.scale + self.offset_y,
        )
    }

    pub fn invert(&self, view: Point) -> Point {
        Point::new(
            (view.x - self.offset_x) / self.scale,
            (view.y - self.offset_y) / self.scale,
        )
    }

    /// World-space rectangle visible through a view of `extent` pixels.
    pub fn visible_world_rect(&self, extent: Extent) -> BoundingBox {
        let a = self.invert(Point::new(0.0, 0.0));
        let b = self.invert(Point::new(extent.width as f64, extent.height as f64));
        BoundingBox {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Maps view coordinates produced under `earlier` onto view coordinates under `self`.
    pub fn relative_to(&self, earlier: &CameraTransform) -> CameraTransform {
        let ratio = self.scale / earlier.scale;
        CameraTransform {
            scale: ratio,
            offset_x: self.offset_x - ratio * earlier.offset_x,
            offset_y: self.offset_y - ratio * earlier.offset_y,
        }
    }
}
