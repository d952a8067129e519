//! Quads: the atomic renderable unit of a stroke.

use crate::color::Color;
use crate::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Outline of a quad before rotation, relative to its `size`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QuadShape {
    /// Square sampled through a round brush mask.
    Rounded,
    /// Plain square.
    Squared,
    /// Rectangle stretched by independent vertical and horizontal factors.
    Calligraphic { vertical: f64, horizontal: f64 },
    /// Trapezoid with top and bottom widths and a height, all relative to `size`.
    Trapezoid { top: f64, bottom: f64, height: f64 },
}

impl QuadShape {
    /// Round shapes fill the circle inscribed in the quad.
    pub fn is_round(&self) -> bool {
        matches!(self, QuadShape::Rounded)
    }
}

/// A small oriented rectangle placed along a stroke. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub origin: Point,
    pub size: f64,
    /// Rotation in radians around `origin`.
    pub rotation: f64,
    pub shape: QuadShape,
    pub color: Color,
}

impl Quad {
    pub fn new(origin: Point, size: f64, rotation: f64, shape: QuadShape, color: Color) -> Self {
        Self {
            origin,
            size,
            rotation,
            shape,
            color,
        }
    }

    /// Corners in world space, ordered top-left, top-right, bottom-right, bottom-left
    /// before rotation.
    pub fn corners(&self) -> [Point; 4] {
        let half = self.size / 2.0;
        let local = match self.shape {
            QuadShape::Rounded | QuadShape::Squared => {
                [(-half, -half), (half, -half), (half, half), (-half, half)]
            }
            QuadShape::Calligraphic {
                vertical,
                horizontal,
            } => {
                let (w, h) = (half * horizontal, half * vertical);
                [(-w, -h), (w, -h), (w, h), (-w, h)]
            }
            QuadShape::Trapezoid {
                top,
                bottom,
                height,
            } => {
                let (t, b, h) = (half * top, half * bottom, half * height);
                [(-t, -h), (t, -h), (b, h), (-b, h)]
            }
        };
        let (sin, cos) = self.rotation.sin_cos();
        local.map(|(x, y)| {
            Point::new(
                self.origin.x + x * cos - y * sin,
                self.origin.y + x * sin + y * cos,
            )
        })
    }

    /// Axis-aligned bounds of the rotated outline.
    pub fn bounds(&self) -> BoundingBox {
        self.corners()
            .iter()
            .fold(BoundingBox::infinity(), |acc, corner| {
                acc.union(&BoundingBox::from_point(*corner))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BLACK;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn unrotated_square_bounds_are_size_wide() {
        let quad = Quad::new(Point::new(10.0, 10.0), 4.0, 0.0, QuadShape::Rounded, BLACK);
        assert_eq!(
            quad.bounds(),
            BoundingBox::new(8.0, 8.0, 12.0, 12.0).unwrap()
        );
    }

    #[test]
    fn rotation_widens_bounds() {
        let quad = Quad::new(Point::new(0.0, 0.0), 2.0, FRAC_PI_4, QuadShape::Squared, BLACK);
        let bounds = quad.bounds();
        assert!((bounds.max_x - 2f64.sqrt()).abs() < 1e-9);
        assert!((bounds.min_y + 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn trapezoid_uses_top_and_bottom_widths() {
        let quad = Quad::new(
            Point::new(0.0, 0.0),
            10.0,
            0.0,
            QuadShape::Trapezoid {
                top: 0.5,
                bottom: 1.0,
                height: 0.2,
            },
            BLACK,
        );
        let [tl, tr, br, bl] = quad.corners();
        assert_eq!(tr.x - tl.x, 5.0);
        assert_eq!(br.x - bl.x, 10.0);
        assert_eq!(bl.y - tl.y, 2.0);
    }
}
