//! Axis-aligned bounding boxes in world coordinates.

use super::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Precondition violations raised by geometry constructors.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// A box whose minimum exceeds its maximum on some axis, or with a NaN coordinate.
    #[error("malformed bounding box ({min_x}, {min_y}) - ({max_x}, {max_y})")]
    MalformedBox {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
}

/// Axis-aligned bounding rectangle.
///
/// Invariant: `min_x <= max_x` and `min_y <= max_y`, except for the
/// [`BoundingBox::infinity`] sentinel which is only used as an enlargement seed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a box, rejecting inverted or NaN extents.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, GeometryError> {
        // NaN fails both comparisons, so `!(a <= b)` also catches it.
        if !(min_x <= max_x) || !(min_y <= max_y) {
            return Err(GeometryError::MalformedBox {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// The empty seed `{+inf, +inf, -inf, -inf}`; enlarging it by any box yields that box.
    pub const fn infinity() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(point: Point) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    /// Box of the given size centred on `center`. Negative sizes are rejected.
    pub fn from_center(center: Point, width: f64, height: f64) -> Result<Self, GeometryError> {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        )
    }

    /// Returns `true` for the infinity sentinel (or any box enlarged by nothing yet).
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Every coordinate is finite, which rules out the infinity sentinel.
    pub fn is_finite(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Half perimeter, the R-tree "margin" metric.
    pub fn margin(&self) -> f64 {
        self.width() + self.height()
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grows `self` in place to contain `other`.
    pub fn enlarge(&mut self, other: &Self) {
        *self = self.union(other);
    }

    /// Area of the union of `self` and `other`.
    pub fn enlarged_area(&self, other: &Self) -> f64 {
        self.union(other).area()
    }

    /// Area of the intersection, zero when the boxes are disjoint.
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
    }

    /// Closed-interval overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &Self) -> bool {
        other.min_x <= self.max_x
            && other.min_y <= self.max_y
            && other.max_x >= self.min_x
            && other.max_y >= self.min_y
    }

    /// Returns `true` when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// Expands every edge outward by `amount`.
    pub fn padded(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }
}
