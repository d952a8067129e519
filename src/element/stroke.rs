use super::{ElementError, ElementId};
use crate::color::Color;
use crate::geometry::BoundingBox;
use crate::gpu::BlendMode;
use crate::stroke::{Quad, QuadShape, QuadSink};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Closed set of stroke styles. Both share the generator and differ only in
/// how their quads are blended into the ink layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeKind {
    /// Paints ink with premultiplied source-over.
    Marker,
    /// Removes ink alpha with reverse-subtract blending.
    Eraser,
}

impl StrokeKind {
    pub fn blend(self) -> BlendMode {
        match self {
            StrokeKind::Marker => BlendMode::Over,
            StrokeKind::Eraser => BlendMode::ReverseSubtractAlpha,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrokeKind::Marker => "marker",
            StrokeKind::Eraser => "eraser",
        }
    }
}

impl fmt::Display for StrokeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrokeKind {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "marker" => Ok(StrokeKind::Marker),
            "eraser" => Ok(StrokeKind::Eraser),
            other => Err(ElementError::UnknownStyle(other.to_string())),
        }
    }
}

/// Tool settings captured when a stroke begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenStyle {
    pub kind: StrokeKind,
    pub color: Color,
    pub thickness: f64,
    pub shape: QuadShape,
}

impl PenStyle {
    pub fn marker(color: Color, thickness: f64) -> Self {
        Self {
            kind: StrokeKind::Marker,
            color,
            thickness,
            shape: QuadShape::Rounded,
        }
    }

    pub fn eraser(thickness: f64) -> Self {
        Self {
            kind: StrokeKind::Eraser,
            color: crate::color::WHITE,
            thickness,
            shape: QuadShape::Rounded,
        }
    }

    pub fn validate(&self) -> Result<(), ElementError> {
        if self.thickness.is_finite() && self.thickness > 0.0 {
            Ok(())
        } else {
            Err(ElementError::InvalidThickness(self.thickness))
        }
    }
}

/// A freehand stroke: an ordered, growable run of quads.
#[derive(Debug, Clone)]
pub struct Stroke {
    pub id: ElementId,
    pub color: Color,
    pub kind: StrokeKind,
    pub thickness: f64,
    pub created_at: DateTime<Utc>,
    /// Eraser strokes that were drawn over this stroke after it was finished.
    pub erasers: BTreeSet<ElementId>,
    quads: Vec<Quad>,
    /// `running[i]` bounds `quads[..=i]`, so dropping a tail is O(1).
    running: Vec<BoundingBox>,
}

impl Stroke {
    /// Empty stroke ready to receive quads from a generator.
    pub fn new(id: ElementId, style: &PenStyle, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            color: style.color,
            kind: style.kind,
            thickness: style.thickness,
            created_at,
            erasers: BTreeSet::new(),
            quads: Vec::new(),
            running: Vec::new(),
        }
    }

    /// Rebuilds a stroke from stored parts, recomputing its bounds.
    pub fn from_parts(
        id: ElementId,
        kind: StrokeKind,
        color: Color,
        thickness: f64,
        quads: Vec<Quad>,
        created_at: DateTime<Utc>,
        erasers: BTreeSet<ElementId>,
    ) -> Self {
        let mut stroke = Self {
            id,
            color,
            kind,
            thickness,
            created_at,
            erasers,
            quads: Vec::with_capacity(quads.len()),
            running: Vec::with_capacity(quads.len()),
        };
        for quad in quads {
            stroke.push_quad(quad);
        }
        stroke
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// Union of all quad bounds; the infinity sentinel while empty.
    pub fn bounds(&self) -> BoundingBox {
        self.running
            .last()
            .copied()
            .unwrap_or_else(BoundingBox::infinity)
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

}

impl QuadSink for Stroke {
    fn push_quad(&mut self, quad: Quad) {
        self.running.push(self.bounds().union(&quad.bounds()));
        self.quads.push(quad);
    }

    fn remove_quads(&mut self, from: usize) {
        self.quads.truncate(from);
        self.running.truncate(from);
    }

    fn quad_count(&self) -> usize {
        self.quads.len()
    }
}
