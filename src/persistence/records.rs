//! On-disk element records and their decoding into live elements.

use crate::color::Color;
use crate::element::{Element, ElementError, ElementId, Photo, PhotoRef, Stroke, StrokeKind};
use crate::geometry::Point;
use crate::stroke::{Quad, QuadShape};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialised element, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementRecord {
    Stroke(StrokeRecord),
    Photo(PhotoRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    pub id: ElementId,
    /// `marker` or `eraser`. Kept as text so unknown tags surface as
    /// [`ElementError::UnknownStyle`] instead of a generic parse error.
    pub style: String,
    pub shape: ShapeRecord,
    pub color: Color,
    pub thickness: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub erasers: Vec<ElementId>,
    pub quads: Vec<QuadRecord>,
}

/// Quad placement; shape and colour are shared by the whole stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadRecord {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub image: PhotoRef,
    pub created_at: DateTime<Utc>,
}

impl ElementRecord {
    pub fn id(&self) -> ElementId {
        match self {
            ElementRecord::Stroke(stroke) => stroke.id,
            ElementRecord::Photo(photo) => photo.id,
        }
    }
}

impl From<QuadShape> for ShapeRecord {
    fn from(shape: QuadShape) -> Self {
        let (kind, params) = match shape {
            QuadShape::Rounded => ("rounded", Vec::new()),
            QuadShape::Squared => ("squared", Vec::new()),
            QuadShape::Calligraphic {
                vertical,
                horizontal,
            } => ("calligraphic", vec![vertical, horizontal]),
            QuadShape::Trapezoid {
                top,
                bottom,
                height,
            } => ("trapezoid", vec![top, bottom, height]),
        };
        Self {
            kind: kind.to_string(),
            params,
        }
    }
}

impl TryFrom<&ShapeRecord> for QuadShape {
    type Error = ElementError;

    fn try_from(record: &ShapeRecord) -> Result<Self, Self::Error> {
        match (record.kind.as_str(), record.params.as_slice()) {
            ("rounded", []) => Ok(QuadShape::Rounded),
            ("squared", []) => Ok(QuadShape::Squared),
            ("calligraphic", [vertical, horizontal]) => Ok(QuadShape::Calligraphic {
                vertical: *vertical,
                horizontal: *horizontal,
            }),
            ("trapezoid", [top, bottom, height]) => Ok(QuadShape::Trapezoid {
                top: *top,
                bottom: *bottom,
                height: *height,
            }),
            // Known tag with the wrong arity.
            (kind @ ("rounded" | "squared" | "calligraphic" | "trapezoid"), params) => Err(
                ElementError::UnknownQuadShape(format!("{kind}[{}]", params.len())),
            ),
            (kind, _) => Err(ElementError::UnknownQuadShape(kind.to_string())),
        }
    }
}

impl From<&Stroke> for StrokeRecord {
    fn from(stroke: &Stroke) -> Self {
        let shape = stroke
            .quads()
            .first()
            .map_or(QuadShape::Rounded, |quad| quad.shape);
        Self {
            id: stroke.id,
            style: stroke.kind.as_str().to_string(),
            shape: shape.into(),
            color: stroke.color,
            thickness: stroke.thickness,
            created_at: stroke.created_at,
            erasers: stroke.erasers.iter().copied().collect(),
            quads: stroke
                .quads()
                .iter()
                .map(|quad| QuadRecord {
                    x: quad.origin.x,
                    y: quad.origin.y,
                    size: quad.size,
                    rotation: quad.rotation,
                })
                .collect(),
        }
    }
}

impl From<&Photo> for PhotoRecord {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            x: photo.origin.x,
            y: photo.origin.y,
            width: photo.size.0,
            height: photo.size.1,
            image: photo.image.clone(),
            created_at: photo.created_at,
        }
    }
}

impl From<&Element> for ElementRecord {
    fn from(element: &Element) -> Self {
        match element {
            Element::Stroke(stroke) => ElementRecord::Stroke(stroke.into()),
            Element::Photo(photo) => ElementRecord::Photo(photo.into()),
        }
    }
}

impl TryFrom<StrokeRecord> for Stroke {
    type Error = ElementError;

    fn try_from(record: StrokeRecord) -> Result<Self, Self::Error> {
        let kind: StrokeKind = record.style.parse()?;
        let shape = QuadShape::try_from(&record.shape)?;
        if !(record.thickness.is_finite() && record.thickness > 0.0) {
            return Err(ElementError::InvalidThickness(record.thickness));
        }
        if record.quads.is_empty() {
            return Err(ElementError::EmptyStroke(record.id));
        }
        let mut quads = Vec::with_capacity(record.quads.len());
        for (index, placed) in record.quads.iter().enumerate() {
            let quad = Quad::new(
                Point::new(placed.x, placed.y),
                placed.size,
                placed.rotation,
                shape,
                record.color,
            );
            let fields = [placed.x, placed.y, placed.size, placed.rotation];
            if !fields.iter().all(|v| v.is_finite()) || !quad.bounds().is_finite() {
                return Err(ElementError::InvalidQuad {
                    stroke: record.id,
                    index,
                });
            }
            quads.push(quad);
        }
        Ok(Stroke::from_parts(
            record.id,
            kind,
            record.color,
            record.thickness,
            quads,
            record.created_at,
            record.erasers.into_iter().collect(),
        ))
    }
}

impl TryFrom<ElementRecord> for Element {
    type Error = ElementError;

    fn try_from(record: ElementRecord) -> Result<Self, Self::Error> {
        match record {
            ElementRecord::Stroke(stroke) => Ok(Element::Stroke(stroke.try_into()?)),
            ElementRecord::Photo(photo) => {
                let placed = Photo::new(
                    photo.id,
                    Point::new(photo.x, photo.y),
                    (photo.width, photo.height),
                    photo.image,
                    photo.created_at,
                )?;
                if !placed.bounds.is_finite() {
                    return Err(ElementError::UnboundedPhoto(photo.id));
                }
                Ok(Element::Photo(placed))
            }
        }
    }
}
