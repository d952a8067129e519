//! Drawable elements: strokes and photos placed on the canvas.

pub mod group;
pub mod photo;
pub mod stroke;

pub use group::{ElementGroup, group_elements};
pub use photo::{Photo, PhotoLibrary, PhotoRef};
pub use stroke::{PenStyle, Stroke, StrokeKind};

use crate::geometry::{BoundingBox, GeometryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Stable identifier of an element within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building or decoding elements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElementError {
    #[error("unknown stroke style '{0}'")]
    UnknownStyle(String),

    #[error("unknown quad shape '{0}'")]
    UnknownQuadShape(String),

    #[error("invalid thickness {0}")]
    InvalidThickness(f64),

    #[error("stroke {0} has no quads")]
    EmptyStroke(ElementId),

    #[error("stroke {stroke} has an unplaceable quad at index {index}")]
    InvalidQuad { stroke: ElementId, index: usize },

    #[error("photo {0} is not placed within finite bounds")]
    UnboundedPhoto(ElementId),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Coarse classification used for batching and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Marker,
    Eraser,
    Photo,
}

/// A stroke or a photo.
///
/// Elements are totally ordered by creation time (ties broken by id) and
/// compare equal when their ids match.
#[derive(Debug, Clone)]
pub enum Element {
    Stroke(Stroke),
    Photo(Photo),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Stroke(stroke) => stroke.id,
            Element::Photo(photo) => photo.id,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        match self {
            Element::Stroke(stroke) => stroke.bounds(),
            Element::Photo(photo) => photo.bounds,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Element::Stroke(stroke) => stroke.created_at,
            Element::Photo(photo) => photo.created_at,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Stroke(stroke) => match stroke.kind {
                StrokeKind::Marker => ElementKind::Marker,
                StrokeKind::Eraser => ElementKind::Eraser,
            },
            Element::Photo(_) => ElementKind::Photo,
        }
    }

    /// Eraser strokes already applied on top of this element.
    pub fn erasers(&self) -> Option<&BTreeSet<ElementId>> {
        match self {
            Element::Stroke(stroke) => Some(&stroke.erasers),
            Element::Photo(_) => None,
        }
    }

    pub fn as_stroke(&self) -> Option<&Stroke> {
        match self {
            Element::Stroke(stroke) => Some(stroke),
            Element::Photo(_) => None,
        }
    }

    pub fn as_photo(&self) -> Option<&Photo> {
        match self {
            Element::Photo(photo) => Some(photo),
            Element::Stroke(_) => None,
        }
    }

    /// Ordering key: creation time, then id.
    pub fn creation_key(&self) -> (DateTime<Utc>, ElementId) {
        (self.created_at(), self.id())
    }
}

impl From<Stroke> for Element {
    fn from(stroke: Stroke) -> Self {
        Element::Stroke(stroke)
    }
}

impl From<Photo> for Element {
    fn from(photo: Photo) -> Self {
        Element::Photo(photo)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Element {}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.id() == other.id() {
            return Ordering::Equal;
        }
        self.creation_key().cmp(&other.creation_key())
    }
}
