use super::ElementId;
use crate::geometry::{BoundingBox, GeometryError, Point};
use crate::gpu::Bitmap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted reference to an image; pixels live in a [`PhotoLibrary`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoRef {
    pub key: String,
    pub width: u32,
    pub height: u32,
}

/// A photo placed on the canvas with its top-left corner at `origin`.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: ElementId,
    pub bounds: BoundingBox,
    pub origin: Point,
    /// World-space width and height.
    pub size: (f64, f64),
    pub image: PhotoRef,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(
        id: ElementId,
        origin: Point,
        size: (f64, f64),
        image: PhotoRef,
        created_at: DateTime<Utc>,
    ) -> Result<Self, GeometryError> {
        let bounds = BoundingBox::new(origin.x, origin.y, origin.x + size.0, origin.y + size.1)?;
        Ok(Self {
            id,
            bounds,
            origin,
            size,
            image,
            created_at,
        })
    }
}

/// Decoded photo pixels keyed by [`PhotoRef::key`].
#[derive(Debug, Clone, Default)]
pub struct PhotoLibrary {
    images: HashMap<String, Bitmap>,
}

impl PhotoLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bitmap` under `key` and returns the reference to place it with.
    pub fn insert(&mut self, key: impl Into<String>, bitmap: Bitmap) -> PhotoRef {
        let key = key.into();
        let extent = bitmap.extent();
        self.images.insert(key.clone(), bitmap);
        PhotoRef {
            key,
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn get(&self, image: &PhotoRef) -> Option<&Bitmap> {
        self.images.get(&image.key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Bitmap> {
        self.images.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
