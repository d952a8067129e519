use crate::element::{PhotoLibrary, PhotoRef};
use crate::gpu::Bitmap;
use crate::persistence::PersistenceManager;

/// Session context of one open document.
///
/// Holds what outlives a single view: the photo pixels and the optional
/// background persistence worker.
#[derive(Default)]
pub struct Document {
    pub name: String,
    pub library: PhotoLibrary,
    persistence: Option<PersistenceManager>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: PhotoLibrary::new(),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: PersistenceManager) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn persistence(&self) -> Option<&PersistenceManager> {
        self.persistence.as_ref()
    }

    /// Adds decoded photo pixels and returns the reference to place them with.
    pub fn add_image(&mut self, key: impl Into<String>, bitmap: Bitmap) -> PhotoRef {
        self.library.insert(key, bitmap)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("images", &self.library.len())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}
