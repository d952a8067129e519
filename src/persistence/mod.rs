//! Durable storage of document elements.
//!
//! The in-memory [`GraphicContext`](crate::context::GraphicContext) is
//! authoritative; storage catches up in the background through the
//! [`PersistenceManager`].

pub mod manager;
pub mod records;
pub mod store;

pub use manager::{PersistenceManager, PersistenceStatus, RetryPolicy};
pub use records::{ElementRecord, PhotoRecord, QuadRecord, ShapeRecord, StrokeRecord};
pub use store::{CompressionMode, ElementStore, FileStore, FileStoreOptions};

use crate::element::ElementError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decode element: {0}")]
    Decode(#[from] ElementError),

    #[error("document version {0} is newer than this build supports")]
    UnsupportedVersion(u32),

    #[error("blocking storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("persistence worker is not running")]
    Closed,
}

#[cfg(test)]
mod tests;
