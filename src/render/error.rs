use super::textures::TextureSlot;
use crate::gpu::GpuError;
use std::fmt;
use thiserror::Error;

/// Render passes, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Graphic,
    Cache,
    Stroke,
    Eraser,
    Photo,
    ViewPort,
    Preview,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassKind::Graphic => "graphic",
            PassKind::Cache => "cache",
            PassKind::Stroke => "stroke",
            PassKind::Eraser => "eraser",
            PassKind::Photo => "photo",
            PassKind::ViewPort => "viewport",
            PassKind::Preview => "preview",
        };
        f.write_str(name)
    }
}

/// Errors produced while rendering a frame or a preview.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A resource of one pass failed; the pass is skipped for this frame.
    #[error("{pass} pass failed: {source}")]
    Pass {
        pass: PassKind,
        #[source]
        source: GpuError,
    },

    /// No command buffer could be obtained; the frame is aborted.
    #[error("{pass} pass could not obtain a command buffer: {source}")]
    CommandBuffer {
        pass: PassKind,
        #[source]
        source: GpuError,
    },

    /// A texture read by a pass has not been produced yet.
    #[error("{pass} pass needs the {slot} texture, which does not exist yet")]
    MissingSlot { pass: PassKind, slot: TextureSlot },
}

impl RenderError {
    pub fn pass(&self) -> PassKind {
        match self {
            RenderError::Pass { pass, .. }
            | RenderError::CommandBuffer { pass, .. }
            | RenderError::MissingSlot { pass, .. } => *pass,
        }
    }

    /// Whether the frame can continue without the failed pass.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RenderError::Pass { source, .. } => source.is_recoverable(),
            RenderError::CommandBuffer { .. } => false,
            RenderError::MissingSlot { .. } => true,
        }
    }
}

/// Attributes device errors to a pass.
pub(crate) trait InPass<T> {
    fn in_pass(self, pass: PassKind) -> Result<T, RenderError>;
}

impl<T> InPass<T> for Result<T, GpuError> {
    fn in_pass(self, pass: PassKind) -> Result<T, RenderError> {
        self.map_err(|source| RenderError::Pass { pass, source })
    }
}
