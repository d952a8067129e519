//! Compositing pipeline over a [`GpuDevice`](crate::gpu::GpuDevice).
//!
//! Finished ink lives in the graphic layer, photos in a layer beneath it and
//! the stroke in flight only in the cache layer. The viewport pass composes
//! them with the background and grid into the presented texture.

pub mod error;
pub mod passes;
pub mod renderer;
pub mod textures;
pub mod vertices;

pub use error::{PassKind, RenderError};
pub use passes::{
    CacheRenderPass, ElementPasses, EraserRenderPass, GraphicRenderPass, PhotoRenderPass,
    PreviewRenderPass, StrokeRenderPass, ViewPortRenderPass,
};
pub use renderer::{FrameReport, RenderSettings, Renderer};
pub use textures::{TextureRegistry, TextureSlot};

use crate::gpu::GridStyle;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Background grid shown behind the ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GridMode {
    None,
    #[default]
    Point,
    Line,
}

impl GridMode {
    pub fn style(self) -> Option<GridStyle> {
        match self {
            GridMode::None => None,
            GridMode::Point => Some(GridStyle::Point),
            GridMode::Line => Some(GridStyle::Line),
        }
    }
}

#[cfg(test)]
mod tests;
