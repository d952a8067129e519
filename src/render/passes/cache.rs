use super::{ElementPasses, command_buffer};
use crate::context::GraphicContext;
use crate::geometry::CameraTransform;
use crate::gpu::{ComputeDispatch, GpuDevice};
use crate::render::error::{InPass, PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};

/// Builds [`TextureSlot::Cache`]: a copy of the ink layer with the stroke in
/// flight drawn on top, so the ink layer itself never holds unfinished ink.
#[derive(Debug, Default)]
pub struct CacheRenderPass;

impl CacheRenderPass {
    pub fn new() -> Self {
        Self
    }

    /// Returns whether an in-progress stroke was drawn.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        passes: &mut ElementPasses,
        context: &GraphicContext,
        camera: CameraTransform,
    ) -> Result<bool, RenderError> {
        let graphic = textures.require(TextureSlot::Graphic, PassKind::Cache)?;
        let cache = textures
            .acquire(device, TextureSlot::Cache)
            .in_pass(PassKind::Cache)?;
        let mut commands = command_buffer(device, PassKind::Cache, "cache-copy")?;
        commands.dispatch(ComputeDispatch::CopyTexture {
            source: graphic,
            destination: cache,
        });
        device.commit(commands).in_pass(PassKind::Cache)?;
        textures.mark_written(TextureSlot::Cache);

        let Some(stroke) = context.current_stroke().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };
        let drawn = passes.draw_strokes(
            device,
            textures,
            stroke.kind,
            &[stroke],
            camera,
            TextureSlot::Cache,
        )?;
        Ok(drawn > 0)
    }
}
