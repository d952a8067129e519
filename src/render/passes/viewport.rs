use super::command_buffer;
use crate::color::Color;
use crate::geometry::CameraTransform;
use crate::gpu::{
    BlendMode, DrawCall, GpuDevice, GridStyle, LoadAction, Placement, RenderPassDescriptor,
};
use crate::render::error::{InPass, PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};
use crate::util::Rect;

/// Background and grid drawn beneath the layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backdrop {
    pub background: Color,
    pub grid: Option<(GridStyle, f64)>,
    pub grid_color: Color,
}

/// Composes the presented image: background, grid, photos, then ink.
#[derive(Debug, Default)]
pub struct ViewPortRenderPass;

impl ViewPortRenderPass {
    pub fn new() -> Self {
        Self
    }

    /// `placement` maps the cached layers onto the screen; it is the identity
    /// unless the camera moved since they were drawn.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        backdrop: &Backdrop,
        camera: CameraTransform,
        placement: Placement,
        clip: Option<Rect>,
    ) -> Result<(), RenderError> {
        let target = textures
            .acquire(device, TextureSlot::Viewport)
            .in_pass(PassKind::ViewPort)?;
        let mut pass = RenderPassDescriptor::new(
            "viewport",
            target,
            LoadAction::Clear(backdrop.background),
        )
        .with_scissor(clip);
        if let Some((style, spacing)) = backdrop.grid {
            pass = pass.draw(DrawCall::Grid {
                style,
                spacing,
                transform: camera,
                color: backdrop.grid_color,
            });
        }
        let ink = textures
            .get(TextureSlot::Cache)
            .or_else(|| textures.get(TextureSlot::Graphic));
        for layer in [textures.get(TextureSlot::PhotoBackground), ink]
            .into_iter()
            .flatten()
        {
            pass = pass.draw(DrawCall::Texture {
                source: layer,
                placement,
                opacity: 1.0,
                blend: BlendMode::Over,
            });
        }
        let mut commands = command_buffer(device, PassKind::ViewPort, "viewport")?;
        commands.render(pass);
        device.commit(commands).in_pass(PassKind::ViewPort)?;
        textures.mark_written(TextureSlot::Viewport);
        Ok(())
    }
}
