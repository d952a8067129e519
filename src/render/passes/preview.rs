use super::{ElementPasses, Targets, command_buffer, ensure_cleared};
use crate::color::TRANSPARENT;
use crate::context::GraphicContext;
use crate::element::{Element, PhotoLibrary, group_elements};
use crate::geometry::{BoundingBox, CameraTransform, Extent};
use crate::gpu::{
    Bitmap, BlendMode, DrawCall, GpuDevice, LoadAction, Placement, RenderPassDescriptor,
};
use crate::render::error::{InPass, PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};
use log::debug;

/// Renders the whole document into an offscreen thumbnail.
#[derive(Debug, Clone)]
pub struct PreviewRenderPass {
    padding: f64,
    max_dimension: u32,
}

impl PreviewRenderPass {
    pub fn new(padding: f64, max_dimension: u32) -> Self {
        Self {
            padding: padding.max(0.0),
            max_dimension: max_dimension.max(1),
        }
    }

    /// Scale and pixel extent of a preview covering `bounds`.
    pub fn layout(&self, bounds: &BoundingBox) -> (f64, Extent) {
        let longest = bounds.width().max(bounds.height()).max(1.0);
        let scale = (self.max_dimension as f64 / longest).min(1.0);
        let extent = Extent::new(
            ((bounds.width() * scale).ceil() as u32).clamp(1, self.max_dimension),
            ((bounds.height() * scale).ceil() as u32).clamp(1, self.max_dimension),
        );
        (scale, extent)
    }

    /// Returns `None` for an empty document. Every texture it creates is
    /// released before returning.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        passes: &mut ElementPasses,
        context: &GraphicContext,
        library: &PhotoLibrary,
    ) -> Result<Option<Bitmap>, RenderError> {
        let elements = context.elements_in_creation_order();
        if elements.is_empty() {
            return Ok(None);
        }
        let bounds = context.bounds().padded(self.padding);
        let (scale, extent) = self.layout(&bounds);
        let camera = CameraTransform::new(scale, -bounds.min_x * scale, -bounds.min_y * scale);
        debug!(
            "Rendering {}x{} preview of {} elements",
            extent.width,
            extent.height,
            elements.len()
        );

        let mut textures = TextureRegistry::new(extent);
        let result = Self::compose(device, &mut textures, passes, &elements, library, camera);
        textures.release(device);
        result.map(Some)
    }

    fn compose(
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        passes: &mut ElementPasses,
        elements: &[&Element],
        library: &PhotoLibrary,
        camera: CameraTransform,
    ) -> Result<Bitmap, RenderError> {
        for group in &group_elements(elements.iter().copied()) {
            passes.draw_group(device, textures, group, library, camera, Targets::LAYERS)?;
        }
        ensure_cleared(device, textures, TextureSlot::Graphic, PassKind::Preview)?;
        ensure_cleared(device, textures, TextureSlot::PhotoBackground, PassKind::Preview)?;
        let target = textures
            .acquire(device, TextureSlot::Viewport)
            .in_pass(PassKind::Preview)?;
        let mut pass =
            RenderPassDescriptor::new("preview", target, LoadAction::Clear(TRANSPARENT));
        for slot in [TextureSlot::PhotoBackground, TextureSlot::Graphic] {
            let source = textures.require(slot, PassKind::Preview)?;
            pass = pass.draw(DrawCall::Texture {
                source,
                placement: Placement::IDENTITY,
                opacity: 1.0,
                blend: BlendMode::Over,
            });
        }
        let mut commands = command_buffer(device, PassKind::Preview, "preview")?;
        commands.render(pass);
        device.commit(commands).in_pass(PassKind::Preview)?;
        device.read_texture(target).in_pass(PassKind::Preview)
    }
}
