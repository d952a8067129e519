use super::{ElementPasses, Targets, ensure_cleared};
use crate::context::GraphicContext;
use crate::element::{Element, PhotoLibrary, group_elements};
use crate::geometry::CameraTransform;
use crate::gpu::GpuDevice;
use crate::render::error::{PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};
use log::debug;

/// What the graphic pass did this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicOutcome {
    /// Elements drawn by a full redraw.
    pub redrawn: Option<usize>,
    /// The just-finished stroke was baked into the ink layer.
    pub baked: bool,
}

/// Maintains the finished-ink layer ([`TextureSlot::Graphic`]) and the photo
/// layer beneath it.
#[derive(Debug, Default)]
pub struct GraphicRenderPass;

impl GraphicRenderPass {
    pub fn new() -> Self {
        Self
    }

    /// Redraws both layers from every visible element when `redraw` is set,
    /// then bakes the just-finished stroke on top of the cached ink.
    ///
    /// The previous stroke is only marked as baked after its draw succeeded,
    /// so a recoverable failure retries it on the next frame.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        passes: &mut ElementPasses,
        context: &mut GraphicContext,
        library: &PhotoLibrary,
        camera: CameraTransform,
        redraw: bool,
    ) -> Result<GraphicOutcome, RenderError> {
        let mut outcome = GraphicOutcome::default();
        if redraw {
            let drawn = self.redraw(device, textures, passes, context, library, camera)?;
            outcome.redrawn = Some(drawn);
        }

        if let Some(stroke) = context.previous_stroke() {
            let id = stroke.id;
            passes.draw_strokes(
                device,
                textures,
                stroke.kind,
                &[stroke],
                camera,
                TextureSlot::Graphic,
            )?;
            debug!("Baked stroke {} into the ink layer", id);
            outcome.baked = context.take_previous_stroke().is_some();
        }
        Ok(outcome)
    }

    fn redraw(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        passes: &mut ElementPasses,
        context: &GraphicContext,
        library: &PhotoLibrary,
        camera: CameraTransform,
    ) -> Result<usize, RenderError> {
        textures.invalidate(TextureSlot::Graphic);
        textures.invalidate(TextureSlot::PhotoBackground);

        let visible = camera.visible_world_rect(textures.extent());
        let skipped = context.previous_stroke_id();
        let elements: Vec<&Element> = context
            .visible_elements(&visible)
            .into_iter()
            .filter(|element| Some(element.id()) != skipped)
            .collect();
        let groups = group_elements(elements.iter().copied());
        let mut drawn = 0;
        for group in &groups {
            drawn +=
                passes.draw_group(device, textures, group, library, camera, Targets::LAYERS)?;
        }
        // Layers nothing was drawn into still have to exist and be empty.
        ensure_cleared(device, textures, TextureSlot::Graphic, PassKind::Graphic)?;
        ensure_cleared(device, textures, TextureSlot::PhotoBackground, PassKind::Graphic)?;
        debug!(
            "Redrew {} of {} elements in {} groups",
            drawn,
            context.len(),
            groups.len()
        );
        Ok(drawn)
    }
}
