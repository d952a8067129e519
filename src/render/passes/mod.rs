//! The passes of the compositing pipeline.
//!
//! Element passes (stroke, eraser, photo) draw batches into whichever target
//! slot they are handed. The frame passes (graphic, cache, viewport, preview)
//! decide what gets drawn where.

mod cache;
mod graphic;
mod ink;
mod photo;
mod preview;
mod viewport;

pub use cache::CacheRenderPass;
pub use graphic::{GraphicOutcome, GraphicRenderPass};
pub use ink::{EraserRenderPass, StrokeRenderPass};
pub use photo::PhotoRenderPass;
pub use preview::PreviewRenderPass;
pub use viewport::{Backdrop, ViewPortRenderPass};

use super::error::{InPass, PassKind, RenderError};
use super::textures::{TextureRegistry, TextureSlot};
use crate::element::{ElementGroup, ElementKind, PhotoLibrary, Stroke, StrokeKind};
use crate::geometry::{BoundingBox, CameraTransform, Extent, Point};
use crate::gpu::{CommandBuffer, GpuDevice, RenderPassDescriptor};
use crate::util::Rect;

/// Quads are rasterised at pixel centres; one pixel of slack covers rounding.
const SCISSOR_SLACK: f64 = 1.0;

/// Where a batch of elements is drawn.
#[derive(Debug, Clone, Copy)]
pub struct Targets {
    /// Receives marker and eraser strokes.
    pub ink: TextureSlot,
    /// Receives photos.
    pub photos: TextureSlot,
}

impl Targets {
    pub const LAYERS: Self = Self {
        ink: TextureSlot::Graphic,
        photos: TextureSlot::PhotoBackground,
    };
}

/// The passes able to draw elements, shared by the frame passes.
#[derive(Debug)]
pub struct ElementPasses {
    pub stroke: StrokeRenderPass,
    pub eraser: EraserRenderPass,
    pub photo: PhotoRenderPass,
}

impl Default for ElementPasses {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementPasses {
    pub fn new() -> Self {
        Self {
            stroke: StrokeRenderPass::new(),
            eraser: EraserRenderPass::new(),
            photo: PhotoRenderPass::new(),
        }
    }

    /// Draws strokes of one kind with the matching pass.
    pub fn draw_strokes(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        kind: StrokeKind,
        strokes: &[&Stroke],
        camera: CameraTransform,
        target: TextureSlot,
    ) -> Result<usize, RenderError> {
        match kind {
            StrokeKind::Marker => self.stroke.draw(device, textures, strokes, camera, target),
            StrokeKind::Eraser => self.eraser.draw(device, textures, strokes, camera, target),
        }
    }

    /// Draws one group with a single batch. Returns the number of elements drawn.
    pub fn draw_group(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        group: &ElementGroup<'_>,
        library: &PhotoLibrary,
        camera: CameraTransform,
        targets: Targets,
    ) -> Result<usize, RenderError> {
        match group.kind {
            ElementKind::Photo => {
                let photos: Vec<_> = group.elements.iter().filter_map(|e| e.as_photo()).collect();
                self.photo
                    .draw(device, textures, &photos, library, camera, targets.photos)
            }
            ElementKind::Marker | ElementKind::Eraser => {
                let kind = if group.kind == ElementKind::Marker {
                    StrokeKind::Marker
                } else {
                    StrokeKind::Eraser
                };
                let strokes: Vec<_> = group.elements.iter().filter_map(|e| e.as_stroke()).collect();
                self.draw_strokes(device, textures, kind, &strokes, camera, targets.ink)
            }
        }
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.stroke.release(device);
        self.eraser.release(device);
        self.photo.release(device);
    }
}

/// View-space box of world `bounds` under `camera`.
pub(crate) fn view_bounds(bounds: &BoundingBox, camera: &CameraTransform) -> BoundingBox {
    let a = camera.apply(Point::new(bounds.min_x, bounds.min_y));
    let b = camera.apply(Point::new(bounds.max_x, bounds.max_y));
    BoundingBox {
        min_x: a.x.min(b.x),
        min_y: a.y.min(b.y),
        max_x: a.x.max(b.x),
        max_y: a.y.max(b.y),
    }
}

/// Pixel rectangle touched by world `bounds`, or `None` when off-screen.
pub(crate) fn scissor_for(
    bounds: &BoundingBox,
    camera: &CameraTransform,
    extent: Extent,
) -> Option<Rect> {
    if bounds.is_empty() {
        return None;
    }
    Rect::covering(&view_bounds(bounds, camera).padded(SCISSOR_SLACK), extent)
}

pub(crate) fn command_buffer(
    device: &mut dyn GpuDevice,
    pass: PassKind,
    label: &str,
) -> Result<CommandBuffer, RenderError> {
    device
        .make_command_buffer(label)
        .map_err(|source| RenderError::CommandBuffer { pass, source })
}

/// Creates `slot` if needed and clears it when nothing has written it yet.
pub(crate) fn ensure_cleared(
    device: &mut dyn GpuDevice,
    textures: &mut TextureRegistry,
    slot: TextureSlot,
    pass: PassKind,
) -> Result<(), RenderError> {
    let target = textures.acquire(device, slot).in_pass(pass)?;
    if !textures.needs_clear(slot) {
        return Ok(());
    }
    let mut commands = command_buffer(device, pass, "clear")?;
    commands.render(RenderPassDescriptor::new(
        format!("clear-{slot}"),
        target,
        textures.load_action(slot),
    ));
    device.commit(commands).in_pass(pass)?;
    textures.mark_written(slot);
    Ok(())
}
