use super::{command_buffer, scissor_for};
use crate::color::TRANSPARENT;
use crate::element::{Stroke, StrokeKind};
use crate::geometry::CameraTransform;
use crate::gpu::{BlendMode, DrawCall, GpuDevice, LoadAction, Placement, RenderPassDescriptor};
use crate::render::error::{InPass, PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};
use crate::render::vertices::QuadVertexBuilder;
use crate::stroke::Quad;
use log::trace;
use std::ops::Range;

/// Shared body of the marker and eraser passes.
///
/// All quads of a batch are expanded with one dispatch. Each stroke is then
/// rasterised opaque into the scratch [`TextureSlot::Stroke`] texture and
/// composited into the target, so overlapping quads of one stroke never
/// accumulate alpha.
#[derive(Debug)]
struct InkPass {
    kind: StrokeKind,
    vertices: QuadVertexBuilder,
}

impl InkPass {
    fn new(kind: StrokeKind) -> Self {
        Self {
            kind,
            vertices: QuadVertexBuilder::new(Self::pass_kind(kind)),
        }
    }

    fn pass_kind(kind: StrokeKind) -> PassKind {
        match kind {
            StrokeKind::Marker => PassKind::Stroke,
            StrokeKind::Eraser => PassKind::Eraser,
        }
    }

    fn opacity(&self, stroke: &Stroke) -> f32 {
        match self.kind {
            StrokeKind::Marker => stroke.color.a.clamp(0.0, 1.0) as f32,
            StrokeKind::Eraser => 1.0,
        }
    }

    fn draw(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        strokes: &[&Stroke],
        camera: CameraTransform,
        target: TextureSlot,
    ) -> Result<usize, RenderError> {
        let pass = Self::pass_kind(self.kind);
        let extent = textures.extent();

        let mut quads: Vec<Quad> = Vec::new();
        let mut batch: Vec<(&Stroke, Range<usize>)> = Vec::with_capacity(strokes.len());
        for &stroke in strokes {
            if stroke.is_empty() || scissor_for(&stroke.bounds(), &camera, extent).is_none() {
                continue;
            }
            let start = quads.len();
            quads.extend_from_slice(stroke.quads());
            batch.push((stroke, start..quads.len()));
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let scratch = textures.acquire(device, TextureSlot::Stroke).in_pass(pass)?;
        let target_id = textures.acquire(device, target).in_pass(pass)?;
        let ready = self.vertices.produce(device, quads, camera)?.wait(device)?;
        trace!(
            "{} pass: {} strokes, {} quads into {}",
            pass,
            batch.len(),
            ready.quad_count(),
            target
        );

        let mut commands = command_buffer(device, pass, &format!("{pass}-batch"))?;
        if textures.needs_clear(target) {
            commands.render(RenderPassDescriptor::new(
                format!("clear-{target}"),
                target_id,
                textures.load_action(target),
            ));
        }
        for (stroke, range) in &batch {
            let scissor = scissor_for(&stroke.bounds(), &camera, extent);
            commands.render(
                RenderPassDescriptor::new(
                    format!("{pass}-{}", stroke.id),
                    scratch,
                    LoadAction::Clear(TRANSPARENT),
                )
                .with_scissor(scissor)
                .draw(ready.draw(range.clone(), BlendMode::Over)),
            );
            commands.render(
                RenderPassDescriptor::new(
                    format!("{pass}-composite"),
                    target_id,
                    LoadAction::Load,
                )
                .with_scissor(scissor)
                .draw(DrawCall::Texture {
                    source: scratch,
                    placement: Placement::IDENTITY,
                    opacity: self.opacity(stroke),
                    blend: stroke.kind.blend(),
                }),
            );
        }
        device.commit(commands).in_pass(pass)?;
        textures.mark_written(target);
        textures.mark_written(TextureSlot::Stroke);
        Ok(batch.len())
    }
}

/// Draws marker strokes with their colour and opacity.
#[derive(Debug)]
pub struct StrokeRenderPass(InkPass);

impl Default for StrokeRenderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeRenderPass {
    pub fn new() -> Self {
        Self(InkPass::new(StrokeKind::Marker))
    }

    pub fn draw(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        strokes: &[&Stroke],
        camera: CameraTransform,
        target: TextureSlot,
    ) -> Result<usize, RenderError> {
        self.0.draw(device, textures, strokes, camera, target)
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.0.vertices.release(device);
    }
}

/// Removes ink beneath eraser strokes by subtracting their coverage from alpha.
#[derive(Debug)]
pub struct EraserRenderPass(InkPass);

impl Default for EraserRenderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EraserRenderPass {
    pub fn new() -> Self {
        Self(InkPass::new(StrokeKind::Eraser))
    }

    pub fn draw(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        strokes: &[&Stroke],
        camera: CameraTransform,
        target: TextureSlot,
    ) -> Result<usize, RenderError> {
        self.0.draw(device, textures, strokes, camera, target)
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.0.vertices.release(device);
    }
}
