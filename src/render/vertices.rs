//! Compute-then-render handoff for quad vertices.
//!
//! [`QuadVertexBuilder::produce`] dispatches the expansion kernel,
//! [`PendingVertices::wait`] blocks until it completed, and only the resulting
//! [`ReadyVertices`] can be turned into a draw call.

use super::error::{InPass, PassKind, RenderError};
use crate::geometry::CameraTransform;
use crate::gpu::{BlendMode, BufferId, ComputeDispatch, DrawCall, GpuDevice, Submission};
use crate::stroke::Quad;
use std::ops::Range;

/// Owns one reusable vertex/index buffer of a pass.
#[derive(Debug)]
pub struct QuadVertexBuilder {
    pass: PassKind,
    buffer: Option<(BufferId, usize)>,
}

/// Vertices whose expansion was submitted but not waited for.
#[must_use = "vertices must be waited for before drawing"]
#[derive(Debug)]
pub struct PendingVertices {
    pass: PassKind,
    buffer: BufferId,
    quad_count: usize,
    submission: Submission,
}

/// Vertices ready to be bound by a draw.
#[derive(Debug, Clone, Copy)]
pub struct ReadyVertices {
    buffer: BufferId,
    quad_count: usize,
}

impl QuadVertexBuilder {
    pub fn new(pass: PassKind) -> Self {
        Self { pass, buffer: None }
    }

    fn ensure_capacity(
        &mut self,
        device: &mut dyn GpuDevice,
        quads: usize,
    ) -> Result<BufferId, RenderError> {
        if let Some((buffer, capacity)) = self.buffer
            && capacity >= quads
        {
            return Ok(buffer);
        }
        if let Some((old, _)) = self.buffer.take() {
            device.destroy_buffer(old);
        }
        let capacity = quads.max(64).next_power_of_two();
        let label = format!("{}-quads", self.pass);
        let buffer = device.create_buffer(&label, capacity).in_pass(self.pass)?;
        self.buffer = Some((buffer, capacity));
        Ok(buffer)
    }

    /// Submits the expansion of `quads` into view space through `transform`.
    pub fn produce(
        &mut self,
        device: &mut dyn GpuDevice,
        quads: Vec<Quad>,
        transform: CameraTransform,
    ) -> Result<PendingVertices, RenderError> {
        let quad_count = quads.len();
        let buffer = self.ensure_capacity(device, quad_count)?;
        let mut commands = device
            .make_command_buffer(&format!("{}-expand", self.pass))
            .map_err(|source| RenderError::CommandBuffer {
                pass: self.pass,
                source,
            })?;
        commands.dispatch(ComputeDispatch::ExpandQuads {
            quads,
            transform,
            opaque: true,
            output: buffer,
        });
        let submission = device.commit(commands).in_pass(self.pass)?;
        Ok(PendingVertices {
            pass: self.pass,
            buffer,
            quad_count,
            submission,
        })
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some((buffer, _)) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
    }
}

impl PendingVertices {
    /// Blocks until the expansion kernel finished.
    pub fn wait(self, device: &mut dyn GpuDevice) -> Result<ReadyVertices, RenderError> {
        device
            .wait_until_completed(self.submission)
            .in_pass(self.pass)?;
        Ok(ReadyVertices {
            buffer: self.buffer,
            quad_count: self.quad_count,
        })
    }
}

impl ReadyVertices {
    pub fn quad_count(&self) -> usize {
        self.quad_count
    }

    pub fn draw(&self, quads: Range<usize>, blend: BlendMode) -> DrawCall {
        DrawCall::Quads {
            buffer: self.buffer,
            quads,
            blend,
        }
    }
}
