//! Command recording: compute dispatches and render passes encoded into a
//! [`CommandBuffer`] and executed in order when committed.

use super::types::{BlendMode, BufferId, LoadAction, TextureId};
use crate::color::Color;
use crate::geometry::CameraTransform;
use crate::stroke::Quad;
use crate::util::Rect;
use std::ops::Range;

/// Threadgroup edge of the texture copy kernel.
pub const COPY_THREADGROUP: u32 = 16;

/// Axis-aligned mapping from source texels to target pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Placement {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };
}

impl From<CameraTransform> for Placement {
    fn from(camera: CameraTransform) -> Self {
        Self {
            scale_x: camera.scale,
            scale_y: camera.scale,
            offset_x: camera.offset_x,
            offset_y: camera.offset_y,
        }
    }
}

/// Background grid flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStyle {
    Point,
    Line,
}

/// Compute work encoded before render passes.
#[derive(Debug, Clone)]
pub enum ComputeDispatch {
    /// One thread per quad: writes 4 vertices and 6 indices into `output`,
    /// mapping world coordinates through `transform`.
    ExpandQuads {
        quads: Vec<Quad>,
        transform: CameraTransform,
        /// Forces alpha to 1; stroke passes apply opacity when compositing.
        opaque: bool,
        output: BufferId,
    },
    /// Copies `source` into `destination` in 16x16 threadgroups. Extents must match.
    CopyTexture {
        source: TextureId,
        destination: TextureId,
    },
}

/// A single draw inside a render pass.
#[derive(Debug, Clone)]
pub enum DrawCall {
    /// Indexed triangles for the quads `quads` of an expanded buffer.
    Quads {
        buffer: BufferId,
        quads: Range<usize>,
        blend: BlendMode,
    },
    /// Nearest-sampled textured rectangle.
    Texture {
        source: TextureId,
        placement: Placement,
        opacity: f32,
        blend: BlendMode,
    },
    /// World-aligned grid every `spacing` world units.
    Grid {
        style: GridStyle,
        spacing: f64,
        transform: CameraTransform,
        color: Color,
    },
}

/// Render pass targeting one texture.
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: String,
    pub target: TextureId,
    pub load: LoadAction,
    /// Limits clears and draws to this pixel rectangle.
    pub scissor: Option<Rect>,
    pub draws: Vec<DrawCall>,
}

impl RenderPassDescriptor {
    pub fn new(label: impl Into<String>, target: TextureId, load: LoadAction) -> Self {
        Self {
            label: label.into(),
            target,
            load,
            scissor: None,
            draws: Vec::new(),
        }
    }

    pub fn with_scissor(mut self, scissor: Option<Rect>) -> Self {
        self.scissor = scissor;
        self
    }

    pub fn draw(mut self, call: DrawCall) -> Self {
        self.draws.push(call);
        self
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Compute(ComputeDispatch),
    Render(RenderPassDescriptor),
}

/// Ordered list of commands submitted as one unit.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    label: String,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dispatch(&mut self, dispatch: ComputeDispatch) {
        self.commands.push(Command::Compute(dispatch));
    }

    pub fn render(&mut self, pass: RenderPassDescriptor) {
        self.commands.push(Command::Render(pass));
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Buffers written by compute dispatches in this command buffer.
    pub fn produced_buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.commands.iter().filter_map(|command| match command {
            Command::Compute(ComputeDispatch::ExpandQuads { output, .. }) => Some(*output),
            _ => None,
        })
    }

    /// Buffers bound by draw calls, with the quad range each draw reads.
    pub fn consumed_buffers(&self) -> impl Iterator<Item = (BufferId, Range<usize>)> + '_ {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Render(pass) => Some(pass.draws.iter()),
                _ => None,
            })
            .flatten()
            .filter_map(|draw| match draw {
                DrawCall::Quads { buffer, quads, .. } => Some((*buffer, quads.clone())),
                _ => None,
            })
    }
}
