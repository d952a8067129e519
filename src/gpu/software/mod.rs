//! Reference [`GpuDevice`] that executes every command on the CPU.
//!
//! Textures are Cairo ARGB32 pixel buffers and render passes paint them
//! through a Cairo context. Submissions run eagerly inside `commit`, but
//! buffers written by a compute dispatch stay pending until the submission is
//! waited for, so the produce/wait/consume contract behaves exactly like on
//! real hardware.

mod kernels;
mod surface;

pub(crate) use surface::SurfaceBuffer;

use super::command::{Command, CommandBuffer, ComputeDispatch, DrawCall, RenderPassDescriptor};
use super::device::GpuDevice;
use super::types::{
    Bitmap, BufferId, DeviceLimits, GpuError, INDICES_PER_QUAD, LoadAction, QuadVertex,
    Submission, TextureId, VERTICES_PER_QUAD,
};
use crate::geometry::Extent;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const BYTES_PER_TEXEL: usize = surface::BYTES_PER_PIXEL;
const BYTES_PER_QUAD: usize =
    VERTICES_PER_QUAD * std::mem::size_of::<QuadVertex>() + INDICES_PER_QUAD * 4;

/// Counters exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub submissions: u64,
    pub dispatches: u64,
    pub copies: u64,
    pub render_passes: u64,
    pub draws: u64,
    pub waits: u64,
}

#[derive(Debug)]
struct TextureSlot {
    label: String,
    pixels: SurfaceBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    Empty,
    Pending(Submission),
    Ready,
}

#[derive(Debug)]
struct BufferSlot {
    label: String,
    capacity: usize,
    vertices: Vec<QuadVertex>,
    indices: Vec<u32>,
    state: BufferState,
}

#[derive(Debug, Default)]
struct DeviceState {
    limits: DeviceLimits,
    textures: HashMap<TextureId, TextureSlot>,
    buffers: HashMap<BufferId, BufferSlot>,
    next_id: u32,
    next_submission: u64,
    memory_used: usize,
    lost: bool,
    stats: DeviceStats,
}

/// CPU implementation of [`GpuDevice`].
///
/// Cloning yields another handle to the same device, which lets callers keep
/// inspecting it after handing one handle to a renderer.
#[derive(Debug, Clone, Default)]
pub struct SoftwareDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                limits,
                ..DeviceState::default()
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DeviceState>, GpuError> {
        self.state.lock().map_err(|_| GpuError::DeviceLost)
    }

    pub fn stats(&self) -> DeviceStats {
        self.lock().map(|s| s.stats).unwrap_or_default()
    }

    /// Bytes of textures and buffers currently allocated.
    pub fn memory_used(&self) -> usize {
        self.lock().map(|s| s.memory_used).unwrap_or_default()
    }

    pub fn texture_count(&self) -> usize {
        self.lock().map(|s| s.textures.len()).unwrap_or_default()
    }

    /// Simulates a device reset; every later call fails with `DeviceLost`.
    pub fn lose_device(&self) {
        if let Ok(mut state) = self.lock() {
            warn!("Software GPU device marked as lost");
            state.lost = true;
        }
    }

    /// Changes the limits applied to future allocations.
    pub fn set_limits(&self, limits: DeviceLimits) {
        if let Ok(mut state) = self.lock() {
            state.limits = limits;
        }
    }

    fn live(&self) -> Result<MutexGuard<'_, DeviceState>, GpuError> {
        let state = self.lock()?;
        if state.lost {
            return Err(GpuError::DeviceLost);
        }
        Ok(state)
    }
}

impl DeviceState {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn reserve(&mut self, label: &str, bytes: usize) -> Result<(), GpuError> {
        if self.memory_used.saturating_add(bytes) > self.limits.memory_budget {
            return Err(GpuError::OutOfMemory {
                label: label.to_string(),
                requested: bytes,
            });
        }
        self.memory_used += bytes;
        Ok(())
    }

    /// Checks every resource a command buffer touches before anything runs.
    fn validate(&self, commands: &CommandBuffer) -> Result<(), GpuError> {
        let produced: Vec<BufferId> = commands.produced_buffers().collect();
        for (buffer, quads) in commands.consumed_buffers() {
            let slot = self
                .buffers
                .get(&buffer)
                .ok_or(GpuError::MissingBuffer(buffer))?;
            if produced.contains(&buffer) || slot.state != BufferState::Ready {
                return Err(GpuError::BufferNotReady(buffer));
            }
            let written = slot.vertices.len() / VERTICES_PER_QUAD;
            if quads.start > quads.end || quads.end > written {
                return Err(GpuError::BufferOverflow {
                    buffer,
                    capacity: written,
                    requested: quads.end,
                });
            }
        }
        let texture = |id: TextureId| -> Result<&TextureSlot, GpuError> {
            self.textures.get(&id).ok_or(GpuError::MissingTexture(id))
        };
        for command in commands.commands() {
            match command {
                Command::Compute(ComputeDispatch::ExpandQuads { quads, output, .. }) => {
                    let slot = self
                        .buffers
                        .get(output)
                        .ok_or(GpuError::MissingBuffer(*output))?;
                    if quads.len() > slot.capacity {
                        return Err(GpuError::BufferOverflow {
                            buffer: *output,
                            capacity: slot.capacity,
                            requested: quads.len(),
                        });
                    }
                }
                Command::Compute(ComputeDispatch::CopyTexture {
                    source,
                    destination,
                }) => {
                    let from = texture(*source)?.pixels.extent();
                    let to = texture(*destination)?.pixels.extent();
                    if from != to {
                        return Err(GpuError::invalid_extent(to));
                    }
                }
                Command::Render(pass) => {
                    texture(pass.target)?;
                    for draw in &pass.draws {
                        if let DrawCall::Texture { source, .. } = draw {
                            if *source == pass.target {
                                return Err(GpuError::FeedbackLoop(*source));
                            }
                            texture(*source)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn execute_dispatch(&mut self, dispatch: ComputeDispatch, submission: Submission) {
        match dispatch {
            ComputeDispatch::ExpandQuads {
                quads,
                transform,
                opaque,
                output,
            } => {
                if let Some(slot) = self.buffers.get_mut(&output) {
                    kernels::expand_quads(
                        &quads,
                        &transform,
                        opaque,
                        &mut slot.vertices,
                        &mut slot.indices,
                    );
                    slot.state = BufferState::Pending(submission);
                    self.stats.dispatches += 1;
                }
            }
            ComputeDispatch::CopyTexture {
                source,
                destination,
            } => {
                let Some(from) = self.textures.get(&source).map(|t| t.pixels.clone()) else {
                    return;
                };
                if let Some(to) = self.textures.get_mut(&destination) {
                    kernels::copy_texture(&from, &mut to.pixels);
                    self.stats.dispatches += 1;
                    self.stats.copies += 1;
                }
            }
        }
    }

    fn execute_render(&mut self, pass: RenderPassDescriptor) -> Result<(), GpuError> {
        let Some(mut target) = self.textures.remove(&pass.target) else {
            return Ok(());
        };
        let painted = self.paint_pass(&mut target.pixels, &pass);
        self.textures.insert(pass.target, target);
        let draws = painted?;
        self.stats.draws += draws as u64;
        self.stats.render_passes += 1;
        Ok(())
    }

    /// Paints `pass` into `target`, which is out of the texture map meanwhile.
    fn paint_pass(
        &mut self,
        target: &mut SurfaceBuffer,
        pass: &RenderPassDescriptor,
    ) -> Result<usize, GpuError> {
        let extent = target.extent();
        let buffers = &self.buffers;
        let textures = &mut self.textures;
        target.draw(|ctx| {
            surface::clip_to(ctx, pass.scissor);
            if let LoadAction::Clear(color) = pass.load {
                surface::clear(ctx, color)?;
            }
            for draw in &pass.draws {
                match draw {
                    DrawCall::Quads {
                        buffer,
                        quads,
                        blend,
                    } => {
                        if let Some(slot) = buffers.get(buffer) {
                            let indices = slot
                                .indices
                                .get(quads.start * INDICES_PER_QUAD..quads.end * INDICES_PER_QUAD)
                                .unwrap_or_default();
                            surface::fill_quads(ctx, &slot.vertices, indices, *blend)?;
                        }
                    }
                    DrawCall::Texture {
                        source,
                        placement,
                        opacity,
                        blend,
                    } => {
                        if let Some(slot) = textures.get_mut(source) {
                            slot.pixels.with_surface(|source| {
                                surface::paint_texture(ctx, source, placement, *opacity, *blend)
                            })??;
                        }
                    }
                    DrawCall::Grid {
                        style,
                        spacing,
                        transform,
                        color,
                    } => surface::paint_grid(ctx, extent, *style, *spacing, transform, *color)?,
                }
            }
            Ok(pass.draws.len())
        })
    }
}

impl GpuDevice for SoftwareDevice {
    fn limits(&self) -> DeviceLimits {
        self.lock().map(|s| s.limits).unwrap_or_default()
    }

    fn create_texture(&mut self, label: &str, extent: Extent) -> Result<TextureId, GpuError> {
        let mut state = self.live()?;
        if extent.is_empty() {
            return Err(GpuError::invalid_extent(extent));
        }
        let max = state.limits.max_texture_dimension;
        if extent.width > max || extent.height > max {
            return Err(GpuError::TextureTooLarge {
                label: label.to_string(),
                width: extent.width,
                height: extent.height,
                max,
            });
        }
        state.reserve(label, extent.pixel_count() * BYTES_PER_TEXEL)?;
        let id = TextureId(state.allocate_id());
        debug!(
            "Created texture {} {:?} ({}x{})",
            label, id, extent.width, extent.height
        );
        state.textures.insert(
            id,
            TextureSlot {
                label: label.to_string(),
                pixels: SurfaceBuffer::new(extent),
            },
        );
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if let Ok(mut state) = self.lock()
            && let Some(slot) = state.textures.remove(&id)
        {
            debug!("Destroyed texture {} {:?}", slot.label, id);
            state.memory_used = state
                .memory_used
                .saturating_sub(slot.pixels.extent().pixel_count() * BYTES_PER_TEXEL);
        }
    }

    fn texture_extent(&self, id: TextureId) -> Result<Extent, GpuError> {
        let state = self.live()?;
        state
            .textures
            .get(&id)
            .map(|slot| slot.pixels.extent())
            .ok_or(GpuError::MissingTexture(id))
    }

    fn write_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), GpuError> {
        let mut state = self.live()?;
        let slot = state
            .textures
            .get_mut(&id)
            .ok_or(GpuError::MissingTexture(id))?;
        if slot.pixels.extent() != bitmap.extent() {
            return Err(GpuError::invalid_extent(bitmap.extent()));
        }
        slot.pixels = SurfaceBuffer::from_bitmap(bitmap);
        Ok(())
    }

    fn read_texture(&self, id: TextureId) -> Result<Bitmap, GpuError> {
        let state = self.live()?;
        state
            .textures
            .get(&id)
            .map(|slot| slot.pixels.to_bitmap())
            .ok_or(GpuError::MissingTexture(id))
    }

    fn create_buffer(&mut self, label: &str, quad_capacity: usize) -> Result<BufferId, GpuError> {
        let mut state = self.live()?;
        let capacity = quad_capacity.max(1);
        state.reserve(label, capacity.saturating_mul(BYTES_PER_QUAD))?;
        let id = BufferId(state.allocate_id());
        state.buffers.insert(
            id,
            BufferSlot {
                label: label.to_string(),
                capacity,
                vertices: Vec::new(),
                indices: Vec::new(),
                state: BufferState::Empty,
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if let Ok(mut state) = self.lock()
            && let Some(slot) = state.buffers.remove(&id)
        {
            debug!("Destroyed buffer {} {:?}", slot.label, id);
            state.memory_used = state
                .memory_used
                .saturating_sub(slot.capacity * BYTES_PER_QUAD);
        }
    }

    fn buffer_capacity(&self, id: BufferId) -> Result<usize, GpuError> {
        let state = self.live()?;
        state
            .buffers
            .get(&id)
            .map(|slot| slot.capacity)
            .ok_or(GpuError::MissingBuffer(id))
    }

    fn make_command_buffer(&mut self, label: &str) -> Result<CommandBuffer, GpuError> {
        self.live()?;
        Ok(CommandBuffer::new(label))
    }

    fn commit(&mut self, commands: CommandBuffer) -> Result<Submission, GpuError> {
        let mut state = self.live()?;
        state.validate(&commands)?;
        state.next_submission += 1;
        let submission = Submission(state.next_submission);
        debug!(
            "Executing command buffer '{}' as {:?}",
            commands.label(),
            submission
        );
        for command in commands.into_commands() {
            match command {
                Command::Compute(dispatch) => state.execute_dispatch(dispatch, submission),
                Command::Render(pass) => state.execute_render(pass)?,
            }
        }
        state.stats.submissions += 1;
        Ok(submission)
    }

    fn wait_until_completed(&mut self, submission: Submission) -> Result<(), GpuError> {
        let mut state = self.live()?;
        for slot in state.buffers.values_mut() {
            if let BufferState::Pending(pending) = slot.state
                && pending <= submission
            {
                slot.state = BufferState::Ready;
            }
        }
        state.stats.waits += 1;
        Ok(())
    }
}
