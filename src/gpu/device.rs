use super::command::CommandBuffer;
use super::types::{Bitmap, BufferId, DeviceLimits, GpuError, Submission, TextureId};
use crate::geometry::Extent;

/// Abstraction over a GPU with a single serial command queue.
///
/// Submissions complete in commit order. A draw may only bind a vertex buffer
/// after the submission that produced it was waited for with
/// [`GpuDevice::wait_until_completed`]; committing earlier fails with
/// [`GpuError::BufferNotReady`].
pub trait GpuDevice: Send {
    fn limits(&self) -> DeviceLimits;

    fn create_texture(&mut self, label: &str, extent: Extent) -> Result<TextureId, GpuError>;

    fn destroy_texture(&mut self, id: TextureId);

    fn texture_extent(&self, id: TextureId) -> Result<Extent, GpuError>;

    fn write_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), GpuError>;

    fn read_texture(&self, id: TextureId) -> Result<Bitmap, GpuError>;

    /// Allocates a vertex/index buffer large enough for `quad_capacity` quads.
    fn create_buffer(&mut self, label: &str, quad_capacity: usize) -> Result<BufferId, GpuError>;

    fn destroy_buffer(&mut self, id: BufferId);

    fn buffer_capacity(&self, id: BufferId) -> Result<usize, GpuError>;

    fn make_command_buffer(&mut self, label: &str) -> Result<CommandBuffer, GpuError>;

    fn commit(&mut self, commands: CommandBuffer) -> Result<Submission, GpuError>;

    /// Blocks until `submission` and every earlier submission finished.
    fn wait_until_completed(&mut self, submission: Submission) -> Result<(), GpuError>;
}
