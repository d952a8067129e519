//! GPU device abstraction and the CPU reference backend.

pub mod command;
pub mod device;
pub mod software;
pub mod types;

pub use command::{
    COPY_THREADGROUP, Command, CommandBuffer, ComputeDispatch, DrawCall, GridStyle, Placement,
    RenderPassDescriptor,
};
pub use device::GpuDevice;
pub use software::{DeviceStats, SoftwareDevice};
pub use types::{
    Bitmap, BlendMode, BufferId, DeviceLimits, GpuError, INDICES_PER_QUAD, LoadAction,
    QuadVertex, Submission, TextureId, VERTICES_PER_QUAD,
};
