//! Resource handles, blend state and pixel containers shared by every backend.

use crate::color::Color;
use crate::geometry::Extent;
use thiserror::Error;

/// Handle to a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a device vertex/index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Ticket returned by `commit`; submissions complete in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Submission(pub u64);

/// Errors reported by a [`GpuDevice`](super::GpuDevice).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("out of device memory allocating {label} ({requested} bytes)")]
    OutOfMemory { label: String, requested: usize },

    #[error("texture {label} of {width}x{height} exceeds the device limit of {max}")]
    TextureTooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("texture {0:?} does not exist")]
    MissingTexture(TextureId),

    #[error("buffer {0:?} does not exist")]
    MissingBuffer(BufferId),

    #[error("buffer {0:?} is bound before its producing dispatch completed")]
    BufferNotReady(BufferId),

    #[error("buffer {buffer:?} holds {capacity} quads, {requested} requested")]
    BufferOverflow {
        buffer: BufferId,
        capacity: usize,
        requested: usize,
    },

    #[error("extent {width}x{height} is not valid here")]
    InvalidExtent { width: u32, height: u32 },

    #[error("texture {0:?} is sampled by a pass that renders into it")]
    FeedbackLoop(TextureId),

    #[error("rasterizer failed: {0}")]
    Raster(String),

    #[error("the GPU device was lost")]
    DeviceLost,
}

impl From<cairo::Error> for GpuError {
    fn from(err: cairo::Error) -> Self {
        GpuError::Raster(err.to_string())
    }
}

impl GpuError {
    pub fn invalid_extent(extent: Extent) -> Self {
        GpuError::InvalidExtent {
            width: extent.width,
            height: extent.height,
        }
    }

    /// Resource failures that skip a single pass; everything else aborts the frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GpuError::DeviceLost)
    }
}

/// Fixed-function blend state of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Premultiplied source-over: `dst = src + dst * (1 - src.a)`.
    Over,
    /// Reverse subtract scaled by source alpha: `dst = dst - dst * src.a`.
    ReverseSubtractAlpha,
    /// `dst = src`.
    Replace,
}

/// What happens to a render target when a pass starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadAction {
    Clear(Color),
    Load,
}

/// Hard limits of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_texture_dimension: u32,
    /// Total bytes of textures and buffers alive at once.
    pub memory_budget: usize,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_dimension: 8192,
            memory_budget: 1 << 30,
        }
    }
}

/// One vertex of an expanded quad, in target pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 2],
    /// Premultiplied color.
    pub color: [f32; 4],
    /// Fill the circle inscribed in the quad instead of the quad itself.
    pub round: bool,
}

/// Vertices and indices emitted per quad by the expansion kernel.
pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// CPU-side RGBA image with premultiplied `f32` channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    extent: Extent,
    pixels: Vec<[f32; 4]>,
}

impl Bitmap {
    /// Fully transparent bitmap.
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            pixels: vec![[0.0; 4]; extent.pixel_count()],
        }
    }

    pub fn filled(extent: Extent, color: Color) -> Self {
        Self {
            extent,
            pixels: vec![color.premultiplied(); extent.pixel_count()],
        }
    }

    /// Builds a bitmap from straight (non-premultiplied) 8-bit RGBA rows.
    pub fn from_rgba8(extent: Extent, data: &[u8]) -> Result<Self, GpuError> {
        if extent.is_empty() || data.len() != extent.pixel_count() * 4 {
            return Err(GpuError::invalid_extent(extent));
        }
        let pixels = data
            .chunks_exact(4)
            .map(|px| {
                let a = px[3] as f32 / 255.0;
                [
                    px[0] as f32 / 255.0 * a,
                    px[1] as f32 / 255.0 * a,
                    px[2] as f32 / 255.0 * a,
                    a,
                ]
            })
            .collect();
        Ok(Self { extent, pixels })
    }

    /// Straight (un-premultiplied) 8-bit RGBA rows.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for [r, g, b, a] in &self.pixels {
            let unpremultiply = |c: f32| if *a > 0.0 { c / a } else { 0.0 };
            out.push(to_u8(unpremultiply(*r)));
            out.push(to_u8(unpremultiply(*g)));
            out.push(to_u8(unpremultiply(*b)));
            out.push(to_u8(*a));
        }
        out
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.extent.width || y >= self.extent.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.extent.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels with any coverage.
    pub fn covered_pixels(&self) -> usize {
        self.pixels.iter().filter(|px| px[3] > 0.0).count()
    }
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_conversion_premultiplies() {
        let bitmap = Bitmap::from_rgba8(Extent::new(1, 1), &[255, 0, 0, 128]).unwrap();
        let px = bitmap.pixel(0, 0).unwrap();
        assert!((px[0] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(bitmap.to_rgba8(), vec![255, 0, 0, 128]);
    }

    #[test]
    fn rgba8_rejects_wrong_length() {
        assert!(Bitmap::from_rgba8(Extent::new(2, 2), &[0; 4]).is_err());
    }

    #[test]
    fn only_device_loss_is_fatal() {
        assert!(GpuError::MissingTexture(TextureId(1)).is_recoverable());
        assert!(
            GpuError::OutOfMemory {
                label: "graphic".into(),
                requested: 4
            }
            .is_recoverable()
        );
        assert!(!GpuError::DeviceLost.is_recoverable());
    }
}
