//! PNG export of rendered bitmaps through Cairo image surfaces.

use crate::gpu::Bitmap;
use crate::gpu::software::SurfaceBuffer;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;

/// Writes `bitmap` to `path` as a PNG, creating the parent directory if needed.
pub fn save_png(bitmap: &Bitmap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let mut pixels = SurfaceBuffer::from_bitmap(bitmap);
    pixels
        .with_surface(|surface| surface.write_to_png(&mut file))
        .context("Failed to create image surface")?
        .with_context(|| format!("Failed to write PNG to {}", path.display()))?;

    let extent = bitmap.extent();
    log::info!(
        "Saved {}x{} PNG to {}",
        extent.width,
        extent.height,
        path.display()
    );
    Ok(())
}
