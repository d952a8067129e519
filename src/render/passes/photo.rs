use super::command_buffer;
use crate::element::{Photo, PhotoLibrary, PhotoRef};
use crate::geometry::CameraTransform;
use crate::gpu::{BlendMode, DrawCall, GpuDevice, Placement, RenderPassDescriptor, TextureId};
use crate::render::error::{InPass, PassKind, RenderError};
use crate::render::textures::{TextureRegistry, TextureSlot};
use log::{debug, warn};
use std::collections::HashMap;

/// Draws photos as textured rectangles. Uploaded images are kept until
/// [`PhotoRenderPass::release`].
#[derive(Debug, Default)]
pub struct PhotoRenderPass {
    uploaded: HashMap<String, TextureId>,
}

impl PhotoRenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.len()
    }

    fn upload(
        &mut self,
        device: &mut dyn GpuDevice,
        library: &PhotoLibrary,
        image: &PhotoRef,
    ) -> Result<Option<TextureId>, RenderError> {
        if let Some(id) = self.uploaded.get(&image.key) {
            return Ok(Some(*id));
        }
        let Some(bitmap) = library.get(image) else {
            warn!("Photo '{}' has no decoded image, skipping", image.key);
            return Ok(None);
        };
        let id = device
            .create_texture(&format!("photo-{}", image.key), bitmap.extent())
            .in_pass(PassKind::Photo)?;
        if let Err(source) = device.write_texture(id, bitmap) {
            device.destroy_texture(id);
            return Err(RenderError::Pass {
                pass: PassKind::Photo,
                source,
            });
        }
        debug!("Uploaded photo '{}'", image.key);
        self.uploaded.insert(image.key.clone(), id);
        Ok(Some(id))
    }

    fn placement(
        device: &dyn GpuDevice,
        id: TextureId,
        photo: &Photo,
        camera: &CameraTransform,
    ) -> Option<Placement> {
        let extent = device.texture_extent(id).ok()?;
        let origin = camera.apply(photo.origin);
        Some(Placement {
            scale_x: photo.size.0 / extent.width as f64 * camera.scale,
            scale_y: photo.size.1 / extent.height as f64 * camera.scale,
            offset_x: origin.x,
            offset_y: origin.y,
        })
    }

    pub fn draw(
        &mut self,
        device: &mut dyn GpuDevice,
        textures: &mut TextureRegistry,
        photos: &[&Photo],
        library: &PhotoLibrary,
        camera: CameraTransform,
        target: TextureSlot,
    ) -> Result<usize, RenderError> {
        if photos.is_empty() {
            return Ok(0);
        }
        let target_id = textures.acquire(device, target).in_pass(PassKind::Photo)?;
        let mut pass =
            RenderPassDescriptor::new("photo", target_id, textures.load_action(target));
        let mut drawn = 0;
        for photo in photos {
            let Some(texture) = self.upload(device, library, &photo.image)? else {
                continue;
            };
            let Some(placement) = Self::placement(device, texture, photo, &camera) else {
                continue;
            };
            pass = pass.draw(DrawCall::Texture {
                source: texture,
                placement,
                opacity: 1.0,
                blend: BlendMode::Over,
            });
            drawn += 1;
        }
        let mut commands = command_buffer(device, PassKind::Photo, "photo")?;
        commands.render(pass);
        device.commit(commands).in_pass(PassKind::Photo)?;
        textures.mark_written(target);
        Ok(drawn)
    }

    /// Drops the texture of one image, e.g. after it left the library.
    pub fn forget(&mut self, device: &mut dyn GpuDevice, key: &str) {
        if let Some(id) = self.uploaded.remove(key) {
            device.destroy_texture(id);
        }
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        for (_, id) in self.uploaded.drain() {
            device.destroy_texture(id);
        }
    }
}
