//! Cached render targets, each owned by exactly one pass.

use super::error::{PassKind, RenderError};
use crate::color::TRANSPARENT;
use crate::geometry::Extent;
use crate::gpu::{GpuDevice, GpuError, LoadAction, TextureId};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Named cached textures of the compositing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Finished ink.
    Graphic,
    /// Finished ink plus the stroke in flight.
    Cache,
    /// Scratch target for a single stroke.
    Stroke,
    /// Photos beneath the ink.
    PhotoBackground,
    /// What is presented on screen.
    Viewport,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::Graphic,
        TextureSlot::Cache,
        TextureSlot::Stroke,
        TextureSlot::PhotoBackground,
        TextureSlot::Viewport,
    ];

    /// The pass that creates and writes this texture.
    pub fn owner(self) -> PassKind {
        match self {
            TextureSlot::Graphic => PassKind::Graphic,
            TextureSlot::Cache => PassKind::Cache,
            TextureSlot::Stroke => PassKind::Stroke,
            TextureSlot::PhotoBackground => PassKind::Photo,
            TextureSlot::Viewport => PassKind::ViewPort,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextureSlot::Graphic => "graphic",
            TextureSlot::Cache => "cache",
            TextureSlot::Stroke => "stroke",
            TextureSlot::PhotoBackground => "photo-background",
            TextureSlot::Viewport => "viewport",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registry of the pipeline's textures. Passes hold slots, never texture ids,
/// so every texture has a single owner: the registry itself.
#[derive(Debug)]
pub struct TextureRegistry {
    extent: Extent,
    textures: HashMap<TextureSlot, TextureId>,
    needs_clear: HashSet<TextureSlot>,
}

impl TextureRegistry {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            textures: HashMap::new(),
            needs_clear: HashSet::new(),
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Returns the texture of `slot`, creating it on first use.
    pub fn acquire(
        &mut self,
        device: &mut dyn GpuDevice,
        slot: TextureSlot,
    ) -> Result<TextureId, GpuError> {
        if let Some(id) = self.textures.get(&slot) {
            return Ok(*id);
        }
        let id = device.create_texture(slot.label(), self.extent)?;
        self.textures.insert(slot, id);
        self.needs_clear.insert(slot);
        Ok(id)
    }

    /// Non-owning lookup for passes that only read `slot`.
    pub fn get(&self, slot: TextureSlot) -> Option<TextureId> {
        self.textures.get(&slot).copied()
    }

    pub fn require(&self, slot: TextureSlot, reader: PassKind) -> Result<TextureId, RenderError> {
        self.get(slot).ok_or(RenderError::MissingSlot {
            pass: reader,
            slot,
        })
    }

    /// Clear on the first write after creation or invalidation, load afterwards.
    /// Writers call [`TextureRegistry::mark_written`] once their commit succeeded.
    pub fn load_action(&self, slot: TextureSlot) -> LoadAction {
        if self.needs_clear.contains(&slot) {
            LoadAction::Clear(TRANSPARENT)
        } else {
            LoadAction::Load
        }
    }

    pub fn needs_clear(&self, slot: TextureSlot) -> bool {
        self.needs_clear.contains(&slot)
    }

    /// The next write to `slot` starts from a cleared texture.
    pub fn invalidate(&mut self, slot: TextureSlot) {
        self.needs_clear.insert(slot);
    }

    /// `slot` now holds valid content.
    pub fn mark_written(&mut self, slot: TextureSlot) {
        self.needs_clear.remove(&slot);
    }

    /// Drops every texture when the extent changes. Returns `true` on change.
    pub fn resize(&mut self, device: &mut dyn GpuDevice, extent: Extent) -> bool {
        if extent == self.extent {
            return false;
        }
        debug!(
            "Resizing render targets {}x{} -> {}x{}",
            self.extent.width, self.extent.height, extent.width, extent.height
        );
        self.release(device);
        self.extent = extent;
        true
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        for (_, id) in self.textures.drain() {
            device.destroy_texture(id);
        }
        self.needs_clear.clear();
    }
}
