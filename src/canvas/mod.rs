//! The canvas facade: one document, its live state and one view onto it.
//!
//! Input handlers talk to [`Canvas`] only. Every finished stroke, placed photo,
//! deletion, undo and redo is forwarded to the document's persistence worker
//! right after it is applied in memory.

mod demo;
mod document;
mod stats;

pub use demo::draw_demo;
pub use document::Document;
pub use stats::DocumentStats;

use crate::config::Config;
use crate::context::{ElementChange, GraphicContext, PhotoHandle, StrokeHandle};
use crate::element::{Element, ElementError, ElementId, PenStyle, PhotoRef};
use crate::geometry::{CameraTransform, Extent, GeometryError, Point};
use crate::gpu::{Bitmap, GpuDevice};
use crate::persistence::PersistenceError;
use crate::render::{FrameReport, GridMode, RenderError, Renderer};
use crate::util::Rect;
use log::{debug, info, warn};

pub struct Canvas {
    document: Document,
    context: GraphicContext,
    renderer: Renderer,
    pen: PenStyle,
    eraser: PenStyle,
    needs_frame: bool,
}

impl Canvas {
    pub fn new(
        document: Document,
        device: Box<dyn GpuDevice>,
        extent: Extent,
        config: &Config,
    ) -> Self {
        info!(
            "Opening canvas '{}' at {}x{}",
            document.name, extent.width, extent.height
        );
        Self {
            document,
            context: GraphicContext::new(config.generator_config(), config.drawing.smoothing),
            renderer: Renderer::new(device, extent, config.render_settings()),
            pen: config.pen_style(),
            eraser: config.eraser_style(),
            needs_frame: true,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn context(&self) -> &GraphicContext {
        &self.context
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Marker pen taken from the configuration.
    pub fn pen(&self) -> PenStyle {
        self.pen
    }

    pub fn eraser(&self) -> PenStyle {
        self.eraser
    }

    pub fn set_pen(&mut self, pen: PenStyle) {
        self.pen = pen;
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats::collect(&self.context)
    }

    /// Whether something changed since the last rendered frame.
    pub fn needs_redraw(&self) -> bool {
        self.needs_frame
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    pub fn begin_stroke(
        &mut self,
        point: Point,
        style: &PenStyle,
    ) -> Result<StrokeHandle, ElementError> {
        let handle = self.context.begin_stroke(point, style)?;
        self.needs_frame = true;
        Ok(handle)
    }

    pub fn append_stroke(&mut self, point: Point) -> bool {
        let appended = self.context.append_stroke(point);
        self.needs_frame |= appended;
        appended
    }

    pub fn end_stroke(&mut self, point: Point) -> Option<StrokeHandle> {
        let handle = self.context.end_stroke(point)?;
        self.needs_frame = true;
        self.forward_changes();
        Some(handle)
    }

    /// Discards the stroke in progress and schedules a frame to erase its preview.
    pub fn cancel_stroke(&mut self) -> bool {
        let cancelled = self.context.cancel_stroke();
        if cancelled {
            self.request_redraw();
        }
        cancelled
    }

    /// Places `image` at `origin` with its pixel size in world units.
    pub fn insert_photo(
        &mut self,
        origin: Point,
        image: PhotoRef,
    ) -> Result<PhotoHandle, GeometryError> {
        let size = (image.width as f64, image.height as f64);
        self.insert_photo_sized(origin, size, image)
    }

    pub fn insert_photo_sized(
        &mut self,
        origin: Point,
        size: (f64, f64),
        image: PhotoRef,
    ) -> Result<PhotoHandle, GeometryError> {
        if !self.document.library.contains(&image.key) {
            warn!("Placing photo '{}' without decoded pixels", image.key);
        }
        let handle = self.context.insert_photo(origin, size, image)?;
        self.needs_frame = true;
        self.forward_changes();
        Ok(handle)
    }

    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        let removed = self.context.remove_element(id)?;
        self.needs_frame = true;
        self.forward_changes();
        Some(removed)
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.context.undo();
        if undone {
            self.needs_frame = true;
            self.forward_changes();
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.context.redo();
        if redone {
            self.needs_frame = true;
            self.forward_changes();
        }
        redone
    }

    pub fn clear(&mut self) {
        self.context.clear();
        self.needs_frame = true;
        self.forward_changes();
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    pub fn set_camera_transform(&mut self, camera: CameraTransform, interactive: bool) {
        self.renderer.set_camera_transform(camera, interactive);
        self.needs_frame = true;
    }

    pub fn set_clip_bounds(&mut self, clip: Option<Rect>) {
        self.renderer.set_clip_bounds(clip);
        self.needs_frame = true;
    }

    pub fn set_grid_mode(&mut self, mode: GridMode) {
        self.renderer.set_grid_mode(mode);
        self.needs_frame = true;
    }

    pub fn resize(&mut self, extent: Extent) {
        self.renderer.resize(extent);
        self.needs_frame = true;
    }

    /// Asks for one more frame. Repeated requests coalesce.
    pub fn request_redraw(&mut self) {
        self.needs_frame = true;
    }

    pub fn render_frame(&mut self) -> Result<FrameReport, RenderError> {
        let report = self
            .renderer
            .render_frame(&mut self.context, &self.document.library)?;
        // Skipped passes are retried on the next frame.
        self.needs_frame = !report.is_complete();
        Ok(report)
    }

    pub fn viewport_image(&self) -> Result<Option<Bitmap>, RenderError> {
        self.renderer.viewport_image()
    }

    /// Thumbnail of the whole document, `None` while it is empty.
    pub fn render_preview_image(&mut self) -> Result<Option<Bitmap>, RenderError> {
        self.renderer
            .render_preview(&self.context, &self.document.library)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Loads every stored element. Returns how many were new.
    pub async fn load_all(&mut self) -> Result<usize, PersistenceError> {
        let Some(persistence) = self.document.persistence() else {
            return Ok(0);
        };
        let elements = persistence.load_all_elements().await?;
        Ok(self.absorb_loaded(elements))
    }

    /// Loads the stored elements under the current view.
    pub async fn load_visible(&mut self) -> Result<usize, PersistenceError> {
        let Some(persistence) = self.document.persistence() else {
            return Ok(0);
        };
        let visible = self
            .renderer
            .camera()
            .visible_world_rect(self.renderer.extent());
        let elements = persistence.load_elements(visible).await?;
        Ok(self.absorb_loaded(elements))
    }

    /// Resolves once every change forwarded so far reached the store.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        match self.document.persistence() {
            Some(persistence) => persistence.flush().await,
            None => Ok(()),
        }
    }

    fn absorb_loaded(&mut self, elements: Vec<Element>) -> usize {
        let inserted = self.context.load_elements(elements);
        if inserted > 0 {
            self.needs_frame = true;
        }
        inserted
    }

    fn forward_changes(&mut self) {
        let changes = self.context.take_changes();
        let Some(persistence) = self.document.persistence() else {
            return;
        };
        for change in changes {
            let sent = match change {
                ElementChange::Saved(id) => match self.context.element(id) {
                    Some(element) => persistence.save_element(element),
                    None => {
                        debug!("Element {} vanished before it was saved", id);
                        Ok(())
                    }
                },
                ElementChange::Deleted(id) => persistence.delete_element(id),
            };
            if let Err(err) = sent {
                warn!("Failed to queue {:?}: {}", change, err);
            }
        }
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("document", &self.document)
            .field("elements", &self.context.len())
            .field("renderer", &self.renderer)
            .finish()
    }
}

#[cfg(test)]
mod tests;
