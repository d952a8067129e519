use super::GridMode;
use super::error::{PassKind, RenderError};
use super::passes::{
    Backdrop, CacheRenderPass, ElementPasses, GraphicRenderPass, PreviewRenderPass, ViewPortRenderPass,
};
use super::textures::{TextureRegistry, TextureSlot};
use crate::color::{Color, WHITE};
use crate::context::GraphicContext;
use crate::element::PhotoLibrary;
use crate::geometry::{CameraTransform, Extent};
use crate::gpu::{Bitmap, GpuDevice, Placement};
use crate::render::error::InPass;
use crate::util::Rect;
use log::{debug, error, warn};

/// Appearance and preview parameters of a [`Renderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub grid_mode: GridMode,
    /// World units between grid lines.
    pub grid_spacing: f64,
    pub grid_color: Color,
    pub background: Color,
    /// World units added around the document in previews.
    pub preview_padding: f64,
    /// Longest preview edge in pixels.
    pub preview_max_dimension: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            grid_mode: GridMode::default(),
            grid_spacing: 40.0,
            grid_color: Color::new(0.0, 0.0, 0.0, 0.15),
            background: WHITE,
            preview_padding: 20.0,
            preview_max_dimension: 512,
        }
    }
}

/// Summary of one [`Renderer::render_frame`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Number of elements drawn by a full redraw of the ink layer.
    pub redrawn: Option<usize>,
    /// The just-finished stroke was baked into the ink layer.
    pub baked_stroke: bool,
    /// The stroke in flight was drawn into the cache layer.
    pub previewed_stroke: bool,
    /// Only the viewport was recomposed from cached layers.
    pub viewport_only: bool,
    /// Passes skipped after a recoverable failure.
    pub skipped: Vec<PassKind>,
}

impl FrameReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Drives the passes of one view onto one device.
pub struct Renderer {
    device: Box<dyn GpuDevice>,
    textures: TextureRegistry,
    passes: ElementPasses,
    graphic: GraphicRenderPass,
    cache: CacheRenderPass,
    viewport: ViewPortRenderPass,
    settings: RenderSettings,
    camera: CameraTransform,
    /// Camera the cached layers were drawn with.
    rendered_camera: CameraTransform,
    clip: Option<Rect>,
    redraws_graphic_render: bool,
    updates_viewport: bool,
}

impl Renderer {
    pub fn new(device: Box<dyn GpuDevice>, extent: Extent, settings: RenderSettings) -> Self {
        Self {
            device,
            textures: TextureRegistry::new(extent),
            passes: ElementPasses::new(),
            graphic: GraphicRenderPass::new(),
            cache: CacheRenderPass::new(),
            viewport: ViewPortRenderPass::new(),
            settings,
            camera: CameraTransform::IDENTITY,
            rendered_camera: CameraTransform::IDENTITY,
            clip: None,
            redraws_graphic_render: true,
            updates_viewport: false,
        }
    }

    pub fn extent(&self) -> Extent {
        self.textures.extent()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn camera(&self) -> CameraTransform {
        self.camera
    }

    /// Whether the next frame redraws the ink layer from the index.
    pub fn redraws_graphic_render(&self) -> bool {
        self.redraws_graphic_render
    }

    /// Whether the next frame only recomposes the viewport.
    pub fn updates_viewport(&self) -> bool {
        self.updates_viewport
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn resize(&mut self, extent: Extent) {
        if self.textures.resize(self.device.as_mut(), extent) {
            self.request_full_redraw();
        }
    }

    /// While `interactive` (a pan or pinch in progress) frames only move the
    /// cached layers; otherwise the next frame redraws them at the new camera.
    pub fn set_camera_transform(&mut self, camera: CameraTransform, interactive: bool) {
        self.camera = camera;
        if interactive {
            self.updates_viewport = true;
            return;
        }
        self.updates_viewport = false;
        if camera != self.rendered_camera {
            debug!("Camera settled, redrawing ink layer");
            self.redraws_graphic_render = true;
        }
    }

    /// Restricts the viewport pass to `clip` (in view pixels).
    pub fn set_clip_bounds(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }

    pub fn set_grid_mode(&mut self, mode: GridMode) {
        if self.settings.grid_mode != mode {
            self.settings.grid_mode = mode;
            self.request_full_redraw();
        }
    }

    pub fn set_background(&mut self, background: Color) {
        self.settings.background = background;
    }

    pub fn request_full_redraw(&mut self) {
        self.redraws_graphic_render = true;
        self.updates_viewport = false;
    }

    /// Renders one frame of `context`.
    ///
    /// Recoverable pass failures are logged and reported in
    /// [`FrameReport::skipped`]; the failed work is retried next frame. Any
    /// other failure aborts the frame.
    pub fn render_frame(
        &mut self,
        context: &mut GraphicContext,
        library: &PhotoLibrary,
    ) -> Result<FrameReport, RenderError> {
        if context.take_invalidation() {
            self.request_full_redraw();
        }
        let mut report = FrameReport::default();

        let placement = if self.updates_viewport {
            report.viewport_only = true;
            Placement::from(self.camera.relative_to(&self.rendered_camera))
        } else {
            self.render_layers(context, library, &mut report)?;
            Placement::IDENTITY
        };

        let backdrop = Backdrop {
            background: self.settings.background,
            grid: self
                .settings
                .grid_mode
                .style()
                .map(|style| (style, self.settings.grid_spacing)),
            grid_color: self.settings.grid_color,
        };
        let composed = self.viewport.render(
            self.device.as_mut(),
            &mut self.textures,
            &backdrop,
            self.camera,
            placement,
            self.clip,
        );
        if let Err(err) = composed {
            absorb(err, &mut report)?;
        }
        Ok(report)
    }

    fn render_layers(
        &mut self,
        context: &mut GraphicContext,
        library: &PhotoLibrary,
        report: &mut FrameReport,
    ) -> Result<(), RenderError> {
        let redraw = self.redraws_graphic_render;
        let graphic = self.graphic.render(
            self.device.as_mut(),
            &mut self.textures,
            &mut self.passes,
            context,
            library,
            self.camera,
            redraw,
        );
        match graphic {
            Ok(outcome) => {
                if redraw {
                    self.redraws_graphic_render = false;
                    self.rendered_camera = self.camera;
                }
                report.redrawn = outcome.redrawn;
                report.baked_stroke = outcome.baked;
            }
            Err(err) => absorb(err, report)?,
        }

        let cache = self.cache.render(
            self.device.as_mut(),
            &mut self.textures,
            &mut self.passes,
            context,
            self.camera,
        );
        match cache {
            Ok(previewed) => report.previewed_stroke = previewed,
            Err(err) => absorb(err, report)?,
        }
        Ok(())
    }

    /// Pixels of the last composed frame, if any.
    pub fn viewport_image(&self) -> Result<Option<Bitmap>, RenderError> {
        match self.textures.get(TextureSlot::Viewport) {
            Some(id) => self.device.read_texture(id).in_pass(PassKind::ViewPort).map(Some),
            None => Ok(None),
        }
    }

    /// Offscreen thumbnail of the whole document; `None` when it is empty.
    pub fn render_preview(
        &mut self,
        context: &GraphicContext,
        library: &PhotoLibrary,
    ) -> Result<Option<Bitmap>, RenderError> {
        let mut preview = PreviewRenderPass::new(
            self.settings.preview_padding,
            self.settings.preview_max_dimension,
        );
        preview.render(self.device.as_mut(), &mut self.passes, context, library)
    }

    /// Drops the uploaded texture of a photo image.
    pub fn forget_photo(&mut self, key: &str) {
        self.passes.photo.forget(self.device.as_mut(), key);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.passes.release(self.device.as_mut());
        self.textures.release(self.device.as_mut());
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("extent", &self.textures.extent())
            .field("camera", &self.camera)
            .field("redraws_graphic_render", &self.redraws_graphic_render)
            .field("updates_viewport", &self.updates_viewport)
            .finish()
    }
}

fn absorb(err: RenderError, report: &mut FrameReport) -> Result<(), RenderError> {
    if err.is_recoverable() {
        warn!("Skipping {} pass this frame: {}", err.pass(), err);
        report.skipped.push(err.pass());
        Ok(())
    } else {
        error!("Aborting frame: {}", err);
        Err(err)
    }
}
