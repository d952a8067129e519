//! Cairo-backed texture storage and the raster half of a render pass.

use super::super::command::{GridStyle, Placement};
use super::super::types::{Bitmap, BlendMode, GpuError, INDICES_PER_QUAD, QuadVertex};
use crate::color::Color;
use crate::geometry::{CameraTransform, Extent, Point};
use crate::util::Rect;
use cairo::{Antialias, Context, FillRule, Filter, Format, ImageSurface, Operator};
use std::f64::consts::TAU;

pub(crate) const BYTES_PER_PIXEL: usize = 4;

/// Grids denser than this many pixels between lines are skipped.
const MIN_GRID_PIXELS: f64 = 2.0;

pub(super) fn operator(mode: BlendMode) -> Operator {
    match mode {
        BlendMode::Over => Operator::Over,
        // dst * (1 - src.a)
        BlendMode::ReverseSubtractAlpha => Operator::DestOut,
        BlendMode::Replace => Operator::Source,
    }
}

/// Texture pixels in Cairo's ARGB32 layout: premultiplied, one native-endian
/// `u32` per pixel, rows packed without padding.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SurfaceBuffer {
    extent: Extent,
    data: Vec<u8>,
}

impl SurfaceBuffer {
    /// Fully transparent buffer.
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            data: vec![0; extent.pixel_count() * BYTES_PER_PIXEL],
        }
    }

    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        let mut data = Vec::with_capacity(bitmap.pixels().len() * BYTES_PER_PIXEL);
        for px in bitmap.pixels() {
            data.extend_from_slice(&pack(*px).to_ne_bytes());
        }
        Self {
            extent: bitmap.extent(),
            data,
        }
    }

    pub fn to_bitmap(&self) -> Bitmap {
        let mut bitmap = Bitmap::new(self.extent);
        for (px, word) in bitmap
            .pixels_mut()
            .iter_mut()
            .zip(self.data.chunks_exact(BYTES_PER_PIXEL))
        {
            *px = unpack(u32::from_ne_bytes([word[0], word[1], word[2], word[3]]));
        }
        bitmap
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Copies pixel `index` from `source`, which must share this extent.
    pub fn copy_pixel(&mut self, source: &SurfaceBuffer, index: usize) {
        let range = index * BYTES_PER_PIXEL..(index + 1) * BYTES_PER_PIXEL;
        if let (Some(to), Some(from)) = (self.data.get_mut(range.clone()), source.data.get(range)) {
            to.copy_from_slice(from);
        }
    }

    /// Runs `paint` with a non-antialiased Cairo context over the pixels.
    pub fn draw<R>(
        &mut self,
        paint: impl FnOnce(&Context) -> Result<R, GpuError>,
    ) -> Result<R, GpuError> {
        let surface = self.surface()?;
        let result = {
            let ctx = Context::new(&surface)?;
            ctx.set_antialias(Antialias::None);
            paint(&ctx)
        };
        surface.flush();
        result
    }

    /// Runs `read` with the pixels wrapped in a Cairo image surface.
    pub fn with_surface<R>(&mut self, read: impl FnOnce(&ImageSurface) -> R) -> Result<R, GpuError> {
        let surface = self.surface()?;
        let result = read(&surface);
        surface.flush();
        Ok(result)
    }

    fn surface(&mut self) -> Result<ImageSurface, GpuError> {
        let width = self.extent.width as i32;
        let height = self.extent.height as i32;
        // SAFETY: `data` holds exactly width * height * 4 bytes in ARGB32
        // layout with a stride of width * 4. Every surface created here is
        // dropped by `draw`/`with_surface` before they return, while the
        // mutable borrow of `self` keeps `data` alive and unaliased.
        let surface = unsafe {
            ImageSurface::create_for_data_unsafe(
                self.data.as_mut_ptr(),
                Format::ARgb32,
                width,
                height,
                width * BYTES_PER_PIXEL as i32,
            )?
        };
        Ok(surface)
    }
}

fn pack(px: [f32; 4]) -> u32 {
    let [r, g, b, a] = px.map(channel);
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

fn unpack(word: u32) -> [f32; 4] {
    let channel = |shift: u32| ((word >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0), channel(24)]
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn set_premultiplied_source(ctx: &Context, [r, g, b, a]: [f32; 4]) {
    let straight = |c: f32| if a > 0.0 { f64::from(c / a) } else { 0.0 };
    ctx.set_source_rgba(straight(r), straight(g), straight(b), f64::from(a));
}

/// Restricts every later operation on `ctx` to `scissor`.
pub(super) fn clip_to(ctx: &Context, scissor: Option<Rect>) {
    if let Some(rect) = scissor {
        ctx.rectangle(
            f64::from(rect.x),
            f64::from(rect.y),
            f64::from(rect.width),
            f64::from(rect.height),
        );
        ctx.clip();
    }
}

pub(super) fn clear(ctx: &Context, color: Color) -> Result<(), GpuError> {
    ctx.save()?;
    if color.a <= 0.0 {
        ctx.set_operator(Operator::Clear);
    } else {
        ctx.set_operator(Operator::Source);
        ctx.set_source_rgba(color.r, color.g, color.b, color.a.min(1.0));
    }
    ctx.paint()?;
    ctx.restore()?;
    Ok(())
}

/// Fills expanded quads, one path per quad so overlaps composite.
pub(super) fn fill_quads(
    ctx: &Context,
    vertices: &[QuadVertex],
    indices: &[u32],
    mode: BlendMode,
) -> Result<(), GpuError> {
    ctx.save()?;
    ctx.set_operator(operator(mode));
    for quad in indices.chunks_exact(INDICES_PER_QUAD) {
        // Triangles a-b-c and a-c-d.
        let corners = [quad[0], quad[1], quad[2], quad[5]].map(|i| vertices.get(i as usize));
        let [Some(a), Some(b), Some(c), Some(d)] = corners else {
            continue;
        };
        let [pa, pb, pc, pd] = [a, b, c, d].map(|v| v.position.map(f64::from));
        if ![pa, pb, pc, pd].iter().flatten().all(|v| v.is_finite()) {
            continue;
        }
        if a.round {
            let radius = (pb[0] - pa[0]).hypot(pb[1] - pa[1]) / 2.0;
            ctx.arc(
                (pa[0] + pc[0]) / 2.0,
                (pa[1] + pc[1]) / 2.0,
                radius,
                0.0,
                TAU,
            );
        } else {
            ctx.move_to(pa[0], pa[1]);
            ctx.line_to(pb[0], pb[1]);
            ctx.line_to(pc[0], pc[1]);
            ctx.line_to(pd[0], pd[1]);
            ctx.close_path();
        }
        set_premultiplied_source(ctx, a.color);
        ctx.fill()?;
    }
    ctx.restore()?;
    Ok(())
}

/// Paints `source` through `placement` with nearest sampling.
pub(super) fn paint_texture(
    ctx: &Context,
    source: &ImageSurface,
    placement: &Placement,
    opacity: f32,
    mode: BlendMode,
) -> Result<(), GpuError> {
    let scales = [placement.scale_x, placement.scale_y];
    if scales.iter().any(|s| *s == 0.0 || !s.is_finite()) {
        return Ok(());
    }
    ctx.save()?;
    ctx.set_operator(operator(mode));
    ctx.translate(placement.offset_x, placement.offset_y);
    ctx.scale(placement.scale_x, placement.scale_y);
    ctx.set_source_surface(source, 0.0, 0.0)?;
    ctx.source().set_filter(Filter::Nearest);
    ctx.rectangle(
        0.0,
        0.0,
        f64::from(source.width()),
        f64::from(source.height()),
    );
    ctx.clip();
    ctx.paint_with_alpha(f64::from(opacity))?;
    ctx.restore()?;
    Ok(())
}

/// Draws grid lines or grid points at multiples of `spacing` world units.
pub(super) fn paint_grid(
    ctx: &Context,
    extent: Extent,
    style: GridStyle,
    spacing: f64,
    transform: &CameraTransform,
    color: Color,
) -> Result<(), GpuError> {
    if !(spacing > 0.0) || spacing * transform.scale < MIN_GRID_PIXELS {
        return Ok(());
    }
    let world = transform.visible_world_rect(extent);
    let width = f64::from(extent.width);
    let height = f64::from(extent.height);
    let columns: Vec<f64> = grid_lines(world.min_x, world.max_x, spacing)
        .map(|k| transform.apply(Point::new(k, 0.0)).x.floor())
        .filter(|x| (0.0..width).contains(x))
        .collect();
    let rows: Vec<f64> = grid_lines(world.min_y, world.max_y, spacing)
        .map(|k| transform.apply(Point::new(0.0, k)).y.floor())
        .filter(|y| (0.0..height).contains(y))
        .collect();

    ctx.save()?;
    // One path under the winding rule paints each crossing once.
    ctx.set_fill_rule(FillRule::Winding);
    match style {
        GridStyle::Line => {
            for x in &columns {
                ctx.rectangle(*x, 0.0, 1.0, height);
            }
            for y in &rows {
                ctx.rectangle(0.0, *y, width, 1.0);
            }
        }
        GridStyle::Point => {
            for y in &rows {
                for x in &columns {
                    ctx.rectangle(*x, *y, 1.0, 1.0);
                }
            }
        }
    }
    ctx.set_source_rgba(color.r, color.g, color.b, color.a);
    ctx.fill()?;
    ctx.restore()?;
    Ok(())
}

/// World coordinates of grid lines within `[min, max]`.
fn grid_lines(min: f64, max: f64, spacing: f64) -> impl Iterator<Item = f64> {
    let first = (min / spacing).ceil() as i64;
    let last = (max / spacing).floor() as i64;
    (first..=last).map(move |k| k as f64 * spacing)
}
