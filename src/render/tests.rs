use super::*;
use crate::color::{BLACK, Color, GREEN, RED, WHITE};
use crate::context::GraphicContext;
use crate::element::{PenStyle, PhotoLibrary};
use crate::geometry::{CameraTransform, Extent, Point};
use crate::gpu::{Bitmap, DeviceLimits, GpuDevice, SoftwareDevice};
use crate::stroke::GeneratorConfig;

fn settings() -> RenderSettings {
    RenderSettings {
        grid_mode: GridMode::None,
        background: WHITE,
        ..RenderSettings::default()
    }
}

fn renderer_on(device: SoftwareDevice, settings: RenderSettings) -> Renderer {
    Renderer::new(Box::new(device), Extent::new(64, 64), settings)
}

fn setup() -> (Renderer, SoftwareDevice, GraphicContext, PhotoLibrary) {
    let device = SoftwareDevice::new();
    let handle = device.clone();
    (
        renderer_on(device, settings()),
        handle,
        GraphicContext::new(GeneratorConfig::default(), false),
        PhotoLibrary::new(),
    )
}

fn draw(ctx: &mut GraphicContext, style: &PenStyle, from: (f64, f64), to: (f64, f64)) {
    ctx.begin_stroke(Point::from(from), style).unwrap();
    ctx.end_stroke(Point::from(to)).unwrap();
}

fn assert_pixel(image: &Bitmap, x: u32, y: u32, expected: Color) {
    let actual = image.pixel(x, y).unwrap();
    let expected = expected.premultiplied();
    for channel in 0..4 {
        assert!(
            (actual[channel] - expected[channel]).abs() < 1e-3,
            "pixel ({x}, {y}) is {actual:?}, expected {expected:?}"
        );
    }
}

fn screen(renderer: &Renderer) -> Bitmap {
    renderer.viewport_image().unwrap().unwrap()
}

#[test]
fn finished_stroke_is_baked_exactly_once() {
    let (mut renderer, _, mut ctx, library) = setup();
    draw(&mut ctx, &PenStyle::marker(RED, 4.0), (10.0, 32.0), (50.0, 32.0));

    let first = renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(first.redrawn, Some(0));
    assert!(first.baked_stroke);
    assert!(first.is_complete());
    assert!(!renderer.redraws_graphic_render());
    assert_pixel(&screen(&renderer), 30, 32, RED);
    assert_pixel(&screen(&renderer), 30, 50, WHITE);

    let second = renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(second.redrawn, None);
    assert!(!second.baked_stroke);
    assert_pixel(&screen(&renderer), 30, 32, RED);
}

#[test]
fn redraw_only_draws_visible_elements() {
    let (mut renderer, _, mut ctx, library) = setup();
    let pen = PenStyle::marker(RED, 4.0);
    draw(&mut ctx, &pen, (10.0, 10.0), (20.0, 10.0));
    draw(&mut ctx, &pen, (1000.0, 10.0), (1020.0, 10.0));
    draw(&mut ctx, &pen, (10.0, 40.0), (20.0, 40.0));

    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    // The off-screen stroke is culled and the last one is baked separately.
    assert_eq!(report.redrawn, Some(1));
    assert!(report.baked_stroke);
    let image = screen(&renderer);
    assert_pixel(&image, 15, 10, RED);
    assert_pixel(&image, 15, 40, RED);
}

#[test]
fn stroke_in_progress_only_reaches_the_cache() {
    let (mut renderer, handle, mut ctx, library) = setup();
    renderer.render_frame(&mut ctx, &library).unwrap();

    ctx.begin_stroke(Point::new(10.0, 32.0), &PenStyle::marker(RED, 4.0))
        .unwrap();
    ctx.append_stroke(Point::new(50.0, 32.0));
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(report.previewed_stroke);
    assert_pixel(&screen(&renderer), 30, 32, RED);

    let graphic = renderer.textures().get(TextureSlot::Graphic).unwrap();
    assert_eq!(handle.read_texture(graphic).unwrap().covered_pixels(), 0);

    assert!(ctx.cancel_stroke());
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(!report.previewed_stroke);
    assert_pixel(&screen(&renderer), 30, 32, WHITE);
}

#[test]
fn eraser_removes_ink_in_preview_and_after_baking() {
    let (mut renderer, handle, mut ctx, library) = setup();
    draw(&mut ctx, &PenStyle::marker(RED, 6.0), (5.0, 32.0), (60.0, 32.0));
    renderer.render_frame(&mut ctx, &library).unwrap();

    ctx.begin_stroke(Point::new(30.0, 10.0), &PenStyle::eraser(10.0))
        .unwrap();
    ctx.append_stroke(Point::new(30.0, 54.0));
    renderer.render_frame(&mut ctx, &library).unwrap();
    let image = screen(&renderer);
    assert_pixel(&image, 30, 32, WHITE);
    assert_pixel(&image, 10, 32, RED);

    ctx.end_stroke(Point::new(30.0, 55.0)).unwrap();
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(report.baked_stroke);
    assert_pixel(&screen(&renderer), 30, 32, WHITE);
    let graphic = renderer.textures().get(TextureSlot::Graphic).unwrap();
    let ink = handle.read_texture(graphic).unwrap();
    assert_eq!(ink.pixel(30, 32).map(|p| p[3]), Some(0.0));
    assert_eq!(ink.pixel(10, 32).map(|p| p[3]), Some(1.0));
}

#[test]
fn interactive_camera_moves_cached_layers_without_redrawing() {
    let (mut renderer, handle, mut ctx, library) = setup();
    draw(&mut ctx, &PenStyle::marker(RED, 4.0), (10.0, 32.0), (30.0, 32.0));
    renderer.render_frame(&mut ctx, &library).unwrap();
    let before = handle.stats();

    renderer.set_camera_transform(CameraTransform::new(1.0, 20.0, 0.0), true);
    assert!(renderer.updates_viewport());
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(report.viewport_only);
    let after = handle.stats();
    assert_eq!(after.dispatches, before.dispatches);
    assert_eq!(after.copies, before.copies);
    let image = screen(&renderer);
    assert_pixel(&image, 40, 32, RED);
    assert_pixel(&image, 12, 32, WHITE);

    renderer.set_camera_transform(CameraTransform::new(1.0, 20.0, 0.0), false);
    assert!(!renderer.updates_viewport());
    assert!(renderer.redraws_graphic_render());
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(report.redrawn, Some(1));
    assert_pixel(&screen(&renderer), 40, 32, RED);
}

#[test]
fn allocation_failure_skips_passes_until_memory_returns() {
    let device = SoftwareDevice::with_limits(DeviceLimits {
        max_texture_dimension: 8192,
        memory_budget: 0,
    });
    let handle = device.clone();
    let mut renderer = renderer_on(device, settings());
    let mut ctx = GraphicContext::new(GeneratorConfig::default(), false);
    let library = PhotoLibrary::new();
    draw(&mut ctx, &PenStyle::marker(RED, 4.0), (10.0, 32.0), (50.0, 32.0));

    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(
        report.skipped,
        vec![PassKind::Graphic, PassKind::Cache, PassKind::ViewPort]
    );
    assert!(renderer.redraws_graphic_render());
    assert!(ctx.previous_stroke_id().is_some());
    assert!(renderer.viewport_image().unwrap().is_none());

    handle.set_limits(DeviceLimits::default());
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(report.is_complete());
    assert!(report.baked_stroke);
    assert_pixel(&screen(&renderer), 30, 32, RED);
}

#[test]
fn lost_device_aborts_the_frame() {
    let (mut renderer, handle, mut ctx, library) = setup();
    handle.lose_device();
    let err = renderer.render_frame(&mut ctx, &library).unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(err.pass(), PassKind::Graphic);
}

#[test]
fn grid_mode_changes_request_a_redraw() {
    let device = SoftwareDevice::new();
    let mut renderer = renderer_on(
        device,
        RenderSettings {
            grid_mode: GridMode::Line,
            grid_spacing: 16.0,
            grid_color: BLACK,
            ..settings()
        },
    );
    let mut ctx = GraphicContext::default();
    let library = PhotoLibrary::new();
    renderer.render_frame(&mut ctx, &library).unwrap();
    assert_pixel(&screen(&renderer), 16, 5, BLACK);
    assert_pixel(&screen(&renderer), 8, 5, WHITE);

    renderer.set_grid_mode(GridMode::None);
    assert!(renderer.redraws_graphic_render());
    renderer.render_frame(&mut ctx, &library).unwrap();
    assert_pixel(&screen(&renderer), 16, 5, WHITE);
}

#[test]
fn photos_sit_beneath_ink_and_survive_erasers() {
    let (mut renderer, _, mut ctx, mut library) = setup();
    let image = library.insert("grass", Bitmap::filled(Extent::new(4, 4), GREEN));
    ctx.insert_photo(Point::new(0.0, 0.0), (32.0, 32.0), image)
        .unwrap();
    draw(&mut ctx, &PenStyle::marker(RED, 4.0), (0.0, 20.0), (40.0, 20.0));
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(report.redrawn, Some(1));
    let image = screen(&renderer);
    assert_pixel(&image, 10, 10, GREEN);
    assert_pixel(&image, 10, 20, RED);
    assert_pixel(&image, 40, 40, WHITE);

    draw(&mut ctx, &PenStyle::eraser(8.0), (5.0, 10.0), (25.0, 10.0));
    draw(&mut ctx, &PenStyle::eraser(8.0), (5.0, 20.0), (25.0, 20.0));
    renderer.render_frame(&mut ctx, &library).unwrap();
    let image = screen(&renderer);
    assert_pixel(&image, 10, 10, GREEN);
    assert_pixel(&image, 10, 20, GREEN);
    assert_pixel(&image, 35, 20, RED);
}

#[test]
fn missing_photo_pixels_are_skipped() {
    let (mut renderer, _, mut ctx, library) = setup();
    let image = crate::element::PhotoRef {
        key: "gone".into(),
        width: 4,
        height: 4,
    };
    ctx.insert_photo(Point::new(0.0, 0.0), (32.0, 32.0), image)
        .unwrap();
    let report = renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.redrawn, Some(0));
    assert_pixel(&screen(&renderer), 10, 10, WHITE);
}

#[test]
fn preview_covers_the_whole_document_and_releases_textures() {
    let device = SoftwareDevice::new();
    let handle = device.clone();
    let mut renderer = renderer_on(
        device,
        RenderSettings {
            preview_padding: 10.0,
            preview_max_dimension: 64,
            ..settings()
        },
    );
    let mut ctx = GraphicContext::new(GeneratorConfig::default(), false);
    let library = PhotoLibrary::new();
    assert!(renderer.render_preview(&ctx, &library).unwrap().is_none());

    draw(&mut ctx, &PenStyle::marker(RED, 4.0), (100.0, 100.0), (300.0, 100.0));
    renderer.render_frame(&mut ctx, &library).unwrap();
    let textures = handle.texture_count();

    let preview = renderer.render_preview(&ctx, &library).unwrap().unwrap();
    assert_eq!(preview.extent().width, 64);
    assert!((1..=8).contains(&preview.extent().height));
    assert!(preview.covered_pixels() > 0);
    assert_eq!(handle.texture_count(), textures);
}

#[test]
fn resize_recreates_targets_and_redraws() {
    let (mut renderer, _, mut ctx, library) = setup();
    renderer.render_frame(&mut ctx, &library).unwrap();
    assert!(!renderer.redraws_graphic_render());

    renderer.resize(Extent::new(32, 16));
    assert!(renderer.redraws_graphic_render());
    assert!(renderer.textures().get(TextureSlot::Graphic).is_none());
    renderer.render_frame(&mut ctx, &library).unwrap();
    assert_eq!(screen(&renderer).extent(), Extent::new(32, 16));
}

#[test]
fn texture_registry_clears_once_then_loads() {
    let mut device = SoftwareDevice::new();
    let mut textures = TextureRegistry::new(Extent::new(8, 8));
    assert!(textures.get(TextureSlot::Cache).is_none());
    let id = textures.acquire(&mut device, TextureSlot::Cache).unwrap();
    assert!(textures.needs_clear(TextureSlot::Cache));
    assert!(matches!(
        textures.load_action(TextureSlot::Cache),
        crate::gpu::LoadAction::Clear(_)
    ));
    textures.mark_written(TextureSlot::Cache);
    assert_eq!(
        textures.load_action(TextureSlot::Cache),
        crate::gpu::LoadAction::Load
    );
    assert_eq!(textures.acquire(&mut device, TextureSlot::Cache), Ok(id));
    assert_eq!(
        textures.require(TextureSlot::Graphic, PassKind::Cache),
        Err(RenderError::MissingSlot {
            pass: PassKind::Cache,
            slot: TextureSlot::Graphic,
        })
    );
    textures.release(&mut device);
    assert_eq!(device.texture_count(), 0);
}
