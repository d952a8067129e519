use super::*;
use crate::color::{BLACK, RED, WHITE};
use crate::gpu::SoftwareDevice;
use crate::persistence::{ElementStore, FileStore, PersistenceManager, RetryPolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> Config {
    let mut config = Config::default();
    config.render.grid_mode = GridMode::None;
    config
}

fn canvas(document: Document) -> Canvas {
    Canvas::new(
        document,
        Box::new(SoftwareDevice::new()),
        Extent::new(64, 64),
        &config(),
    )
}

fn persistent_document(path: &Path) -> Document {
    let store = Arc::new(FileStore::new(path));
    let policy = RetryPolicy {
        max_retries: 0,
        delay: Duration::from_millis(1),
    };
    let manager = PersistenceManager::new(&tokio::runtime::Handle::current(), store, policy);
    Document::new("test").with_persistence(manager)
}

fn assert_pixel(image: &Bitmap, x: u32, y: u32, expected: crate::color::Color) {
    let actual = image.pixel(x, y).unwrap();
    let expected = expected.premultiplied();
    for channel in 0..4 {
        assert!(
            (actual[channel] - expected[channel]).abs() < 1e-3,
            "pixel ({x}, {y}) is {actual:?}, expected {expected:?}"
        );
    }
}

fn line(canvas: &mut Canvas, from: (f64, f64), to: (f64, f64)) -> StrokeHandle {
    let pen = canvas.pen();
    canvas.begin_stroke(Point::from(from), &pen).unwrap();
    canvas.end_stroke(Point::from(to)).unwrap()
}

#[test]
fn frames_show_finished_ink_and_settle() {
    let mut canvas = canvas(Document::new("ink"));
    assert!(canvas.needs_redraw());
    line(&mut canvas, (10.0, 32.0), (50.0, 32.0));

    let report = canvas.render_frame().unwrap();
    assert!(report.baked_stroke);
    assert!(!canvas.needs_redraw());

    let image = canvas.viewport_image().unwrap().unwrap();
    assert_pixel(&image, 30, 32, BLACK);
    assert_pixel(&image, 30, 5, WHITE);
}

#[test]
fn cancelled_stroke_leaves_document_and_requests_a_frame() {
    let mut canvas = canvas(Document::new("cancel"));
    line(&mut canvas, (0.0, 0.0), (10.0, 0.0));
    canvas.render_frame().unwrap();

    let pen = canvas.pen();
    canvas.begin_stroke(Point::new(5.0, 40.0), &pen).unwrap();
    assert!(canvas.append_stroke(Point::new(30.0, 40.0)));
    canvas.render_frame().unwrap();
    assert!(!canvas.needs_redraw());

    assert!(canvas.cancel_stroke());
    assert!(canvas.needs_redraw());
    assert_eq!(canvas.context().len(), 1);

    canvas.render_frame().unwrap();
    let image = canvas.viewport_image().unwrap().unwrap();
    assert_pixel(&image, 20, 40, WHITE);
    assert!(!canvas.cancel_stroke());
}

#[test]
fn undo_and_redo_round_trip_the_document() {
    let mut canvas = canvas(Document::new("history"));
    let handle = line(&mut canvas, (0.0, 0.0), (10.0, 0.0));
    assert!(canvas.undo());
    assert!(canvas.context().element(handle.id).is_none());
    assert!(canvas.redo());
    assert!(canvas.context().element(handle.id).is_some());
    assert!(canvas.remove_element(handle.id).is_some());
    assert!(canvas.context().is_empty());
    assert!(!canvas.redo());
}

#[test]
fn photo_size_follows_the_image() {
    let mut document = Document::new("photos");
    let image = document.add_image("red", Bitmap::filled(Extent::new(16, 8), RED));
    let mut canvas = canvas(document);

    let handle = canvas.insert_photo(Point::new(4.0, 4.0), image).unwrap();
    let bounds = canvas.context().element(handle.id).map(Element::bounds);
    assert_eq!(bounds.map(|b| (b.width(), b.height())), Some((16.0, 8.0)));

    canvas.render_frame().unwrap();
    let image = canvas.viewport_image().unwrap().unwrap();
    assert_pixel(&image, 10, 8, RED);
}

#[test]
fn empty_canvas_has_no_preview() {
    let mut canvas = canvas(Document::new("empty"));
    assert!(canvas.render_preview_image().unwrap().is_none());
    line(&mut canvas, (0.0, 0.0), (100.0, 50.0));
    let preview = canvas.render_preview_image().unwrap().unwrap();
    assert!(preview.covered_pixels() > 0);
}

#[tokio::test]
async fn changes_reach_the_store_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.json");

    let mut first = canvas(persistent_document(&path));
    let document = first.document_mut();
    let image = document.add_image("red", Bitmap::filled(Extent::new(4, 4), RED));
    let stroke = line(&mut first, (0.0, 0.0), (20.0, 0.0));
    let photo = first.insert_photo(Point::new(30.0, 30.0), image).unwrap();
    first.flush().await.unwrap();
    assert_eq!(FileStore::new(&path).load_all_elements().await.unwrap().len(), 2);

    assert!(first.undo());
    first.flush().await.unwrap();
    let stored = FileStore::new(&path).load_all_elements().await.unwrap();
    assert_eq!(stored.iter().map(Element::id).collect::<Vec<_>>(), vec![stroke.id]);
    assert!(first.redo());
    first.flush().await.unwrap();

    let mut second = canvas(persistent_document(&path));
    assert_eq!(second.load_all().await.unwrap(), 2);
    assert_eq!(second.load_all().await.unwrap(), 0);
    assert!(second.context().element(photo.id).is_some());
    // Fresh ids continue after the loaded ones.
    let next = line(&mut second, (0.0, 10.0), (5.0, 10.0));
    assert!(next.id > photo.id);
}

#[tokio::test]
async fn visible_load_is_limited_to_the_view() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.json");
    {
        let mut seed = canvas(persistent_document(&path));
        line(&mut seed, (10.0, 10.0), (20.0, 10.0));
        line(&mut seed, (1000.0, 1000.0), (1010.0, 1000.0));
        seed.flush().await.unwrap();
    }

    let mut canvas = canvas(persistent_document(&path));
    assert_eq!(canvas.load_visible().await.unwrap(), 1);
    canvas.set_camera_transform(CameraTransform::new(1.0, -990.0, -990.0), false);
    assert_eq!(canvas.load_visible().await.unwrap(), 1);
    assert_eq!(canvas.context().len(), 2);
}

#[tokio::test]
async fn documents_without_persistence_load_nothing() {
    let mut canvas = canvas(Document::new("memory"));
    line(&mut canvas, (0.0, 0.0), (10.0, 0.0));
    assert_eq!(canvas.load_all().await.unwrap(), 0);
    canvas.flush().await.unwrap();
}

#[test]
fn demo_scene_erases_part_of_the_first_wave() {
    let mut canvas = canvas(Document::new("demo"));
    assert_eq!(draw_demo(&mut canvas).unwrap(), 4);

    let stats = canvas.stats();
    assert_eq!((stats.markers, stats.erasers, stats.photos), (3, 1, 0));
    assert!(stats.quads > 0);
    assert_eq!(stats.colors.get("Black"), Some(&1));
    assert_eq!(stats.colors.get("Blue"), Some(&1));
    assert_eq!(stats.colors.get("Orange"), Some(&1));
    let bounds = stats.bounds.unwrap();
    assert!(bounds.min_x < 40.0 && bounds.max_x > 700.0);

    let erased: Vec<_> = canvas
        .context()
        .elements_in_creation_order()
        .into_iter()
        .filter(|e| e.erasers().is_some_and(|set| !set.is_empty()))
        .map(Element::id)
        .collect();
    assert_eq!(erased.len(), 1);
    assert!(stats.to_string().starts_with("elements: 4"));
}

#[test]
fn empty_stats_report_empty_bounds() {
    let canvas = canvas(Document::new("empty"));
    let stats = canvas.stats();
    assert_eq!(stats.total(), 0);
    assert!(stats.to_string().ends_with("bounds: empty"));
}
