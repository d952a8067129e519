use super::*;
use crate::color::RED;
use crate::context::GraphicContext;
use crate::element::{Element, ElementError, ElementId, PenStyle, Photo, PhotoRef, Stroke};
use crate::geometry::{BoundingBox, Point};
use crate::stroke::GeneratorConfig;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A marker, a photo and an eraser over the marker.
fn sample_document() -> Vec<Element> {
    let mut ctx = GraphicContext::new(GeneratorConfig::default(), false);
    ctx.begin_stroke(Point::new(0.0, 0.0), &PenStyle::marker(RED, 3.0))
        .unwrap();
    ctx.append_stroke(Point::new(10.0, 5.0));
    ctx.end_stroke(Point::new(20.0, 0.0)).unwrap();
    let image = PhotoRef {
        key: "cat.png".into(),
        width: 8,
        height: 8,
    };
    ctx.insert_photo(Point::new(500.0, 500.0), (80.0, 60.0), image)
        .unwrap();
    ctx.begin_stroke(Point::new(10.0, -10.0), &PenStyle::eraser(8.0))
        .unwrap();
    ctx.end_stroke(Point::new(10.0, 10.0)).unwrap();
    ctx.elements_in_creation_order()
        .into_iter()
        .cloned()
        .collect()
}

fn stroke_of(element: &Element) -> &Stroke {
    element.as_stroke().unwrap()
}

#[test]
fn records_rebuild_identical_elements() {
    for element in sample_document() {
        let record = ElementRecord::from(&element);
        let json = serde_json::to_string(&record).unwrap();
        let decoded = Element::try_from(serde_json::from_str::<ElementRecord>(&json).unwrap())
            .unwrap();
        assert_eq!(decoded.id(), element.id());
        assert_eq!(decoded.bounds(), element.bounds());
        assert_eq!(decoded.kind(), element.kind());
        assert_eq!(decoded.erasers(), element.erasers());
        if let Element::Stroke(stroke) = &element {
            assert_eq!(stroke_of(&decoded).quads(), stroke.quads());
        }
    }
}

#[test]
fn unknown_style_tag_is_a_typed_error() {
    let mut record = match ElementRecord::from(&sample_document()[0]) {
        ElementRecord::Stroke(stroke) => stroke,
        other => panic!("expected a stroke record, got {other:?}"),
    };
    record.style = "highlighter".into();
    let err = Stroke::try_from(record.clone()).unwrap_err();
    assert_eq!(err, ElementError::UnknownStyle("highlighter".into()));

    record.style = "marker".into();
    record.shape = ShapeRecord {
        kind: "star".into(),
        params: Vec::new(),
    };
    let err = Stroke::try_from(record.clone()).unwrap_err();
    assert_eq!(err, ElementError::UnknownQuadShape("star".into()));

    record.shape = ShapeRecord {
        kind: "trapezoid".into(),
        params: vec![1.0],
    };
    assert!(matches!(
        Stroke::try_from(record),
        Err(ElementError::UnknownQuadShape(_))
    ));
}

#[test]
fn malformed_photo_record_is_rejected() {
    let record = ElementRecord::Photo(PhotoRecord {
        id: ElementId(1),
        x: 0.0,
        y: 0.0,
        width: -5.0,
        height: 5.0,
        image: PhotoRef {
            key: "x".into(),
            width: 1,
            height: 1,
        },
        created_at: chrono::Utc::now(),
    });
    assert!(matches!(
        Element::try_from(record),
        Err(ElementError::Geometry(_))
    ));
}

async fn save_all(store: &FileStore, elements: &[Element]) {
    for element in elements {
        match element {
            Element::Stroke(stroke) => store.save_stroke(stroke.clone()).await.unwrap(),
            Element::Photo(photo) => store.save_photo(photo.clone()).await.unwrap(),
        }
    }
}

#[tokio::test]
async fn file_store_round_trips_and_filters_by_bounds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    let elements = sample_document();
    save_all(&FileStore::new(&path), &elements).await;

    let reopened = FileStore::new(&path);
    let loaded = reopened.load_all_elements().await.unwrap();
    let ids: Vec<_> = loaded.iter().map(Element::id).collect();
    let expected: Vec<_> = elements.iter().map(Element::id).collect();
    assert_eq!(ids, expected);

    let near_origin = BoundingBox::new(-50.0, -50.0, 50.0, 50.0).unwrap();
    let visible = reopened.load_elements(near_origin).await.unwrap();
    assert_eq!(visible.len(), 2);
    assert!(visible.iter().all(|e| e.as_photo().is_none()));

    assert!(reopened.backup_path().exists());
}

#[tokio::test]
async fn file_store_deletes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    let store = FileStore::new(&path);
    let elements = sample_document();
    save_all(&store, &elements).await;
    store.delete_element(elements[1].id()).await.unwrap();

    let loaded = FileStore::new(&path).load_all_elements().await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.iter().all(|e| e.id() != elements[1].id()));
}

#[tokio::test]
async fn compressed_documents_are_gzip_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    let store = FileStore::with_options(
        &path,
        FileStoreOptions {
            compression: CompressionMode::On,
            keep_backup: false,
            ..FileStoreOptions::default()
        },
    );
    save_all(&store, &sample_document()).await;

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    assert!(!store.backup_path().exists());
    assert_eq!(
        FileStore::new(&path).load_all_elements().await.unwrap().len(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn concurrent_saves_run_off_the_worker_and_all_land() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    let store = Arc::new(FileStore::new(&path));
    let elements = sample_document();

    let saves = elements.iter().cloned().map(|element| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            match element {
                Element::Stroke(stroke) => store.save_stroke(stroke).await,
                Element::Photo(photo) => store.save_photo(photo).await,
            }
        })
    });
    for save in saves.collect::<Vec<_>>() {
        save.await.unwrap().unwrap();
    }

    let reloaded = FileStore::new(&path).load_all_elements().await.unwrap();
    assert_eq!(reloaded.len(), elements.len());
}

#[tokio::test]
async fn missing_file_is_an_empty_document() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("absent.json"));
    assert!(store.load_all_elements().await.unwrap().is_empty());
}

#[tokio::test]
async fn bad_documents_surface_typed_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");

    std::fs::write(&path, br#"{"version": 99, "last_modified": "", "elements": []}"#).unwrap();
    assert!(matches!(
        FileStore::new(&path).load_all_elements().await,
        Err(PersistenceError::UnsupportedVersion(99))
    ));

    std::fs::write(&path, b"not json").unwrap();
    assert!(matches!(
        FileStore::new(&path).load_all_elements().await,
        Err(PersistenceError::Json(_))
    ));

    let mut record = serde_json::to_value(ElementRecord::from(&sample_document()[0])).unwrap();
    record["style"] = "pencil".into();
    let document = serde_json::json!({
        "version": 1,
        "last_modified": "",
        "elements": [record],
    });
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    match FileStore::new(&path).load_all_elements().await {
        Err(PersistenceError::Decode(ElementError::UnknownStyle(tag))) => assert_eq!(tag, "pencil"),
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn strokes_without_placeable_quads_fail_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    let marker = serde_json::to_value(ElementRecord::from(&sample_document()[0])).unwrap();

    let mut empty = marker.clone();
    empty["quads"] = serde_json::json!([]);
    let document = serde_json::json!({"version": 1, "last_modified": "", "elements": [empty]});
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    assert!(matches!(
        FileStore::new(&path).load_all_elements().await,
        Err(PersistenceError::Decode(ElementError::EmptyStroke(_)))
    ));

    let mut huge = marker;
    huge["quads"] = serde_json::json!([
        {"x": 0.0, "y": 0.0, "size": 2.0},
        {"x": 1.5e308, "y": 0.0, "size": 1e308},
    ]);
    let document = serde_json::json!({"version": 1, "last_modified": "", "elements": [huge]});
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    assert!(matches!(
        FileStore::new(&path).load_all_elements().await,
        Err(PersistenceError::Decode(ElementError::InvalidQuad { index: 1, .. }))
    ));
}

#[test]
fn non_finite_quads_are_rejected() {
    let mut record = match ElementRecord::from(&sample_document()[0]) {
        ElementRecord::Stroke(stroke) => stroke,
        other => panic!("expected a stroke record, got {other:?}"),
    };
    record.quads[0].rotation = f64::NAN;
    assert!(matches!(
        Stroke::try_from(record.clone()),
        Err(ElementError::InvalidQuad { index: 0, .. })
    ));
    record.quads.clear();
    assert_eq!(
        Stroke::try_from(record.clone()).unwrap_err(),
        ElementError::EmptyStroke(record.id)
    );
}

#[test]
fn unbounded_photo_record_is_rejected() {
    let record = ElementRecord::Photo(PhotoRecord {
        id: ElementId(4),
        x: 1e308,
        y: 0.0,
        width: 1e308,
        height: 5.0,
        image: PhotoRef {
            key: "x".into(),
            width: 1,
            height: 1,
        },
        created_at: chrono::Utc::now(),
    });
    assert!(matches!(
        Element::try_from(record),
        Err(ElementError::UnboundedPhoto(ElementId(4)))
    ));
}

#[derive(Default)]
struct MockStore {
    failures_left: Mutex<u32>,
    saved: Mutex<Vec<ElementId>>,
    deleted: Mutex<Vec<ElementId>>,
}

impl MockStore {
    fn failing(times: u32) -> Self {
        Self {
            failures_left: Mutex::new(times),
            ..Self::default()
        }
    }

    fn attempt(&self) -> Result<(), PersistenceError> {
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(PersistenceError::Io {
                path: "mock".into(),
                source: std::io::Error::other("disk unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ElementStore for MockStore {
    async fn load_elements(&self, _bounds: BoundingBox) -> Result<Vec<Element>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn load_all_elements(&self) -> Result<Vec<Element>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn save_stroke(&self, stroke: Stroke) -> Result<(), PersistenceError> {
        self.attempt()?;
        self.saved.lock().unwrap().push(stroke.id);
        Ok(())
    }

    async fn save_photo(&self, photo: Photo) -> Result<(), PersistenceError> {
        self.attempt()?;
        self.saved.lock().unwrap().push(photo.id);
        Ok(())
    }

    async fn delete_element(&self, id: ElementId) -> Result<(), PersistenceError> {
        self.attempt()?;
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

fn quick_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn manager_applies_requests_in_order() {
    let store = Arc::new(MockStore::default());
    let manager = PersistenceManager::new(
        &tokio::runtime::Handle::current(),
        store.clone(),
        quick_retries(0),
    );
    for element in &sample_document() {
        manager.save_element(element).unwrap();
    }
    manager.delete_element(ElementId(1)).unwrap();
    manager.flush().await.unwrap();

    assert_eq!(
        *store.saved.lock().unwrap(),
        vec![ElementId(1), ElementId(2), ElementId(3)]
    );
    assert_eq!(*store.deleted.lock().unwrap(), vec![ElementId(1)]);
    assert_eq!(manager.status().await, PersistenceStatus::Synced);
}

#[tokio::test]
async fn manager_retries_transient_failures() {
    let store = Arc::new(MockStore::failing(2));
    let manager = PersistenceManager::new(
        &tokio::runtime::Handle::current(),
        store.clone(),
        quick_retries(2),
    );
    manager.delete_element(ElementId(7)).unwrap();
    manager.flush().await.unwrap();

    assert_eq!(*store.deleted.lock().unwrap(), vec![ElementId(7)]);
    assert_eq!(manager.status().await, PersistenceStatus::Synced);
    assert_eq!(manager.take_last_failure().await, None);
}

#[tokio::test]
async fn manager_reports_permanent_failures() {
    let store = Arc::new(MockStore::failing(5));
    let manager = PersistenceManager::new(
        &tokio::runtime::Handle::current(),
        store.clone(),
        quick_retries(1),
    );
    manager.delete_element(ElementId(3)).unwrap();
    manager.flush().await.unwrap();

    assert!(store.deleted.lock().unwrap().is_empty());
    assert!(matches!(
        manager.status().await,
        PersistenceStatus::Failed(ref msg) if msg.contains("disk unavailable")
    ));
    let failure = manager.take_last_failure().await.unwrap();
    assert!(failure.contains("delete #3"), "unexpected failure: {failure}");
    assert_eq!(manager.take_last_failure().await, None);
    // Two of the five queued failures were consumed.
    assert_eq!(*store.failures_left.lock().unwrap(), 3);
}

#[test]
fn requests_fail_when_worker_is_gone() {
    let manager = PersistenceManager::with_closed_channel_for_test(Arc::new(MockStore::default()));
    assert!(matches!(
        manager.delete_element(ElementId(1)),
        Err(PersistenceError::Closed)
    ));
}

#[tokio::test]
async fn manager_loads_through_the_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    save_all(&FileStore::new(&path), &sample_document()).await;

    let manager = PersistenceManager::new(
        &tokio::runtime::Handle::current(),
        Arc::new(FileStore::new(&path)),
        RetryPolicy::default(),
    );
    assert_eq!(manager.load_all_elements().await.unwrap().len(), 3);
    let far = BoundingBox::new(400.0, 400.0, 600.0, 600.0).unwrap();
    let photos = manager.load_elements(far).await.unwrap();
    assert_eq!(photos.len(), 1);
    assert!(photos[0].as_photo().is_some());
}
