//! Element storage backends.

use super::PersistenceError;
use super::records::ElementRecord;
use crate::element::{Element, ElementId, Photo, Stroke};
use crate::geometry::BoundingBox;
use async_trait::async_trait;
use chrono::Utc;
use flate2::{Compression, bufread::GzDecoder, write::GzEncoder};
use fs2::FileExt;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

pub const CURRENT_VERSION: u32 = 1;
pub const DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES: u64 = 100 * 1024;

/// Durable storage for document elements. Every call is independent and
/// may be retried.
#[async_trait]
pub trait ElementStore: Send + Sync {
    /// Elements whose bounds intersect `bounds`.
    async fn load_elements(&self, bounds: BoundingBox) -> Result<Vec<Element>, PersistenceError>;

    async fn load_all_elements(&self) -> Result<Vec<Element>, PersistenceError>;

    async fn save_stroke(&self, stroke: Stroke) -> Result<(), PersistenceError>;

    async fn save_photo(&self, photo: Photo) -> Result<(), PersistenceError>;

    async fn delete_element(&self, id: ElementId) -> Result<(), PersistenceError>;
}

/// Compression preference for document files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMode {
    /// Always write plain JSON.
    Off,
    /// Always write gzip-compressed JSON.
    On,
    /// Write gzip when the payload exceeds the threshold.
    #[default]
    Auto,
}

#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    pub compression: CompressionMode,
    pub auto_compress_threshold_bytes: u64,
    /// Keep the previous file as `<name>.bak` on every write.
    pub keep_backup: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMode::Auto,
            auto_compress_threshold_bytes: DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES,
            keep_backup: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    version: u32,
    last_modified: String,
    #[serde(default)]
    elements: Vec<ElementRecord>,
}

/// Stores a whole document as one JSON file, optionally gzip-compressed.
///
/// Writes go through a temporary file and rotate the previous file into a
/// backup. An advisory lock file serialises access between processes. File
/// access runs on tokio's blocking pool.
#[derive(Debug)]
pub struct FileStore {
    files: Arc<DocumentFiles>,
    records: Mutex<Option<BTreeMap<ElementId, ElementRecord>>>,
}

/// Path and format of the document file, with the blocking I/O on it.
#[derive(Debug)]
struct DocumentFiles {
    path: PathBuf,
    options: FileStoreOptions,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, FileStoreOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: FileStoreOptions) -> Self {
        Self {
            files: Arc::new(DocumentFiles {
                path: path.into(),
                options,
            }),
            records: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.files.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.files.backup_path()
    }

    pub fn lock_path(&self) -> PathBuf {
        self.files.lock_path()
    }

    /// Runs `job` against the document files on the blocking pool.
    async fn blocking<T, F>(&self, job: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&DocumentFiles) -> T + Send + 'static,
        T: Send + 'static,
    {
        let files = Arc::clone(&self.files);
        Ok(task::spawn_blocking(move || job(&files)).await?)
    }

    async fn update<F>(&self, change: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&mut BTreeMap<ElementId, ElementRecord>) + Send,
    {
        let mut cached = self.records.lock().await;
        let mut records = match cached.take() {
            Some(records) => records,
            None => self.blocking(DocumentFiles::read_records).await??,
        };
        change(&mut records);
        let (records, written) = self
            .blocking(move |files| {
                let written = files.write_records(&records);
                (records, written)
            })
            .await?;
        *cached = Some(records);
        written
    }

    async fn decoded(&self) -> Result<Vec<Element>, PersistenceError> {
        let mut cached = self.records.lock().await;
        let records = match cached.take() {
            Some(records) => records,
            None => {
                let records = self.blocking(DocumentFiles::read_records).await??;
                info!(
                    "Loaded {} records from {}",
                    records.len(),
                    self.path().display()
                );
                records
            }
        };
        let decoded = records
            .values()
            .cloned()
            .map(Element::try_from)
            .collect::<Result<Vec<_>, _>>();
        *cached = Some(records);
        Ok(decoded?)
    }
}

impl DocumentFiles {
    fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn lock(&self, exclusive: bool) -> Result<File, PersistenceError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| Self::io_error(parent, err))?;
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| Self::io_error(&lock_path, err))?;
        let locked = if exclusive {
            lock_file.lock_exclusive()
        } else {
            lock_file.lock_shared()
        };
        locked.map_err(|err| Self::io_error(&lock_path, err))?;
        Ok(lock_file)
    }

    fn unlock(&self, lock_file: File) {
        if let Err(err) = lock_file.unlock() {
            warn!(
                "failed to unlock document {}: {}",
                self.lock_path().display(),
                err
            );
        }
    }

    /// Reads every record from disk. A missing file is an empty document.
    fn read_records(&self) -> Result<BTreeMap<ElementId, ElementRecord>, PersistenceError> {
        if !self.path.exists() {
            debug!("No document at {}, starting empty", self.path.display());
            return Ok(BTreeMap::new());
        }
        let lock_file = self.lock(false)?;
        let result = self.read_records_inner();
        self.unlock(lock_file);
        result
    }

    fn read_records_inner(&self) -> Result<BTreeMap<ElementId, ElementRecord>, PersistenceError> {
        let mut bytes = Vec::new();
        File::open(&self.path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|err| Self::io_error(&self.path, err))?;
        let json = if is_gzip(&bytes) {
            let mut out = Vec::new();
            GzDecoder::new(&bytes[..])
                .read_to_end(&mut out)
                .map_err(|err| Self::io_error(&self.path, err))?;
            out
        } else {
            bytes
        };
        let document: DocumentFile = serde_json::from_slice(&json)?;
        if document.version > CURRENT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(document.version));
        }
        Ok(document
            .elements
            .into_iter()
            .map(|record| (record.id(), record))
            .collect())
    }

    /// Writes `records` atomically, replacing the document.
    fn write_records(
        &self,
        records: &BTreeMap<ElementId, ElementRecord>,
    ) -> Result<(), PersistenceError> {
        let lock_file = self.lock(true)?;
        let result = self.write_records_inner(records);
        self.unlock(lock_file);
        result
    }

    fn write_records_inner(
        &self,
        records: &BTreeMap<ElementId, ElementRecord>,
    ) -> Result<(), PersistenceError> {
        let document = DocumentFile {
            version: CURRENT_VERSION,
            last_modified: Utc::now().to_rfc3339(),
            elements: records.values().cloned().collect(),
        };
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        let compress = match self.options.compression {
            CompressionMode::Off => false,
            CompressionMode::On => true,
            CompressionMode::Auto => bytes.len() as u64 >= self.options.auto_compress_threshold_bytes,
        };
        if compress {
            bytes = compress_bytes(&bytes).map_err(|err| Self::io_error(&self.path, err))?;
        }

        let tmp_path = temp_path(&self.path);
        {
            let mut tmp_file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)
                .map_err(|err| Self::io_error(&tmp_path, err))?;
            tmp_file
                .write_all(&bytes)
                .and_then(|_| tmp_file.sync_all())
                .map_err(|err| Self::io_error(&tmp_path, err))?;
        }

        if self.path.exists() {
            let backup_path = self.backup_path();
            if self.options.keep_backup {
                if backup_path.exists() {
                    fs::remove_file(&backup_path).ok();
                }
                fs::rename(&self.path, &backup_path)
                    .map_err(|err| Self::io_error(&backup_path, err))?;
            } else {
                fs::remove_file(&self.path).ok();
            }
        }
        fs::rename(&tmp_path, &self.path).map_err(|err| Self::io_error(&self.path, err))?;

        debug!(
            "Document saved to {} ({} elements, {} bytes, compression={})",
            self.path.display(),
            records.len(),
            bytes.len(),
            compress
        );
        Ok(())
    }
}

#[async_trait]
impl ElementStore for FileStore {
    async fn load_elements(&self, bounds: BoundingBox) -> Result<Vec<Element>, PersistenceError> {
        let mut elements = self.decoded().await?;
        elements.retain(|element| element.bounds().intersects(&bounds));
        Ok(elements)
    }

    async fn load_all_elements(&self) -> Result<Vec<Element>, PersistenceError> {
        self.decoded().await
    }

    async fn save_stroke(&self, stroke: Stroke) -> Result<(), PersistenceError> {
        let record = ElementRecord::Stroke((&stroke).into());
        self.update(move |records| {
            records.insert(stroke.id, record);
        })
        .await
    }

    async fn save_photo(&self, photo: Photo) -> Result<(), PersistenceError> {
        let record = ElementRecord::Photo((&photo).into());
        self.update(move |records| {
            records.insert(photo.id, record);
        })
        .await
    }

    async fn delete_element(&self, id: ElementId) -> Result<(), PersistenceError> {
        self.update(move |records| {
            records.remove(&id);
        })
        .await
    }
}

/// `doc.json` -> `doc.json.<suffix>`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut candidate = sibling(target, "tmp");
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = sibling(target, &format!("tmp{counter}"));
    }
    candidate
}

fn compress_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}
