use super::PersistenceError;
use super::store::ElementStore;
use crate::element::{Element, ElementId, Photo, Stroke};
use crate::geometry::BoundingBox;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};

/// How often a failed request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// Progress of the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PersistenceStatus {
    #[default]
    Idle,
    Saving,
    /// The last request reached the store.
    Synced,
    /// The last request gave up after all retries.
    Failed(String),
}

enum Request {
    SaveStroke(Stroke),
    SavePhoto(Photo),
    Delete(ElementId),
    Flush(oneshot::Sender<()>),
}

impl Request {
    fn describe(&self) -> String {
        match self {
            Request::SaveStroke(stroke) => format!("save stroke {}", stroke.id),
            Request::SavePhoto(photo) => format!("save photo {}", photo.id),
            Request::Delete(id) => format!("delete {id}"),
            Request::Flush(_) => "flush".to_string(),
        }
    }
}

/// Forwards document changes to an [`ElementStore`] from a background task.
///
/// Requests are queued without blocking and applied in order. Each one is
/// retried according to the [`RetryPolicy`]; a request that still fails is
/// dropped and reported through [`PersistenceManager::status`].
#[derive(Clone)]
pub struct PersistenceManager {
    request_tx: mpsc::UnboundedSender<Request>,
    store: Arc<dyn ElementStore>,
    status: Arc<Mutex<PersistenceStatus>>,
    last_failure: Arc<Mutex<Option<String>>>,
}

impl PersistenceManager {
    /// Spawns the worker on `runtime_handle`.
    pub fn new(
        runtime_handle: &tokio::runtime::Handle,
        store: Arc<dyn ElementStore>,
        policy: RetryPolicy,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Request>();
        let status = Arc::new(Mutex::new(PersistenceStatus::Idle));
        let last_failure = Arc::new(Mutex::new(None));

        let status_clone = status.clone();
        let failure_clone = last_failure.clone();
        let store_clone = store.clone();

        runtime_handle.spawn(async move {
            while let Some(request) = request_rx.recv().await {
                if let Request::Flush(done) = request {
                    // Every earlier request already finished.
                    let _ = done.send(());
                    continue;
                }
                let label = request.describe();
                log::debug!("Processing persistence request: {}", label);
                *status_clone.lock().await = PersistenceStatus::Saving;

                match apply_with_retries(store_clone.as_ref(), request, policy).await {
                    Ok(()) => {
                        log::info!("Persisted: {}", label);
                        *status_clone.lock().await = PersistenceStatus::Synced;
                    }
                    Err(e) => {
                        let message = format!("{label}: {e}");
                        log::error!("Persistence failed permanently: {}", message);
                        *status_clone.lock().await = PersistenceStatus::Failed(message.clone());
                        *failure_clone.lock().await = Some(message);
                    }
                }
            }
            log::debug!("Persistence worker stopped");
        });

        Self {
            request_tx,
            store,
            status,
            last_failure,
        }
    }

    fn send(&self, request: Request) -> Result<(), PersistenceError> {
        self.request_tx
            .send(request)
            .map_err(|_| PersistenceError::Closed)
    }

    pub fn save_stroke(&self, stroke: Stroke) -> Result<(), PersistenceError> {
        self.send(Request::SaveStroke(stroke))
    }

    pub fn save_photo(&self, photo: Photo) -> Result<(), PersistenceError> {
        self.send(Request::SavePhoto(photo))
    }

    pub fn delete_element(&self, id: ElementId) -> Result<(), PersistenceError> {
        self.send(Request::Delete(id))
    }

    /// Forwards a saved element to the matching store call.
    pub fn save_element(&self, element: &Element) -> Result<(), PersistenceError> {
        match element {
            Element::Stroke(stroke) => self.save_stroke(stroke.clone()),
            Element::Photo(photo) => self.save_photo(photo.clone()),
        }
    }

    /// Resolves once every request queued before it finished (or gave up).
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Request::Flush(done_tx))?;
        done_rx.await.map_err(|_| PersistenceError::Closed)
    }

    /// Range-limited load straight from the store.
    pub async fn load_elements(
        &self,
        bounds: BoundingBox,
    ) -> Result<Vec<Element>, PersistenceError> {
        self.store.load_elements(bounds).await
    }

    pub async fn load_all_elements(&self) -> Result<Vec<Element>, PersistenceError> {
        self.store.load_all_elements().await
    }

    pub async fn status(&self) -> PersistenceStatus {
        self.status.lock().await.clone()
    }

    /// Non-blocking status read; `None` while the worker holds the lock.
    pub fn try_status(&self) -> Option<PersistenceStatus> {
        self.status.try_lock().ok().map(|status| status.clone())
    }

    /// The most recent request dropped after exhausting its retries. Clears it.
    pub async fn take_last_failure(&self) -> Option<String> {
        self.last_failure.lock().await.take()
    }
}

async fn apply_with_retries(
    store: &dyn ElementStore,
    request: Request,
    policy: RetryPolicy,
) -> Result<(), PersistenceError> {
    let mut attempt = 0;
    loop {
        let result = match &request {
            Request::SaveStroke(stroke) => store.save_stroke(stroke.clone()).await,
            Request::SavePhoto(photo) => store.save_photo(photo.clone()).await,
            Request::Delete(id) => store.delete_element(*id).await,
            Request::Flush(_) => Ok(()),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying",
                    request.describe(),
                    attempt,
                    policy.max_retries + 1,
                    e
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
impl PersistenceManager {
    pub(crate) fn with_closed_channel_for_test(store: Arc<dyn ElementStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Request>();
        drop(rx);
        Self {
            request_tx: tx,
            store,
            status: Arc::new(Mutex::new(PersistenceStatus::Idle)),
            last_failure: Arc::new(Mutex::new(None)),
        }
    }
}
