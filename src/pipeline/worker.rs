//! Download worker pool
//!
//! Two independently bounded pools share one fetcher and one storage
//! backend. A worker performs a single fetch-and-store and reports its
//! outcome; no error escapes a worker, so a failing download never takes the
//! pool down with it.

use crate::config::WorkerConfig;
use crate::media::{MediaKind, PoolClass};
use crate::output::{ProgressEvent, ProgressSink};
use crate::pipeline::{CandidateReference, FetchError, Fetcher};
use crate::state::{RunState, Tally};
use crate::storage::{OutputLayout, Storage, StorageError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Result of one fetch-and-store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Bytes were fetched and written
    Downloaded { path: PathBuf, bytes: usize },
    /// The destination already existed; nothing was fetched
    AlreadyPresent { path: PathBuf },
    /// The fetch or the write failed
    Failed { reason: String },
}

/// Image-class and video-class download pools
pub struct WorkerPool {
    image_permits: Arc<Semaphore>,
    video_permits: Arc<Semaphore>,
    image_timeout: Duration,
    video_timeout: Duration,
    politeness_delay: Duration,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Storage>,
    layout: OutputLayout,
    progress: Arc<dyn ProgressSink>,
}

impl WorkerPool {
    /// Creates both pools from the `[workers]` section
    pub fn new(
        config: &WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
        layout: OutputLayout,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            image_permits: Arc::new(Semaphore::new(config.image_concurrency as usize)),
            video_permits: Arc::new(Semaphore::new(config.video_concurrency as usize)),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            video_timeout: Duration::from_secs(config.video_timeout_secs),
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            fetcher,
            storage,
            layout,
            progress,
        }
    }

    /// Fetch timeout for media of `kind`
    pub fn timeout_for(&self, kind: MediaKind) -> Duration {
        match kind.pool() {
            PoolClass::Image => self.image_timeout,
            PoolClass::Video => self.video_timeout,
        }
    }

    /// Free worker slots of a pool
    pub fn available(&self, pool: PoolClass) -> usize {
        self.permits(pool).available_permits()
    }

    fn permits(&self, pool: PoolClass) -> &Arc<Semaphore> {
        match pool {
            PoolClass::Image => &self.image_permits,
            PoolClass::Video => &self.video_permits,
        }
    }

    /// Downloads one reference unless its file already exists
    ///
    /// Does not take a pool slot; [`WorkerPool::spawn`] does that around it.
    ///
    /// # Steps
    ///
    /// 1. Return `AlreadyPresent` without any network call if the destination exists
    /// 2. Fetch with the kind's timeout; anything but HTTP 200 fails
    /// 3. Write the bytes atomically; losing a race for the destination to
    ///    another reference is `AlreadyPresent`
    /// 4. Wait the politeness delay
    pub async fn fetch_and_store(&self, reference: &CandidateReference) -> WorkerOutcome {
        let path = self.layout.destination(&reference.url, reference.kind);

        if self.storage.exists(&path).await {
            tracing::debug!("{} already present at {}", reference.url, path.display());
            return WorkerOutcome::AlreadyPresent { path };
        }

        let timeout = self.timeout_for(reference.kind);
        let response = match self.fetcher.get(&reference.url, timeout).await {
            Ok(response) => response,
            Err(e) => {
                return WorkerOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if response.status != 200 {
            let error = FetchError::Status {
                url: reference.url.clone(),
                status: response.status,
            };
            return WorkerOutcome::Failed {
                reason: error.to_string(),
            };
        }

        match self.storage.write_atomic(&path, &response.body).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                // Another reference with the same destination finished first
                tracing::debug!("{} was written concurrently, keeping it", path.display());
                return WorkerOutcome::AlreadyPresent { path };
            }
            Err(e) => {
                return WorkerOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }

        if !self.politeness_delay.is_zero() {
            tokio::time::sleep(self.politeness_delay).await;
        }

        WorkerOutcome::Downloaded {
            path,
            bytes: response.body.len(),
        }
    }

    /// Starts a worker for `reference` in the pool matching its kind
    ///
    /// The worker waits for a slot, downloads, updates the run counters and
    /// emits a progress event.
    pub fn spawn(self: &Arc<Self>, reference: CandidateReference, run: Arc<RunState>) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        let permits = Arc::clone(self.permits(reference.kind.pool()));

        tokio::spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => pool.fetch_and_store(&reference).await,
                Err(_) => WorkerOutcome::Failed {
                    reason: "worker pool closed".to_string(),
                },
            };
            pool.report(&reference, outcome, &run);
        })
    }

    fn report(&self, reference: &CandidateReference, outcome: WorkerOutcome, run: &RunState) {
        match outcome {
            WorkerOutcome::Downloaded { bytes, .. } => {
                run.counters.record(reference.kind, Tally::Downloaded);
                self.progress.emit(&ProgressEvent::Downloaded {
                    kind: reference.kind,
                    url: reference.url.clone(),
                    bytes,
                });
            }
            WorkerOutcome::AlreadyPresent { .. } => {
                run.counters.record(reference.kind, Tally::Skipped);
                self.progress.emit(&ProgressEvent::AlreadyPresent {
                    url: reference.url.clone(),
                });
            }
            WorkerOutcome::Failed { reason } => {
                run.counters.record(reference.kind, Tally::Failed);
                self.progress.emit(&ProgressEvent::DownloadFailed {
                    url: reference.url.clone(),
                    reason,
                });
            }
        }
    }
}
