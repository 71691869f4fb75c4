//! Per-run shared state
//!
//! A fresh [`RunState`] is built every time a session starts a run, so two
//! sequential runs sharing one feed source never see each other's dedup
//! entries, workers or counters.

use crate::media::MediaKind;
use crate::pipeline::DedupSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Things counted per media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Enqueued,
    Downloaded,
    Skipped,
    Failed,
}

#[derive(Debug, Default)]
struct KindCounters {
    enqueued: AtomicU64,
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl KindCounters {
    fn slot(&self, tally: Tally) -> &AtomicU64 {
        match tally {
            Tally::Enqueued => &self.enqueued,
            Tally::Downloaded => &self.downloaded,
            Tally::Skipped => &self.skipped,
            Tally::Failed => &self.failed,
        }
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of one kind's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub enqueued: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl CounterSnapshot {
    fn add(self, other: CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            enqueued: self.enqueued + other.enqueued,
            downloaded: self.downloaded + other.downloaded,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

/// Download counters for every media kind
#[derive(Debug, Default)]
pub struct RunCounters {
    image: KindCounters,
    video: KindCounters,
    animated: KindCounters,
}

impl RunCounters {
    fn kind(&self, kind: MediaKind) -> &KindCounters {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
            MediaKind::AnimatedImage => &self.animated,
        }
    }

    pub fn record(&self, kind: MediaKind, tally: Tally) {
        self.kind(kind).slot(tally).fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, kind: MediaKind) -> CounterSnapshot {
        self.kind(kind).snapshot()
    }

    pub fn totals(&self) -> CounterSnapshot {
        MediaKind::all()
            .into_iter()
            .map(|kind| self.snapshot(kind))
            .fold(CounterSnapshot::default(), CounterSnapshot::add)
    }
}

/// Handles of spawned download workers
///
/// Mutated by the dispatcher (register, prune) and drained by the session.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, handle: JoinHandle<()>) {
        self.lock().push(handle);
    }

    /// Drops handles of finished workers and returns how many are still running
    pub fn prune(&self) -> usize {
        let mut handles = self.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.len()
    }

    /// Number of registered workers that have not finished
    pub fn active(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits for every registered worker, bounded by `timeout` overall
    ///
    /// Workers still running at the deadline are aborted. Returns the number
    /// of aborted workers.
    pub async fn join_all(&self, timeout: Duration) -> usize {
        let handles: Vec<_> = std::mem::take(&mut *self.lock());
        let deadline = Instant::now() + timeout;
        let mut aborted = 0;

        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Download worker ended abnormally: {}", e),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        aborted
    }
}

/// State shared by the scanner, dispatcher and workers of one run
#[derive(Debug, Default)]
pub struct RunState {
    token: CancellationToken,
    pub dedup: DedupSet,
    pub workers: WorkerRegistry,
    pub counters: RunCounters,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true until the run is stopped
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stops the run; every loop observes this on its next iteration
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_per_kind_and_totals() {
        let counters = RunCounters::default();
        counters.record(MediaKind::Image, Tally::Enqueued);
        counters.record(MediaKind::Image, Tally::Enqueued);
        counters.record(MediaKind::Image, Tally::Downloaded);
        counters.record(MediaKind::Video, Tally::Enqueued);
        counters.record(MediaKind::Video, Tally::Failed);
        counters.record(MediaKind::AnimatedImage, Tally::Skipped);

        assert_eq!(
            counters.snapshot(MediaKind::Image),
            CounterSnapshot {
                enqueued: 2,
                downloaded: 1,
                skipped: 0,
                failed: 0
            }
        );
        let totals = counters.totals();
        assert_eq!(totals.enqueued, 3);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.skipped, 1);
    }

    #[test]
    fn test_stop() {
        let state = RunState::new();
        assert!(state.is_running());
        state.stop();
        assert!(!state.is_running());
        assert!(state.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_registry_prune_and_join() {
        let registry = WorkerRegistry::default();
        registry.register(tokio::spawn(async {}));
        registry.register(tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }));

        assert_eq!(registry.join_all(Duration::from_secs(5)).await, 0);
        assert_eq!(registry.prune(), 0);
    }

    #[tokio::test]
    async fn test_registry_aborts_stragglers() {
        let registry = WorkerRegistry::default();
        registry.register(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));
        registry.register(tokio::spawn(async {}));

        assert!(registry.active() >= 1);
        assert_eq!(registry.join_all(Duration::from_millis(50)).await, 1);
        assert_eq!(registry.active(), 0);
    }
}
