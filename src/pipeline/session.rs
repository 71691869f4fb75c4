//! Session lifecycle
//!
//! A session owns the feed source and runs the pipeline over it, one run at
//! a time:
//!
//! - `Idle → Scanning`: fresh run state, client state of the feed cleared,
//!   scanner and dispatcher started
//! - `Scanning → Draining`: the scanner has queued end-of-stream (or the run
//!   was stopped); outstanding work is awaited under timeouts
//! - `Draining → Terminated`: the transcript is reconciled and reported
//! - `Terminated → Scanning`: the next run on the same feed source
//!
//! Stopping a run through a [`SessionHandle`] is cooperative: the scanner
//! and the dispatcher see it on their next loop iteration, and the run still
//! goes through draining and reconciliation.

use crate::config::{validate, Config};
use crate::feed::FeedSource;
use crate::media::MediaKind;
use crate::output::{
    append_summary, reconcile, write_manifest, LogProgress, ProgressEvent, ProgressSink,
    Reconciliation, RunReport, TranscriptHeader, TranscriptLog,
};
use crate::pipeline::{
    task_queue, DispatchOutcome, Dispatcher, FeedScanner, Fetcher, ScanSettings, TaskSender,
    WindowPolicy, WorkerPool,
};
use crate::state::{RunState, SessionPhase};
use crate::storage::{OutputLayout, Storage};
use crate::HarvestError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct SessionShared {
    phase: Mutex<SessionPhase>,
    current: Mutex<Option<Arc<RunState>>>,
    stop_requested: AtomicBool,
}

impl SessionShared {
    fn phase(&self) -> MutexGuard<'_, SessionPhase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<RunState>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cloneable remote control of a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Requests the current run to stop
    ///
    /// Has no effect when no run is in progress.
    pub fn stop(&self) {
        let current = self.shared.current();
        match current.as_ref() {
            Some(run) => {
                tracing::info!("Stop requested");
                self.shared.stop_requested.store(true, Ordering::SeqCst);
                run.stop();
            }
            None => tracing::debug!("Stop requested with no run in progress"),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.shared.phase()
    }

    /// Returns true while a run is scanning and has not been stopped
    pub fn is_running(&self) -> bool {
        self.shared
            .current()
            .as_ref()
            .is_some_and(|run| run.is_running())
    }
}

/// Runs the harvesting pipeline over one feed source
pub struct Session<F> {
    feed: F,
    config: Config,
    config_hash: String,
    window: WindowPolicy,
    layout: OutputLayout,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Storage>,
    progress: Arc<dyn ProgressSink>,
    shared: Arc<SessionShared>,
    runs: u32,
}

impl<F: FeedSource> Session<F> {
    /// Creates an idle session
    ///
    /// The configuration is validated here, so an invalid window is reported
    /// as [`ConfigError`](crate::ConfigError) before anything is started.
    ///
    /// # Arguments
    ///
    /// * `config` - The harvesting configuration
    /// * `feed` - The feed source; the session keeps it across runs
    /// * `fetcher` - HTTP fetcher used by the download workers
    /// * `storage` - Where downloaded media are written
    pub fn new(
        config: Config,
        feed: F,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, HarvestError> {
        validate(&config)?;
        let window = WindowPolicy::from_config(&config.window)?;
        let layout = OutputLayout::new(&config.output);

        Ok(Self {
            feed,
            config,
            config_hash: "unknown".to_string(),
            window,
            layout,
            fetcher,
            storage,
            progress: Arc::new(LogProgress),
            shared: Arc::new(SessionShared {
                phase: Mutex::new(SessionPhase::Idle),
                current: Mutex::new(None),
                stop_requested: AtomicBool::new(false),
            }),
            runs: 0,
        })
    }

    /// Records the configuration hash in every transcript header
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Replaces the default progress sink, which logs through `tracing`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.shared.phase()
    }

    pub fn window(&self) -> &WindowPolicy {
        &self.window
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Releases the feed source
    pub fn into_feed(self) -> F {
        self.feed
    }

    fn transition(&self, to: SessionPhase) -> Result<(), HarvestError> {
        let mut phase = self.shared.phase();
        if !phase.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition { from: *phase, to });
        }
        tracing::debug!("Session {} -> {}", *phase, to);
        *phase = to;
        Ok(())
    }

    /// Performs one complete run and returns its report
    ///
    /// Only setup failures (the session is mid-run, or the transcript cannot
    /// be created) are returned as errors. Once scanning has started the run
    /// always reaches `Terminated` and produces a report, whatever fails
    /// along the way.
    pub async fn run(&mut self) -> Result<RunReport, HarvestError> {
        let from = self.phase();
        if !from.can_start() {
            return Err(HarvestError::InvalidTransition {
                from,
                to: SessionPhase::Scanning,
            });
        }

        let started_at = Utc::now();
        let transcript = TranscriptLog::create(
            self.layout.transcript_path(),
            &TranscriptHeader {
                started_at,
                window: self.window.describe(),
                config_hash: self.config_hash.clone(),
            },
        )
        .await?;

        let run = Arc::new(RunState::new());
        *self.shared.current() = Some(Arc::clone(&run));
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.transition(SessionPhase::Scanning)?;
        self.runs += 1;

        tracing::info!("Starting run {} ({})", self.runs, self.window.describe());
        self.progress.emit(&ProgressEvent::RunStarted {
            window: self.window.describe(),
        });

        if let Err(e) = self.feed.reset_client_state().await {
            tracing::warn!("Could not reset feed client state: {}", e);
        }

        let (tx, rx) = task_queue();
        let pool = Arc::new(WorkerPool::new(
            &self.config.workers,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.storage),
            self.layout.clone(),
            Arc::clone(&self.progress),
        ));
        let dispatcher = Dispatcher::new(
            rx,
            pool,
            Arc::clone(&run),
            Arc::clone(&self.progress),
            &self.config.dispatcher,
            &self.config.workers,
        );
        let dispatcher = tokio::spawn(dispatcher.run());

        let scanner = FeedScanner::new(
            self.window,
            ScanSettings::from_config(&self.config),
            Arc::clone(&run),
            tx.clone(),
            transcript,
            Arc::clone(&self.progress),
        );
        let scan = scanner.run(&mut self.feed).await;

        self.transition(SessionPhase::Draining)?;
        let stopped = self.shared.stop_requested.load(Ordering::SeqCst);
        if stopped {
            self.progress.emit(&ProgressEvent::Cancelled);
        }
        self.progress.emit(&ProgressEvent::Draining {
            active_workers: run.workers.active(),
        });

        let dispatch = self.drain_dispatcher(dispatcher, &tx).await;
        let aborted_workers = run
            .workers
            .join_all(Duration::from_secs(self.config.drain.worker_timeout_secs))
            .await;
        if aborted_workers > 0 {
            self.progress.emit(&ProgressEvent::WorkersAborted {
                count: aborted_workers,
            });
        }

        let reconciliation = self.reconcile_run().await;
        self.progress.emit(&ProgressEvent::RunFinished {
            attempted: reconciliation.attempted,
            found: reconciliation.found,
            missing: reconciliation.missing,
        });

        *self.shared.current() = None;
        self.transition(SessionPhase::Terminated)?;

        Ok(RunReport {
            run: self.runs,
            started_at,
            finished_at: Utc::now(),
            window: self.window.describe(),
            scan,
            dispatch,
            stopped,
            aborted_workers,
            counters: MediaKind::all()
                .into_iter()
                .map(|kind| (kind, run.counters.snapshot(kind)))
                .collect(),
            reconciliation,
        })
    }

    /// Waits for the dispatcher to stop popping
    ///
    /// If it is still running after the drain timeout, end-of-stream is
    /// queued again and a grace period applies; after that it is aborted.
    async fn drain_dispatcher(
        &self,
        mut dispatcher: JoinHandle<DispatchOutcome>,
        tx: &TaskSender,
    ) -> DispatchOutcome {
        let drain = &self.config.drain;

        match tokio::time::timeout(Duration::from_secs(drain.timeout_secs), &mut dispatcher).await {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => {
                tracing::error!("Dispatcher task failed: {}", e);
                return DispatchOutcome::Abandoned;
            }
            Err(_) => {
                tracing::warn!(
                    "Dispatcher still running after {}s, sending end of stream again",
                    drain.timeout_secs
                );
                tx.finish();
            }
        }

        match tokio::time::timeout(Duration::from_secs(drain.grace_secs), &mut dispatcher).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!("Dispatcher task failed: {}", e);
                DispatchOutcome::Abandoned
            }
            Err(_) => {
                tracing::error!("Dispatcher did not stop, continuing without it");
                dispatcher.abort();
                DispatchOutcome::Abandoned
            }
        }
    }

    /// Reconciles the transcript and writes the manifest and summary block
    ///
    /// Failures are logged; the returned report is empty if the transcript
    /// cannot be read.
    async fn reconcile_run(&self) -> Reconciliation {
        let transcript = self.layout.transcript_path();

        let reconciliation = match reconcile(transcript, &self.layout, self.storage.as_ref()).await {
            Ok(reconciliation) => reconciliation,
            Err(e) => {
                tracing::error!("Reconciliation failed: {}", e);
                return Reconciliation::default();
            }
        };

        if let Err(e) = write_manifest(self.layout.manifest_path(), &reconciliation).await {
            tracing::error!("Could not write manifest: {}", e);
        }
        if let Err(e) = append_summary(transcript, &reconciliation).await {
            tracing::error!("Could not append run summary: {}", e);
        }

        reconciliation
    }
}
