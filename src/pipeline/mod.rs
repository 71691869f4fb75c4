//! Pipeline module for media acquisition
//!
//! This module contains the core harvesting logic, including:
//! - The time window applied to feed elements
//! - The task queue and per-run deduplication
//! - The feed scanner (producer) and the dispatcher (consumer)
//! - The bounded download worker pools and their HTTP fetcher
//! - The session lifecycle that ties a run together

mod dedup;
mod dispatcher;
mod fetcher;
mod queue;
mod scanner;
mod session;
mod window;
mod worker;

pub use dedup::DedupSet;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use fetcher::{FetchError, FetchResponse, Fetcher, HttpFetcher};
pub use queue::{task_queue, CandidateReference, DownloadTask, Popped, TaskReceiver, TaskSender};
pub use scanner::{FeedScanner, MediaFilter, ScanOutcome, ScanSettings};
pub use session::{Session, SessionHandle};
pub use window::{WindowPolicy, WindowVerdict};
pub use worker::{WorkerOutcome, WorkerPool};
