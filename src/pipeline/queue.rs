//! Task queue between the feed scanner and the dispatcher
//!
//! The queue is an unbounded FIFO: pushing never blocks the scanner, and the
//! dispatcher pops with a timeout so that it can notice a stalled producer.

use crate::media::{classify_url, MediaKind};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// One discovered media URL and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateReference {
    /// Link to the post the media belongs to, when known
    pub source_context: Option<String>,
    pub url: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: MediaKind,
}

impl CandidateReference {
    /// Creates a reference, inferring its kind from the URL
    pub fn new(
        url: impl Into<String>,
        source_context: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        let url = url.into();
        let kind = classify_url(&url);
        Self {
            source_context,
            url,
            timestamp,
            kind,
        }
    }
}

/// Queue payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTask {
    Fetch(CandidateReference),
    EndOfStream,
}

/// Result of a timed pop
#[derive(Debug, PartialEq, Eq)]
pub enum Popped {
    Task(CandidateReference),
    EndOfStream,
    TimedOut,
}

/// Creates a connected sender/receiver pair
pub fn task_queue() -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender { tx }, TaskReceiver { rx })
}

/// Producer side of the task queue
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<DownloadTask>,
}

impl TaskSender {
    /// Queues a task; returns false if the consumer is gone
    pub fn push(&self, task: DownloadTask) -> bool {
        self.tx.send(task).is_ok()
    }

    /// Queues the end-of-stream marker
    pub fn finish(&self) -> bool {
        self.push(DownloadTask::EndOfStream)
    }
}

/// Consumer side of the task queue
#[derive(Debug)]
pub struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<DownloadTask>,
}

impl TaskReceiver {
    /// Waits up to `wait` for the next task
    ///
    /// A queue whose senders are all gone reads as end-of-stream.
    pub async fn pop(&mut self, wait: Duration) -> Popped {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(DownloadTask::Fetch(reference))) => Popped::Task(reference),
            Ok(Some(DownloadTask::EndOfStream)) | Ok(None) => Popped::EndOfStream,
            Err(_) => Popped::TimedOut,
        }
    }
}
