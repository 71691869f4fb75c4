//! Structured progress events
//!
//! The pipeline reports what it does through a [`ProgressSink`]; each event
//! renders as one line of text for whatever presentation layer listens.

use crate::media::MediaKind;
use std::fmt;

/// Something noteworthy that happened during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted { window: String },
    TaskQueued { kind: MediaKind, url: String },
    ElementSkipped { element: String, reason: String },
    WindowStop { element: String },
    FeedExhausted,
    FeedLost { reason: String },
    VariantPass { lists: usize, queued: usize },
    Downloaded { kind: MediaKind, url: String, bytes: usize },
    AlreadyPresent { url: String },
    DownloadFailed { url: String, reason: String },
    DispatcherStalled { idle_polls: u32 },
    Cancelled,
    Draining { active_workers: usize },
    WorkersAborted { count: usize },
    RunFinished { attempted: usize, found: usize, missing: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { window } => write!(f, "run started, window {}", window),
            Self::TaskQueued { kind, url } => write!(f, "queued {} {}", kind, url),
            Self::ElementSkipped { element, reason } => {
                write!(f, "skipped element {}: {}", element, reason)
            }
            Self::WindowStop { element } => {
                write!(f, "element {} is at or before the window start, scan stopped", element)
            }
            Self::FeedExhausted => write!(f, "feed exhausted"),
            Self::FeedLost { reason } => write!(f, "feed source lost: {}", reason),
            Self::VariantPass { lists, queued } => write!(
                f,
                "variant pass found {} variant lists, queued {} new URLs",
                lists, queued
            ),
            Self::Downloaded { kind, url, bytes } => {
                write!(f, "downloaded {} {} ({} bytes)", kind, url, bytes)
            }
            Self::AlreadyPresent { url } => write!(f, "already present {}", url),
            Self::DownloadFailed { url, reason } => write!(f, "failed {}: {}", url, reason),
            Self::DispatcherStalled { idle_polls } => write!(
                f,
                "no tasks after {} polls, ending the run",
                idle_polls
            ),
            Self::Cancelled => write!(f, "stop requested"),
            Self::Draining { active_workers } => {
                write!(f, "draining, {} workers still running", active_workers)
            }
            Self::WorkersAborted { count } => write!(f, "aborted {} stuck workers", count),
            Self::RunFinished {
                attempted,
                found,
                missing,
            } => write!(
                f,
                "run finished: attempted={} found={} missing={}",
                attempted, found, missing
            ),
        }
    }
}

/// Receiver of progress events
///
/// Called from the scanner, the dispatcher and every worker, so
/// implementations must be cheap and thread-safe.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

/// Forwards every event to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DownloadFailed { .. }
            | ProgressEvent::FeedLost { .. }
            | ProgressEvent::DispatcherStalled { .. }
            | ProgressEvent::WorkersAborted { .. } => tracing::warn!("{}", event),
            ProgressEvent::TaskQueued { .. }
            | ProgressEvent::ElementSkipped { .. }
            | ProgressEvent::AlreadyPresent { .. } => tracing::debug!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

/// Ignores all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_lines() {
        assert_eq!(
            ProgressEvent::TaskQueued {
                kind: MediaKind::Video,
                url: "https://video.example.com/pu/a.mp4".to_string()
            }
            .to_string(),
            "queued video https://video.example.com/pu/a.mp4"
        );
        assert_eq!(
            ProgressEvent::RunFinished {
                attempted: 5,
                found: 4,
                missing: 1
            }
            .to_string(),
            "run finished: attempted=5 found=4 missing=1"
        );
    }

    #[test]
    fn test_sinks_accept_events() {
        let event = ProgressEvent::FeedExhausted;
        LogProgress.emit(&event);
        NoProgress.emit(&event);
        assert!(!event.to_string().contains('\n'));
    }
}
