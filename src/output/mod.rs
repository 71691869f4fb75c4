//! Output module for run transcripts, reconciliation and reports
//!
//! This module handles:
//! - Writing the per-run transcript of emitted tasks
//! - Reconciling a transcript against what landed in storage
//! - Writing the manifest and printing the end-of-run report
//! - Reporting structured progress events

mod progress;
mod reconcile;
pub mod report;
mod transcript;

pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressSink};
pub use reconcile::{
    reconcile, reconcile_tasks, render_manifest, write_manifest, ReconciledEntry, Reconciliation,
};
pub use report::{print_report, RunReport};
pub use transcript::{
    append_summary, parse_tasks, read_tasks, TranscriptHeader, TranscriptLog, TranscriptTask,
    SUMMARY_MARKER,
};
