//! End-of-run report
//!
//! This module collects everything a finished run knows about itself and
//! renders it for the command line.

use crate::media::MediaKind;
use crate::output::Reconciliation;
use crate::pipeline::{DispatchOutcome, ScanOutcome};
use crate::state::CounterSnapshot;
use chrono::{DateTime, Utc};

/// Summary of one finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Sequence number of the run within its session, starting at 1
    pub run: u32,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Window description as recorded in the transcript
    pub window: String,

    /// How the feed scan ended
    pub scan: ScanOutcome,

    /// How the dispatcher ended
    pub dispatch: DispatchOutcome,

    /// Whether an external stop was requested
    pub stopped: bool,

    /// Workers that had to be aborted during draining
    pub aborted_workers: usize,

    /// Download counters per media kind
    pub counters: Vec<(MediaKind, CounterSnapshot)>,

    pub reconciliation: Reconciliation,
}

impl RunReport {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Sum of the per-kind counters
    pub fn totals(&self) -> CounterSnapshot {
        self.counters
            .iter()
            .fold(CounterSnapshot::default(), |acc, (_, c)| CounterSnapshot {
                enqueued: acc.enqueued + c.enqueued,
                downloaded: acc.downloaded + c.downloaded,
                skipped: acc.skipped + c.skipped,
                failed: acc.failed + c.failed,
            })
    }
}

/// Prints a run report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &RunReport) {
    println!("=== Harvest Run {} ===\n", report.run);

    println!("Overview:");
    println!("  Started:  {}", report.started_at.to_rfc3339());
    println!(
        "  Finished: {} ({}s)",
        report.finished_at.to_rfc3339(),
        report.duration_seconds()
    );
    println!("  Window:   {}", report.window);
    println!("  Scan:     {}", report.scan);
    println!("  Dispatch: {}", report.dispatch);
    if report.stopped {
        println!("  Stopped by request");
    }
    if report.aborted_workers > 0 {
        println!("  Aborted workers: {}", report.aborted_workers);
    }
    println!();

    println!("Downloads by Kind:");
    for (kind, counters) in &report.counters {
        if counters.enqueued == 0 {
            continue;
        }
        println!(
            "  {}: {} queued, {} downloaded, {} already present, {} failed",
            kind, counters.enqueued, counters.downloaded, counters.skipped, counters.failed
        );
    }
    println!();

    let reconciliation = &report.reconciliation;
    if reconciliation.missing > 0 {
        println!("Missing ({}):", reconciliation.missing);
        for entry in reconciliation.missing_entries() {
            println!("  - {}", entry.url);
        }
        println!();
    }

    let success_rate = if reconciliation.attempted > 0 {
        (reconciliation.found as f64 / reconciliation.attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Result: attempted={} found={} missing={} ({:.1}% on disk)",
        reconciliation.attempted, reconciliation.found, reconciliation.missing, success_rate
    );
}
