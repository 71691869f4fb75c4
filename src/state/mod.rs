//! State module for tracking run progress
//!
//! This module provides state management for a harvesting session and its runs.
//!
//! # Components
//!
//! - `SessionPhase`: The lifecycle phase of a session (idle, scanning, draining, terminated)
//! - `RunState`: Per-run cancellation token, dedup set, worker registry and counters

mod phase;
mod run_state;

// Re-export main types
pub use phase::SessionPhase;
pub use run_state::{CounterSnapshot, RunCounters, RunState, Tally, WorkerRegistry};
