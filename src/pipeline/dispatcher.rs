//! Dispatcher (consumer)
//!
//! Drains the task queue into the worker pools. The dispatcher never blocks
//! the scanner: the queue is unbounded and backpressure is applied only on
//! the dispatcher side, by waiting while too many workers are pending.

use crate::config::{DispatcherConfig, WorkerConfig};
use crate::output::{ProgressEvent, ProgressSink};
use crate::pipeline::{Popped, TaskReceiver, WorkerPool};
use crate::state::RunState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How the dispatcher ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// End-of-stream was received
    Completed,
    /// No task arrived within the idle limit; the run was ended
    Stalled,
    /// The run was stopped
    Cancelled,
    /// Did not finish within the drain timeouts and was aborted
    Abandoned,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::Stalled => "stalled",
            Self::Cancelled => "cancelled",
            Self::Abandoned => "abandoned",
        };
        f.write_str(text)
    }
}

/// Moves tasks from the queue into the worker pools
pub struct Dispatcher {
    receiver: TaskReceiver,
    pool: Arc<WorkerPool>,
    run: Arc<RunState>,
    progress: Arc<dyn ProgressSink>,
    pop_timeout: Duration,
    max_idle_polls: u32,
    max_pending: usize,
    backpressure_poll: Duration,
}

impl Dispatcher {
    pub fn new(
        receiver: TaskReceiver,
        pool: Arc<WorkerPool>,
        run: Arc<RunState>,
        progress: Arc<dyn ProgressSink>,
        dispatcher: &DispatcherConfig,
        workers: &WorkerConfig,
    ) -> Self {
        Self {
            receiver,
            pool,
            run,
            progress,
            pop_timeout: Duration::from_millis(dispatcher.pop_timeout_ms),
            max_idle_polls: dispatcher.max_idle_polls.max(1),
            max_pending: workers.max_pending as usize,
            backpressure_poll: Duration::from_millis(dispatcher.backpressure_poll_ms),
        }
    }

    /// Runs until end-of-stream, a stall, or a stop
    ///
    /// # Loop
    ///
    /// 1. Pop with the configured timeout
    /// 2. On timeout, prune finished workers and count an idle poll; after
    ///    `max-idle-polls` consecutive idle polls, stop the run
    /// 3. On a task, wait while more than `max-pending` workers are running,
    ///    then spawn a worker in the pool for the task's kind
    pub async fn run(mut self) -> DispatchOutcome {
        let mut idle_polls = 0;
        let token = self.run.token().clone();

        loop {
            if !self.run.is_running() {
                return DispatchOutcome::Cancelled;
            }

            let popped = tokio::select! {
                biased;
                _ = token.cancelled() => return DispatchOutcome::Cancelled,
                popped = self.receiver.pop(self.pop_timeout) => popped,
            };

            match popped {
                Popped::EndOfStream => {
                    tracing::debug!("Dispatcher received end of stream");
                    return DispatchOutcome::Completed;
                }
                Popped::TimedOut => {
                    let active = self.run.workers.prune();
                    idle_polls += 1;
                    tracing::debug!(
                        "Task queue empty ({}/{}), {} workers active",
                        idle_polls,
                        self.max_idle_polls,
                        active
                    );

                    if idle_polls >= self.max_idle_polls {
                        self.progress
                            .emit(&ProgressEvent::DispatcherStalled { idle_polls });
                        self.run.stop();
                        return DispatchOutcome::Stalled;
                    }
                }
                Popped::Task(reference) => {
                    idle_polls = 0;

                    while self.run.workers.prune() > self.max_pending {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return DispatchOutcome::Cancelled,
                            _ = tokio::time::sleep(self.backpressure_poll) => {}
                        }
                    }

                    tracing::trace!("Dispatching {} {}", reference.kind, reference.url);
                    let handle = self.pool.spawn(reference, Arc::clone(&self.run));
                    self.run.workers.register(handle);
                }
            }
        }
    }
}
