use crate::types::{FailureReason, WorkflowInstance, WorkflowResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time workflow counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowStats {
    /// Runs started since the engine was created.
    pub started: u64,
    /// Runs started but not yet terminal.
    pub in_flight: u64,
    /// Runs that reached `COMPLETE`.
    pub completed: u64,
    /// Runs that reached `FAILED`, by reason.
    pub failed: BTreeMap<FailureReason, u64>,
}

/// Tracks workflow outcomes across all runs of one engine.
#[derive(Default)]
pub struct WorkflowMonitor {
    stats: Mutex<WorkflowStats>,
}

impl WorkflowMonitor {
    /// Create a monitor with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as started.
    ///
    /// The run stays in flight until the returned guard is finished or
    /// dropped, so a cancelled run never leaves the count behind.
    pub fn start(&self) -> RunGuard<'_> {
        let mut stats = self.stats.lock();
        stats.started += 1;
        stats.in_flight += 1;
        RunGuard {
            monitor: self,
            armed: true,
        }
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> WorkflowStats {
        self.stats.lock().clone()
    }

    fn release(&self, outcome: Option<&WorkflowResult>) {
        let mut stats = self.stats.lock();
        stats.in_flight = stats.in_flight.saturating_sub(1);
        match outcome {
            Some(WorkflowResult::Success { .. }) => stats.completed += 1,
            Some(WorkflowResult::Failure { reason, .. }) => {
                *stats.failed.entry(*reason).or_insert(0) += 1;
            }
            None => {}
        }
    }
}

/// One run counted as in flight by a [`WorkflowMonitor`].
#[must_use = "dropping the guard ends the run without an outcome"]
pub struct RunGuard<'a> {
    monitor: &'a WorkflowMonitor,
    armed: bool,
}

impl RunGuard<'_> {
    /// Record the terminal outcome of the run.
    pub fn finish(mut self, instance: &WorkflowInstance) {
        self.armed = false;
        self.monitor.release(instance.outcome.as_ref());
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.monitor.release(None);
        }
    }
}
