use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::task::TaskResult;

/// Live counters for a running batch, shared with whoever started it.
pub struct Progress {
    submitted: usize,
    started: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    attempts: AtomicU64,
}

impl Progress {
    pub fn new(submitted: usize) -> Arc<Self> {
        Arc::new(Self {
            submitted,
            started: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            attempts: AtomicU64::new(0),
        })
    }

    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result(&self, result: &TaskResult) {
        let counter = match result {
            TaskResult::Success { .. } => &self.succeeded,
            TaskResult::Failure { .. } => &self.failed,
            TaskResult::Cancelled { .. } => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(diagnostics) = result.diagnostics() {
            self.attempts
                .fetch_add(u64::from(diagnostics.attempts), Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let started = self.started.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);

        ProgressSnapshot {
            submitted: self.submitted,
            started,
            succeeded,
            failed,
            cancelled,
            completed: succeeded + failed + cancelled,
            in_flight: started.saturating_sub(succeeded + failed),
            attempts: self.attempts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub submitted: usize,
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub in_flight: usize,
    pub attempts: u64,
}

impl ProgressSnapshot {
    pub fn is_done(&self) -> bool {
        self.completed == self.submitted
    }
}
