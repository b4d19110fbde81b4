//! Progress reporting hooks
//!
//! The scheduler calls [`ProgressSink::begin`] once with the number of queued
//! ids and [`ProgressSink::finish`] once every worker has stopped. Workers call
//! [`ProgressSink::advance`] once per popped id whatever its outcome.
//! Presentation is left to the implementation.

use crate::state::Outcome;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives one tick per processed id
pub trait ProgressSink: Send + Sync {
    /// Called once before workers start
    fn begin(&self, _total: usize) {}

    /// Called once per popped id (success, skip, or failure)
    fn advance(&self, id: u32, outcome: Outcome);

    /// Called once after all workers have exited
    fn finish(&self) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _id: u32, _outcome: Outcome) {}
}

/// Logs a `[n/total]` line per processed id
#[derive(Debug, Default)]
pub struct LogProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids processed so far
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn begin(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn advance(&self, id: u32, outcome: Outcome) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        tracing::debug!("[{}/{}] page {}: {}", done, total, id, outcome);
    }

    fn finish(&self) {
        tracing::info!(
            "Processed {} of {} pages",
            self.done(),
            self.total.load(Ordering::Relaxed)
        );
    }
}
