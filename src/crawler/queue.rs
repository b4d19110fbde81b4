//! The per-run work queue and failure collector

use crate::crawler::fetcher::FetchErrorKind;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending ids for the current run
///
/// Seeded with every id of the requested range in ascending order. Popping
/// never waits: an empty queue means the worker is done.
#[derive(Debug, Default)]
pub struct WorkQueue {
    ids: Mutex<VecDeque<u32>>,
}

impl WorkQueue {
    /// Creates a queue holding every id in `start..=end`
    pub fn seeded(start: u32, end: u32) -> Self {
        Self {
            ids: Mutex::new((start..=end).collect()),
        }
    }

    /// Removes and returns the next id, or `None` if the queue is drained
    pub fn pop(&self) -> Option<u32> {
        lock(&self.ids).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ids).is_empty()
    }
}

/// Why the asset download step failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The asset URL could not be fetched
    Fetch(FetchErrorKind),

    /// The asset arrived but could not be written to disk
    Write(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(kind) => write!(f, "{}", kind),
            Self::Write(message) => write!(f, "could not write asset: {}", message),
        }
    }
}

/// Which pipeline step failed for an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Fetch(FetchErrorKind),
    Extraction,
    Download(DownloadError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(kind) => write!(f, "fetch failed: {}", kind),
            Self::Extraction => f.write_str("extraction failed: a required field is missing"),
            Self::Download(err) => write!(f, "download failed: {}", err),
        }
    }
}

/// One id that failed irrecoverably during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub id: u32,
    pub source_url: String,
    pub reason: FailureReason,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source_url, self.reason)
    }
}

/// Run-scoped collection of failures, shared by all workers
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Mutex<Vec<Failure>>,
}

impl FailureCollector {
    pub fn push(&self, failure: Failure) {
        lock(&self.failures).push(failure);
    }

    pub fn len(&self) -> usize {
        lock(&self.failures).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.failures).is_empty()
    }

    /// Takes every recorded failure, ordered by id
    pub fn drain(&self) -> Vec<Failure> {
        let mut failures = std::mem::take(&mut *lock(&self.failures));
        failures.sort_by_key(|failure| failure.id);
        failures
    }
}
