//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with error classification
//! - HTML field extraction
//! - The work queue, failure collector and worker pool
//! - Overall crawl coordination and interrupt handling

mod coordinator;
mod extractor;
mod fetcher;
mod progress;
mod queue;
mod scheduler;
mod worker;

pub use coordinator::{build_scheduler, run_crawl};
pub use extractor::{ComicExtractor, Extractor, FIELD_ANNOTATION, FIELD_TITLE};
pub use fetcher::{build_http_client, classify_error, FetchError, FetchErrorKind, Fetcher, HttpFetcher};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use queue::{DownloadError, Failure, FailureCollector, FailureReason, WorkQueue};
pub use scheduler::{CrawlReport, CrawlSettings, Scheduler};

/// Re-exported so callers can cancel a [`Scheduler::run`] without naming tokio-util
pub use tokio_util::sync::CancellationToken;
