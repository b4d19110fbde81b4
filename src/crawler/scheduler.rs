//! Scheduler for running a bounded crawl over an id range
//!
//! This module handles:
//! - Seeding the work queue with the requested range
//! - Spawning a fixed pool of workers that share the queue and the item store
//! - Cooperative cancellation (workers stop pulling ids, in-flight ids finish)
//! - Saving the item store exactly once, after every worker has stopped

use crate::config::Config;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::progress::{LogProgress, ProgressSink};
use crate::crawler::queue::{Failure, FailureCollector, WorkQueue};
use crate::crawler::worker::{run_worker, RunTally, WorkerContext};
use crate::storage::ItemStore;
use crate::{ConfigError, HarvestError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Settings for one scheduler, usually derived from [`Config`]
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Directory receiving assets and the snapshot
    pub output_dir: PathBuf,

    /// Snapshot file name inside `output_dir`
    pub snapshot_name: String,

    /// Number of workers to spawn
    pub workers: usize,

    /// Page `n` is fetched from `<base_url>/<n>`
    pub base_url: String,

    /// Ids with no content behind them; never fetched
    pub skip_ids: BTreeSet<u32>,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output.directory.clone(),
            snapshot_name: config.output.snapshot_name.clone(),
            workers: config.crawler.workers as usize,
            base_url: config.target.base_url.clone(),
            skip_ids: config.crawler.skip_ids.iter().copied().collect(),
        }
    }
}

/// Result of one [`Scheduler::run`]
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub start: u32,
    pub end: u32,

    /// Ids whose asset was written during this run
    pub downloaded: usize,

    /// Ids skipped because they were excluded or already downloaded
    pub skipped: usize,

    /// Ids that failed, ordered by id
    pub failures: Vec<Failure>,

    /// Ids never popped because the run was cancelled
    pub unprocessed: usize,

    /// Whether cancellation was requested during the run
    pub interrupted: bool,

    /// Worker tasks that ended abnormally
    pub worker_faults: usize,

    /// Where the snapshot was written
    pub snapshot_path: PathBuf,
}

impl CrawlReport {
    /// Source URLs of every failed id
    pub fn failed_urls(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.source_url.as_str())
            .collect()
    }

    /// Number of ids popped and handled
    pub fn processed(&self) -> usize {
        self.downloaded + self.skipped + self.failures.len()
    }

    /// True if every id in the range ended downloaded or skipped
    pub fn is_complete(&self) -> bool {
        !self.interrupted
            && self.worker_faults == 0
            && self.unprocessed == 0
            && self.failures.is_empty()
    }
}

/// Scheduler owns the collaborators for a crawl and runs id ranges through them
pub struct Scheduler {
    settings: CrawlSettings,
    store: Arc<ItemStore>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    progress: Arc<dyn ProgressSink>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `settings` - Output location, worker count, target and exclusions
    /// * `store` - Item store, empty or loaded from a previous snapshot
    /// * `fetcher` - Network collaborator for pages and assets
    /// * `extractor` - Parser turning pages into fields
    pub fn new(
        settings: CrawlSettings,
        store: Arc<ItemStore>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            settings,
            store,
            fetcher,
            extractor,
            progress: Arc::new(LogProgress::new()),
        }
    }

    /// Replaces the default logging progress sink
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    /// Crawls every id in `start..=end`
    ///
    /// Blocks until all workers have exited, either because the queue is
    /// drained or because `cancel` was triggered. The store is then saved once,
    /// whatever happened to individual ids.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished (possibly with per-id failures)
    /// * `Err(HarvestError)` - The range or settings are invalid, or the output
    ///   directory or snapshot could not be written
    pub async fn run(
        &self,
        start: u32,
        end: u32,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, HarvestError> {
        if start == 0 || start > end {
            return Err(HarvestError::InvalidRange { start, end });
        }
        if self.settings.workers == 0 {
            return Err(ConfigError::Validation("workers must be at least 1".to_string()).into());
        }

        let output_dir = prepare_output_dir(&self.settings.output_dir)?;

        let queue = Arc::new(WorkQueue::seeded(start, end));
        let failures = Arc::new(FailureCollector::default());
        let tally = Arc::new(RunTally::default());
        self.progress.begin(queue.len());

        tracing::info!(
            "Processing pages {} to {} with {} workers",
            start,
            end,
            self.settings.workers
        );

        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            store: Arc::clone(&self.store),
            failures: Arc::clone(&failures),
            tally: Arc::clone(&tally),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            progress: Arc::clone(&self.progress),
            cancel: cancel.clone(),
            output_dir: output_dir.clone(),
            base_url: Arc::from(self.settings.base_url.as_str()),
            skip_ids: Arc::new(self.settings.skip_ids.clone()),
        };

        let handles: Vec<_> = (0..self.settings.workers)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, ctx.clone())))
            .collect();
        drop(ctx);

        let mut worker_faults = 0;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
                worker_faults += 1;
            }
        }
        self.progress.finish();

        let interrupted = cancel.is_cancelled();
        let unprocessed = queue.len();
        if interrupted {
            tracing::info!(
                "Stopped early; {} of {} pages left unprocessed",
                unprocessed,
                end - start + 1
            );
        } else {
            tracing::info!("Finished processing pages {} to {}.", start, end);
        }

        let failures = failures.drain();
        if !failures.is_empty() {
            tracing::info!("Failed to download the following pages:");
            for failure in &failures {
                tracing::info!("   {}", failure);
            }
        }

        let snapshot_path = self
            .store
            .save(&output_dir, &self.settings.snapshot_name)?;

        Ok(CrawlReport {
            start,
            end,
            downloaded: tally.downloaded(),
            skipped: tally.skipped(),
            failures,
            unprocessed,
            interrupted,
            worker_faults,
            snapshot_path,
        })
    }
}

/// Creates the output directory if needed and returns its absolute path
fn prepare_output_dir(dir: &Path) -> Result<PathBuf, HarvestError> {
    let wrap = |source: std::io::Error| HarvestError::OutputDir {
        path: dir.display().to_string(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(wrap)?;
    std::fs::canonicalize(dir).map_err(wrap)
}
