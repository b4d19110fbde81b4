//! Crawler coordinator - wires the default collaborators into a scheduler
//!
//! This module contains the top-level entry point used by the binary:
//! - Loading (or starting) the item store from the configured snapshot
//! - Building the HTTP fetcher and comic extractor
//! - Translating ctrl-c into cancellation of the running scheduler

use crate::config::Config;
use crate::crawler::extractor::ComicExtractor;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::scheduler::{CrawlReport, CrawlSettings, Scheduler};
use crate::storage::ItemStore;
use crate::HarvestError;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Builds a scheduler with the HTTP fetcher and the comic extractor
///
/// The item store is loaded from the configured snapshot when one exists. A
/// snapshot that exists but cannot be read is a hard error: starting empty
/// would overwrite it at the end of the run.
pub fn build_scheduler(config: &Config) -> Result<Scheduler, HarvestError> {
    let store = ItemStore::open(&config.output.snapshot_path())?;
    let fetcher = HttpFetcher::new(&config.user_agent)?;

    Ok(Scheduler::new(
        CrawlSettings::from_config(config),
        Arc::new(store),
        Arc::new(fetcher),
        Arc::new(ComicExtractor::new()),
    ))
}

/// Runs the main crawl operation for `start..=end`
///
/// Ctrl-c cancels the run: workers finish the page they are on, the snapshot
/// is saved, and the partial report is returned.
///
/// # Example
///
/// ```no_run
/// use strip_harvester::config::Config;
/// use strip_harvester::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = run_crawl(&Config::default(), 1, 30).await?;
/// println!("{} failed", report.failures.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, start: u32, end: u32) -> Result<CrawlReport, HarvestError> {
    let scheduler = build_scheduler(config)?;

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let result = scheduler.run(start, end, cancel).await;
    interrupt.abort();

    result
}

/// Exit status used when a second ctrl-c aborts the wait for workers
const FORCED_EXIT_CODE: i32 = 130;

/// How the interrupt watcher ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// The token was cancelled elsewhere before any signal arrived
    Idle,

    /// Signals could not be received
    Unavailable,

    /// A second signal arrived while workers were still finishing
    Forced,
}

/// Cancels `cancel` on the first ctrl-c and exits the process on the second
fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await == Interrupt::Forced {
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}

/// Waits on `next_signal` for the two-stage shutdown
///
/// The first signal cancels the run; the snapshot is saved once workers stop.
/// A second one gives up on the in-flight pages, leaving the previous snapshot
/// on disk untouched.
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    tokio::select! {
        signal = next_signal() => {
            if let Err(e) = signal {
                tracing::error!("Unable to listen for ctrl-c: {}", e);
                return Interrupt::Unavailable;
            }
            tracing::info!("Stopping workers... Please wait for active workers to finish...");
            tracing::info!("Press ctrl-c again to quit without saving");
            cancel.cancel();
        }
        _ = cancel.cancelled() => return Interrupt::Idle,
    }

    match next_signal().await {
        Ok(()) => {
            tracing::warn!("Second interrupt, quitting without saving progress");
            Interrupt::Forced
        }
        Err(e) => {
            tracing::error!("Unable to listen for ctrl-c: {}", e);
            Interrupt::Unavailable
        }
    }
}
