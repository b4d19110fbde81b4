//! Worker loop: fetch, extract, and download one id at a time
//!
//! Every per-item error is absorbed here and turned into a [`Failure`] plus a
//! log line; nothing a single page does can stop the run.

use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::progress::ProgressSink;
use crate::crawler::queue::{DownloadError, Failure, FailureCollector, FailureReason, WorkQueue};
use crate::state::{source_url, Item, Outcome};
use crate::storage::ItemStore;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs, cloned once per worker
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub store: Arc<ItemStore>,
    pub failures: Arc<FailureCollector>,
    pub tally: Arc<RunTally>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
    pub output_dir: PathBuf,
    pub base_url: Arc<str>,
    pub skip_ids: Arc<BTreeSet<u32>>,
}

/// Outcome counts shared by every worker of a run
///
/// Counted as ids finish rather than returned by each worker, so ids handled
/// by a worker that later panics are still reported.
#[derive(Debug, Default)]
pub(crate) struct RunTally {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
}

impl RunTally {
    fn record(&self, outcome: Outcome) {
        if outcome.is_skipped() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        } else if !outcome.is_failure() {
            self.downloaded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Drains the queue until it is empty or the run is cancelled
///
/// Cancellation is only checked between ids, so an id that has been popped is
/// always carried through its fetch, extraction and download.
pub(crate) async fn run_worker(worker_id: usize, ctx: WorkerContext) {
    loop {
        if ctx.cancel.is_cancelled() {
            tracing::debug!("Worker {} stopping: run cancelled", worker_id);
            break;
        }

        let Some(id) = ctx.queue.pop() else {
            tracing::debug!("Worker {} stopping: queue drained", worker_id);
            break;
        };

        let outcome = process_id(&ctx, id).await;
        ctx.tally.record(outcome);
        ctx.progress.advance(id, outcome);
    }
}

/// Runs the full pipeline for one id
pub(crate) async fn process_id(ctx: &WorkerContext, id: u32) -> Outcome {
    if ctx.skip_ids.contains(&id) {
        tracing::info!("Skipping page {}: no content at this id", id);
        return Outcome::SkippedNoContent;
    }

    if ctx.store.is_downloaded(id) {
        tracing::info!("Skipping page {}: already downloaded", id);
        return Outcome::SkippedDownloaded;
    }

    tracing::info!("Processing page {}...", id);
    let source = source_url(&ctx.base_url, id);

    let document = match ctx.fetcher.get(&source).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("Failed to fetch {}, {}", source, e.kind);
            tracing::debug!("Fetch error detail for {}: {}", source, e.detail);
            ctx.failures.push(Failure {
                id,
                source_url: source,
                reason: FailureReason::Fetch(e.kind),
            });
            return Outcome::FetchFailed;
        }
    };
    tracing::debug!("Successfully fetched page {}", id);

    let Some(extraction) = ctx.extractor.extract(&document, &source) else {
        tracing::warn!("Failed to extract fields from {}", source);
        ctx.failures.push(Failure {
            id,
            source_url: source,
            reason: FailureReason::Extraction,
        });
        return Outcome::ExtractionFailed;
    };

    let item = Item::extracted(id, source, extraction);
    ctx.store.put(item.clone());

    match download_asset(ctx.fetcher.as_ref(), &item, &ctx.output_dir).await {
        Ok(path) => {
            ctx.store.put(item.with_download(path));
            Outcome::Downloaded
        }
        Err(e) => {
            tracing::warn!(
                "Failed to download {} from {}, {}",
                item.asset_file_name(),
                item.asset_url(),
                e
            );
            ctx.failures.push(Failure {
                id,
                source_url: item.source_url().to_string(),
                reason: FailureReason::Download(e),
            });
            Outcome::DownloadFailed
        }
    }
}

/// Fetches the item's asset and writes it to `<output_dir>/<id:04>_<basename>`
///
/// The bytes go to a `.part` file first and are renamed into place, so a
/// crash never leaves a truncated asset under the final name.
async fn download_asset(
    fetcher: &dyn Fetcher,
    item: &Item,
    output_dir: &Path,
) -> Result<String, DownloadError> {
    let file_name = item.asset_file_name();
    let path = output_dir.join(&file_name);

    tracing::debug!("Downloading {} from {}...", file_name, item.asset_url());
    let bytes = fetcher
        .get(item.asset_url())
        .await
        .map_err(|e| DownloadError::Fetch(e.kind))?;

    let part_path = output_dir.join(format!("{}.part", file_name));
    let written = match tokio::fs::write(&part_path, &bytes).await {
        Ok(()) => tokio::fs::rename(&part_path, &path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(DownloadError::Write(e.to_string()));
    }

    tracing::debug!("Successfully downloaded {}", file_name);
    Ok(path.to_string_lossy().into_owned())
}
