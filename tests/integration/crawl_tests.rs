//! Integration tests for the crawler
//!
//! The wiremock tests drive the real HTTP fetcher against a mock comic
//! archive. The rest use an in-memory archive so request counts and
//! cancellation points are exact.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strip_harvester::config::Config;
use strip_harvester::crawler::{
    build_scheduler, CancellationToken, ComicExtractor, CrawlSettings, FailureReason, FetchError,
    FetchErrorKind, Fetcher, HttpFetcher, NoProgress, Scheduler,
};
use strip_harvester::storage::ItemStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn comic_page(id: u32) -> String {
    format!(
        r#"<html><body>
        <div id="ctitle">Comic {id}</div>
        <div id="comic"><img src="/imgs/c{id}.png" title="annotation {id}"></div>
        </body></html>"#
    )
}

fn image_bytes(id: u32) -> Vec<u8> {
    format!("PNG-{}", id).into_bytes()
}

async fn mount_page(server: &MockServer, id: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(comic_page(id)))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, id: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/imgs/c{}.png", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes(id)))
        .mount(server)
        .await;
}

/// Mounts a page plus its image
async fn mount_comic(server: &MockServer, id: u32) {
    mount_page(server, id).await;
    mount_image(server, id).await;
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

fn test_config(base_url: &str, output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.target.base_url = base_url.to_string();
    config.output.directory = output_dir.to_path_buf();
    config.crawler.workers = 3;
    config
}

fn read_snapshot(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("snapshot readable");
    serde_json::from_str(&text).expect("snapshot is JSON")
}

#[tokio::test]
async fn test_full_crawl_with_one_extraction_failure() {
    let server = MockServer::start().await;
    for id in 1..=4 {
        mount_comic(&server, id).await;
    }
    // Page 5 has no comic on it
    Mock::given(method("GET"))
        .and(path("/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>gone</body></html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let report = build_scheduler(&config)
        .unwrap()
        .run(1, 5, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed_urls(), vec![format!("{}/5", server.uri())]);
    assert!(matches!(report.failures[0].reason, FailureReason::Extraction));

    let snapshot = read_snapshot(&report.snapshot_path);
    let keys: Vec<_> = snapshot.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["0001", "0002", "0003", "0004"]);

    let record = &snapshot["0002"];
    assert_eq!(record["id"], 2);
    assert_eq!(record["downloaded"], true);
    assert_eq!(record["title"], "Comic 2");
    assert_eq!(record["annotation"], "annotation 2");
    assert_eq!(record["sourceUrl"], format!("{}/2", server.uri()));
    assert_eq!(record["assetUrl"], format!("{}/imgs/c2.png", server.uri()));

    let asset_path = record["assetPath"].as_str().unwrap();
    assert!(asset_path.ends_with("0002_c2.png"));
    assert_eq!(std::fs::read(asset_path).unwrap(), image_bytes(2));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    for id in 1..=6 {
        mount_comic(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let first = build_scheduler(&config)
        .unwrap()
        .run(1, 6, CancellationToken::new())
        .await
        .unwrap();
    assert!(first.is_complete());
    let first_bytes = std::fs::read(&first.snapshot_path).unwrap();
    assert!(first_bytes.ends_with(b"}\n"));

    server.reset().await;

    let second = build_scheduler(&config)
        .unwrap()
        .run(1, 6, CancellationToken::new())
        .await
        .unwrap();

    assert!(requested_paths(&server).await.is_empty());
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 6);
    assert_eq!(std::fs::read(&second.snapshot_path).unwrap(), first_bytes);
}

#[tokio::test]
async fn test_download_failure_is_retried_on_next_run() {
    let server = MockServer::start().await;
    for id in [1, 2, 4, 5] {
        mount_comic(&server, id).await;
    }
    mount_page(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/imgs/c3.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let first = build_scheduler(&config)
        .unwrap()
        .run(1, 5, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.downloaded, 4);
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].id, 3);
    assert!(matches!(first.failures[0].reason, FailureReason::Download(_)));

    let snapshot = read_snapshot(&first.snapshot_path);
    assert_eq!(snapshot["0003"]["downloaded"], false);
    assert!(snapshot["0003"]["assetPath"].is_null());
    assert_eq!(snapshot["0003"]["title"], "Comic 3");

    // The archive recovers
    server.reset().await;
    for id in 1..=5 {
        mount_comic(&server, id).await;
    }

    let second = build_scheduler(&config)
        .unwrap()
        .run(1, 5, CancellationToken::new())
        .await
        .unwrap();

    assert!(second.is_complete());
    assert_eq!(second.downloaded, 1);
    assert_eq!(second.skipped, 4);

    let mut paths = requested_paths(&server).await;
    paths.sort();
    assert_eq!(paths, vec!["/3", "/imgs/c3.png"]);

    let snapshot = read_snapshot(&second.snapshot_path);
    assert_eq!(snapshot["0003"]["downloaded"], true);
}

#[tokio::test]
async fn test_no_content_id_is_never_requested() {
    let server = MockServer::start().await;
    for id in [402, 403, 405] {
        mount_comic(&server, id).await;
    }
    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let report = build_scheduler(&config)
        .unwrap()
        .run(402, 405, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 3);
    assert_eq!(report.skipped, 1);
    assert!(report.failures.is_empty());

    let snapshot = read_snapshot(&report.snapshot_path);
    assert!(snapshot.get("0404").is_none());
    assert_eq!(snapshot.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_http_fetcher_classifies_status_and_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body"))
        .mount(&server)
        .await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let fetcher = HttpFetcher::from_client(client);

    let body = fetcher.get(&format!("{}/ok", server.uri())).await.unwrap();
    assert_eq!(body, b"body");

    let err = fetcher
        .get(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Status(404));

    let err = fetcher
        .get(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}

/// In-memory comic archive at `https://comics.test`
///
/// Ids in `unreachable` fail to fetch, ids in `blank` serve a page without a
/// comic, and ids in `broken_assets` serve a page whose image fails to fetch.
#[derive(Default)]
struct ComicArchive {
    unreachable: HashSet<u32>,
    blank: HashSet<u32>,
    broken_assets: HashSet<u32>,
    requested: Mutex<Vec<String>>,
    cancel_on_first_page: Option<CancellationToken>,
}

const ARCHIVE: &str = "https://comics.test";

impl ComicArchive {
    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn page_requests(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .requested()
            .iter()
            .filter_map(|url| url.strip_prefix(&format!("{}/", ARCHIVE))?.parse().ok())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl Fetcher for ComicArchive {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());

        let rest = url.strip_prefix(&format!("{}/", ARCHIVE)).unwrap_or("");
        if let Some(image) = rest.strip_prefix("imgs/c") {
            let id: u32 = image.trim_end_matches(".png").parse().unwrap();
            if self.broken_assets.contains(&id) {
                return Err(FetchError::new(FetchErrorKind::Status(503), url, "unavailable"));
            }
            return Ok(image_bytes(id));
        }

        let id: u32 = rest.parse().unwrap();
        if let Some(cancel) = &self.cancel_on_first_page {
            cancel.cancel();
        }
        if self.unreachable.contains(&id) {
            return Err(FetchError::new(FetchErrorKind::Transport, url, "connection reset"));
        }
        if self.blank.contains(&id) {
            return Ok(b"<html><body></body></html>".to_vec());
        }
        Ok(comic_page(id).into_bytes())
    }
}

fn archive_scheduler(
    output_dir: &Path,
    workers: usize,
    store: ItemStore,
    archive: Arc<ComicArchive>,
) -> Scheduler {
    let settings = CrawlSettings {
        output_dir: output_dir.to_path_buf(),
        snapshot_name: "xkcd.json".to_string(),
        workers,
        base_url: ARCHIVE.to_string(),
        skip_ids: BTreeSet::from([404]),
    };
    Scheduler::new(
        settings,
        Arc::new(store),
        archive,
        Arc::new(ComicExtractor::new()),
    )
    .with_progress(Arc::new(NoProgress))
}

#[tokio::test]
async fn test_cancelled_run_resumes_where_it_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let archive = Arc::new(ComicArchive {
        cancel_on_first_page: Some(cancel.clone()),
        ..Default::default()
    });

    let first = archive_scheduler(dir.path(), 1, ItemStore::new(), Arc::clone(&archive))
        .run(1, 10, cancel)
        .await
        .unwrap();

    // The in-flight page is finished before the worker stops
    assert!(first.interrupted);
    assert_eq!(first.downloaded, 1);
    assert_eq!(first.unprocessed, 9);
    assert_eq!(archive.page_requests(), vec![1]);

    let snapshot = read_snapshot(&first.snapshot_path);
    assert_eq!(snapshot.as_object().unwrap().len(), 1);
    assert_eq!(snapshot["0001"]["downloaded"], true);

    let resumed_archive = Arc::new(ComicArchive::default());
    let store = ItemStore::load(&first.snapshot_path).unwrap();
    let second = archive_scheduler(dir.path(), 4, store, Arc::clone(&resumed_archive))
        .run(1, 10, CancellationToken::new())
        .await
        .unwrap();

    assert!(second.is_complete());
    assert_eq!(second.downloaded, 9);
    assert_eq!(second.skipped, 1);
    assert_eq!(resumed_archive.page_requests(), (2..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_every_id_is_accounted_for_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(ComicArchive {
        unreachable: HashSet::from([7, 14, 21, 28]),
        blank: HashSet::from([5, 10, 15, 20, 25, 30]),
        broken_assets: HashSet::from([11, 22]),
        ..Default::default()
    });

    let scheduler = archive_scheduler(dir.path(), 5, ItemStore::new(), Arc::clone(&archive));
    let report = scheduler.run(1, 30, CancellationToken::new()).await.unwrap();

    let failed: BTreeSet<u32> = report.failures.iter().map(|f| f.id).collect();
    assert_eq!(failed.len(), report.failures.len());

    let downloaded: BTreeSet<u32> = (1..=30)
        .filter(|id| scheduler.store().is_downloaded(*id))
        .collect();

    assert!(failed.is_disjoint(&downloaded));
    let accounted: BTreeSet<u32> = failed.union(&downloaded).copied().collect();
    assert_eq!(accounted, (1..=30).collect());

    assert_eq!(report.downloaded, downloaded.len());
    assert_eq!(report.processed(), 30);
    assert_eq!(failed.len(), 4 + 6 + 2);

    // Only download failures leave an item behind
    assert_eq!(scheduler.store().len(), downloaded.len() + 2);
    assert!(scheduler.store().get(11).is_some_and(|item| !item.is_downloaded()));
    assert!(scheduler.store().get(7).is_none());
    assert!(scheduler.store().get(5).is_none());
}

#[tokio::test]
async fn test_many_workers_fetch_each_page_once() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(ComicArchive::default());

    let report = archive_scheduler(dir.path(), 8, ItemStore::new(), Arc::clone(&archive))
        .run(1, 60, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.downloaded, 60);
    assert_eq!(archive.page_requests(), (1..=60).collect::<Vec<_>>());
    assert_eq!(archive.requested().len(), 120);

    let reloaded = ItemStore::load(&report.snapshot_path).unwrap();
    assert_eq!(reloaded.len(), 60);
    assert_eq!(reloaded.summary().downloaded, 60);
    assert!(reloaded.summary().pending.is_empty());
}
