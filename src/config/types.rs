use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Strip-Harvester
///
/// Every section and key is optional; missing values fall back to the
/// defaults that crawl the xkcd archive into `./output`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers draining the queue
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Ids known to have no page behind them; never fetched
    #[serde(default = "default_skip_ids", rename = "skip-ids")]
    pub skip_ids: Vec<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            skip_ids: default_skip_ids(),
        }
    }
}

/// The site being crawled
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Page `n` lives at `<base-url>/<n>`
    #[serde(default = "default_base_url", rename = "base-url")]
    pub base_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(default = "default_crawler_name", rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(default = "default_crawler_version", rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default = "default_contact_url", rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: default_contact_url(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the images and the snapshot
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File name of the JSON snapshot inside `directory`
    #[serde(default = "default_snapshot_name", rename = "snapshot-name")]
    pub snapshot_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            snapshot_name: default_snapshot_name(),
        }
    }
}

impl OutputConfig {
    /// Full path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.directory.join(&self.snapshot_name)
    }
}

fn default_workers() -> u32 {
    3
}

fn default_skip_ids() -> Vec<u32> {
    // xkcd 404 is an intentional "Not Found" joke page
    vec![404]
}

fn default_base_url() -> String {
    "https://xkcd.com".to_string()
}

fn default_crawler_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contact_url() -> String {
    "https://github.com/strip-harvester/strip-harvester".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("./output")
}

fn default_snapshot_name() -> String {
    "xkcd.json".to_string()
}
