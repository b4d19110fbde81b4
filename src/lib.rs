//! Strip-Harvester: a resumable comic archive crawler
//!
//! This crate walks a numbered range of pages, extracts the title, annotation and
//! image URL of each one, downloads the image, and keeps a JSON snapshot of its
//! progress so an interrupted run picks up where it stopped.

pub mod config;
pub mod crawler;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Strip-Harvester operations
///
/// Only structural problems surface here. Per-item fetch, extraction and
/// download failures are collected into the [`crawler::CrawlReport`] instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Invalid id range {start}..={end}: ids start at 1 and start must not exceed end")]
    InvalidRange { start: u32, end: u32 },

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Strip-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlReport, Scheduler};
pub use state::{Item, Outcome};
pub use storage::ItemStore;
