//! Configuration module for Strip-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration file is optional; [`Config::default`] crawls xkcd with three
//! workers into `./output`.
//!
//! # Example
//!
//! ```no_run
//! use strip_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Snapshot lives at {}", config.output.snapshot_path().display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, TargetConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
