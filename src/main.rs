//! Strip-Harvester main entry point
//!
//! This is the command-line interface for the Strip-Harvester comic crawler.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use strip_harvester::config::{load_config_with_hash, validate, Config};
use strip_harvester::crawler::run_crawl;
use strip_harvester::storage::ItemStore;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "\
Examples:
   strip-harvester 100 125     Downloads pages 100 to 125.
   strip-harvester 30          Downloads pages 1 to 30.";

/// Strip-Harvester: a resumable comic archive crawler
///
/// Provide either both start and end page numbers or just the end page
/// number. Pages already downloaded by an earlier run are skipped.
#[derive(Parser, Debug)]
#[command(name = "strip-harvester")]
#[command(version)]
#[command(about = "A resumable comic archive crawler", long_about = None)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Page range: `<END>` or `<START> <END>`
    #[arg(
        value_name = "PAGE",
        num_args = 1..=2,
        required_unless_present = "status"
    )]
    pages: Vec<u32>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory (overrides the configuration file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of concurrent workers (overrides the configuration file)
    #[arg(short, long)]
    workers: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show what the snapshot holds and exit
    #[arg(long, conflicts_with = "pages")]
    status: bool,
}

impl Cli {
    /// Resolves the positional pages into an inclusive range
    fn range(&self) -> Option<(u32, u32)> {
        match self.pages.as_slice() {
            [end] => Some((1, *end)),
            [start, end] => Some((*start, *end)),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Reject bad ranges before anything touches the disk
    let range = if cli.status {
        None
    } else {
        match cli.range() {
            Some((start, end)) if start >= 1 && start <= end => Some((start, end)),
            _ => Cli::command()
                .error(
                    ErrorKind::ValueValidation,
                    "pages start at 1 and the start page must not exceed the end page",
                )
                .exit(),
        }
    };

    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(&cli)?;

    match range {
        Some((start, end)) => handle_crawl(&config, start, end).await,
        None => handle_status(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("strip_harvester=info,warn"),
            1 => EnvFilter::new("strip_harvester=debug,info"),
            2 => EnvFilter::new("strip_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file if given, then applies command-line overrides
fn load_configuration(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };

    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    validate(&config)?;

    Ok(config)
}

/// Handles the --status mode: summarises the snapshot without crawling
fn handle_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.output.snapshot_path();
    println!("Snapshot: {}\n", path.display());

    if !path.exists() {
        println!("No snapshot yet; nothing has been crawled.");
        return Ok(());
    }

    let summary = ItemStore::load(&path)?.summary();
    println!("Stored pages:     {}", summary.total);
    println!("Downloaded:       {}", summary.downloaded);
    println!("Pending download: {}", summary.pending.len());
    for id in &summary.pending {
        println!("  - {}", id);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    start: u32,
    end: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling pages {} to {} into {}",
        start,
        end,
        config.output.directory.display()
    );

    match run_crawl(config, start, end).await {
        Ok(report) => {
            tracing::info!(
                "Downloaded {}, skipped {}, failed {}",
                report.downloaded,
                report.skipped,
                report.failures.len()
            );
            if report.interrupted {
                tracing::info!("Run interrupted; rerun the same range to resume");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
