//! Frontier-Crawl main entry point
//!
//! Command-line front end: builds one engine, starts a crawl from the given
//! seed, reports progress, and stops gracefully on Ctrl-C.

use anyhow::Context;
use clap::Parser;
use frontier_crawl::config::{load_config_with_hash, Config};
use frontier_crawl::{CrawlController, Engine, EngineStatus, MemoryFrontier};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Frontier-Crawl: a breadth-first web crawler
///
/// Discovers pages reachable from SEED, fetching up to the configured number
/// of pages concurrently, until no new addresses remain or Ctrl-C is pressed.
#[derive(Parser, Debug)]
#[command(name = "frontier-crawl")]
#[command(version)]
#[command(about = "A breadth-first web crawler", long_about = None)]
struct Cli {
    /// Address to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds between progress reports
    #[arg(long, default_value_t = 5)]
    progress_interval: u64,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    tracing::info!(
        "Max concurrency: {}, max body: {} bytes",
        config.crawler.max_concurrency,
        config.crawler.max_body_bytes
    );

    let engine = Engine::new(&config, Arc::new(MemoryFrontier::new()))
        .context("failed to build crawl engine")?;
    let controller = CrawlController::new(engine);

    let mut crawl = controller.start(&cli.seed)?;
    let mut progress = tokio::time::interval(Duration::from_secs(cli.progress_interval.max(1)));
    progress.tick().await;

    loop {
        tokio::select! {
            joined = &mut crawl => {
                joined.context("crawl task failed")?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, stopping crawl");
                controller.stop().await;
                crawl.await.context("crawl task failed")?;
                break;
            }
            _ = progress.tick() => report_progress(&controller),
        }
    }

    let status = controller
        .engine()
        .get_status()
        .context("failed to read final crawl status")?;
    println!(
        "Crawl finished: {} known addresses, {} pending",
        status.known.len(),
        status.pending.len()
    );

    Ok(())
}

/// Logs a one-line progress summary while a crawl is running
fn report_progress(controller: &CrawlController) {
    match controller.status() {
        Ok(status) if status.status == EngineStatus::Active => tracing::info!(
            "Progress: {} known, {} pending, {} in flight",
            status.known.len(),
            status.pending.len(),
            status.in_flight
        ),
        Ok(status) => tracing::info!("Crawler is {}", status.status),
        Err(e) => tracing::debug!("No progress to report: {}", e),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frontier_crawl=info,warn"),
            1 => EnvFilter::new("frontier_crawl=debug,info"),
            2 => EnvFilter::new("frontier_crawl=trace,debug"),
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
