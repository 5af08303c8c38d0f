//! Ripple main entry point
//!
//! This is the command-line interface for the Ripple crawling engine.

use clap::Parser;
use ripple_engine::config::{load_config_with_hash, Config};
use ripple_engine::crawler::{
    build_http_client, html_link_parser, user_agent_string, ItemProcessor, PageItem, Scheduler,
};
use ripple_engine::output::{print_statistics, CrawlStatistics};
use ripple_engine::Request;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often the crawl loop checks whether the engine went idle
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Ripple: a concurrent, depth-limited web crawler
///
/// Ripple fetches pages starting from a seed URL, follows links up to a
/// configured depth, and reports every page it processed.
#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(version)]
#[command(about = "A concurrent, depth-limited web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_engine=info,ripple=info,warn"),
            1 => EnvFilter::new("ripple_engine=debug,ripple=debug,info"),
            2 => EnvFilter::new("ripple_engine=trace,ripple=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Queue capacity: {}", config.crawler.queue_capacity);
    println!("  Pool size: {}", config.crawler.pool_size);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Fail fast: {}", config.crawler.fail_fast);

    println!("\nUser Agent:");
    println!("  {}", user_agent_string(&config.user_agent));

    println!("\nSeed:");
    println!("  {}", config.seed.url);

    println!("\n✓ Configuration is valid");
}

/// Logs every page that made it through the pipeline
fn page_logger() -> ItemProcessor<PageItem> {
    Arc::new(|page: &PageItem| {
        tracing::info!(
            depth = page.depth,
            links = page.links.len(),
            "Crawled {} ({})",
            page.url,
            page.title.as_deref().unwrap_or("untitled")
        );
        Ok(Some(page.clone()))
    })
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let client = build_http_client(&config.user_agent)?;
    let seed = Request::parse(&config.seed.url)?;

    let mut scheduler: Scheduler<reqwest::Client, PageItem> = Scheduler::new();
    scheduler
        .start(
            &config.crawler,
            move || client.clone(),
            vec![Some(html_link_parser())],
            vec![page_logger()],
            seed,
        )
        .await?;

    let errors = scheduler.error_stream()?;
    let mut stats = CrawlStatistics::default();
    let mut ticker = tokio::time::interval(IDLE_POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::warn!("Interrupted, stopping crawl");
                scheduler.stop();
                break;
            }
            error = errors.next() => match error {
                Some(error) => {
                    tracing::warn!("{}: {}", error.kind(), error);
                    stats.record_error(&error);
                }
                None => break,
            },
            _ = ticker.tick() => {
                if scheduler.idle() {
                    tracing::info!("Crawl is idle");
                    break;
                }
                tracing::debug!("{}", scheduler.summary(""));
            }
        }
    }

    while let Some(error) = errors.try_next() {
        tracing::warn!("{}: {}", error.kind(), error);
        stats.record_error(&error);
    }

    scheduler.shutdown().await;

    println!("=== Scheduler Summary ===\n");
    print!("{}", scheduler.summary("  ").detail());
    println!();

    if let Some(pipeline) = scheduler.pipeline() {
        stats.items = pipeline.count();
    }
    print_statistics(&stats);

    Ok(())
}
