//! crawl-frontier main entry point
//!
//! This is the command-line interface for the crawl frontier.

use anyhow::Context;
use clap::Parser;
use crawl_frontier::config::{load_config_with_hash, resolve_host_scope, Config};
use crawl_frontier::crawler::crawl;
use crawl_frontier::output::{load_statistics, print_statistics};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// crawl-frontier: a bounded, polite web crawl frontier
///
/// Crawls from a set of seed URLs inside one host scope, fetching the most
/// relevant pages first, until the frontier is exhausted or its size cap
/// is reached. Ctrl-C stops the crawl after flushing finished results.
#[derive(Parser, Debug)]
#[command(name = "crawl-frontier")]
#[command(version)]
#[command(about = "A bounded, polite web crawl frontier", long_about = None)]
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
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_frontier=info,warn"),
            1 => EnvFilter::new("crawl_frontier=debug,info"),
            2 => EnvFilter::new("crawl_frontier=trace,debug"),
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
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let scope = resolve_host_scope(&config.crawl)?;

    println!("=== crawl-frontier Dry Run ===\n");

    println!("Frontier:");
    println!("  Host scope: {}", scope.pattern());
    println!("  Max frontier size: {}", config.crawl.max_frontier_size);
    println!("  Workers: {}", config.crawl.concurrency);
    println!("  Seed priority: {}", config.crawl.seed_priority);
    if !config.crawl.keywords.is_empty() {
        println!("  Keywords: {}", config.crawl.keywords.join(", "));
    }

    println!("\nFetch:");
    println!("  Max attempts: {}", config.fetch.max_retries);
    println!(
        "  Backoff: {:?}, base {}ms, jitter up to {}ms",
        config.fetch.backoff, config.fetch.base_delay_ms, config.fetch.jitter_ms
    );
    println!("  Timeout: {}ms", config.fetch.timeout_ms);
    println!("  Expecting: {:?} content", config.fetch.expect);

    println!("\nPoliteness:");
    println!(
        "  Delay: {}ms + up to {}ms jitter",
        config.politeness.min_delay_ms, config.politeness.jitter_ms
    );
    println!(
        "  Resource budget: {} bytes (pause above {:.0}%)",
        config.resources.budget_bytes,
        config.resources.threshold * 100.0
    );

    println!("\nOutput:");
    match &config.output.database_path {
        Some(path) => println!("  Database: {}", path),
        None => println!("  Log only"),
    }

    println!("\nSeeds ({}):", config.crawl.seeds.len());
    for seed in &config.crawl.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.crawl.seeds.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config
        .output
        .database_path
        .as_deref()
        .context("--stats needs output.database-path to be set")?;

    println!("Database: {}\n", path);

    let stats = load_statistics(Path::new(path))
        .with_context(|| format!("Failed to open crawl database {}", path))?;
    match stats {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs recorded yet"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        seeds = config.crawl.seeds.len(),
        max_frontier_size = config.crawl.max_frontier_size,
        workers = config.crawl.concurrency,
        "Starting crawl"
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            on_interrupt.cancel();
        }
    });

    match crawl(config, config_hash, cancel).await {
        Ok(stats) => {
            tracing::info!(
                "Crawl completed successfully: {} succeeded, {} failed",
                stats.pages_succeeded,
                stats.pages_failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
