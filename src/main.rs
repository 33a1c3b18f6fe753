//! Site-Harvester main entry point
//!
//! This is the command-line interface for the Site-Harvester document crawler.

use anyhow::Context;
use clap::Parser;
use site_harvester::config::{load_config_with_hash, validate, Config};
use site_harvester::crawler::Coordinator;
use site_harvester::output::print_statistics;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Harvester: a polite single-site document harvester
///
/// Site-Harvester crawls one website from a start URL, follows links that stay
/// on that site, and archives every linked document whose extension is on the
/// allowlist under a directory tree mirroring the site's paths.
#[derive(Parser, Debug)]
#[command(name = "site-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A polite single-site document harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Override the start URL
    #[arg(long, env = "START_URL", value_name = "URL")]
    start_url: Option<String>,

    /// Override the directory documents are archived under
    #[arg(long, value_name = "DIR")]
    store_root: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and print the effective settings without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), None)
        }
    };

    if let Some(start_url) = cli.start_url {
        config.crawler.start_url = start_url;
    }
    if let Some(store_root) = cli.store_root {
        config.output.store_root = store_root;
    }

    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config, config_hash.as_deref());
        return Ok(());
    }

    handle_crawl(config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvester=info,warn"),
            1 => EnvFilter::new("site_harvester=debug,info"),
            2 => EnvFilter::new("site_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, config_hash: Option<&str>) {
    println!("=== Site-Harvester Dry Run ===\n");

    println!("Crawler:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Download delay: {}s", config.crawler.download_delay);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    println!("  Request timeout: {}s", config.crawler.request_timeout);

    println!("\nAutothrottle:");
    if config.autothrottle.enabled {
        println!("  Start delay: {}s", config.autothrottle.start_delay);
        println!("  Max delay: {}s", config.autothrottle.max_delay);
        println!(
            "  Target concurrency: {}",
            config.autothrottle.target_concurrency
        );
    } else {
        println!("  Disabled (fixed delay)");
    }

    println!("\nRetry:");
    println!(
        "  Max attempts: {}",
        config.retry.effective_max_attempts()
    );
    println!("  Retry on: {:?}", config.retry.http_codes);
    println!(
        "  Backoff: {}s doubling up to {}s",
        config.retry.backoff_base, config.retry.backoff_max
    );

    println!("\nUser Agents:");
    if config.user_agent.pool.is_empty() {
        println!("  Built-in browser pool");
    } else {
        for agent in &config.user_agent.pool {
            println!("  - {}", agent);
        }
    }

    println!("\nOutput:");
    println!("  Store root: {}", config.output.store_root);
    println!("  Provenance sidecars: {}", config.output.write_provenance);
    println!("  Extensions: {}", config.output.extensions.join(" "));

    if let Some(hash) = config_hash {
        println!("\nConfig hash: {}", hash);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: Option<String>) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(config).context("Failed to start crawl")?;
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            shutdown.stop();
        }
    });

    let stats = coordinator.run().await.context("Crawl failed")?;
    print_statistics(&stats);

    Ok(())
}
