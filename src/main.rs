//! Media-Harvest main entry point
//!
//! This is the command-line interface for the Media-Harvest pipeline.

use anyhow::Context;
use clap::Parser;
use media_harvest::config::{load_config_with_hash, Config};
use media_harvest::feed::build_http_client;
use media_harvest::output::{print_report, reconcile, render_manifest, write_manifest};
use media_harvest::pipeline::{HttpFetcher, Session, WindowPolicy};
use media_harvest::storage::{LocalStorage, OutputLayout};
use media_harvest::HttpFeed;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Media-Harvest: bounded media acquisition from a paginated feed
///
/// Media-Harvest scans a reverse-chronological feed inside a time window,
/// downloads the referenced images and videos under bounded concurrency,
/// and reconciles the run transcript against what landed on disk.
#[derive(Parser, Debug)]
#[command(name = "media-harvest")]
#[command(version)]
#[command(about = "Bounded media acquisition from a paginated feed", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "reconcile")]
    dry_run: bool,

    /// Reconcile the last transcript against the output directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    reconcile: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.reconcile {
        handle_reconcile(&config).await?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("media_harvest=info,warn"),
            1 => EnvFilter::new("media_harvest=debug,info"),
            2 => EnvFilter::new("media_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let window = WindowPolicy::from_config(&config.window)?;
    let layout = OutputLayout::new(&config.output);

    println!("=== Media-Harvest Dry Run ===\n");

    println!("Feed:");
    println!("  Endpoint: {}", config.feed.endpoint);
    println!("  Window: {}", window.describe());
    println!("  Growth attempts: {}", config.feed.growth_attempts);
    println!("  Variant pass: {:?}", config.feed.variant_pass);

    println!("\nMedia:");
    println!(
        "  Images: {}, videos: {}, animated: {}",
        config.media.images, config.media.videos, config.media.animated
    );
    if !config.media.exclude_patterns.is_empty() {
        println!("  Excluded: {}", config.media.exclude_patterns.join(", "));
    }
    if let Some(query) = &config.media.image_query {
        println!("  Image query: {}", query);
    }

    println!("\nWorkers:");
    println!(
        "  Image pool: {} workers, {}s timeout",
        config.workers.image_concurrency, config.workers.image_timeout_secs
    );
    println!(
        "  Video pool: {} workers, {}s timeout",
        config.workers.video_concurrency, config.workers.video_timeout_secs
    );

    println!("\nOutput:");
    println!("  Images: {}", layout.root().display());
    println!(
        "  Videos: {}",
        layout
            .directory_for(media_harvest::MediaKind::Video)
            .display()
    );
    println!("  Transcript: {}", layout.transcript_path().display());
    println!("  Manifest: {}", layout.manifest_path().display());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --reconcile mode: re-checks the last transcript without downloading
async fn handle_reconcile(config: &Config) -> anyhow::Result<()> {
    let layout = OutputLayout::new(&config.output);
    let transcript = layout.transcript_path();

    println!("=== Reconciling {} ===\n", transcript.display());

    let reconciliation = reconcile(transcript, &layout, &LocalStorage::new())
        .await
        .with_context(|| format!("reconciling {}", transcript.display()))?;

    write_manifest(layout.manifest_path(), &reconciliation).await?;
    print!("{}", render_manifest(&reconciliation));

    println!("\n✓ Manifest written to: {}", layout.manifest_path().display());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<()> {
    let client = build_http_client(&config.http).context("building HTTP client")?;
    let feed = HttpFeed::new(client.clone(), &config.feed).context("parsing feed endpoint")?;

    tracing::info!("Harvesting from {}", config.feed.endpoint);

    let mut session = Session::new(
        config,
        feed,
        Arc::new(HttpFetcher::new(client)),
        Arc::new(LocalStorage::new()),
    )?
    .with_config_hash(config_hash);

    let handle = session.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    match session.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
