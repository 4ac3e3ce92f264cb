//! Vellum synchronization daemon.
//!
//! This is the main entry point for the ledger tracker. It pages the remote
//! transaction index, fetches the post document behind each new transaction,
//! and appends both streams to local JSONL logs. After catching up it
//! optionally trims the logs, writes a stats snapshot, and publishes an Atom
//! feed.
//!
//! # Usage
//!
//! ```bash
//! # One catch-up pass with default settings
//! vellum-sync
//!
//! # Track a different app, keep polling, publish a feed
//! vellum-sync \
//!     --tag "App-Name=MirrorXYZ" \
//!     --follow --poll-interval-secs 120 \
//!     --feed-path ./public/feed.xml
//! ```
//!
//! # Graceful Shutdown
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the daemon between cycles: a cycle that
//! has started always finishes persisting, so shutdown never tears a page.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use metrics::gauge;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vellum_core::metrics::{init_metrics, start_metrics_server};
use vellum_core::{ContentResult, Record};
use vellum_sync::{
    AppendLog, ContentFetcher, FeedConfig, FetcherConfig, FileCursorStore, QueryClient,
    QueryConfig, RunBudget, SyncEngine, TagFilter, feed, snapshot,
};

/// Vellum ledger synchronization daemon.
#[derive(Parser, Debug)]
#[command(name = "vellum-sync")]
#[command(about = "Incremental permaweb ledger synchronization daemon")]
#[command(version)]
struct Args {
    /// Data directory for the logs and cursor file
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Transaction index endpoint (GraphQL served at {endpoint}/graphql)
    #[arg(long, default_value = "https://arweave.net")]
    endpoint: String,

    /// Content gateway base URL (defaults to the index endpoint)
    #[arg(long)]
    gateway: Option<String>,

    /// Tag filters selecting tracked transactions, name=value or name=v1|v2
    /// (comma-separated for multiple filters)
    #[arg(long = "tag", value_delimiter = ',', default_value = "App-Name=MirrorXYZ")]
    tags: Vec<TagFilter>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Page size for the paged query
    #[arg(long, default_value = "100")]
    page_limit: usize,

    /// Lowest block height to replay on a first run
    #[arg(long, default_value_t = vellum_core::DEFAULT_MIN_BLOCK)]
    min_block: u64,

    /// Maximum concurrent content requests per batch
    #[arg(long, default_value = "16")]
    max_in_flight: usize,

    /// Keep only the newest N lines of each log after a pass (0 disables)
    #[arg(long, default_value = "0")]
    keep_last: usize,

    /// Keep tracking: poll for new pages after catching up
    #[arg(long)]
    follow: bool,

    /// Seconds between polls in follow mode
    #[arg(long, default_value = "60")]
    poll_interval_secs: u64,

    /// Wall-time budget per sync pass, in seconds
    #[arg(long)]
    time_budget_secs: Option<u64>,

    /// Cycle budget per sync pass
    #[arg(long)]
    max_cycles: Option<usize>,

    /// Where to publish the Atom feed (omit to disable)
    #[arg(long)]
    feed_path: Option<PathBuf>,

    /// Feed title
    #[arg(long, default_value = "vellum")]
    feed_title: String,

    /// Base URL feed entries link to
    #[arg(long, default_value = "https://arweave.net")]
    site_url: String,

    /// Maximum feed entries
    #[arg(long, default_value = "50")]
    feed_entries: usize,

    /// Where to write the stats snapshot (omit to disable)
    #[arg(long)]
    snapshot_path: Option<PathBuf>,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("vellum_sync=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("vellum sync daemon starting...");

    // Initialize metrics
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
        gauge!("sync_running").set(1.0);
        info!("Metrics server listening on port {}", args.metrics_port);
    }

    // Set up graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        info!("Shutdown signal received, stopping after the current cycle...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    info!("Configuration:");
    info!("  Data dir:   {}", args.data_dir.display());
    info!("  Endpoint:   {}", args.endpoint);
    info!(
        "  Gateway:    {}",
        args.gateway.as_deref().unwrap_or(&args.endpoint)
    );
    info!("  Filters:    {}", args.tags.len());
    info!("  Page limit: {}", args.page_limit);
    info!("  Follow:     {}", args.follow);

    let query = QueryClient::new(QueryConfig {
        endpoint: args.endpoint.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        filter_tags: args.tags.clone(),
        min_block_floor: args.min_block,
    })?;

    // Tip height is informational only; a failure here shouldn't stop a run
    // the paged query itself might still serve.
    match query.current_block_height().await {
        Ok(height) => info!("Ledger tip at block {height}"),
        Err(e) => warn!("Could not read ledger tip height: {e}"),
    }

    let fetcher = ContentFetcher::new(FetcherConfig {
        gateway: args.gateway.clone().unwrap_or_else(|| args.endpoint.clone()),
        timeout: Duration::from_secs(args.timeout_secs),
        max_in_flight: args.max_in_flight,
    })?;

    let mut engine = SyncEngine::new(
        query,
        fetcher,
        FileCursorStore::new(args.data_dir.join("cursor")),
        AppendLog::new(args.data_dir.join("records.jsonl")),
        AppendLog::new(args.data_dir.join("content.jsonl")),
        args.page_limit,
    );

    let budget = RunBudget {
        max_cycles: args.max_cycles,
        time_budget: args.time_budget_secs.map(Duration::from_secs),
    };

    // Run totals across passes (follow mode runs many)
    let mut total_cycles = 0usize;
    let mut total_records = 0usize;
    let mut total_documents = 0usize;
    let mut total_errors = 0usize;

    loop {
        let stats = engine.run(budget).await?;

        total_cycles += stats.cycles;
        total_records += stats.records_appended;
        total_documents += stats.documents_fetched;
        total_errors += stats.fetch_errors;

        info!(
            cycles = stats.cycles,
            appended = stats.records_appended,
            caught_up = stats.caught_up,
            "sync pass finished"
        );

        housekeeping(&args, engine.record_log(), engine.content_log())?;

        if !args.follow || !running.load(Ordering::SeqCst) {
            break;
        }

        // Sleep in one-second slices so shutdown stays responsive.
        let poll = Duration::from_secs(args.poll_interval_secs.max(1));
        let mut waited = Duration::ZERO;
        while waited < poll && running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            waited += Duration::from_secs(1);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }

    gauge!("sync_running").set(0.0);

    // Print summary
    info!("═══════════════════════════════════════════════════════");
    info!("SYNC COMPLETE");
    info!("═══════════════════════════════════════════════════════");
    info!("Cycles run:        {}", total_cycles);
    info!("Records appended:  {}", total_records);
    info!("Documents fetched: {}", total_documents);
    info!("Fetch errors:      {}", total_errors);

    Ok(())
}

/// Post-pass housekeeping: retention, stats snapshot, feed.
///
/// The snapshot is best-effort and never fails the run; the feed is
/// user-facing output and does.
fn housekeeping(
    args: &Args,
    records: &AppendLog<Record>,
    content: &AppendLog<ContentResult>,
) -> Result<()> {
    if args.keep_last > 0 {
        let dropped =
            records.truncate_to_last(args.keep_last)? + content.truncate_to_last(args.keep_last)?;
        if dropped > 0 {
            info!("Retention dropped {dropped} log lines");
        }
    }

    if let Some(path) = &args.snapshot_path
        && let Err(e) = snapshot::write_snapshot(records, content, path, Utc::now())
    {
        warn!("Stats snapshot failed (continuing): {e}");
    }

    if let Some(path) = &args.feed_path {
        let config = FeedConfig {
            title: args.feed_title.clone(),
            site_url: args.site_url.clone(),
            max_entries: args.feed_entries,
        };
        feed::write_feed(content, &config, path)?;
    }

    Ok(())
}
