//! CLI entry point for the harvester tool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use harvester_core::fetch::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use harvester_core::{
    Database, HtmlPageParser, HttpPageFetcher, MAX_CONCURRENCY, Store, SyncOrchestrator,
    SyncReport,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{DEFAULT_DATABASE_FILE, FileConfig, load_config};
use cli::{Args, Command, ReportArgs, SyncArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = %loaded.path.display(), "loaded config file");
    }
    let config = loaded.config;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE));
    let db = Database::new_with_options(&db_path, config.database_options())
        .await
        .with_context(|| format!("Failed to open database '{}'", db_path.display()))?;
    let store = Store::new(db.clone());

    let outcome = match args.command() {
        Command::Sync(sync_args) => run_sync(&config, &sync_args, store).await,
        Command::Report(report_args) => run_report(&report_args, &store).await,
    };

    db.close().await;
    outcome
}

async fn run_sync(config: &FileConfig, args: &SyncArgs, store: Store) -> Result<()> {
    let desired = config.desired_collections()?;
    let force_refresh = config.force_refresh_with(&args.force);
    if desired.is_empty() {
        info!("No collections configured. Add a [collections] table to the config file.");
        return Ok(());
    }

    let Some(base_url) = args.base_url.as_deref().or(config.base_url.as_deref()) else {
        bail!("No base URL configured: set `base_url` in the config file or pass --base-url");
    };
    let fetcher = HttpPageFetcher::with_timeouts(
        base_url,
        config.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
        config.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS),
    )?;
    let parser = HtmlPageParser::with_layout(config.page_layout())?;

    let concurrency = args
        .concurrency
        .or(config.concurrency)
        .map_or(1, usize::from)
        .min(MAX_CONCURRENCY);
    let mut orchestrator =
        SyncOrchestrator::new(Arc::new(fetcher), Arc::new(parser), Arc::new(store))
            .with_concurrency(concurrency)?;
    if let Some(max_pages) = args.max_pages.or(config.max_pages) {
        orchestrator = orchestrator.with_max_pages(max_pages);
    }

    info!(
        base_url,
        collections = desired.len(),
        concurrency = orchestrator.concurrency(),
        "Harvester starting"
    );
    let report = orchestrator.run(&desired, &force_refresh).await?;
    print_sync_report(&report);

    if !report.is_success() {
        bail!(
            "{} of {} collections failed; rerun to retry them",
            report.failed.len(),
            report.plan.entries.len()
        );
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    for success in &report.completed {
        println!(
            "{}\t{}\t{} records\t{} pages\t{}",
            success.key, success.title, success.records, success.pages, success.action
        );
    }
    for failure in &report.failed {
        println!("{}\tFAILED\t{}", failure.key, failure.error);
    }
    info!(
        fetched = ?report.fetched_keys(),
        purged = ?report.purged_keys(),
        skipped = ?report.skipped(),
        failed = ?report.failed_keys(),
        "Harvest complete"
    );
}

async fn run_report(args: &ReportArgs, store: &Store) -> Result<()> {
    let collections = store.list_collections().await?;
    if collections.is_empty() {
        println!("No collections stored.");
        return Ok(());
    }

    for meta in &collections {
        println!(
            "{}\t{}\t{}\t{} records\t{}",
            meta.key, meta.title, meta.external_id, meta.record_count, meta.harvested_at
        );
    }

    let fields = store.field_names().await?;
    println!("fields: {}", fields.join(", "));

    if let Some(field) = &args.by {
        println!();
        for row in store.summarize_by_field(field).await? {
            println!(
                "{}\t{}\t{}",
                row.key,
                row.value.as_deref().unwrap_or("(none)"),
                row.count
            );
        }
    }

    let orphans = store.orphaned_record_keys().await?;
    if !orphans.is_empty() {
        warn!(?orphans, "records without collection metadata; the next sync will replace them");
    }
    let mismatched = store.mismatched_collection_keys().await?;
    if !mismatched.is_empty() {
        warn!(?mismatched, "stored record counts disagree with metadata; use --force to refetch");
    }
    Ok(())
}
