//! syncro-import - CSV ticket and comment importer for Syncro MSP
//!
//! Reads tickets, comments and labor entries exported from another PSA, resolves every
//! customer, tech and contact name against the target Syncro account and
//! creates the records through the REST API, one paced call at a time.

mod cli;
mod config;
mod defaults;
mod error;
mod services;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::defaults::DEFAULT_LOGS_DIR;
use crate::services::api::SyncroApi;
use crate::services::cache_store::{tenant_fingerprint, CacheStore};
use crate::services::csv_source;
use crate::services::entity_cache::EntityCache;
use crate::services::importer::{Importer, TimeEntryRequest};
use crate::services::pacing::{PacedApi, Pacer};
use crate::services::syncro::SyncroClient;
use crate::services::timestamp::TimestampNormalizer;
use crate::services::validator::RowValidator;
use crate::types::import::RunSummary;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging();

    info!("Starting syncro-import v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::from_env()?;
    info!("Configuration loaded");

    let store = CacheStore::new(&config.cache_file);
    if let Command::ClearCache = cli.command {
        let removed = store
            .clear()
            .with_context(|| format!("Failed to remove {}", store.path().display()))?;
        if removed {
            info!("Removed cache file {}", store.path().display());
        } else {
            info!("No cache file at {}", store.path().display());
        }
        return Ok(());
    }

    config.prompt_missing_credentials()?;
    let base_url = config.api_base_url()?;
    let api_key = config.api_key()?.to_string();
    let tenant = tenant_fingerprint(&config.tenant_name(), &api_key);

    // One schedule for every request, including follow-up listing pages
    let pacer = Pacer::new(config.pacing);
    let client = SyncroClient::new(&base_url, &api_key, config.request_timeout, pacer.clone())
        .context("Failed to create HTTP client")?;
    let api = PacedApi::new(client, pacer);
    info!(
        "Using Syncro API at {} ({} ms between calls)",
        base_url,
        config.pacing.as_millis()
    );

    let mut cache = store
        .load(&tenant)
        .unwrap_or_else(|| EntityCache::new(tenant.clone()))
        .with_max_pages(config.max_pages);
    if cli.refresh_cache {
        cache.invalidate_all();
    }

    let normalizer = TimestampNormalizer::new(config.date_locale, config.timezone);
    let validator = RowValidator::new(normalizer);
    info!(
        "Reading CSV timestamps as {:?} dates in {}",
        validator.normalizer().locale(),
        validator.normalizer().timezone()
    );
    let result = run(&cli.command, &config, &api, &mut cache, validator).await;

    if let Err(e) = store.save(&cache) {
        warn!("Failed to save entity cache to {}: {}", store.path().display(), e);
    }

    let api_calls = api.inner().api_calls();
    info!("API calls made: {}", api_calls);

    let mut summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run aborted: {:#}", e);
            return Err(e);
        }
    };
    summary.api_calls = Some(api_calls);

    println!("{}", summary.render_report());
    if let Some(path) = &cli.report {
        write_report(path, &summary)?;
        info!("Summary written to {}", path.display());
    }

    Ok(())
}

fn init_logging() -> WorkerGuard {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| DEFAULT_LOGS_DIR.to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "syncro-import.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,syncro_import=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    guard
}

async fn run<A: SyncroApi>(
    command: &Command,
    config: &Config,
    api: &A,
    cache: &mut EntityCache,
    validator: RowValidator,
) -> Result<RunSummary> {
    match command {
        Command::Tickets { file } => {
            let path = file.clone().unwrap_or_else(|| config.tickets_csv.clone());
            let rows = csv_source::read_path(&path, &validator.ticket_columns().required())
                .with_context(|| format!("Failed to load tickets from {}", path.display()))?;

            let mut importer = Importer::new(api, cache, validator);
            Ok(importer.import_tickets(&rows).await?)
        }
        Command::Comments { file } => {
            let path = file.clone().unwrap_or_else(|| config.comments_csv.clone());
            let rows = csv_source::read_path(&path, &validator.comment_columns().required())
                .with_context(|| format!("Failed to load comments from {}", path.display()))?;

            let mut importer = Importer::new(api, cache, validator);
            Ok(importer.import_comments(&rows).await?)
        }
        Command::Combined { file } => {
            let path = file.clone().unwrap_or_else(|| config.combined_csv.clone());
            let rows = csv_source::read_path(&path, &validator.combined_columns().required())
                .with_context(|| format!("Failed to load combined rows from {}", path.display()))?;

            let mut importer = Importer::new(api, cache, validator);
            Ok(importer.import_combined(&rows).await?)
        }
        Command::Labor { file } => {
            let path = file.clone().unwrap_or_else(|| config.labor_csv.clone());
            let rows = csv_source::read_path(&path, &validator.labor_columns().required())
                .with_context(|| format!("Failed to load labor rows from {}", path.display()))?;

            let mut importer = Importer::new(api, cache, validator);
            Ok(importer.import_labor(&rows).await?)
        }
        Command::TimerEntries { count, tech, product } => {
            let request = TimeEntryRequest {
                ticket_count: *count,
                tech: tech
                    .clone()
                    .or_else(|| config.timer_tech.clone())
                    .context("No tech given: pass --tech or set TIMER_TECH")?,
                labor_product: product
                    .clone()
                    .or_else(|| config.timer_labor_product.clone())
                    .context("No labor product given: pass --product or set TIMER_LABOR_PRODUCT")?,
            };

            let mut importer = Importer::new(api, cache, validator);
            let mut rng = StdRng::from_entropy();
            Ok(importer.generate_time_entries(&request, &mut rng).await?)
        }
        Command::ClearCache => anyhow::bail!("clear-cache does not talk to Syncro"),
    }
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json =
        serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
