use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rakumachi_scout::config::ScoutConfig;
use rakumachi_scout::logging::{init_logging, LogConfig};
use rakumachi_scout::reconciler::Reconciler;
use rakumachi_scout::scrapers::{ArtifactStore, FetchReport, Fetcher, HttpTransport};
use rakumachi_scout::store::SqliteRepository;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "scout", version, about = "Income-property listing harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listings and print them as JSON
    Scrape {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Write the records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch listings and reconcile them into the database
    Sync {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Overrides SCOUT_DATABASE_URL
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Listing search URL (overrides SCOUT_TARGET_URL)
    #[arg(long)]
    url: Option<String>,

    /// Attempts before falling back; 0 goes straight to fallback data
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Base retry delay in seconds
    #[arg(long)]
    retry_delay: Option<f64>,
}

impl FetchArgs {
    fn apply(&self, config: &mut ScoutConfig) -> Result<()> {
        if let Some(url) = &self.url {
            config.target_url = url.clone();
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if let Some(secs) = self.retry_delay {
            config.retry_delay_secs = secs;
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = match LogConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid logging configuration, using defaults: {e:#}");
            LogConfig::default()
        }
    };
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            None
        }
    };

    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "Command failed");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ScoutConfig::load()?;

    match cli.command {
        Commands::Scrape { fetch, output } => {
            fetch.apply(&mut config)?;
            let report = fetch_listings(&config).await;

            let json = serde_json::to_string_pretty(&report.records)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), count = report.records.len(), "Saved listings");
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Commands::Sync {
            fetch,
            database_url,
        } => {
            fetch.apply(&mut config)?;
            if let Some(url) = database_url {
                config.database_url = url;
            }
            sync(&config).await
        }
    }
}

async fn fetch_listings(config: &ScoutConfig) -> FetchReport {
    let transport = Arc::new(HttpTransport::new(config.request_timeout()));
    let artifacts = ArtifactStore::new(&config.artifacts_dir);
    let mut fetcher = Fetcher::new(transport, artifacts);

    let report = fetcher.fetch(&config.fetch_params()).await;
    if report.is_fallback() {
        warn!(
            source = ?report.source,
            attempts = report.attempts,
            count = report.records.len(),
            "Live fetch exhausted; returning fallback data"
        );
    } else {
        info!(count = report.records.len(), attempts = report.attempts, "Fetched live listings");
    }
    report
}

/// The daily job: make sure the schema exists, harvest, reconcile.
async fn sync(config: &ScoutConfig) -> Result<()> {
    let started = Instant::now();
    info!(target_url = %config.target_url, "Starting property sync");

    let repo = SqliteRepository::connect(&config.database_url)
        .await
        .context("Failed to open database")?;
    repo.migrate().await.context("Failed to create tables")?;
    info!("Database tables verified");

    let report = fetch_listings(config).await;
    let reconciler = Reconciler::new(repo);
    let batch = reconciler.reconcile_batch(&report.records).await;

    info!(
        duration_secs = started.elapsed().as_secs_f64(),
        source = ?report.source,
        processed = batch.processed,
        created = batch.created,
        updated = batch.updated,
        snapshots = batch.snapshots_appended,
        skipped = batch.skipped,
        failed = batch.failed,
        "Completed property sync"
    );
    Ok(())
}
