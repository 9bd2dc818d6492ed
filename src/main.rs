//! Tracking pass entry point
//!
//! Runs one pass over the stored trackings and exits. Scheduling is left to
//! cron or a systemd timer.
//!
//! Exit codes: 0 when the pass ran, 1 when startup failed or the tracking
//! scan could not be opened.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use outfit_tracker_lib::application::{ScanReport, Tracker};
use outfit_tracker_lib::domain::VendorType;
use outfit_tracker_lib::infrastructure::{
    AppConfig, DatabaseConnection, DocumentMessageRepository, DocumentStore,
    DocumentTrackingRepository, HttpClient, ParserRegistry, SqliteDocumentStore,
    init_logging_with_config,
};

/// Re-check tracked products and queue alerts for changed ones
#[derive(Debug, Parser)]
#[command(name = "tracker", version, about, long_about = None)]
struct Cli {
    /// Only process trackings of this vendor (lamoda, kixbox, oktyabr, lime, ridestep, traektoria)
    #[arg(short, long)]
    vendor: Option<VendorType>,

    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "OUTFIT_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli, &config).await {
        Ok(report) => {
            if report.failed > 0 {
                warn!(failed = report.failed, "Some trackings were not processed");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Tracking pass failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(workers) = cli.workers {
        config.worker.count = workers;
        config.validate()?;
    }

    Ok(config)
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<ScanReport> {
    let db = DatabaseConnection::from_config(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    db.migrate().await.context("Failed to migrate database")?;

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(db.pool().clone()));
    let trackings = Arc::new(DocumentTrackingRepository::new(Arc::clone(&store)));
    let messages = Arc::new(DocumentMessageRepository::new(store));

    let http = Arc::new(HttpClient::new(config.http.clone()).context("Failed to build HTTP client")?);
    let registry = Arc::new(ParserRegistry::with_default_parsers(http)?);

    let tracker = Tracker::new(registry, trackings, messages).with_worker_count(config.worker.count);

    let cancellation = tracker.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight trackings");
            cancellation.cancel();
        }
    });

    let report = tracker.start(cli.vendor).await?;
    info!(?report, "Done");
    Ok(report)
}
