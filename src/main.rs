//! Tunedex - media library indexer
//!
//! Entry point for the indexing daemon.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tunedex::catalog::shared;
use tunedex::config::WatchLimitPolicy;
use tunedex::metadata::FileInfoExtractor;
use tunedex::scanner::ExtensionFilter;
use tunedex::storage::{init_storage, Database, SqliteCatalog};
use tunedex::telemetry::{init_metrics, init_tracing, render_metrics, TracingConfig};
use tunedex::watcher::WatcherConfig;
use tunedex::{
    ChangeWatcher, Config, ExtractorRegistry, MetadataPipeline, Result, ScanCoordinator,
    ScanEvent,
};

/// Tunedex - media library indexer
#[derive(Parser, Debug)]
#[command(name = "tunedex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for the `SQLite` catalog
    #[arg(short, long, env = "TUNEDEX_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TUNEDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TUNEDEX_LOG_JSON")]
    log_json: bool,

    /// Media directories to index
    #[arg(short, long, env = "TUNEDEX_LOCATIONS", value_delimiter = ',', required = true)]
    locations: Vec<PathBuf>,

    /// File extensions to index
    #[arg(
        long,
        env = "TUNEDEX_EXTENSIONS",
        value_delimiter = ',',
        default_value = "flac,mp3,wav,ogg,m4a,dsf"
    )]
    extensions: Vec<String>,

    /// Feature capabilities requested for each new track, after its extension
    #[arg(
        long,
        env = "TUNEDEX_FEATURE_TAGS",
        value_delimiter = ',',
        default_value = "discid,text,fingerprint,cover"
    )]
    feature_tags: Vec<String>,

    /// Quiet period after a change before checking stability, in milliseconds
    #[arg(long, env = "TUNEDEX_DEBOUNCE_MS", default_value = "2000")]
    debounce_ms: u64,

    /// Stability checks before scanning anyway (0 waits indefinitely)
    #[arg(long, env = "TUNEDEX_MAX_STABILITY_CYCLES", default_value = "30")]
    max_stability_cycles: u32,

    /// Behaviour when the watch limit is reached (warn, fail)
    #[arg(long, env = "TUNEDEX_WATCH_LIMIT_POLICY", default_value = "warn")]
    watch_limit_policy: WatchLimitPolicy,

    /// Seconds between scheduled full scans (0 disables)
    #[arg(long, env = "TUNEDEX_SCAN_PERIOD_SECS", default_value = "0")]
    scan_period_secs: u64,

    /// Disable change-triggered re-indexing
    #[arg(long, env = "TUNEDEX_NO_WATCH")]
    no_watch: bool,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    tracing::info!("Tunedex v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        data_dir: cli.data_dir,
        log_level: cli.log_level,
        log_json: cli.log_json,
        locations: cli.locations,
        extensions: cli.extensions,
        feature_tags: cli.feature_tags,
        debounce: Duration::from_millis(cli.debounce_ms),
        max_stability_cycles: cli.max_stability_cycles,
        watch_limit_policy: cli.watch_limit_policy,
        scan_period: (cli.scan_period_secs > 0).then(|| Duration::from_secs(cli.scan_period_secs)),
        watch: !cli.no_watch && !cli.once,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let db = Database::open(config.database_path())?;
    init_storage(&db)?;
    init_metrics();

    let extensions = config.normalized_extensions();
    let mut registry = ExtractorRegistry::new();
    registry.register(FileInfoExtractor::new(extensions.iter().cloned()));

    let coordinator = ScanCoordinator::new(
        shared(SqliteCatalog::new(db)),
        MetadataPipeline::new(Arc::new(registry))
            .with_features(config.feature_tags.iter().map(|t| t.trim().to_string())),
        ExtensionFilter::new(extensions),
    );
    for location in &config.locations {
        coordinator.add_location(location)?;
    }

    spawn_report_logger(&coordinator);

    coordinator.start();
    if cli.once {
        coordinator.wait().await;
        return Ok(());
    }

    let watcher = if config.watch {
        let watcher = ChangeWatcher::new(
            WatcherConfig::from_config(&config, coordinator.locations()),
            Arc::new(coordinator.clone()),
        );
        watcher.start()?;
        Some(watcher)
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let periodic = config
        .scan_period
        .map(|period| coordinator.spawn_periodic(period, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    shutdown.cancel();
    if let Some(periodic) = periodic {
        let _ = periodic.await;
    }
    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    coordinator.stop().await?;

    tracing::info!("Tunedex stopped");
    Ok(())
}

/// Log every pass report as JSON, followed by a metrics snapshot.
fn spawn_report_logger(coordinator: &ScanCoordinator) {
    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ScanEvent::PassFinished(report)) => {
                    match serde_json::to_string(&report) {
                        Ok(json) => tracing::info!(report = %json, "Pass report"),
                        Err(e) => tracing::warn!(error = %e, "Failed to encode pass report"),
                    }
                    tracing::debug!(metrics = %render_metrics(), "Metrics snapshot");
                }
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
