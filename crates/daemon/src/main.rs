//! Blob Watcher - Main Entry Point
//! Reconciles harvest jobs against the record-import service

mod config;
mod logging;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

// Import workspace crates
use blob_watcher_core::application::{shutdown_channel, BlobReconciler, Watcher};
use blob_watcher_core::port::time_provider::SystemTimeProvider;
use blob_watcher_infra_http::HttpBlobStatusSource;
use blob_watcher_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use crate::config::WatcherConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = logging::init_logging()?;

    info!("Blob Watcher v{} starting...", VERSION);

    // 2. Load configuration
    let config = WatcherConfig::from_env().context("Invalid configuration")?;
    info!(
        api_url = %config.api_url,
        db_path = %config.db_path,
        run_once = config.run_once,
        "Configuration loaded"
    );

    // 3. Initialize database
    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() && !config.db_path.starts_with("sqlite:") {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
        }
    }
    let pool = create_pool(&config.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let job_store = Arc::new(SqliteJobStore::new(pool.clone(), time_provider.clone()));
    let blob_source = Arc::new(
        HttpBlobStatusSource::new(config.http_source_config())
            .context("HTTP client setup failed")?,
    );
    let reconciler = Arc::new(BlobReconciler::new(
        blob_source,
        time_provider,
        config.reconciler_config(),
    ));
    let watcher = Watcher::new(job_store, reconciler, config.watcher_settings());

    // 5. Single sweep or watcher loop
    if config.run_once {
        let report = watcher.sweep().await.context("Sweep failed")?;
        info!(
            examined = report.examined,
            done = report.done,
            restarted = report.restarted,
            aborted = report.aborted,
            inconclusive = report.inconclusive,
            failed = report.failed,
            "Single sweep complete"
        );
    } else {
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let watcher_handle = tokio::spawn(async move {
            if let Err(e) = watcher.run(shutdown_rx).await {
                error!(error = ?e, "Watcher failed");
            }
        });

        info!("System ready. Press Ctrl+C to shutdown");

        // 6. Wait for shutdown signal
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received. Exiting gracefully...");

        shutdown_tx.shutdown();
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, watcher_handle)
            .await
            .is_err()
        {
            error!("Watcher did not stop within the grace period");
        }
    }

    // 7. Cleanup
    pool.close().await;
    telemetry::shutdown_telemetry();
    info!("Shutdown complete.");

    Ok(())
}
