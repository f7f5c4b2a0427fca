//! Logging setup

use crate::telemetry;
use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "blob_watcher=info";
const LOG_FILE_PREFIX: &str = "blob-watcher.log";

/// Install the global subscriber
///
/// - `RUST_LOG` overrides the default filter
/// - `WATCHER_LOG_FORMAT=json` switches to JSON lines (default: pretty)
/// - `WATCHER_LOG_DIR` writes daily-rotated files instead of stdout
///
/// The returned guard must live until exit so buffered lines are flushed.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("WATCHER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    let (writer, guard) = match std::env::var("WATCHER_LOG_DIR") {
        Ok(dir) => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        Err(_) => (BoxMakeWriter::new(std::io::stdout), None),
    };
    let ansi = guard.is_none();

    let fmt_layer = match log_format.as_str() {
        // Production: JSON structured logging
        "json" => fmt::layer().json().with_writer(writer).boxed(),
        // Development: Pretty formatting
        _ => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    let (otel_layer, otel_error) = match telemetry::otel_layer() {
        Ok(layer) => (layer, None),
        Err(e) => (None, Some(e)),
    };
    let otel_enabled = otel_layer.is_some();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    if let Some(e) = otel_error {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    } else if otel_enabled {
        tracing::info!("OpenTelemetry export enabled");
    } else if telemetry::otlp_endpoint().is_some() {
        tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        tracing::warn!("Rebuild with: cargo build --features telemetry");
    } else {
        tracing::debug!("OpenTelemetry not configured (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }

    Ok(guard)
}
