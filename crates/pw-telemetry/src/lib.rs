//! # PW Telemetry
//!
//! Logging and metrics for the passkey wallet.
//!
//! - Logs: `tracing` events rendered by a `tracing-subscriber` fmt layer, pretty
//!   in development and JSON when `PW_JSON_LOGS` is set.
//! - Metrics: Prometheus counters and histograms in a crate-local registry,
//!   exposed as text through [`encode_metrics`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pw_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PW_SERVICE_NAME` | `passkey-wallet` | Service name attached to logs |
//! | `PW_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `PW_JSON_LOGS` | `false` | JSON formatted logs |
//! | `PW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, BALANCE_QUERIES,
    EVENTS_PUBLISHED, OPERATIONS, OPERATION_DURATION, STORAGE_FALLBACKS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Safe to call more than once: a second call leaves the already-installed
/// subscriber and registry in place.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active for the lifetime of the application.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
