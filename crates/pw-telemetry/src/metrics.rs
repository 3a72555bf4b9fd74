//! Prometheus metrics for the wallet operation layer.
//!
//! All metrics follow the naming convention: `pw_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{exponential_buckets, CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Crate-local metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Wallet operations by kind and outcome
    pub static ref OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("pw_wallet_operations_total", "Wallet operations by kind and outcome"),
        &["operation", "outcome"]  // outcome: success/failure/timeout/rejected
    ).expect("metric creation failed");

    /// Wallet operation duration
    pub static ref OPERATION_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "pw_wallet_operation_duration_seconds",
            "Time spent in wallet operations, including user ceremonies"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("valid buckets")),
        &["operation"]
    ).expect("metric creation failed");

    /// Persistent storage fallbacks (latch trips)
    pub static ref STORAGE_FALLBACKS: CounterVec = CounterVec::new(
        Opts::new("pw_storage_fallbacks_total", "Switches from persistent to in-memory storage"),
        &["call"]
    ).expect("metric creation failed");

    /// Balance queries by outcome
    pub static ref BALANCE_QUERIES: CounterVec = CounterVec::new(
        Opts::new("pw_balance_queries_total", "Balance queries by outcome"),
        &["outcome"]  // outcome: ready/absent/error/stale
    ).expect("metric creation failed");

    /// Events published to subscribers
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("pw_events_published_total", "Wallet events published"),
        &["event"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the crate registry.
///
/// Re-registration is tolerated so initialization can run more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OPERATIONS.clone()),
        Box::new(OPERATION_DURATION.clone()),
        Box::new(STORAGE_FALLBACKS.clone()),
        Box::new(BALANCE_QUERIES.clone()),
        Box::new(EVENTS_PUBLISHED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: prometheus::Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &prometheus::Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }

    /// Start a timer for one label of [`OPERATION_DURATION`].
    pub fn for_operation(operation: &str) -> Self {
        Self::new(&OPERATION_DURATION.with_label_values(&[operation]))
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
