//! Logging and metrics for the data-access layer.
//!
//! Metrics are registered with the default Prometheus registry the first
//! time they are touched. Registration failure (a name clash with another
//! library) disables recording rather than failing reads.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Batch sizes seen by the scatter-gather executor.
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<Result<DataMetrics, prometheus::Error>> = Lazy::new(DataMetrics::new);

/// The registered metrics, if registration succeeded.
pub fn metrics() -> Option<&'static DataMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all data-layer metrics.
#[derive(Clone)]
pub struct DataMetrics {
    /// Cache reads - labels: entity, scope, result (hit/miss/error)
    pub cache_requests_total: CounterVec,

    /// Invalidations - labels: entity, outcome (purged/retried/failed/dropped)
    pub cache_invalidations_total: CounterVec,

    /// Batch fetches - labels: status (success/error)
    pub fetch_batches_total: CounterVec,

    /// Ids per batch fetch - labels: status
    pub fetch_batch_size: HistogramVec,
}

impl DataMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            cache_requests_total: register_counter_vec!(
                "forum_cache_requests_total",
                "Cache reads by entity, scope and result",
                &["entity", "scope", "result"]
            )?,

            cache_invalidations_total: register_counter_vec!(
                "forum_cache_invalidations_total",
                "Cache invalidations by entity and outcome",
                &["entity", "outcome"]
            )?,

            fetch_batches_total: register_counter_vec!(
                "forum_fetch_batches_total",
                "Scatter-gather batch fetches",
                &["status"]
            )?,

            fetch_batch_size: register_histogram_vec!(
                "forum_fetch_batch_size",
                "Number of ids per scatter-gather batch",
                &["status"],
                BATCH_SIZE_BUCKETS.to_vec()
            )?,
        })
    }

    /// Record one cache read.
    pub fn record_cache_read(&self, entity: &str, scope: &str, result: &str) {
        self.cache_requests_total
            .with_label_values(&[entity, scope, result])
            .inc();
    }

    /// Record one invalidation outcome.
    pub fn record_invalidation(&self, entity: &str, outcome: &str) {
        self.cache_invalidations_total
            .with_label_values(&[entity, outcome])
            .inc();
    }

    /// Record a completed batch fetch.
    pub fn record_batch(&self, size: usize, success: bool) {
        let status = if success { "success" } else { "error" };
        self.fetch_batches_total.with_label_values(&[status]).inc();
        self.fetch_batch_size
            .with_label_values(&[status])
            .observe(size as f64);
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `FORUM_LOG_FORMAT` (`json` or `text`) from the environment.
    pub fn from_env() -> Self {
        let json = std::env::var("FORUM_LOG_FORMAT")
            .map(|s| s.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self {
            json,
            ..Self::default()
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed, which makes this
/// safe to call from every test and binary entry point.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.as_str()));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(json = config.json, "tracing initialized");
    }
    installed
}
