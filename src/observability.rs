use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: booking requests. Labels: outcome (confirmed, conflict, error).
pub const BOOKINGS_REQUESTED_TOTAL: &str = "innkeep_bookings_requested_total";

/// Counter: bookings moved to cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "innkeep_bookings_cancelled_total";

/// Histogram: time spent holding a room lock, in seconds.
pub const CRITICAL_SECTION_SECONDS: &str = "innkeep_critical_section_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Counter: store calls cut off by the storage timeout.
pub const STORAGE_TIMEOUTS_TOTAL: &str = "innkeep_storage_timeouts_total";

/// Counter: reads retried after a timeout.
pub const STORAGE_RETRIES_TOTAL: &str = "innkeep_storage_retries_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Counter: WAL compactions run.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global log subscriber and, when `metrics_port` is set, the
/// Prometheus exporter. Fails if a subscriber is already installed.
pub fn init(config: &Config) -> Result<(), InitError> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    tracing_subscriber::fmt().with_env_filter(filter).try_init()?;

    let Some(port) = config.metrics_port else {
        return Ok(());
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
