//! Prometheus metrics for the form relay.
//!
//! Metrics are exposed by the exporter's own HTTP listener on `METRICS_PORT`.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `formsubmit_decisions_total` - Terminal decision per request (label: decision)
//! - `formsubmit_rate_limiter_evictions_total` - Client windows removed by the sweep
//!
//! ## Histograms
//! - `formsubmit_mail_send_duration_seconds` - Mail dispatch duration (label: status)
//!
//! ## Gauges
//! - `formsubmit_rate_limiter_tracked_clients` - Client windows currently held
//!
//! Recording before [`init_metrics`] (or with metrics disabled) is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::pipeline::AdmissionDecision;

/// Metric names as constants for consistency.
pub mod names {
    pub const DECISIONS_TOTAL: &str = "formsubmit_decisions_total";
    pub const RATE_LIMITER_EVICTIONS_TOTAL: &str = "formsubmit_rate_limiter_evictions_total";
    pub const MAIL_SEND_DURATION_SECONDS: &str = "formsubmit_mail_send_duration_seconds";
    pub const RATE_LIMITER_TRACKED_CLIENTS: &str = "formsubmit_rate_limiter_tracked_clients";
}

/// Initialize the Prometheus metrics exporter.
///
/// Installs the global recorder, starts the HTTP listener on `metrics_addr`
/// and describes every metric.
///
/// # Errors
///
/// Returns a message if the recorder is already installed or the listener
/// cannot be set up.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DECISIONS_TOTAL,
        "Form submissions by terminal admission decision"
    );
    describe_counter!(
        names::RATE_LIMITER_EVICTIONS_TOTAL,
        "Expired client windows removed by the rate limiter sweep"
    );

    describe_histogram!(
        names::MAIL_SEND_DURATION_SECONDS,
        "Mail dispatch duration in seconds"
    );

    describe_gauge!(
        names::RATE_LIMITER_TRACKED_CLIENTS,
        "Client windows currently tracked by the rate limiter"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record the terminal decision of one request.
pub fn record_decision(decision: AdmissionDecision) {
    counter!(names::DECISIONS_TOTAL, "decision" => decision.as_str()).increment(1);
}

/// Record client windows removed by one sweep.
pub fn record_evictions(count: usize) {
    counter!(names::RATE_LIMITER_EVICTIONS_TOTAL).increment(count as u64);
}

// =============================================================================
// Histogram Recording Functions
// =============================================================================

/// Record how long one mail dispatch took. `status` is `success`, `error` or `timeout`.
pub fn record_mail_send_duration(status: &'static str, duration_secs: f64) {
    histogram!(names::MAIL_SEND_DURATION_SECONDS, "status" => status).record(duration_secs);
}

// =============================================================================
// Gauge Recording Functions
// =============================================================================

/// Update the tracked client gauge.
pub fn set_tracked_clients(count: usize) {
    gauge!(names::RATE_LIMITER_TRACKED_CLIENTS).set(count as f64);
}
