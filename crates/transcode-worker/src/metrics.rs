//! Worker metrics.
//!
//! Provides standardized metrics for monitoring the worker:
//! - Job admission and outcome counters
//! - Conversion outcomes by resolution
//! - Dropped status updates
//! - Transcode latency histograms

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_ADMITTED_TOTAL: &str = "transcode_jobs_admitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "transcode_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "transcode_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "transcode_jobs_active";

    /// Conversions by resolution and outcome.
    pub const CONVERSIONS_TOTAL: &str = "transcode_conversions_total";

    /// Status updates lost to store errors.
    pub const STATUS_UPDATES_DROPPED_TOTAL: &str = "transcode_status_updates_dropped_total";

    /// Wall time of one resolution transcode in seconds.
    pub const TRANSCODE_DURATION_SECONDS: &str = "transcode_duration_seconds";
}

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_job_admitted() {
    counter!(names::JOBS_ADMITTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

/// Update the in-process active jobs gauge.
pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

/// Record the final outcome of one resolution.
pub fn record_conversion(resolution: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("resolution", resolution.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::CONVERSIONS_TOTAL, &labels).increment(1);
    histogram!(names::TRANSCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a status update that was not persisted.
pub fn record_status_update_dropped(operation: &str) {
    counter!(
        names::STATUS_UPDATES_DROPPED_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_ADMITTED_TOTAL.starts_with("transcode_"));
        assert!(names::CONVERSIONS_TOTAL.ends_with("_total"));
        assert!(names::TRANSCODE_DURATION_SECONDS.contains("seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job_admitted();
        record_conversion("720p", "completed", 1.5);
        record_status_update_dropped("update_conversion");
        set_active_jobs(1);
    }
}
