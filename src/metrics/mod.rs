//! Metrics module
//!
//! Provides Prometheus metrics for file uploads and the HTTPS transport.

use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "kumo_uploads_total",
        "Total number of file uploads by terminal status",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "kumo_upload_bytes_total",
        "Total bytes written to storage"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "kumo_upload_duration_seconds",
        "Duration of the full authorize/transfer/notify protocol in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 120.0]
    ).unwrap();

    // Transport metrics
    pub static ref TRANSPORT_REQUESTS: CounterVec = register_counter_vec!(
        "kumo_transport_requests_total",
        "HTTPS requests sent to the hub",
        &["method", "status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "kumo_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

static RECORDING_ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off for the whole process
///
/// Driven by `metrics.enabled`. Metrics stay registered either way; when
/// disabled the `record_*` functions do nothing.
pub fn set_enabled(enabled: bool) {
    RECORDING_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    RECORDING_ENABLED.load(Ordering::Relaxed)
}

/// Record the terminal status of an upload
pub fn record_upload_outcome(status: &str, duration_secs: f64) {
    if !is_enabled() {
        return;
    }
    UPLOADS_TOTAL.with_label_values(&[status]).inc();
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record bytes written to the storage data plane
pub fn record_upload_bytes(bytes: u64) {
    if !is_enabled() {
        return;
    }
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a completed HTTPS exchange
pub fn record_transport_request(method: &str, status_code: u16) {
    if !is_enabled() {
        return;
    }
    TRANSPORT_REQUESTS
        .with_label_values(&[method, &status_code.to_string()])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    if !is_enabled() {
        return;
    }
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn encode_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
