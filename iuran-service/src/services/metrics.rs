//! Prometheus metrics for iuran-service.
//!
//! Domain counters live in the default `prometheus` registry. HTTP request metrics are
//! emitted through the `metrics` facade by the shared middleware and rendered by the
//! `metrics-exporter-prometheus` recorder; [`get_metrics`] concatenates both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, histogram_opts, opts,
    register_histogram_vec, register_int_counter_vec,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!("iuran_db_query_duration_seconds", "Database query duration"),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

static HTTP_RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Payment submissions by source (resident or admin) and initial status
pub static PAYMENTS_SUBMITTED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Verification decisions by outcome
pub static VERIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub static TARIFF_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub static SUBSCRIPTION_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    HTTP_RECORDER.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("A global metrics recorder is already installed");
        }
        handle
    });

    PAYMENTS_SUBMITTED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "iuran_payments_submitted_total",
                "Payment transactions recorded by source and initial status"
            ),
            &["source", "status"]
        )
        .expect("Failed to register PAYMENTS_SUBMITTED_TOTAL")
    });

    VERIFICATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "iuran_verifications_total",
                "Payment verification decisions by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register VERIFICATIONS_TOTAL")
    });

    TARIFF_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("iuran_tariff_operations_total", "Tariff writes by operation"),
            &["operation"]
        )
        .expect("Failed to register TARIFF_OPERATIONS_TOTAL")
    });

    SUBSCRIPTION_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "iuran_subscription_operations_total",
                "Component subscription operations by type"
            ),
            &["operation"]
        )
        .expect("Failed to register SUBSCRIPTION_OPERATIONS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("iuran_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = HTTP_RECORDER
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    output.push_str(&String::from_utf8_lossy(&buffer));
    output
}

pub fn record_payment_submitted(source: &str, status: &str) {
    if let Some(counter) = PAYMENTS_SUBMITTED_TOTAL.get() {
        counter.with_label_values(&[source, status]).inc();
    }
}

pub fn record_verification(outcome: &str) {
    if let Some(counter) = VERIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_tariff_operation(operation: &str) {
    if let Some(counter) = TARIFF_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

pub fn record_subscription_operation(operation: &str) {
    if let Some(counter) = SUBSCRIPTION_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
