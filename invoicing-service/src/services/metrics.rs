//! Prometheus metrics for invoicing-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Invoice writes by kind, operation and outcome.
pub static INVOICE_WRITES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_invoice_writes_total",
        "Invoice writes by kind, operation and outcome",
        &["kind", "operation", "outcome"]
    )
    .expect("Failed to register invoicing_invoice_writes_total")
});

/// Consistency warnings by kind.
pub static CONSISTENCY_WARNINGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_consistency_warnings_total",
        "Non-fatal consistency warnings by kind",
        &["kind"]
    )
    .expect("Failed to register invoicing_consistency_warnings_total")
});

/// Target accrual decisions.
pub static TARGET_ACCRUALS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_target_accruals_total",
        "Target accrual decisions by outcome",
        &["outcome"]
    )
    .expect("Failed to register invoicing_target_accruals_total")
});

/// Install the global recorder used by the HTTP metrics middleware.
/// Calling it again is a no-op.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer).ok();
    if let Ok(custom_metrics) = String::from_utf8(buffer) {
        output.push_str(&custom_metrics);
    }

    output
}

pub fn record_invoice_write(kind: &str, operation: &str, outcome: &str) {
    INVOICE_WRITES_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
}

pub fn record_warning(kind: &str) {
    CONSISTENCY_WARNINGS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_accrual(outcome: &str) {
    TARGET_ACCRUALS_TOTAL.with_label_values(&[outcome]).inc();
}
