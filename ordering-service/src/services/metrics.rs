//! Metrics module for ordering-service.
//! HTTP request metrics come from the `metrics` facade (rendered by the
//! Prometheus exporter); coupon and order counters use the `prometheus` crate.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "ordering_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Coupon quotes by outcome (applied, not_found, format, or a rejection reason)
pub static COUPON_QUOTES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Coupon redemptions committed with an order
pub static COUPON_REDEMPTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Orders placed, labelled by whether a coupon was used
pub static ORDERS_PLACED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Coupon admin operations (create/update/delete)
pub static COUPON_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Order notifications that could not be delivered
pub static NOTIFICATION_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder already installed"),
        }
    }

    COUPON_QUOTES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "ordering_coupon_quotes_total",
                "Coupon quotes by restaurant and outcome"
            ),
            &["restaurant_id", "outcome"]
        )
        .expect("Failed to register COUPON_QUOTES_TOTAL")
    });

    COUPON_REDEMPTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "ordering_coupon_redemptions_total",
                "Coupon redemptions by restaurant and outcome"
            ),
            &["restaurant_id", "outcome"]
        )
        .expect("Failed to register COUPON_REDEMPTIONS_TOTAL")
    });

    ORDERS_PLACED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("ordering_orders_placed_total", "Orders placed by restaurant"),
            &["restaurant_id", "with_coupon"]
        )
        .expect("Failed to register ORDERS_PLACED_TOTAL")
    });

    COUPON_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "ordering_coupon_operations_total",
                "Coupon admin operations by restaurant and operation type"
            ),
            &["restaurant_id", "operation"]
        )
        .expect("Failed to register COUPON_OPERATIONS_TOTAL")
    });

    NOTIFICATION_FAILURES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "ordering_notification_failures_total",
                "Order notifications that failed to deliver"
            ),
            &["channel"]
        )
        .expect("Failed to register NOTIFICATION_FAILURES_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return output;
    }
    if let Ok(custom_metrics) = String::from_utf8(buffer) {
        output.push_str(&custom_metrics);
    }
    output
}

pub fn record_coupon_quote(restaurant_id: &str, outcome: &str) {
    if let Some(counter) = COUPON_QUOTES_TOTAL.get() {
        counter.with_label_values(&[restaurant_id, outcome]).inc();
    }
}

pub fn record_coupon_redemption(restaurant_id: &str, outcome: &str) {
    if let Some(counter) = COUPON_REDEMPTIONS_TOTAL.get() {
        counter.with_label_values(&[restaurant_id, outcome]).inc();
    }
}

pub fn record_order_placed(restaurant_id: &str, with_coupon: bool) {
    if let Some(counter) = ORDERS_PLACED_TOTAL.get() {
        let label = if with_coupon { "true" } else { "false" };
        counter.with_label_values(&[restaurant_id, label]).inc();
    }
}

pub fn record_coupon_operation(restaurant_id: &str, operation: &str) {
    if let Some(counter) = COUPON_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[restaurant_id, operation]).inc();
    }
}

pub fn record_notification_failure(channel: &str) {
    if let Some(counter) = NOTIFICATION_FAILURES_TOTAL.get() {
        counter.with_label_values(&[channel]).inc();
    }
}
