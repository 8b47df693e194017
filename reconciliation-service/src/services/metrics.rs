//! Prometheus metrics for reconciliation-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "reconciliation_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for pipeline runs by calling context and outcome.
pub static PIPELINE_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_pipeline_runs_total",
        "Total number of matching pipeline runs",
        &["context", "status"]
    )
    .expect("Failed to register PIPELINE_RUNS")
});

/// Histogram for full pipeline run duration by calling context.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "reconciliation_pipeline_duration_seconds",
        "Matching pipeline run duration in seconds",
        &["context"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register PIPELINE_DURATION")
});

/// Counter for classified transactions by confidence tier.
pub static TRANSACTION_TIERS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_transaction_tiers_total",
        "Transactions classified, by confidence tier",
        &["tier"]
    )
    .expect("Failed to register TRANSACTION_TIERS")
});

/// Counter for cache lookups by object and outcome.
pub static CACHE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_cache_operations_total",
        "Cache lookups by object and outcome",
        &["object", "outcome"]
    )
    .expect("Failed to register CACHE_OPERATIONS")
});

/// Counter for accounting system fetches by resource and status.
pub static ACCOUNTING_FETCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_accounting_fetches_total",
        "Accounting system page fetches by resource and status",
        &["resource", "status"]
    )
    .expect("Failed to register ACCOUNTING_FETCHES")
});

/// Counter for store mutations (confirm/unconfirm/link).
pub static STORE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_store_operations_total",
        "Reconciliation store mutations by operation and status",
        &["operation", "status"]
    )
    .expect("Failed to register STORE_OPERATIONS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&PIPELINE_RUNS);
    Lazy::force(&PIPELINE_DURATION);
    Lazy::force(&TRANSACTION_TIERS);
    Lazy::force(&CACHE_OPERATIONS);
    Lazy::force(&ACCOUNTING_FETCHES);
    Lazy::force(&STORE_OPERATIONS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a pipeline run outcome.
pub fn record_pipeline_run(context: &str, status: &str) {
    PIPELINE_RUNS.with_label_values(&[context, status]).inc();
}

/// Record a classified transaction.
pub fn record_tier(tier: &str, count: i32) {
    TRANSACTION_TIERS
        .with_label_values(&[tier])
        .inc_by(count.max(0) as f64);
}

/// Record a cache lookup outcome.
pub fn record_cache_operation(object: &str, outcome: &str) {
    CACHE_OPERATIONS.with_label_values(&[object, outcome]).inc();
}

/// Record an accounting system fetch.
pub fn record_accounting_fetch(resource: &str, status: &str) {
    ACCOUNTING_FETCHES
        .with_label_values(&[resource, status])
        .inc();
}

/// Record a store mutation.
pub fn record_store_operation(operation: &str, status: &str) {
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
