//! Prometheus metrics for revenue-service.
//!
//! Exposes ledger and batch collectors and an HTTP handler for the `/metrics` endpoint.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;

/// Calculations by outcome (committed/not_eligible/error)
static CALCULATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "revenue_calculations_total",
        "Total number of per-video revenue calculations by outcome",
        &["outcome"]
    )
    .expect("failed to register revenue_calculations_total")
});

/// Cents committed to the ledger per distribution type
static DISTRIBUTED_CENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "revenue_distributed_cents_total",
        "Cents written to the distribution ledger by distribution type",
        &["type"]
    )
    .expect("failed to register revenue_distributed_cents_total")
});

static BATCH_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "revenue_batch_runs_total",
        "Total number of batch runs by mode",
        &["mode"]
    )
    .expect("failed to register revenue_batch_runs_total")
});

static BATCH_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "revenue_batch_errors_total",
        "Per-video failures recovered inside batch runs"
    )
    .expect("failed to register revenue_batch_errors_total")
});

static LEDGER_COMMIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "revenue_ledger_commit_duration_seconds",
        "Duration of one per-video ledger commit",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("failed to register revenue_ledger_commit_duration_seconds")
});

pub fn record_calculation(outcome: &str) {
    CALCULATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_distributed(distribution_type: &str, cents: i64) {
    if cents > 0 {
        DISTRIBUTED_CENTS_TOTAL
            .with_label_values(&[distribution_type])
            .inc_by(cents as u64);
    }
}

pub fn record_batch_run(mode: &str) {
    BATCH_RUNS_TOTAL.with_label_values(&[mode]).inc();
}

pub fn record_batch_error() {
    BATCH_ERRORS_TOTAL.inc();
}

pub fn record_ledger_commit(duration: Duration) {
    LEDGER_COMMIT_SECONDS.observe(duration.as_secs_f64());
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
