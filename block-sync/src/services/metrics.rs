//! Prometheus metrics for block-sync.
//!
//! The job is short-lived, so metrics are written once at the end of a run in
//! text exposition format for a node-exporter textfile collector.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_gauge_vec, CounterVec, Encoder,
    Histogram, IntGaugeVec, TextEncoder,
};
use std::path::Path;

/// Accounts remaining after each pipeline stage.
pub static ACCOUNTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "block_sync_accounts",
        "Accounts remaining after each pipeline stage",
        &["stage"]
    )
    .expect("Failed to register ACCOUNTS")
});

/// Decisions by target state and outcome.
pub static DECISIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "block_sync_decisions_total",
        "Reconciliation decisions by target state and outcome",
        &["to_state", "result"]
    )
    .expect("Failed to register DECISIONS")
});

/// Fatal errors by stage.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "block_sync_errors_total",
        "Total number of fatal run errors",
        &["stage"]
    )
    .expect("Failed to register ERRORS")
});

/// Wall-clock duration of a run.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "block_sync_run_duration_seconds",
        "Run duration in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("Failed to register RUN_DURATION")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&ACCOUNTS);
    Lazy::force(&DECISIONS);
    Lazy::force(&ERRORS);
    Lazy::force(&RUN_DURATION);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Write all metrics to `path`, replacing it atomically.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let text = get_metrics().map_err(std::io::Error::other)?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
}

/// Record the number of accounts left after a stage.
pub fn record_accounts(stage: &str, count: usize) {
    ACCOUNTS
        .with_label_values(&[stage])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

/// Record one decision.
pub fn record_decision(to_state: &str, result: &str) {
    DECISIONS.with_label_values(&[to_state, result]).inc();
}

/// Record a fatal error.
pub fn record_error(stage: &str) {
    ERRORS.with_label_values(&[stage]).inc();
}

/// Record run duration.
pub fn record_run_duration(duration_secs: f64) {
    RUN_DURATION.observe(duration_secs);
}
