use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// View counter operations segmented by operation (increment/read/read_many) and result.
    pub static ref VIEW_COUNTER_OPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "view_counter_ops_total",
        "View counter store operations segmented by operation and result",
        &["op", "result"]
    )
    .expect("failed to register view_counter_ops_total");

    /// Latency of counter store round-trips.
    pub static ref VIEW_COUNTER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "view_counter_duration_seconds",
        "View counter store round-trip duration",
        &["op"]
    )
    .expect("failed to register view_counter_duration_seconds");
}

pub fn record_op(op: &str, ok: bool, elapsed_secs: f64) {
    let result = if ok { "success" } else { "error" };
    VIEW_COUNTER_OPS_TOTAL.with_label_values(&[op, result]).inc();
    VIEW_COUNTER_DURATION_SECONDS
        .with_label_values(&[op])
        .observe(elapsed_secs);
}
