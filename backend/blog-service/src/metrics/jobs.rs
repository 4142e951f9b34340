use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

lazy_static! {
    /// Outbound emails segmented by kind (new_post/digest) and result.
    pub static ref EMAILS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_emails_sent_total",
        "Outbound notification emails segmented by kind and result",
        &["kind", "result"]
    )
    .expect("failed to register blog_emails_sent_total");

    /// Digest runs segmented by result.
    pub static ref DIGEST_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_digest_runs_total",
        "Weekly digest runs segmented by result",
        &["result"]
    )
    .expect("failed to register blog_digest_runs_total");

    /// Notifications waiting in the new-post queue.
    pub static ref NOTIFY_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "blog_notify_queue_depth",
        "New-post notifications waiting to be processed"
    )
    .expect("failed to register blog_notify_queue_depth");
}

pub fn record_email(kind: &str, ok: bool) {
    let result = if ok { "success" } else { "error" };
    EMAILS_SENT_TOTAL.with_label_values(&[kind, result]).inc();
}
