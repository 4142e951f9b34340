use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Profile cache events (hit/miss/error).
    pub static ref PROFILE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "profile_cache_events_total",
        "Profile posts cache events segmented by outcome",
        &["event"]
    )
    .expect("failed to register profile_cache_events_total");
}

pub fn record_cache_event(event: &str) {
    PROFILE_CACHE_EVENTS.with_label_values(&[event]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_events_are_counted_per_outcome() {
        let before = PROFILE_CACHE_EVENTS.with_label_values(&["miss"]).get();
        record_cache_event("miss");
        assert!(PROFILE_CACHE_EVENTS.with_label_values(&["miss"]).get() > before);
    }
}
