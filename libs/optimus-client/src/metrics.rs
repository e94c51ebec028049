// Client-side counters for runs, polling and the query cache

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, IntCounter, IntCounterVec, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("optimus_client".into()), None).expect("valid registry prefix");

    pub static ref RUNS_ISSUED: IntCounter = register_int_counter_with_registry!(
        "runs_issued_total",
        "Ephemeral runs sent to the sandbox",
        REGISTRY
    )
    .expect("metric can be registered");

    pub static ref RUNS_SUPERSEDED: IntCounter = register_int_counter_with_registry!(
        "runs_superseded_total",
        "Run responses discarded because a newer run started on the same slot",
        REGISTRY
    )
    .expect("metric can be registered");

    pub static ref RUN_LATENCY: Histogram = register_histogram_with_registry!(
        "run_round_trip_seconds",
        "Round trip time of ephemeral runs",
        REGISTRY
    )
    .expect("metric can be registered");

    pub static ref SUBMISSIONS_CREATED: IntCounter = register_int_counter_with_registry!(
        "submissions_created_total",
        "Submissions accepted by the backend",
        REGISTRY
    )
    .expect("metric can be registered");

    /// Poll ticks labelled by outcome: progress, terminal, transient, fatal, unknown.
    pub static ref POLL_TICKS: IntCounterVec = register_int_counter_vec_with_registry!(
        "poll_ticks_total",
        "Status polls by outcome",
        &["outcome"],
        REGISTRY
    )
    .expect("metric can be registered");

    /// Cache events labelled by kind: hit, miss, invalidated, refetch, evicted.
    pub static ref CACHE_EVENTS: IntCounterVec = register_int_counter_vec_with_registry!(
        "cache_events_total",
        "Query cache events",
        &["event"],
        REGISTRY
    )
    .expect("metric can be registered");
}

pub fn record_poll(outcome: &str) {
    POLL_TICKS.with_label_values(&[outcome]).inc();
}

pub fn record_cache(event: &str) {
    CACHE_EVENTS.with_label_values(&[event]).inc();
}

/// Render all client metrics in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
