use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref WATCH_FETCHES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_fetches", "Fetches issued by watch loops"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_RETRYABLE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_retryable_failures", "Fetches that failed with a retryable error"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_FATAL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_fatal_failures", "Watches terminated by a fatal error"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EMISSIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_emissions", "Snapshots delivered to consumers"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_COALESCED: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_coalesced", "Pending snapshots superseded before emission"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers the watch collectors with `registry`.
///
/// Safe to call for several registries; a second registration into the same
/// registry is logged and ignored.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors = [
        WATCH_FETCHES.clone(),
        WATCH_RETRYABLE_FAILURES.clone(),
        WATCH_FATAL_FAILURES.clone(),
        WATCH_EMISSIONS.clone(),
        WATCH_COALESCED.clone(),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(Box::new(collector)) {
            error!("collector can not be registered: {:?}", e);
        }
    }
}

/// Renders `registry` in the Prometheus text exposition format
pub fn gather_text(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
