use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"]
    ).expect("metric can be created");

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path"]
    ).expect("metric can be created");

    // Business metrics
    pub static ref FRAUD_DECISIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("fraud_decisions_total", "Fraud decisions by recommendation and source"),
        &["recommendation", "source"]
    ).expect("metric can be created");

    pub static ref ROUTING_DECISIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("routing_decisions_total", "Routing decisions by gateway and model"),
        &["gateway", "model"]
    ).expect("metric can be created");

    pub static ref UPSTREAM_FALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("upstream_fallbacks_total", "Decisions served by a fallback strategy"),
        &["kind"]
    ).expect("metric can be created");

    // Cache metrics
    pub static ref CACHE_HITS: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_hits_total", "Total cache hits"),
        &["kind"]
    ).expect("metric can be created");

    pub static ref CACHE_MISSES: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_misses_total", "Total cache misses"),
        &["kind"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;

    registry.register(Box::new(FRAUD_DECISIONS.clone()))?;
    registry.register(Box::new(ROUTING_DECISIONS.clone()))?;
    registry.register(Box::new(UPSTREAM_FALLBACKS.clone()))?;

    registry.register(Box::new(CACHE_HITS.clone()))?;
    registry.register(Box::new(CACHE_MISSES.clone()))?;

    Ok(())
}

/// Register with the service registry once; later calls are no-ops
pub fn init() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(e) = register_metrics(&REGISTRY) {
            tracing::error!("Failed to register metrics: {}", e);
        }
    });
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_request(method: &str, path: &str, status: u16, seconds: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(seconds);
}
