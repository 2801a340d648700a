use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref WAKE_PACKETS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_wake_packets_total",
        "Total magic packets sent"
    ))
    .unwrap();
    pub static ref WAKE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_wake_failures_total",
        "Total magic packet sends that failed"
    ))
    .unwrap();
    pub static ref ACTIVITY_LOG_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_activity_log_failures_total",
        "Wakes that were sent but could not be logged"
    ))
    .unwrap();
    pub static ref DEVICES_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_devices_created_total",
        "Total devices registered"
    ))
    .unwrap();
    pub static ref BULK_WAKE_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "registry_bulk_wake_size",
            "Number of identifiers per bulk wake request"
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(WAKE_PACKETS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(WAKE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(ACTIVITY_LOG_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DEVICES_CREATED_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(BULK_WAKE_SIZE.clone())).unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
