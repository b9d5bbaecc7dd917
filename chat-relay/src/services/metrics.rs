use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

use crate::models::ResponseMode;

struct RelayMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

static METRICS: OnceLock<RelayMetrics> = OnceLock::new();

fn metrics() -> &'static RelayMetrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("relay_requests_total", "Total number of relayed requests"),
            &["mode"],
        )
        .expect("metric can be created");

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "relay_request_duration_seconds",
                "Time until the relay produced response headers",
            ),
            &["mode"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("collector can be registered");

        RelayMetrics {
            registry,
            requests_total,
            request_duration_seconds,
        }
    })
}

/// Register collectors eagerly so `/metrics` lists them before the first request.
pub fn init_metrics() {
    let _ = metrics();
}

pub fn record_request(mode: ResponseMode, elapsed: Duration) {
    let metrics = metrics();
    metrics
        .requests_total
        .with_label_values(&[mode.as_str()])
        .inc();
    metrics
        .request_duration_seconds
        .with_label_values(&[mode.as_str()])
        .observe(elapsed.as_secs_f64());
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = metrics().registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
