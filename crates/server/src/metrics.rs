//! Prometheus metrics for the HTTP server.
//!
//! HTTP request metrics live here; queue, provider, snatch and
//! post-processing metrics come from `medusa_core::metrics` and are
//! registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "medusa_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "medusa_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_auth_failures_total", "Total authentication failures"),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Library and queue gauges (collected on scrape)
// =============================================================================

pub static SHOWS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("medusa_shows", "Number of shows in the library").unwrap()
});

pub static QUEUE_LENGTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("medusa_queue_length", "Items waiting in each queue"),
        &["queue"],
    )
    .unwrap()
});

pub static QUEUE_BUSY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("medusa_queue_busy", "1 while a queue item is running"),
        &["queue"],
    )
    .unwrap()
});

pub static CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("medusa_provider_cache_entries", "Rows in the provider cache").unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP metrics
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // State gauges
    registry.register(Box::new(SHOWS_TOTAL.clone())).unwrap();
    registry.register(Box::new(QUEUE_LENGTH.clone())).unwrap();
    registry.register(Box::new(QUEUE_BUSY.clone())).unwrap();
    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();

    // Core metrics (queues, schedulers, providers, snatches, post-processing)
    for metric in medusa_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from the current application state before a scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(shows) = state.library().list_shows() {
        SHOWS_TOTAL.set(shows.len() as i64);
    }

    for queue in state.queues() {
        QUEUE_LENGTH
            .with_label_values(&[queue.name()])
            .set(queue.len() as i64);
        QUEUE_BUSY
            .with_label_values(&[queue.name()])
            .set(i64::from(queue.is_busy()));
    }

    if let Ok(stats) = state.cache().stats() {
        CACHE_ENTRIES.set(stats.total as i64);
    }
}

static UUID_RE: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .expect("valid uuid regex")
});

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let path = UUID_RE.replace_all(path, "{id}");
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
