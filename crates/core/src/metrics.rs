//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Queues and schedulers
//! - Providers (requests, latency, results)
//! - Snatches and post-processing

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Queues and schedulers
// =============================================================================

/// Items added to a queue, by queue and action kind.
pub static QUEUE_ITEMS_ADDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_queue_items_added_total", "Total items added to queues"),
        &["queue", "kind"],
    )
    .unwrap()
});

/// Finished queue items by outcome.
pub static QUEUE_ITEMS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "medusa_queue_items_finished_total",
            "Total queue items finished",
        ),
        &["queue", "outcome"], // "success", "failure"
    )
    .unwrap()
});

pub static QUEUE_ITEM_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "medusa_queue_item_duration_seconds",
            "Time spent running a queue item",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
        &["queue"],
    )
    .unwrap()
});

pub static SCHEDULER_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_scheduler_runs_total", "Total scheduler runs"),
        &["scheduler", "trigger"], // "scheduled", "forced"
    )
    .unwrap()
});

// =============================================================================
// Providers
// =============================================================================

pub static PROVIDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_provider_requests_total", "Total provider requests"),
        &["provider", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

pub static PROVIDER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "medusa_provider_request_duration_seconds",
            "Duration of provider requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["provider", "operation"],
    )
    .unwrap()
});

/// Results returned by a search, after cache matching and filtering.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "medusa_search_results",
            "Number of candidate results per episode search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &["search"],
    )
    .unwrap()
});

// =============================================================================
// Snatches and post-processing
// =============================================================================

pub static SNATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("medusa_snatches_total", "Releases sent to download clients"),
        &["client", "status"],
    )
    .unwrap()
});

pub static POSTPROCESSED_FILES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "medusa_postprocessed_files_total",
            "Files handled by post-processing",
        ),
        &["result"], // "processed", "skipped", "failed"
    )
    .unwrap()
});

pub static CACHE_TRIMMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "medusa_cache_trimmed_total",
        "Provider cache rows removed by trimming",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record one provider request with its latency.
pub fn record_provider_request(provider: &str, operation: &str, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "error" };
    PROVIDER_REQUESTS
        .with_label_values(&[provider, operation, status])
        .inc();
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[provider, operation])
        .observe(elapsed.as_secs_f64());
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queues and schedulers
        Box::new(QUEUE_ITEMS_ADDED.clone()),
        Box::new(QUEUE_ITEMS_FINISHED.clone()),
        Box::new(QUEUE_ITEM_DURATION_SECONDS.clone()),
        Box::new(SCHEDULER_RUNS_TOTAL.clone()),
        // Providers
        Box::new(PROVIDER_REQUESTS.clone()),
        Box::new(PROVIDER_REQUEST_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Snatches and post-processing
        Box::new(SNATCHES_TOTAL.clone()),
        Box::new(POSTPROCESSED_FILES.clone()),
        Box::new(CACHE_TRIMMED.clone()),
    ]
}
