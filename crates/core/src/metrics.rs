//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (outcomes and duration per category)
//! - Backends (failures that triggered a fallback)
//! - Artifact lifecycle (expiries)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by category and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_conversions_total", "Total conversions"),
        &["category", "result"], // result: "success", "failure"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmute_conversion_duration_seconds",
            "Duration of conversions",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0]),
        &["category"],
    )
    .unwrap()
});

/// Backend attempts that failed and fell through to the next backend.
pub static BACKEND_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transmute_backend_failures_total",
            "Total failed backend attempts",
        ),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Artifacts deleted because their download window elapsed.
pub static ARTIFACTS_EXPIRED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_artifacts_expired_total",
        "Total artifacts removed by expiry",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(BACKEND_FAILURES.clone()),
        Box::new(ARTIFACTS_EXPIRED.clone()),
    ]
}
