//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Transmute server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Downloads by outcome
//! - Tracked artifacts (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

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
            "transmute_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmute_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Artifact Metrics
// =============================================================================

/// Downloads by outcome.
pub static DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_downloads_total", "Download attempts by result"),
        &["result"], // result: "completed", "expired", "not_found", "error"
    )
    .unwrap()
});

/// Artifacts awaiting download (collected dynamically).
pub static ARTIFACTS_TRACKED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmute_artifacts_tracked",
        "Number of converted artifacts awaiting download",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Artifacts
    registry
        .register(Box::new(DOWNLOADS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(ARTIFACTS_TRACKED.clone()))
        .unwrap();

    // Core metrics (conversions, backends, expiry)
    for metric in transmute_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    ARTIFACTS_TRACKED.set(state.lifecycle().tracked_count().await as i64);
}

static DOWNLOAD_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/api/download/)[^/]+$").expect("valid pattern"));

/// Normalize a path for metric labels (artifact names become a placeholder).
pub fn normalize_path(path: &str) -> String {
    DOWNLOAD_PATH.replace(path, "${1}{filename}").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_download() {
        let path = "/api/download/report-1a2b3c4d.md";
        assert_eq!(normalize_path(path), "/api/download/{filename}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/health"), "/api/health");
        assert_eq!(normalize_path("/api/cleanup/stats"), "/api/cleanup/stats");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("transmute_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        DOWNLOADS_TOTAL.with_label_values(&["completed"]).inc();
        ARTIFACTS_TRACKED.set(0);
        transmute_core::metrics::CONVERSIONS_TOTAL
            .with_label_values(&["document", "success"])
            .inc();

        let output = encode_metrics();

        assert!(output.contains("transmute_http_request_duration_seconds"));
        assert!(output.contains("transmute_http_requests_in_flight"));
        assert!(output.contains("transmute_downloads_total"));
        assert!(output.contains("transmute_artifacts_tracked"));
        assert!(output.contains("transmute_conversions_total"));
    }
}
