use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use transmute_core::converter::probed_paths;
use transmute_core::{Category, Config, LifecycleStats, SupportedFormats, ToolCapabilities};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub tracked_artifacts: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        tracked_artifacts: state.lifecycle().tracked_count().await,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// GET /api/formats
pub async fn formats(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<Category, Vec<&'static str>>> {
    Json(state.dispatcher().classifier().list_supported_formats())
}

/// GET /api/cleanup/stats
pub async fn cleanup_stats(State(state): State<Arc<AppState>>) -> Json<LifecycleStats> {
    Json(state.lifecycle().stats().await)
}

#[derive(Serialize)]
pub struct CapabilitiesResponse {
    /// Whether external tool detection has finished.
    pub ready: bool,
    pub present: Vec<&'static str>,
    pub tools: ToolCapabilities,
    /// Executable each external tool was looked up at.
    pub paths: BTreeMap<&'static str, PathBuf>,
    pub formats: BTreeMap<Category, SupportedFormats>,
}

/// GET /api/capabilities
pub async fn capabilities(State(state): State<Arc<AppState>>) -> Json<CapabilitiesResponse> {
    let tools = state.probe().snapshot();
    let formats = state.dispatcher().registry().supported_formats(&tools);
    Json(CapabilitiesResponse {
        ready: tools.probed,
        present: tools.present(),
        paths: probed_paths(&state.config().tools).into_iter().collect(),
        formats,
        tools,
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
