//! Artifact download endpoint.

use std::io;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, Response, StatusCode},
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use transmute_core::{content_type_for, ArtifactLifecycleManager};

use super::error::ApiError;
use crate::metrics::DOWNLOADS_TOTAL;
use crate::state::AppState;

/// Rejects names that could address anything outside the output directory.
fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '"'])
        && !name.contains("..")
        && !name.chars().any(char::is_control)
}

/// GET /api/download/{filename}
///
/// Streams the artifact, then deletes it and stops tracking it once the
/// last chunk has been handed to the client.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response<Body>, ApiError> {
    if !is_valid_filename(&filename) {
        return Err(ApiError::InvalidFilename);
    }

    let lifecycle = state.lifecycle();
    if lifecycle.is_expired(&filename).await {
        DOWNLOADS_TOTAL.with_label_values(&["expired"]).inc();
        tracing::debug!(file = %filename, "Download of expired artifact refused");
        return Err(ApiError::DownloadExpired);
    }

    let path = lifecycle.path_for(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            DOWNLOADS_TOTAL.with_label_values(&["not_found"]).inc();
            lifecycle.stop_tracking(&filename).await;
            return Err(ApiError::FileNotFound);
        }
        Err(e) => {
            DOWNLOADS_TOTAL.with_label_values(&["error"]).inc();
            return Err(ApiError::DownloadError(e.to_string()));
        }
    };
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::DownloadError(e.to_string()))?
        .len();

    let finished = {
        let lifecycle = lifecycle.clone();
        let filename = filename.clone();
        futures::stream::once(async move {
            finish_download(&lifecycle, &filename).await;
            Ok::<Bytes, io::Error>(Bytes::new())
        })
    };
    let body_stream = ReaderStream::new(file).chain(finished);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from_stream(body_stream))
        .map_err(|e| ApiError::DownloadError(format!("Failed to build response: {}", e)))
}

/// Runs after the file has been read to the end.
async fn finish_download(lifecycle: &ArtifactLifecycleManager, filename: &str) {
    lifecycle.stop_tracking(filename).await;
    let path = lifecycle.path_for(filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(file = %filename, error = %e, "Failed to remove downloaded artifact")
        }
    }
    DOWNLOADS_TOTAL.with_label_values(&["completed"]).inc();
    tracing::info!(file = %filename, "Download completed, artifact removed");
}
