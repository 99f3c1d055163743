//! Upload and conversion endpoint.

use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use transmute_core::{ConversionOptions, DispatchError, UploadedFile};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    pub download_url: String,
    pub original_name: String,
    pub converted_name: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/convert
///
/// Multipart fields: `file` (required), `format` (required),
/// `useCompression` and `quality` (optional).
pub async fn convert(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let mut upload: Option<UploadedFile> = None;
    let mut format: Option<String> = None;
    let mut use_compression: Option<String> = None;
    let mut quality: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(ApiError::InvalidUpload(e.body_text())),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                upload = Some(receive_file(&state, field).await?);
            }
            "format" => format = Some(read_text(field).await?),
            "useCompression" => use_compression = Some(read_text(field).await?),
            "quality" => quality = Some(read_text(field).await?),
            _ => {}
        }
    }

    let upload = upload.ok_or(DispatchError::MissingFile)?;
    let format = format
        .filter(|f| !f.trim().is_empty())
        .ok_or(DispatchError::MissingFormat)?;
    let options = ConversionOptions::from_form(quality.as_deref(), use_compression.as_deref());

    tracing::debug!(
        file = upload.original_name(),
        size = upload.size(),
        format = %format,
        "Conversion requested"
    );

    let artifact = state
        .dispatcher()
        .handle_conversion(upload, &format, options)
        .await
        .into_result()?;

    Ok(Json(ConvertResponse {
        success: true,
        message: "File converted successfully".to_string(),
        download_url: format!(
            "/api/download/{}",
            urlencoding::encode(&artifact.converted_name)
        ),
        original_name: artifact.original_name,
        converted_name: artifact.converted_name,
    }))
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.body_text()))
}

/// Streams the `file` field to disk chunk by chunk, enforcing the upload limit.
///
/// The returned guard owns the file; on any error it is dropped and the
/// partial file removed.
async fn receive_file(state: &AppState, mut field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let storage = &state.config().storage;
    let original_name = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .ok_or(DispatchError::MissingFile)?;

    tokio::fs::create_dir_all(&storage.upload_dir)
        .await
        .map_err(DispatchError::Io)?;
    let mut upload = UploadedFile::reserve(&storage.upload_dir, &original_name);
    let mut file = tokio::fs::File::create(upload.path())
        .await
        .map_err(DispatchError::Io)?;

    let mut received: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => return Err(ApiError::InvalidUpload(e.body_text())),
        };
        received += chunk.len() as u64;
        if received > storage.max_upload_bytes {
            tracing::info!(
                file = %original_name,
                limit = storage.max_upload_bytes,
                "Upload rejected, too large"
            );
            return Err(ApiError::FileTooLarge {
                limit: storage.max_upload_bytes,
            });
        }
        file.write_all(&chunk).await.map_err(DispatchError::Io)?;
    }
    file.flush().await.map_err(DispatchError::Io)?;
    drop(file);

    if received == 0 {
        return Err(DispatchError::MissingFile.into());
    }
    upload.set_size(received);
    Ok(upload)
}
