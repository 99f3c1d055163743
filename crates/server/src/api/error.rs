//! Error responses for the conversion and download endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use transmute_core::DispatchError;

/// Body of a failed conversion request.
#[derive(Debug, Serialize)]
pub struct ConvertErrorResponse {
    pub success: bool,
    pub error: String,
    pub details: String,
}

/// Body of a failed download request.
#[derive(Debug, Serialize)]
pub struct DownloadErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub code: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    /// Conversion did not produce an artifact.
    Conversion(DispatchError),
    /// Upload body exceeded the configured limit.
    FileTooLarge { limit: u64 },
    /// The multipart body could not be read.
    InvalidUpload(String),
    DownloadExpired,
    FileNotFound,
    InvalidFilename,
    DownloadError(String),
}

impl ApiError {
    fn download(status: StatusCode, code: &'static str, message: String) -> Response {
        (
            status,
            Json(DownloadErrorResponse {
                error: code,
                message,
                code,
            }),
        )
            .into_response()
    }

    fn convert(status: StatusCode, error: impl Into<String>, details: String) -> Response {
        (
            status,
            Json(ConvertErrorResponse {
                success: false,
                error: error.into(),
                details,
            }),
        )
            .into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self::Conversion(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Conversion(e) => {
                let status = if e.is_validation() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                Self::convert(status, e.label(), e.to_string())
            }
            ApiError::FileTooLarge { limit } => Self::convert(
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                format!("Uploads are limited to {} bytes", limit),
            ),
            ApiError::InvalidUpload(details) => {
                Self::convert(StatusCode::BAD_REQUEST, "Invalid upload", details)
            }
            ApiError::DownloadExpired => Self::download(
                StatusCode::GONE,
                "DOWNLOAD_EXPIRED",
                "This download has expired. Please convert the file again.".to_string(),
            ),
            ApiError::FileNotFound => Self::download(
                StatusCode::NOT_FOUND,
                "FILE_NOT_FOUND",
                "The requested file does not exist.".to_string(),
            ),
            ApiError::InvalidFilename => Self::download(
                StatusCode::BAD_REQUEST,
                "INVALID_FILENAME",
                "The requested filename is not valid.".to_string(),
            ),
            ApiError::DownloadError(message) => {
                Self::download(StatusCode::INTERNAL_SERVER_ERROR, "DOWNLOAD_ERROR", message)
            }
        }
    }
}
