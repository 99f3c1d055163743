//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use crate::classifier::Category;
use crate::format::Format;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Input or output format is outside the category's supported set.
    #[error("Unsupported {category} format {format}; supported: {}", .supported.join(", "))]
    UnsupportedFormat {
        category: Category,
        format: Format,
        supported: Vec<String>,
    },

    /// No backend currently present can perform the transformation.
    #[error("No {category} backend available to convert {input} to {output}")]
    NoBackendAvailable {
        category: Category,
        input: Format,
        output: Format,
    },

    /// External tool binary not found.
    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// External tool exited unsuccessfully.
    #[error("{tool} exited with code {code:?}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// External tool did not finish in time.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Input could not be interpreted.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Backend reported success but produced nothing.
    #[error("Output file missing or empty: {path}")]
    OutputMissing { path: PathBuf },

    /// Archive codec failure.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Image codec failure.
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every backend in the chain failed.
    #[error("{category} conversion from {input} to {output} failed; last backend {last_backend}: {cause}")]
    AllBackendsFailed {
        category: Category,
        input: Format,
        output: Format,
        last_backend: String,
        cause: String,
    },
}

impl ConverterError {
    /// Creates a tool failure with captured stderr.
    pub fn tool_failed(tool: impl Into<String>, code: Option<i32>, stderr: Option<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            code,
            stderr,
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Whether this error is a request validation problem rather than a
    /// conversion failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }

    /// A short single-line cause, used when aggregating chain failures.
    pub fn terse(&self) -> String {
        match self {
            Self::ToolFailed {
                tool,
                code,
                stderr: Some(stderr),
            } => {
                let last_line = stderr
                    .lines()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("")
                    .trim();
                format!("{} exited with code {:?}: {}", tool, code, last_line)
            }
            other => other.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for ConverterError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

impl From<image::ImageError> for ConverterError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e.to_string())
    }
}
