//! Request-level conversion orchestration.
//!
//! [`ConversionDispatcher::handle_conversion`] classifies an upload, hands
//! it to the right converter, deletes the upload, and registers the output
//! with the [`ArtifactLifecycleManager`].

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::classifier::{Category, FileClassifier};
use crate::converter::{
    CapabilityProbe, ConversionJob, ConversionOptions, ConverterError, ConverterRegistry,
};
use crate::format::Format;
use crate::lifecycle::ArtifactLifecycleManager;
use crate::metrics;
use crate::upload::{output_name_for, UploadedFile};

/// Why a conversion request did not produce an artifact.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("No target format specified")]
    MissingFormat,

    #[error("Unsupported file type {extension}; supported categories: {categories}")]
    UnsupportedFileType {
        extension: String,
        categories: String,
    },

    #[error(transparent)]
    Conversion(#[from] ConverterError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DispatchError {
    /// Client mistakes, answered with 400 and never retried.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::MissingFile | Self::MissingFormat | Self::UnsupportedFileType { .. } => true,
            Self::Conversion(e) => e.is_validation(),
            Self::Io(_) => false,
        }
    }

    /// Short label used as the `error` field of API responses.
    pub fn label(&self) -> &'static str {
        if self.is_validation() {
            "Invalid conversion request"
        } else {
            "Conversion failed"
        }
    }
}

/// A successfully converted file awaiting download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedArtifact {
    pub original_name: String,
    pub converted_name: String,
    #[serde(skip)]
    pub output_path: PathBuf,
    pub category: Category,
    pub input_format: Format,
    pub output_format: Format,
}

/// Outcome of [`ConversionDispatcher::handle_conversion`].
#[derive(Debug)]
pub enum ConversionResult {
    Success(ConvertedArtifact),
    Failure(DispatchError),
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Human readable outcome.
    pub fn message(&self) -> String {
        match self {
            Self::Success(_) => "File converted successfully".to_string(),
            Self::Failure(e) => e.to_string(),
        }
    }

    pub fn into_result(self) -> Result<ConvertedArtifact, DispatchError> {
        match self {
            Self::Success(artifact) => Ok(artifact),
            Self::Failure(e) => Err(e),
        }
    }
}

/// Classifies, converts and registers uploads.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ConversionDispatcher {
    classifier: FileClassifier,
    registry: ConverterRegistry,
    probe: Arc<CapabilityProbe>,
    lifecycle: ArtifactLifecycleManager,
}

impl ConversionDispatcher {
    pub fn new(
        registry: ConverterRegistry,
        probe: Arc<CapabilityProbe>,
        lifecycle: ArtifactLifecycleManager,
    ) -> Self {
        Self {
            classifier: FileClassifier::new(),
            registry,
            probe,
            lifecycle,
        }
    }

    pub fn classifier(&self) -> &FileClassifier {
        &self.classifier
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        &self.probe
    }

    pub fn lifecycle(&self) -> &ArtifactLifecycleManager {
        &self.lifecycle
    }

    /// Converts `upload` into `target_format`.
    ///
    /// The upload is deleted before this returns, whatever the outcome.
    pub async fn handle_conversion(
        &self,
        upload: UploadedFile,
        target_format: &str,
        options: ConversionOptions,
    ) -> ConversionResult {
        let started = Instant::now();
        let category = self.classifier.classify(upload.original_name());

        let result = self.convert_upload(&upload, target_format, options).await;
        upload.release().await;

        let label = category.as_str();
        metrics::CONVERSION_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(artifact) => {
                self.lifecycle.track(&artifact.converted_name).await;
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[label, "success"])
                    .inc();
                tracing::info!(
                    original = %artifact.original_name,
                    converted = %artifact.converted_name,
                    category = label,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Conversion completed"
                );
                ConversionResult::Success(artifact)
            }
            Err(e) => {
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[label, "failure"])
                    .inc();
                if e.is_validation() {
                    tracing::info!(category = label, error = %e, "Conversion rejected");
                } else {
                    tracing::warn!(category = label, error = %e, "Conversion failed");
                }
                ConversionResult::Failure(e)
            }
        }
    }

    async fn convert_upload(
        &self,
        upload: &UploadedFile,
        target_format: &str,
        options: ConversionOptions,
    ) -> Result<ConvertedArtifact, DispatchError> {
        let target = Format::parse(target_format).ok_or(DispatchError::MissingFormat)?;
        let original_name = upload.original_name();

        let (input_format, category) = match upload.format() {
            Some(format) => {
                let category = Category::of_format(&format);
                (format, category)
            }
            None => {
                return Err(self.unsupported(original_name));
            }
        };
        if category == Category::Unknown {
            return Err(self.unsupported(original_name));
        }

        // Any input may be packed into an archive.
        let route = if Category::of_format(&target) == Category::Archive {
            Category::Archive
        } else {
            category
        };

        let converted_name = output_name_for(original_name, Some(&input_format), &target);
        let output_path = self.lifecycle.path_for(&converted_name);
        tokio::fs::create_dir_all(self.lifecycle.output_dir()).await?;

        let job = ConversionJob::new(
            upload.path(),
            &output_path,
            input_format.clone(),
            target.clone(),
        )
        .with_source_name(original_name)
        .with_options(options);

        let capabilities = self.probe.snapshot();
        let converter = self
            .registry
            .get(route)
            .ok_or_else(|| ConverterError::NoBackendAvailable {
                category: route,
                input: input_format.clone(),
                output: target.clone(),
            })?;

        converter.convert(&job, &capabilities).await?;

        Ok(ConvertedArtifact {
            original_name: original_name.to_string(),
            converted_name,
            output_path,
            category: route,
            input_format,
            output_format: target,
        })
    }

    fn unsupported(&self, original_name: &str) -> DispatchError {
        let extension = Format::from_filename(original_name)
            .map(|f| f.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let categories = self
            .classifier
            .list_supported_formats()
            .iter()
            .map(|(category, extensions)| format!("{}: {}", category, extensions.join(" ")))
            .collect::<Vec<_>>()
            .join("; ");
        DispatchError::UnsupportedFileType {
            extension,
            categories,
        }
    }
}
