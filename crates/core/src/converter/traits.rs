//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::PathBuf;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::types::{ConversionJob, SupportedFormats};
use crate::classifier::Category;

/// One concrete tool or library able to perform (part of) a category's
/// conversions.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the name of this backend, used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the backend is present in the given capability set.
    fn is_available(&self, capabilities: &ToolCapabilities) -> bool;

    /// Formats this backend can read.
    fn input_formats(&self) -> &[&'static str];

    /// Formats this backend can write.
    fn output_formats(&self) -> &[&'static str];

    /// Whether this backend can perform this exact transformation.
    fn can_convert(&self, job: &ConversionJob) -> bool {
        job.input_format.is_any(self.input_formats())
            && job.output_format.is_any(self.output_formats())
    }

    /// Performs the conversion, writing `job.output_path`.
    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError>;
}

/// Converts files within one category.
#[async_trait]
pub trait Converter: Send + Sync {
    fn category(&self) -> Category;

    /// Formats convertible with the given capabilities.
    fn supported_formats(&self, capabilities: &ToolCapabilities) -> SupportedFormats;

    /// Converts `job.input_path` into `job.output_path`, returning the
    /// output path. The caller owns deletion of the input.
    async fn convert(
        &self,
        job: &ConversionJob,
        capabilities: &ToolCapabilities,
    ) -> Result<PathBuf, ConverterError>;
}
