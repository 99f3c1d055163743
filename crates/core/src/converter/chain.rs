//! Ordered fallback over a category's backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::traits::{Backend, Converter};
use super::types::{ConversionJob, SupportedFormats};
use crate::classifier::Category;
use crate::metrics;

/// Tries a category's backends in fixed priority order until one succeeds.
///
/// Attempts are strictly sequential so two backends never write the same
/// output file at once.
pub struct ConverterChain {
    category: Category,
    backends: Vec<Arc<dyn Backend>>,
}

impl ConverterChain {
    pub fn new(category: Category, backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { category, backends }
    }

    /// Backend names in priority order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    fn validate(
        &self,
        job: &ConversionJob,
        supported: &SupportedFormats,
    ) -> Result<(), ConverterError> {
        if !supported.accepts_input(&job.input_format) {
            return Err(ConverterError::UnsupportedFormat {
                category: self.category,
                format: job.input_format.clone(),
                supported: supported.inputs.iter().map(ToString::to_string).collect(),
            });
        }
        if !supported.accepts_output(&job.output_format) {
            return Err(ConverterError::UnsupportedFormat {
                category: self.category,
                format: job.output_format.clone(),
                supported: supported.outputs.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for ConverterChain {
    fn category(&self) -> Category {
        self.category
    }

    fn supported_formats(&self, capabilities: &ToolCapabilities) -> SupportedFormats {
        let mut formats = SupportedFormats::default();
        for backend in self
            .backends
            .iter()
            .filter(|b| b.is_available(capabilities))
        {
            formats.extend(backend.input_formats(), backend.output_formats());
        }
        formats
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        capabilities: &ToolCapabilities,
    ) -> Result<PathBuf, ConverterError> {
        let supported = self.supported_formats(capabilities);
        if supported.inputs.is_empty() {
            return Err(ConverterError::NoBackendAvailable {
                category: self.category,
                input: job.input_format.clone(),
                output: job.output_format.clone(),
            });
        }
        self.validate(job, &supported)?;

        let mut last_failure: Option<(String, ConverterError)> = None;

        for backend in self
            .backends
            .iter()
            .filter(|b| b.is_available(capabilities) && b.can_convert(job))
        {
            tracing::debug!(
                backend = backend.name(),
                category = %self.category,
                input = %job.input_format,
                output = %job.output_format,
                "Attempting conversion"
            );

            let result = match backend.attempt(job).await {
                Ok(()) => match tokio::fs::metadata(&job.output_path).await {
                    Ok(meta) if meta.len() > 0 => Ok(()),
                    _ => Err(ConverterError::OutputMissing {
                        path: job.output_path.clone(),
                    }),
                },
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    tracing::debug!(backend = backend.name(), "Conversion succeeded");
                    return Ok(job.output_path.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        category = %self.category,
                        error = %e,
                        "Backend failed, falling through"
                    );
                    metrics::BACKEND_FAILURES
                        .with_label_values(&[backend.name()])
                        .inc();
                    // A partial output would be mistaken for a result by the next backend.
                    discard_output(&job.output_path).await;
                    last_failure = Some((backend.name().to_string(), e));
                }
            }
        }

        match last_failure {
            Some((last_backend, cause)) => {
                tracing::error!(
                    category = %self.category,
                    input = %job.input_format,
                    output = %job.output_format,
                    last_backend = %last_backend,
                    "All backends failed"
                );
                Err(ConverterError::AllBackendsFailed {
                    category: self.category,
                    input: job.input_format.clone(),
                    output: job.output_format.clone(),
                    last_backend,
                    cause: cause.terse(),
                })
            }
            None => Err(ConverterError::NoBackendAvailable {
                category: self.category,
                input: job.input_format.clone(),
                output: job.output_format.clone(),
            }),
        }
    }
}

/// Removes a rejected output so the next backend starts clean.
async fn discard_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Discarded partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "Failed to discard output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::testing::{AttemptLog, MockBackend};
    use tempfile::TempDir;

    fn job(dir: &TempDir, input: &str, output: &str) -> ConversionJob {
        let input_path = dir.path().join(format!("in{}", input));
        std::fs::write(&input_path, b"data").unwrap();
        ConversionJob::new(
            input_path,
            dir.path().join(format!("out{}", output)),
            Format::parse(input).unwrap(),
            Format::parse(output).unwrap(),
        )
    }

    fn caps() -> ToolCapabilities {
        ToolCapabilities::builtin_only()
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let dir = TempDir::new().unwrap();
        let log = AttemptLog::default();
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(MockBackend::succeeding("a", &[".png"], &[".jpg"]).with_log(&log)),
                Arc::new(MockBackend::succeeding("b", &[".png"], &[".jpg"]).with_log(&log)),
            ],
        );
        let job = job(&dir, ".png", ".jpg");
        let out = chain.convert(&job, &caps()).await.unwrap();
        assert_eq!(out, job.output_path);
        assert_eq!(log.names(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_falls_through_in_priority_order() {
        let dir = TempDir::new().unwrap();
        let log = AttemptLog::default();
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(MockBackend::failing("a", &[".png"], &[".jpg"]).with_log(&log)),
                Arc::new(MockBackend::failing("b", &[".png"], &[".jpg"]).with_log(&log)),
                Arc::new(MockBackend::succeeding("c", &[".png"], &[".jpg"]).with_log(&log)),
            ],
        );
        let job = job(&dir, ".png", ".jpg");
        chain.convert(&job, &caps()).await.unwrap();
        assert_eq!(log.names(), vec!["a", "b", "c"]);
        assert!(job.output_path.exists());
    }

    #[tokio::test]
    async fn test_all_fail_aggregates_last_cause() {
        let dir = TempDir::new().unwrap();
        let chain = ConverterChain::new(
            Category::Video,
            vec![
                Arc::new(MockBackend::failing("first", &[".mp4"], &[".gif"])),
                Arc::new(MockBackend::failing("second", &[".mp4"], &[".gif"])),
            ],
        );
        let job = job(&dir, ".mp4", ".gif");
        let err = chain.convert(&job, &caps()).await.unwrap_err();
        match &err {
            ConverterError::AllBackendsFailed {
                category,
                last_backend,
                cause,
                ..
            } => {
                assert_eq!(*category, Category::Video);
                assert_eq!(last_backend, "second");
                assert!(cause.contains("second"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!job.output_path.exists());
    }

    #[tokio::test]
    async fn test_success_without_output_falls_through() {
        let dir = TempDir::new().unwrap();
        let log = AttemptLog::default();
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(MockBackend::silent("liar", &[".png"], &[".jpg"]).with_log(&log)),
                Arc::new(MockBackend::succeeding("honest", &[".png"], &[".jpg"]).with_log(&log)),
            ],
        );
        let job = job(&dir, ".png", ".jpg");
        chain.convert(&job, &caps()).await.unwrap();
        assert_eq!(log.names(), vec!["liar", "honest"]);
    }

    #[tokio::test]
    async fn test_empty_output_falls_through() {
        let dir = TempDir::new().unwrap();
        let log = AttemptLog::default();
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(MockBackend::empty("hollow", &[".png"], &[".jpg"]).with_log(&log)),
                Arc::new(MockBackend::succeeding("honest", &[".png"], &[".jpg"]).with_log(&log)),
            ],
        );
        let job = job(&dir, ".png", ".jpg");
        chain.convert(&job, &caps()).await.unwrap();
        assert_eq!(log.names(), vec!["hollow", "honest"]);
        assert_eq!(
            std::fs::read_to_string(&job.output_path).unwrap(),
            "converted by honest"
        );
    }

    #[tokio::test]
    async fn test_only_empty_output_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let chain = ConverterChain::new(
            Category::Image,
            vec![Arc::new(MockBackend::empty("hollow", &[".png"], &[".jpg"]))],
        );
        let job = job(&dir, ".png", ".jpg");
        let err = chain.convert(&job, &caps()).await.unwrap_err();
        assert!(matches!(err, ConverterError::AllBackendsFailed { .. }));
        assert!(!job.output_path.exists());
    }

    #[tokio::test]
    async fn test_unsupported_output_names_supported_set() {
        let dir = TempDir::new().unwrap();
        let chain = ConverterChain::new(
            Category::Image,
            vec![Arc::new(MockBackend::succeeding("a", &[".png"], &[".jpg", ".gif"]))],
        );
        let err = chain
            .convert(&job(&dir, ".png", ".xyz"), &caps())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains(".jpg"));
        assert!(msg.contains(".gif"));
    }

    #[tokio::test]
    async fn test_unavailable_backends_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = AttemptLog::default();
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(
                    MockBackend::succeeding("tool", &[".png"], &[".jpg"])
                        .requiring_tool()
                        .with_log(&log),
                ),
                Arc::new(MockBackend::succeeding("lib", &[".png"], &[".jpg"]).with_log(&log)),
            ],
        );
        chain
            .convert(&job(&dir, ".png", ".jpg"), &caps())
            .await
            .unwrap();
        assert_eq!(log.names(), vec!["lib"]);
    }

    #[tokio::test]
    async fn test_empty_capabilities_report_no_backend() {
        let dir = TempDir::new().unwrap();
        let chain = ConverterChain::new(
            Category::Image,
            vec![Arc::new(MockBackend::succeeding("lib", &[".png"], &[".ico"]))],
        );
        let err = chain
            .convert(&job(&dir, ".png", ".ico"), &ToolCapabilities::none())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::NoBackendAvailable { category: Category::Image, .. }));
        assert!(err.to_string().contains("image"));
        assert!(err.to_string().contains("No image backend available"));
    }

    #[tokio::test]
    async fn test_supported_formats_follow_capabilities() {
        let chain = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(MockBackend::succeeding("tool", &[".svg"], &[".png"]).requiring_tool()),
                Arc::new(MockBackend::succeeding("lib", &[".png"], &[".jpg"])),
            ],
        );
        let builtin = chain.supported_formats(&caps());
        assert!(!builtin.accepts_input(&Format::parse("svg").unwrap()));
        let full = chain.supported_formats(&ToolCapabilities {
            ffmpeg: true,
            ..caps()
        });
        assert!(full.accepts_input(&Format::parse("svg").unwrap()));
        assert_eq!(chain.backend_names(), vec!["tool", "lib"]);
    }
}
