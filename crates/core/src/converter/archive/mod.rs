//! Archive conversion: extract, create, transcode and list.
//!
//! Archive backends work on whole directories rather than single files, so
//! they sit behind [`ArchiveBackend`] instead of the per-file [`Backend`]
//! trait. [`ArchiveConverter`] runs the same ordered fallback over them.
//!
//! [`Backend`]: super::Backend

mod builtin;
mod sevenzip;

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{ConversionJob, ConversionOptions, SupportedFormats};
use crate::classifier::Category;
use crate::format::Format;
use crate::metrics;

pub use builtin::BuiltinArchiveBackend;
pub use sevenzip::SevenZipBackend;

/// Written next to extracted entries, one entry per line.
pub const MANIFEST_NAME: &str = "MANIFEST.txt";

/// Picks a manifest name that no extracted top-level entry uses.
pub fn manifest_name_for(entries: &[String]) -> String {
    if !entries.iter().any(|e| e == MANIFEST_NAME) {
        return MANIFEST_NAME.to_string();
    }
    (1..)
        .map(|n| format!("MANIFEST-{}.txt", n))
        .find(|candidate| !entries.iter().any(|e| e == candidate))
        .unwrap_or_else(|| MANIFEST_NAME.to_string())
}

/// One archive implementation.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool;

    /// Archive formats this backend can extract and list.
    fn readable(&self) -> &[&'static str];

    /// Archive formats this backend can create.
    fn writable(&self) -> &[&'static str];

    /// Extracts `archive` into the existing directory `dest`.
    ///
    /// `source_name` is the user-facing archive name, used to name the
    /// single member of a bare `.gz` stream.
    async fn extract(
        &self,
        archive: &Path,
        format: &Format,
        dest: &Path,
        source_name: &str,
    ) -> Result<(), ConverterError>;

    /// Archives the contents of directory `source` into `archive`.
    async fn create(
        &self,
        source: &Path,
        format: &Format,
        archive: &Path,
        options: &ConversionOptions,
    ) -> Result<(), ConverterError>;

    /// Entry names of `archive` without extracting it.
    async fn list(
        &self,
        archive: &Path,
        format: &Format,
        source_name: &str,
    ) -> Result<Vec<String>, ConverterError>;
}

/// Normalizes an archive entry name to a relative `/`-separated path.
///
/// Rejects absolute paths and any `..` component.
pub fn sanitize_entry_name(raw: &str) -> Option<String> {
    let normalized = raw.replace('\\', "/");
    let path = Path::new(&normalized);
    if path.is_absolute() {
        return None;
    }
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => parts.push(segment.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Relative names of every regular file under `dir`, sorted.
pub fn collect_entries(dir: &Path) -> Result<Vec<String>, ConverterError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| ConverterError::Archive(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ConverterError::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(name);
    }
    entries.sort();
    Ok(entries)
}

/// Runs archive operations over an ordered list of backends.
pub struct ArchiveConverter {
    backends: Vec<Arc<dyn ArchiveBackend>>,
}

impl ArchiveConverter {
    pub fn new(backends: Vec<Arc<dyn ArchiveBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    fn readers<'a>(
        &'a self,
        format: &'a Format,
        capabilities: &'a ToolCapabilities,
    ) -> impl Iterator<Item = &'a Arc<dyn ArchiveBackend>> + 'a {
        self.backends
            .iter()
            .filter(move |b| b.is_available(capabilities) && format.is_any(b.readable()))
    }

    fn writers<'a>(
        &'a self,
        format: &'a Format,
        capabilities: &'a ToolCapabilities,
    ) -> impl Iterator<Item = &'a Arc<dyn ArchiveBackend>> + 'a {
        self.backends
            .iter()
            .filter(move |b| b.is_available(capabilities) && format.is_any(b.writable()))
    }

    fn no_backend(&self, input: &Format, output: &Format) -> ConverterError {
        ConverterError::NoBackendAvailable {
            category: Category::Archive,
            input: input.clone(),
            output: output.clone(),
        }
    }

    fn all_failed(
        &self,
        input: &Format,
        output: &Format,
        last: Option<(String, ConverterError)>,
    ) -> ConverterError {
        match last {
            Some((last_backend, cause)) => ConverterError::AllBackendsFailed {
                category: Category::Archive,
                input: input.clone(),
                output: output.clone(),
                last_backend,
                cause: cause.terse(),
            },
            None => self.no_backend(input, output),
        }
    }

    fn record_failure(backend: &str, error: &ConverterError) {
        tracing::warn!(
            backend = backend,
            category = "archive",
            error = %error,
            "Backend failed, falling through"
        );
        metrics::BACKEND_FAILURES.with_label_values(&[backend]).inc();
    }

    /// Extracts `archive` into `dest` and writes the manifest there.
    /// Returns the extracted entry names, sorted.
    ///
    /// `dest` is emptied between failed attempts.
    pub async fn extract(
        &self,
        archive: &Path,
        format: &Format,
        dest: &Path,
        source_name: &str,
        capabilities: &ToolCapabilities,
    ) -> Result<Vec<String>, ConverterError> {
        self.extract_with_manifest(archive, format, dest, source_name, capabilities)
            .await
            .map(|(entries, _)| entries)
    }

    /// Like [`extract`](Self::extract), also returning the manifest path.
    /// The manifest never replaces an extracted entry.
    async fn extract_with_manifest(
        &self,
        archive: &Path,
        format: &Format,
        dest: &Path,
        source_name: &str,
        capabilities: &ToolCapabilities,
    ) -> Result<(Vec<String>, PathBuf), ConverterError> {
        let mut last = None;
        for backend in self.readers(format, capabilities) {
            reset_dir(dest).await?;
            tracing::debug!(backend = backend.name(), format = %format, "Extracting archive");
            match backend.extract(archive, format, dest, source_name).await {
                Ok(()) => {
                    let dir = dest.to_path_buf();
                    let entries = tokio::task::spawn_blocking(move || collect_entries(&dir))
                        .await
                        .map_err(|e| ConverterError::Archive(e.to_string()))??;
                    let mut manifest = entries.join("\n");
                    manifest.push('\n');
                    let manifest_path = dest.join(manifest_name_for(&entries));
                    tokio::fs::write(&manifest_path, manifest).await?;
                    return Ok((entries, manifest_path));
                }
                Err(e) => {
                    Self::record_failure(backend.name(), &e);
                    last = Some((backend.name().to_string(), e));
                }
            }
        }
        let _ = reset_dir(dest).await;
        Err(self.all_failed(format, format, last))
    }

    /// Archives a directory's contents into `archive`. Returns the archived
    /// entry names.
    pub async fn create_from_dir(
        &self,
        source: &Path,
        format: &Format,
        archive: &Path,
        options: &ConversionOptions,
        capabilities: &ToolCapabilities,
    ) -> Result<Vec<String>, ConverterError> {
        let dir = source.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || collect_entries(&dir))
            .await
            .map_err(|e| ConverterError::Archive(e.to_string()))??;

        let mut last = None;
        for backend in self.writers(format, capabilities) {
            tracing::debug!(backend = backend.name(), format = %format, "Creating archive");
            match backend.create(source, format, archive, options).await {
                Ok(()) if tokio::fs::metadata(archive).await.is_ok() => return Ok(entries),
                Ok(()) => {
                    let e = ConverterError::OutputMissing {
                        path: archive.to_path_buf(),
                    };
                    Self::record_failure(backend.name(), &e);
                    last = Some((backend.name().to_string(), e));
                }
                Err(e) => {
                    Self::record_failure(backend.name(), &e);
                    let _ = tokio::fs::remove_file(archive).await;
                    last = Some((backend.name().to_string(), e));
                }
            }
        }
        Err(self.all_failed(format, format, last))
    }

    /// Archives a single file under `entry_name`.
    pub async fn create_from_file(
        &self,
        file: &Path,
        entry_name: &str,
        format: &Format,
        archive: &Path,
        options: &ConversionOptions,
        capabilities: &ToolCapabilities,
    ) -> Result<Vec<String>, ConverterError> {
        let entry_name = sanitize_entry_name(entry_name)
            .and_then(|name| name.rsplit('/').next().map(str::to_string))
            .unwrap_or_else(|| "file".to_string());
        let staging = TempDir::new()?;
        tokio::fs::copy(file, staging.path().join(&entry_name)).await?;
        self.create_from_dir(staging.path(), format, archive, options, capabilities)
            .await
    }

    /// Re-packs an archive in another archive format through a fresh
    /// temporary directory, removed whether or not the conversion succeeds.
    pub async fn transcode(
        &self,
        job: &ConversionJob,
        capabilities: &ToolCapabilities,
    ) -> Result<Vec<String>, ConverterError> {
        let workspace = TempDir::new()?;
        let extracted = workspace.path().join("extracted");
        let (_, manifest) = self
            .extract_with_manifest(
                &job.input_path,
                &job.input_format,
                &extracted,
                &job.source_name,
                capabilities,
            )
            .await?;
        tokio::fs::remove_file(&manifest).await?;
        self.create_from_dir(
            &extracted,
            &job.output_format,
            &job.output_path,
            &job.options,
            capabilities,
        )
        .await
    }

    /// Entry names of `archive`, sorted.
    pub async fn list(
        &self,
        archive: &Path,
        format: &Format,
        source_name: &str,
        capabilities: &ToolCapabilities,
    ) -> Result<Vec<String>, ConverterError> {
        let mut last = None;
        for backend in self.readers(format, capabilities) {
            match backend.list(archive, format, source_name).await {
                Ok(mut entries) => {
                    entries.sort();
                    entries.dedup();
                    return Ok(entries);
                }
                Err(e) => {
                    Self::record_failure(backend.name(), &e);
                    last = Some((backend.name().to_string(), e));
                }
            }
        }
        Err(self.all_failed(format, format, last))
    }
}

async fn reset_dir(dir: &Path) -> Result<(), ConverterError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

#[async_trait]
impl Converter for ArchiveConverter {
    fn category(&self) -> Category {
        Category::Archive
    }

    fn supported_formats(&self, capabilities: &ToolCapabilities) -> SupportedFormats {
        let mut formats = SupportedFormats::default();
        for backend in self.backends.iter().filter(|b| b.is_available(capabilities)) {
            formats.extend(backend.readable(), backend.writable());
        }
        formats
    }

    /// Archive input: transcode. Any other input: pack the single file.
    async fn convert(
        &self,
        job: &ConversionJob,
        capabilities: &ToolCapabilities,
    ) -> Result<PathBuf, ConverterError> {
        let supported = self.supported_formats(capabilities);
        if supported.outputs.is_empty() {
            return Err(self.no_backend(&job.input_format, &job.output_format));
        }
        if !supported.accepts_output(&job.output_format) {
            return Err(ConverterError::UnsupportedFormat {
                category: Category::Archive,
                format: job.output_format.clone(),
                supported: supported.outputs.iter().map(ToString::to_string).collect(),
            });
        }

        let is_archive = Category::of_format(&job.input_format) == Category::Archive;
        let result = if is_archive {
            if !supported.accepts_input(&job.input_format) {
                return Err(ConverterError::UnsupportedFormat {
                    category: Category::Archive,
                    format: job.input_format.clone(),
                    supported: supported.inputs.iter().map(ToString::to_string).collect(),
                });
            }
            self.transcode(job, capabilities).await
        } else {
            self.create_from_file(
                &job.input_path,
                &job.source_name,
                &job.output_format,
                &job.output_path,
                &job.options,
                capabilities,
            )
            .await
        };

        match result {
            Ok(entries) => {
                tracing::debug!(entries = entries.len(), output = %job.output_path.display(), "Archive written");
                Ok(job.output_path.clone())
            }
            Err(e) => {
                tracing::error!(
                    category = "archive",
                    input = %job.input_format,
                    output = %job.output_format,
                    error = %e,
                    "Archive conversion failed"
                );
                let _ = tokio::fs::remove_file(&job.output_path).await;
                Err(e)
            }
        }
    }
}
