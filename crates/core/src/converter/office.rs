//! Office-suite, pandoc and Gnumeric backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::ffmpeg::ensure_parent;
use super::process::run_tool;
use super::traits::Backend;
use super::types::ConversionJob;
use crate::classifier::Category;
use crate::config::ToolsConfig;
use crate::format::Format;

const OFFICE_DOCUMENT_INPUTS: &[&str] = &[
    ".txt", ".html", ".htm", ".rtf", ".docx", ".doc", ".odt",
];
const OFFICE_DOCUMENT_OUTPUTS: &[&str] = &[".txt", ".html", ".rtf", ".docx", ".pdf", ".odt"];

const OFFICE_SPREADSHEET_INPUTS: &[&str] = &[".csv", ".xlsx", ".xls", ".ods"];
const OFFICE_SPREADSHEET_OUTPUTS: &[&str] = &[".csv", ".xlsx", ".xls", ".ods", ".html"];

const OFFICE_PRESENTATION_INPUTS: &[&str] = &[".pptx", ".ppt", ".odp"];
const OFFICE_PRESENTATION_OUTPUTS: &[&str] = &[".pptx", ".ppt", ".odp", ".pdf"];

const PANDOC_INPUTS: &[&str] = &[
    ".md", ".markdown", ".txt", ".html", ".htm", ".rtf", ".docx", ".odt",
];
const PANDOC_OUTPUTS: &[&str] = &[".md", ".txt", ".html", ".rtf", ".docx", ".odt"];

const SSCONVERT_INPUTS: &[&str] = &[".csv", ".tsv", ".xlsx", ".xls", ".ods"];
const SSCONVERT_OUTPUTS: &[&str] = &[".csv", ".xlsx", ".xls", ".ods", ".html"];

/// Which office-suite entry point to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeSuite {
    LibreOffice,
    Soffice,
}

/// Headless LibreOffice conversion for one category.
pub struct OfficeSuiteBackend {
    program: PathBuf,
    timeout_secs: u64,
    suite: OfficeSuite,
    category: Category,
}

impl OfficeSuiteBackend {
    pub fn new(tools: &ToolsConfig, suite: OfficeSuite, category: Category) -> Self {
        let program = match suite {
            OfficeSuite::LibreOffice => tools.libreoffice.clone(),
            OfficeSuite::Soffice => tools.soffice.clone(),
        };
        Self {
            program,
            timeout_secs: tools.timeout_secs,
            suite,
            category,
        }
    }

    /// Arguments for converting `job` into `outdir`. Each run gets its own
    /// user profile inside `outdir` so concurrent conversions do not fight
    /// over the profile lock.
    pub fn build_args(&self, job: &ConversionJob, outdir: &Path) -> Vec<String> {
        vec![
            format!("-env:UserInstallation=file://{}", outdir.join("profile").display()),
            "--headless".to_string(),
            "--norestore".to_string(),
            "--convert-to".to_string(),
            job.output_format.bare().to_string(),
            "--outdir".to_string(),
            outdir.to_string_lossy().to_string(),
            job.input_path.to_string_lossy().to_string(),
        ]
    }

    /// Where the suite writes its result: the input stem with the target
    /// extension, inside `outdir`.
    fn produced_path(job: &ConversionJob, outdir: &Path) -> PathBuf {
        let stem = job
            .input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        outdir.join(format!("{}.{}", stem, job.output_format.bare()))
    }
}

#[async_trait]
impl Backend for OfficeSuiteBackend {
    fn name(&self) -> &str {
        match self.suite {
            OfficeSuite::LibreOffice => "libreoffice",
            OfficeSuite::Soffice => "soffice",
        }
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        match self.suite {
            OfficeSuite::LibreOffice => capabilities.libreoffice,
            OfficeSuite::Soffice => capabilities.soffice,
        }
    }

    fn input_formats(&self) -> &[&'static str] {
        match self.category {
            Category::Spreadsheet => OFFICE_SPREADSHEET_INPUTS,
            Category::Presentation => OFFICE_PRESENTATION_INPUTS,
            _ => OFFICE_DOCUMENT_INPUTS,
        }
    }

    fn output_formats(&self) -> &[&'static str] {
        match self.category {
            Category::Spreadsheet => OFFICE_SPREADSHEET_OUTPUTS,
            Category::Presentation => OFFICE_PRESENTATION_OUTPUTS,
            _ => OFFICE_DOCUMENT_OUTPUTS,
        }
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        let outdir = TempDir::new()?;
        let args = self.build_args(job, outdir.path());
        run_tool(&self.program, args, Some(outdir.path()), self.timeout_secs).await?;

        let produced = Self::produced_path(job, outdir.path());
        if tokio::fs::metadata(&produced).await.is_err() {
            return Err(ConverterError::OutputMissing { path: produced });
        }
        tokio::fs::copy(&produced, &job.output_path).await?;
        Ok(())
    }
}

/// Document conversion through pandoc.
pub struct PandocBackend {
    program: PathBuf,
    timeout_secs: u64,
}

impl PandocBackend {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            program: tools.pandoc.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }

    pub fn build_args(&self, job: &ConversionJob) -> Vec<String> {
        vec![
            "-f".to_string(),
            pandoc_reader(&job.input_format).to_string(),
            "-t".to_string(),
            pandoc_writer(&job.output_format).to_string(),
            "-s".to_string(),
            "-o".to_string(),
            job.output_path.to_string_lossy().to_string(),
            job.input_path.to_string_lossy().to_string(),
        ]
    }
}

fn pandoc_reader(format: &Format) -> &'static str {
    match format.as_str() {
        ".html" | ".htm" => "html",
        ".rtf" => "rtf",
        ".docx" => "docx",
        ".odt" => "odt",
        _ => "markdown",
    }
}

fn pandoc_writer(format: &Format) -> &'static str {
    match format.as_str() {
        ".txt" => "plain",
        ".html" | ".htm" => "html",
        ".rtf" => "rtf",
        ".docx" => "docx",
        ".odt" => "odt",
        _ => "markdown",
    }
}

#[async_trait]
impl Backend for PandocBackend {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.pandoc
    }

    fn input_formats(&self) -> &[&'static str] {
        PANDOC_INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        PANDOC_OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        run_tool(&self.program, self.build_args(job), None, self.timeout_secs).await?;
        Ok(())
    }
}

/// Spreadsheet conversion through Gnumeric's `ssconvert`.
pub struct SsconvertBackend {
    program: PathBuf,
    timeout_secs: u64,
}

impl SsconvertBackend {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            program: tools.ssconvert.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }
}

#[async_trait]
impl Backend for SsconvertBackend {
    fn name(&self) -> &str {
        "ssconvert"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.ssconvert
    }

    fn input_formats(&self) -> &[&'static str] {
        SSCONVERT_INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        SSCONVERT_OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        run_tool(
            &self.program,
            [job.input_path.as_os_str(), job.output_path.as_os_str()],
            None,
            self.timeout_secs,
        )
        .await?;
        Ok(())
    }
}
