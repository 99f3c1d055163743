//! 7-Zip command line backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{sanitize_entry_name, ArchiveBackend};
use crate::config::ToolsConfig;
use crate::converter::capabilities::ToolCapabilities;
use crate::converter::error::ConverterError;
use crate::converter::process::run_tool;
use crate::converter::types::ConversionOptions;
use crate::format::Format;

const READABLE: &[&str] = &[".7z", ".rar", ".zip", ".tar", ".gz"];
const WRITABLE: &[&str] = &[".7z", ".zip", ".tar"];

pub struct SevenZipBackend {
    program: PathBuf,
    timeout_secs: u64,
}

impl SevenZipBackend {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            program: tools.sevenzip.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }

    pub fn extract_args(archive: &Path, dest: &Path) -> Vec<String> {
        vec![
            "x".to_string(),
            "-y".to_string(),
            format!("-o{}", dest.display()),
            archive.to_string_lossy().to_string(),
        ]
    }

    /// Arguments for archiving the working directory's contents.
    pub fn create_args(format: &Format, archive: &Path, compress: bool) -> Vec<String> {
        vec![
            "a".to_string(),
            format!("-t{}", format.bare()),
            "-y".to_string(),
            format!("-mx={}", if compress { 9 } else { 5 }),
            archive.to_string_lossy().to_string(),
            ".".to_string(),
        ]
    }
}

/// Parses `7z l -slt` output into file entry names.
pub fn parse_listing(output: &str) -> Vec<String> {
    let Some((_, body)) = output.split_once("\n----------") else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for block in body.split("\n\n") {
        let mut path = None;
        let mut is_folder = false;
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("Path = ") {
                path = Some(value.trim());
            } else if let Some(value) = line.strip_prefix("Folder = ") {
                is_folder = value.trim() == "+";
            } else if let Some(value) = line.strip_prefix("Attributes = ") {
                is_folder |= value.trim_start().starts_with('D');
            }
        }
        if is_folder {
            continue;
        }
        if let Some(name) = path.and_then(sanitize_entry_name) {
            names.push(name);
        }
    }
    names
}

#[async_trait]
impl ArchiveBackend for SevenZipBackend {
    fn name(&self) -> &str {
        "7z"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.sevenzip
    }

    fn readable(&self) -> &[&'static str] {
        READABLE
    }

    fn writable(&self) -> &[&'static str] {
        WRITABLE
    }

    async fn extract(
        &self,
        archive: &Path,
        _format: &Format,
        dest: &Path,
        _source_name: &str,
    ) -> Result<(), ConverterError> {
        run_tool(
            &self.program,
            Self::extract_args(archive, dest),
            None,
            self.timeout_secs,
        )
        .await?;
        Ok(())
    }

    async fn create(
        &self,
        source: &Path,
        format: &Format,
        archive: &Path,
        options: &ConversionOptions,
    ) -> Result<(), ConverterError> {
        // The tool runs inside `source`, so the archive path must not be
        // relative to the caller's directory.
        let archive = std::path::absolute(archive)?;
        if let Some(parent) = archive.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        run_tool(
            &self.program,
            Self::create_args(format, &archive, options.compress),
            Some(source),
            self.timeout_secs,
        )
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        archive: &Path,
        _format: &Format,
        _source_name: &str,
    ) -> Result<Vec<String>, ConverterError> {
        let output = run_tool(
            &self.program,
            vec![
                "l".to_string(),
                "-slt".to_string(),
                archive.to_string_lossy().to_string(),
            ],
            None,
            self.timeout_secs,
        )
        .await?;
        Ok(parse_listing(&output))
    }
}
