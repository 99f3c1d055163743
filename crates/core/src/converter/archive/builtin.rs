//! In-process zip, tar and gzip handling.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{collect_entries, sanitize_entry_name, ArchiveBackend};
use crate::converter::capabilities::ToolCapabilities;
use crate::converter::error::ConverterError;
use crate::converter::types::ConversionOptions;
use crate::format::Format;

const FORMATS: &[&str] = &[".zip", ".tar", ".tar.gz", ".tgz", ".gz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Zip,
    Tar,
    TarGz,
    Gz,
}

impl Kind {
    fn of(format: &Format) -> Result<Self, ConverterError> {
        match format.as_str() {
            ".zip" => Ok(Kind::Zip),
            ".tar" => Ok(Kind::Tar),
            ".tar.gz" | ".tgz" => Ok(Kind::TarGz),
            ".gz" => Ok(Kind::Gz),
            other => Err(ConverterError::Archive(format!(
                "unsupported archive format {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinArchiveBackend;

impl BuiltinArchiveBackend {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(work: F) -> Result<T, ConverterError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ConverterError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConverterError::Archive(format!("archive task failed: {}", e)))?
}

#[async_trait]
impl ArchiveBackend for BuiltinArchiveBackend {
    fn name(&self) -> &str {
        "builtin-archive"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.archive_builtin
    }

    fn readable(&self) -> &[&'static str] {
        FORMATS
    }

    fn writable(&self) -> &[&'static str] {
        FORMATS
    }

    async fn extract(
        &self,
        archive: &Path,
        format: &Format,
        dest: &Path,
        source_name: &str,
    ) -> Result<(), ConverterError> {
        let kind = Kind::of(format)?;
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let member = gz_member_name(source_name);
        blocking(move || match kind {
            Kind::Zip => extract_zip(&archive, &dest),
            Kind::Tar => extract_tar(File::open(&archive)?, &dest),
            Kind::TarGz => extract_tar(GzDecoder::new(File::open(&archive)?), &dest),
            Kind::Gz => {
                let mut decoder = GzDecoder::new(BufReader::new(File::open(&archive)?));
                let mut out = BufWriter::new(File::create(dest.join(member))?);
                io::copy(&mut decoder, &mut out)?;
                out.flush()?;
                Ok(())
            }
        })
        .await
    }

    async fn create(
        &self,
        source: &Path,
        format: &Format,
        archive: &Path,
        options: &ConversionOptions,
    ) -> Result<(), ConverterError> {
        let kind = Kind::of(format)?;
        let source = source.to_path_buf();
        let archive = archive.to_path_buf();
        let compress = options.compress;
        blocking(move || {
            if let Some(parent) = archive.parent() {
                fs::create_dir_all(parent)?;
            }
            let entries = collect_entries(&source)?;
            let level = if compress {
                Compression::best()
            } else {
                Compression::default()
            };
            match kind {
                Kind::Zip => create_zip(&source, &entries, &archive, compress),
                Kind::Tar => {
                    let file = BufWriter::new(File::create(&archive)?);
                    let mut out = create_tar(&source, &entries, file)?;
                    out.flush()?;
                    Ok(())
                }
                Kind::TarGz => {
                    let encoder = GzEncoder::new(BufWriter::new(File::create(&archive)?), level);
                    let encoder = create_tar(&source, &entries, encoder)?;
                    encoder.finish()?.flush()?;
                    Ok(())
                }
                Kind::Gz => {
                    let [only] = entries.as_slice() else {
                        return Err(ConverterError::invalid_input(format!(
                            "gzip holds exactly one file, got {}",
                            entries.len()
                        )));
                    };
                    let mut input = BufReader::new(File::open(source.join(only))?);
                    let mut encoder =
                        GzEncoder::new(BufWriter::new(File::create(&archive)?), level);
                    io::copy(&mut input, &mut encoder)?;
                    encoder.finish()?.flush()?;
                    Ok(())
                }
            }
        })
        .await
    }

    async fn list(
        &self,
        archive: &Path,
        format: &Format,
        source_name: &str,
    ) -> Result<Vec<String>, ConverterError> {
        let kind = Kind::of(format)?;
        let archive = archive.to_path_buf();
        let member = gz_member_name(source_name);
        blocking(move || match kind {
            Kind::Zip => list_zip(&archive),
            Kind::Tar => list_tar(File::open(&archive)?),
            Kind::TarGz => list_tar(GzDecoder::new(File::open(&archive)?)),
            Kind::Gz => Ok(vec![member]),
        })
        .await
    }
}

/// Name of the single member of a bare gzip stream.
fn gz_member_name(source_name: &str) -> String {
    let base = Path::new(source_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = base.to_ascii_lowercase();
    let stem = if lower.ends_with(".gz") {
        &base[..base.len() - 3]
    } else {
        base.as_str()
    };
    sanitize_entry_name(stem).unwrap_or_else(|| "data".to_string())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ConverterError> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!(entry = entry.name(), "Skipping unsafe zip entry");
            continue;
        };
        let target = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&target)?);
        io::copy(&mut entry, &mut out)?;
        out.flush()?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), ConverterError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if !(entry_type.is_file() || entry_type.is_dir()) {
            tracing::debug!(?entry_type, "Skipping non-regular tar entry");
            continue;
        }
        if !entry.unpack_in(dest)? {
            tracing::warn!("Skipping unsafe tar entry");
        }
    }
    Ok(())
}

fn create_zip(
    source: &Path,
    entries: &[String],
    archive: &Path,
    compress: bool,
) -> Result<(), ConverterError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(if compress { 9 } else { 6 }));
    for name in entries {
        zip.start_file(name.as_str(), options)?;
        let mut input = BufReader::new(File::open(source.join(name))?);
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?.flush()?;
    Ok(())
}

fn create_tar<W: Write>(source: &Path, entries: &[String], writer: W) -> Result<W, ConverterError> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);
    for name in entries {
        let path: PathBuf = source.join(name);
        builder.append_path_with_name(&path, name)?;
    }
    Ok(builder.into_inner()?)
}

fn list_zip(archive: &Path) -> Result<Vec<String>, ConverterError> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    let mut names = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(name) = sanitize_entry_name(entry.name()) {
            names.push(name);
        }
    }
    Ok(names)
}

fn list_tar<R: Read>(reader: R) -> Result<Vec<String>, ConverterError> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?;
        if let Some(name) = sanitize_entry_name(&path.to_string_lossy()) {
            names.push(name);
        }
    }
    Ok(names)
}
