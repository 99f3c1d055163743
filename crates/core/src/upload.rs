//! Uploaded input files and their on-disk naming.

use std::io;
use std::path::{Path, PathBuf};

use crate::format::{strip_format, Format};

/// Longest sanitized filename kept, in characters.
const MAX_NAME_LEN: usize = 100;

/// Reduces a client-supplied filename to a safe single path component.
///
/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes
/// `_`. Directory parts and leading dots are dropped.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = if cleaned.chars().count() > MAX_NAME_LEN {
        // Keep the tail so the extension survives.
        let skip = cleaned.chars().count() - MAX_NAME_LEN;
        cleaned.chars().skip(skip).collect()
    } else {
        cleaned.to_string()
    };
    if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `<sanitized stem>-<8 hex><target>`; distinct for every call.
pub fn output_name_for(original_name: &str, input_format: Option<&Format>, target: &Format) -> String {
    let stem = match input_format {
        Some(format) => strip_format(original_name, format),
        None => original_name.to_string(),
    };
    let stem = sanitize_filename(&stem);
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}{}", stem, &id[..8], target)
}

/// One received file, owned by the request that received it.
///
/// The file is deleted by [`release`](Self::release) or, if that never
/// happens, when the value is dropped. Either way it is deleted once.
#[derive(Debug)]
pub struct UploadedFile {
    original_name: String,
    path: PathBuf,
    size: u64,
    released: bool,
}

impl UploadedFile {
    /// Claims a unique storage path in `upload_dir` for `original_name`.
    /// Nothing is written yet, but the guard already owns the path.
    pub fn reserve(upload_dir: &Path, original_name: &str) -> Self {
        let stored = format!(
            "{}-{}",
            uuid::Uuid::new_v4(),
            sanitize_filename(original_name)
        );
        Self {
            original_name: original_name.to_string(),
            path: upload_dir.join(stored),
            size: 0,
            released: false,
        }
    }

    /// Writes `bytes` into a freshly reserved path.
    pub async fn persist(upload_dir: &Path, original_name: &str, bytes: &[u8]) -> io::Result<Self> {
        let mut upload = Self::reserve(upload_dir, original_name);
        tokio::fs::create_dir_all(upload_dir).await?;
        tokio::fs::write(&upload.path, bytes).await?;
        upload.size = bytes.len() as u64;
        Ok(upload)
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// Format detected from the original name.
    pub fn format(&self) -> Option<Format> {
        Format::from_filename(&self.original_name)
    }

    /// Deletes the stored file. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Upload removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove upload")
            }
        }
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Upload removed on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove upload")
            }
        }
    }
}
