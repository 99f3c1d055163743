//! Canonical file-format identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Extensions made of two dot-separated parts that must be recognised as one.
const COMPOUND_EXTENSIONS: &[&str] = &[".tar.gz"];

/// A file format, stored as a lower-cased extension with exactly one
/// leading dot (e.g. `.md`, `.tar.gz`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Format(String);

impl Format {
    /// Parses a user supplied format (`"md"`, `".MD"`, `"..md"`).
    ///
    /// Returns `None` for empty input or input containing path separators
    /// or whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace())
        {
            return None;
        }
        Some(Self(format!(".{}", trimmed)))
    }

    /// Extracts the format from a filename, recognising `.tar.gz`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename)
            .to_ascii_lowercase();

        for compound in COMPOUND_EXTENSIONS {
            if name.len() > compound.len() && name.ends_with(compound) {
                return Some(Self((*compound).to_string()));
            }
        }

        let ext = Path::new(&name).extension()?.to_str()?;
        Self::parse(ext)
    }

    /// The canonical form, including the leading dot.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The extension without its leading dot, as external tools expect it.
    pub fn bare(&self) -> &str {
        &self.0[1..]
    }

    /// Whether this format equals one of the given canonical extensions.
    pub fn is_any(&self, candidates: &[&str]) -> bool {
        candidates.contains(&self.as_str())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.0
    }
}

impl TryFrom<String> for Format {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid format: {value:?}"))
    }
}

/// Strips the format extension from a filename, leaving the stem.
pub fn strip_format(filename: &str, format: &Format) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(format.as_str()) {
        base[..base.len() - format.as_str().len()].to_string()
    } else {
        base.to_string()
    }
}
