//! Filename → category classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::format::Format;

/// Semantic category of a file, derived from its extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Audio,
    Image,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    Unknown,
}

impl Category {
    /// All categories a file can be converted within, in advertisement order.
    pub const SUPPORTED: [Category; 7] = [
        Category::Video,
        Category::Audio,
        Category::Image,
        Category::Document,
        Category::Spreadsheet,
        Category::Presentation,
        Category::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Image => "image",
            Category::Document => "document",
            Category::Spreadsheet => "spreadsheet",
            Category::Presentation => "presentation",
            Category::Archive => "archive",
            Category::Unknown => "unknown",
        }
    }

    /// Extensions recognised for this category, in display order.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Video => &[
                ".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv", ".m4v", ".mpeg", ".mpg",
                ".3gp",
            ],
            Category::Audio => &[
                ".mp3", ".wav", ".ogg", ".flac", ".aac", ".m4a", ".wma", ".opus",
            ],
            Category::Image => &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".ico",
                ".svg",
            ],
            Category::Document => &[
                ".txt", ".md", ".markdown", ".html", ".htm", ".rtf", ".docx", ".doc", ".odt",
                ".pdf",
            ],
            Category::Spreadsheet => &[".csv", ".tsv", ".xlsx", ".xls", ".ods"],
            Category::Presentation => &[".pptx", ".ppt", ".odp"],
            Category::Archive => &[".zip", ".tar", ".tar.gz", ".tgz", ".gz", ".7z", ".rar"],
            Category::Unknown => &[],
        }
    }

    /// Category of a canonical format, `Unknown` if unrecognised.
    pub fn of_format(format: &Format) -> Category {
        Self::SUPPORTED
            .into_iter()
            .find(|category| format.is_any(category.extensions()))
            .unwrap_or(Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps filenames to categories using a fixed extension table.
///
/// Stateless; constructed once and shared so handlers do not reach for
/// globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileClassifier;

impl FileClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies a filename. Total: missing or unknown extensions yield
    /// [`Category::Unknown`].
    pub fn classify(&self, filename: &str) -> Category {
        Format::from_filename(filename)
            .map(|format| Category::of_format(&format))
            .unwrap_or(Category::Unknown)
    }

    pub fn is_supported(&self, filename: &str) -> bool {
        self.classify(filename) != Category::Unknown
    }

    /// The category → extensions table advertised to clients.
    pub fn list_supported_formats(&self) -> BTreeMap<Category, Vec<&'static str>> {
        Category::SUPPORTED
            .into_iter()
            .map(|category| (category, category.extensions().to_vec()))
            .collect()
    }
}

/// Best-effort MIME type for a filename, used when serving downloads.
pub fn content_type_for(filename: &str) -> &'static str {
    let Some(format) = Format::from_filename(filename) else {
        return "application/octet-stream";
    };
    match format.as_str() {
        ".mp4" | ".m4v" => "video/mp4",
        ".avi" => "video/x-msvideo",
        ".mov" => "video/quicktime",
        ".mkv" => "video/x-matroska",
        ".webm" => "video/webm",
        ".flv" => "video/x-flv",
        ".wmv" => "video/x-ms-wmv",
        ".mpeg" | ".mpg" => "video/mpeg",
        ".3gp" => "video/3gpp",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".ogg" => "audio/ogg",
        ".flac" => "audio/flac",
        ".aac" => "audio/aac",
        ".m4a" => "audio/mp4",
        ".wma" => "audio/x-ms-wma",
        ".opus" => "audio/opus",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".bmp" => "image/bmp",
        ".webp" => "image/webp",
        ".tiff" | ".tif" => "image/tiff",
        ".ico" => "image/x-icon",
        ".svg" => "image/svg+xml",
        ".txt" => "text/plain; charset=utf-8",
        ".md" | ".markdown" => "text/markdown; charset=utf-8",
        ".html" | ".htm" => "text/html; charset=utf-8",
        ".rtf" => "application/rtf",
        ".pdf" => "application/pdf",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".odt" => "application/vnd.oasis.opendocument.text",
        ".csv" => "text/csv; charset=utf-8",
        ".tsv" => "text/tab-separated-values; charset=utf-8",
        ".json" => "application/json",
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".ods" => "application/vnd.oasis.opendocument.spreadsheet",
        ".ppt" => "application/vnd.ms-powerpoint",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".odp" => "application/vnd.oasis.opendocument.presentation",
        ".zip" => "application/zip",
        ".tar" => "application/x-tar",
        ".tar.gz" | ".tgz" | ".gz" => "application/gzip",
        ".7z" => "application/x-7z-compressed",
        ".rar" => "application/vnd.rar",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_category() {
        let classifier = FileClassifier::new();
        assert_eq!(classifier.classify("clip.mp4"), Category::Video);
        assert_eq!(classifier.classify("song.FLAC"), Category::Audio);
        assert_eq!(classifier.classify("photo.png"), Category::Image);
        assert_eq!(classifier.classify("report.docx"), Category::Document);
        assert_eq!(classifier.classify("data.csv"), Category::Spreadsheet);
        assert_eq!(classifier.classify("deck.pptx"), Category::Presentation);
        assert_eq!(classifier.classify("backup.tar.gz"), Category::Archive);
    }

    #[test]
    fn test_classify_unknown_and_missing_extension() {
        let classifier = FileClassifier::new();
        assert_eq!(classifier.classify("binary.exe"), Category::Unknown);
        assert_eq!(classifier.classify("Makefile"), Category::Unknown);
        assert_eq!(classifier.classify(""), Category::Unknown);
        assert!(!classifier.is_supported("binary.exe"));
        assert!(classifier.is_supported("notes.txt"));
    }

    #[test]
    fn test_classify_is_deterministic_over_table() {
        let classifier = FileClassifier::new();
        for (category, extensions) in classifier.list_supported_formats() {
            for ext in extensions {
                let name = format!("file{}", ext);
                assert_eq!(classifier.classify(&name), category, "{}", name);
                assert_eq!(classifier.classify(&name), classifier.classify(&name));
            }
        }
    }

    #[test]
    fn test_extension_table_has_no_overlap() {
        let mut seen = std::collections::HashSet::new();
        for category in Category::SUPPORTED {
            for ext in category.extensions() {
                assert!(seen.insert(*ext), "duplicate extension {}", ext);
            }
        }
    }

    #[test]
    fn test_list_supported_formats_order() {
        let table = FileClassifier::new().list_supported_formats();
        assert_eq!(table.len(), 7);
        assert!(!table.contains_key(&Category::Unknown));
        assert_eq!(table[&Category::Document][0], ".txt");
    }

    #[test]
    fn test_supported_formats_serialize_with_category_keys() {
        let json = serde_json::to_value(FileClassifier::new().list_supported_formats()).unwrap();
        assert!(json["video"].as_array().unwrap().contains(&".mp4".into()));
        assert!(json["archive"].as_array().unwrap().contains(&".tar.gz".into()));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.md"), "text/markdown; charset=utf-8");
        assert_eq!(content_type_for("a.tar.gz"), "application/gzip");
        assert_eq!(content_type_for("a.unknown"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
