//! Built-in document conversion.
//!
//! Every input is parsed into a [`DocumentModel`] (a title plus ordered
//! paragraphs) and every output is rendered from it, so any supported input
//! pairs with any supported output.

mod parse;
mod render;

use async_trait::async_trait;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::ffmpeg::ensure_parent;
use super::traits::Backend;
use super::types::ConversionJob;

pub use parse::{parse_bytes, parse_file};
pub use render::render;

pub const PLACEHOLDER_TITLE: &str = "Untitled Document";
pub const PLACEHOLDER_PARAGRAPH: &str = "No readable content could be extracted.";
pub const FOOTER_TEXT: &str = "Converted by Transmute";

const BUILTIN_INPUTS: &[&str] = &[
    ".txt", ".md", ".markdown", ".html", ".htm", ".rtf", ".docx", ".odt", ".pdf",
];
const BUILTIN_OUTPUTS: &[&str] = &[".txt", ".md", ".html", ".rtf", ".docx"];

/// Format-neutral document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentModel {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl DocumentModel {
    /// Builds a model, substituting placeholders for a blank title or an
    /// empty paragraph list. A document holding only a title keeps it as
    /// its single paragraph.
    pub fn new(title: Option<String>, paragraphs: Vec<String>) -> Self {
        let paragraphs: Vec<String> = paragraphs
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| paragraphs.first().cloned());
        match (title, paragraphs.is_empty()) {
            (Some(title), true) => Self {
                paragraphs: vec![title.clone()],
                title,
            },
            (Some(title), false) => Self { title, paragraphs },
            (None, _) => Self {
                title: PLACEHOLDER_TITLE.to_string(),
                paragraphs: vec![PLACEHOLDER_PARAGRAPH.to_string()],
            },
        }
    }

    /// The model used when nothing could be read from the input.
    pub fn placeholder() -> Self {
        Self::new(None, Vec::new())
    }
}

/// Parses and renders documents without any external tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDocumentBackend;

impl BuiltinDocumentBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for BuiltinDocumentBackend {
    fn name(&self) -> &str {
        "builtin-document"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.document_builtin
    }

    fn input_formats(&self) -> &[&'static str] {
        BUILTIN_INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        BUILTIN_OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        let input = job.input_path.clone();
        let output = job.output_path.clone();
        let input_format = job.input_format.clone();
        let output_format = job.output_format.clone();

        tokio::task::spawn_blocking(move || {
            let model = parse_file(&input, &input_format)?;
            tracing::debug!(
                title = %model.title,
                paragraphs = model.paragraphs.len(),
                "Parsed document"
            );
            let bytes = render(&model, &output_format)?;
            std::fs::write(&output, bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| ConverterError::invalid_input(format!("document task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::testing::fixtures::{docx_bytes, write_file};
    use tempfile::TempDir;

    fn fmt(raw: &str) -> Format {
        Format::parse(raw).unwrap()
    }

    #[test]
    fn test_model_placeholders() {
        let model = DocumentModel::new(Some("   ".to_string()), vec!["".to_string()]);
        assert_eq!(model.title, PLACEHOLDER_TITLE);
        assert_eq!(model.paragraphs, vec![PLACEHOLDER_PARAGRAPH]);
    }

    #[test]
    fn test_title_falls_back_to_first_paragraph() {
        let model = DocumentModel::new(None, vec!["Intro".to_string(), "Body".to_string()]);
        assert_eq!(model.title, "Intro");
    }

    #[test]
    fn test_txt_markdown_txt_round_trip_keeps_paragraphs() {
        let source = "Quarterly report\n\nRevenue grew.\nCosts fell.\n\n\nOutlook is stable.\n";
        let original = parse_bytes(source.as_bytes(), &fmt("txt"));

        let markdown = render(&original, &fmt("md")).unwrap();
        let reparsed = parse_bytes(&markdown, &fmt("md"));
        let text = render(&reparsed, &fmt("txt")).unwrap();
        let back = parse_bytes(&text, &fmt("txt"));

        assert_eq!(back, original);
        assert_eq!(
            original.paragraphs,
            vec!["Quarterly report", "Revenue grew. Costs fell.", "Outlook is stable."]
        );
    }

    #[test]
    fn test_title_line_is_not_repeated_as_paragraph() {
        let model = parse_bytes(b"Quarterly report\n\nRevenue grew.\n", &fmt("txt"));

        let markdown = String::from_utf8(render(&model, &fmt("md")).unwrap()).unwrap();
        assert_eq!(
            markdown,
            "# Quarterly report\n\nRevenue grew.\n\n---\n\n*Converted by Transmute*\n"
        );

        let html = String::from_utf8(render(&model, &fmt("html")).unwrap()).unwrap();
        assert_eq!(html.matches("Quarterly report").count(), 2);
        assert!(!html.contains("<p>Quarterly report</p>"));
    }

    #[test]
    fn test_title_only_document_round_trips() {
        let model = parse_bytes(b"Just a title\n", &fmt("txt"));
        assert_eq!(model.paragraphs, vec!["Just a title"]);
        for target in ["md", "html", "docx", "rtf"] {
            let rendered = render(&model, &fmt(target)).unwrap();
            assert_eq!(parse_bytes(&rendered, &fmt(target)), model, "format {}", target);
        }
    }

    #[test]
    fn test_html_round_trip() {
        let model = DocumentModel::new(
            Some("A & B".to_string()),
            vec!["First <one>".to_string(), "Second".to_string()],
        );
        let html = render(&model, &fmt("html")).unwrap();
        let html_text = String::from_utf8(html.clone()).unwrap();
        assert!(html_text.contains("<title>A &amp; B</title>"));
        assert!(html_text.contains("<p>First &lt;one&gt;</p>"));
        assert_eq!(parse_bytes(&html, &fmt("html")), model);
    }

    #[test]
    fn test_rtf_round_trip() {
        let model = DocumentModel::new(
            Some("Title {braces}".to_string()),
            vec!["Back\\slash".to_string(), "Caf\u{e9}".to_string()],
        );
        let rtf = render(&model, &fmt("rtf")).unwrap();
        assert_eq!(parse_bytes(&rtf, &fmt("rtf")), model);
    }

    #[test]
    fn test_docx_round_trip() {
        let model = DocumentModel::new(
            Some("Minutes".to_string()),
            vec!["Attendees: all".to_string(), "Decisions: none".to_string()],
        );
        let docx = render(&model, &fmt("docx")).unwrap();
        assert_eq!(parse_bytes(&docx, &fmt("docx")), model);
    }

    #[test]
    fn test_malformed_docx_degrades_to_placeholder() {
        let model = parse_bytes(b"definitely not a zip", &fmt("docx"));
        assert_eq!(model, DocumentModel::placeholder());
    }

    #[tokio::test]
    async fn test_backend_docx_to_markdown() {
        let dir = TempDir::new().unwrap();
        let input = write_file(
            dir.path(),
            "report.docx",
            docx_bytes("Report", &["First point", "Second point"]),
        );
        let job = ConversionJob::new(
            input,
            dir.path().join("report.md"),
            fmt("docx"),
            fmt("md"),
        );
        BuiltinDocumentBackend::new().attempt(&job).await.unwrap();
        let markdown = std::fs::read_to_string(&job.output_path).unwrap();
        assert_eq!(
            markdown,
            "# Report\n\nFirst point\n\nSecond point\n\n---\n\n*Converted by Transmute*\n"
        );
    }

    #[test]
    fn test_builtin_formats() {
        let backend = BuiltinDocumentBackend::new();
        assert!(backend.input_formats().contains(&".pdf"));
        assert!(!backend.output_formats().contains(&".pdf"));
        assert!(!backend.input_formats().contains(&".doc"));
    }
}
