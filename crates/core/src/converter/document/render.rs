//! Renders a [`DocumentModel`] into a target format.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use super::{DocumentModel, FOOTER_TEXT};
use crate::converter::error::ConverterError;
use crate::converter::markup::escape_markup;
use crate::format::Format;

/// Renders `model` as `format`.
pub fn render(model: &DocumentModel, format: &Format) -> Result<Vec<u8>, ConverterError> {
    match format.as_str() {
        ".txt" => Ok(render_text(model).into_bytes()),
        ".md" | ".markdown" => Ok(render_markdown(model).into_bytes()),
        ".html" | ".htm" => Ok(render_html(model).into_bytes()),
        ".rtf" => Ok(render_rtf(model).into_bytes()),
        ".docx" => render_docx(model),
        other => Err(ConverterError::invalid_input(format!(
            "no built-in renderer for {}",
            other
        ))),
    }
}

/// Paragraphs after the title. A first paragraph that is the title itself
/// (plain text input, where the title is the first line) is not repeated.
fn body(model: &DocumentModel) -> &[String] {
    match model.paragraphs.split_first() {
        Some((first, rest)) if *first == model.title => rest,
        _ => &model.paragraphs,
    }
}

fn render_text(model: &DocumentModel) -> String {
    let mut out = String::new();
    if model.paragraphs.first() != Some(&model.title) {
        out.push_str(&model.title);
        out.push_str("\n\n");
    }
    out.push_str(&model.paragraphs.join("\n\n"));
    out.push('\n');
    out
}

fn render_markdown(model: &DocumentModel) -> String {
    let mut out = format!("# {}\n\n", model.title);
    for paragraph in self::body(model) {
        out.push_str(paragraph);
        out.push_str("\n\n");
    }
    out.push_str("---\n\n");
    out.push_str(&format!("*{}*\n", FOOTER_TEXT));
    out
}

fn render_html(model: &DocumentModel) -> String {
    let title = escape_markup(&model.title);
    let mut out = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );
    for paragraph in self::body(model) {
        out.push_str(&format!("<p>{}</p>\n", escape_markup(paragraph)));
    }
    out.push_str(&format!("<footer>{}</footer>\n</body>\n</html>\n", FOOTER_TEXT));
    out
}

fn escape_rtf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
    out
}

fn render_rtf(model: &DocumentModel) -> String {
    let mut out = String::from("{\\rtf1\\ansi\\deff0{\\fonttbl{\\f0 Helvetica;}}\n");
    out.push_str(&format!("{{\\b\\fs32 {}}}\\par\n", escape_rtf(&model.title)));
    for paragraph in self::body(model) {
        out.push_str(&format!("{}\\par\n", escape_rtf(paragraph)));
    }
    out.push_str(&format!("{{\\i {}}}\\par\n}}\n", FOOTER_TEXT));
    out
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn docx_paragraph(text: &str, style: Option<&str>, italic: bool) -> String {
    let properties = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, s))
        .unwrap_or_default();
    let run_properties = if italic { "<w:rPr><w:i/></w:rPr>" } else { "" };
    format!(
        r#"<w:p>{}<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        properties,
        run_properties,
        escape_markup(text)
    )
}

/// A minimal WordprocessingML package: content types, package
/// relationships and the main document part.
fn render_docx(model: &DocumentModel) -> Result<Vec<u8>, ConverterError> {
    let mut body = docx_paragraph(&model.title, Some("Title"), false);
    for paragraph in self::body(model) {
        body.push_str(&docx_paragraph(paragraph, None, false));
    }
    body.push_str(&docx_paragraph(FOOTER_TEXT, None, true));

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default();
        for (name, contents) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/document.xml", document.as_str()),
        ] {
            zip.start_file(name, options)?;
            zip.write_all(contents.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> DocumentModel {
        DocumentModel::new(
            Some("Notes".to_string()),
            vec!["One".to_string(), "Two".to_string()],
        )
    }

    #[test]
    fn test_text_omits_duplicate_title() {
        let model = DocumentModel::new(None, vec!["Same".to_string(), "Next".to_string()]);
        assert_eq!(render_text(&model), "Same\n\nNext\n");
        assert_eq!(render_text(&self::model()), "Notes\n\nOne\n\nTwo\n");
    }

    #[test]
    fn test_markdown_layout() {
        assert_eq!(
            render_markdown(&model()),
            "# Notes\n\nOne\n\nTwo\n\n---\n\n*Converted by Transmute*\n"
        );
    }

    #[test]
    fn test_rtf_escapes_non_ascii() {
        assert_eq!(escape_rtf("a{b}\\"), "a\\{b\\}\\\\");
        assert_eq!(escape_rtf("\u{e9}"), "\\u233?");
        assert_eq!(escape_rtf("\u{1F600}"), "\\u-10179?\\u-8704?");
    }

    #[test]
    fn test_docx_contains_document_part() {
        let bytes = render(&model(), &Format::parse("docx").unwrap()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("word/document.xml").is_ok());
        assert!(archive.by_name("[Content_Types].xml").is_ok());
    }

    #[test]
    fn test_unsupported_output() {
        assert!(render(&model(), &Format::parse("pdf").unwrap()).is_err());
    }
}
