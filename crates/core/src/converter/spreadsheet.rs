//! Built-in handling of delimited spreadsheets (CSV and TSV).

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::ffmpeg::ensure_parent;
use super::markup::escape_markup;
use super::traits::Backend;
use super::types::ConversionJob;
use crate::format::Format;

const INPUTS: &[&str] = &[".csv", ".tsv"];
const OUTPUTS: &[&str] = &[".csv", ".tsv", ".json", ".html"];

pub type Table = Vec<Vec<String>>;

fn delimiter_for(format: &Format) -> char {
    if format.as_str() == ".tsv" {
        '\t'
    } else {
        ','
    }
}

/// Parses delimited text, honouring double-quoted fields with embedded
/// delimiters, doubled quotes and line breaks.
pub fn parse_delimited(text: &str, delimiter: char) -> Table {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    rows
}

fn quote_field(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn write_delimited(table: &Table, delimiter: char) -> String {
    let mut out = String::new();
    for row in table {
        let line: Vec<String> = row.iter().map(|f| quote_field(f, delimiter)).collect();
        out.push_str(&line.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

/// Header names with blanks and duplicates replaced by positional names.
fn header_names(header: &[String], width: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    for index in 0..width {
        let candidate = header.get(index).map(|h| h.trim()).unwrap_or("");
        let name = if candidate.is_empty() || names.iter().any(|n| n == candidate) {
            format!("column_{}", index + 1)
        } else {
            candidate.to_string()
        };
        names.push(name);
    }
    names
}

/// Rows after the header as JSON objects keyed by header name.
pub fn write_json(table: &Table) -> Result<String, ConverterError> {
    let Some((header, rows)) = table.split_first() else {
        return Ok("[]\n".to_string());
    };
    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    let names = header_names(header, width);

    let records: Vec<Value> = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = row.get(i).cloned().unwrap_or_default();
                    (name.clone(), Value::String(value))
                })
                .collect();
            Value::Object(object)
        })
        .collect();

    let mut json = serde_json::to_string_pretty(&records)
        .map_err(|e| ConverterError::invalid_input(format!("cannot encode rows: {}", e)))?;
    json.push('\n');
    Ok(json)
}

pub fn write_html(table: &Table, title: &str) -> String {
    let mut out = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<table>\n",
        escape_markup(title)
    );
    for (index, row) in table.iter().enumerate() {
        let cell = if index == 0 { "th" } else { "td" };
        out.push_str("<tr>");
        for field in row {
            out.push_str(&format!("<{cell}>{}</{cell}>", escape_markup(field)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

/// Converts between delimited formats and renders them as JSON or HTML
/// without any external tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedBackend;

impl DelimitedBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn convert_text(
        &self,
        text: &str,
        input: &Format,
        output: &Format,
        title: &str,
    ) -> Result<String, ConverterError> {
        let table = parse_delimited(text, delimiter_for(input));
        match output.as_str() {
            ".csv" | ".tsv" => Ok(write_delimited(&table, delimiter_for(output))),
            ".json" => write_json(&table),
            ".html" => Ok(write_html(&table, title)),
            other => Err(ConverterError::invalid_input(format!(
                "no built-in writer for {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Backend for DelimitedBackend {
    fn name(&self) -> &str {
        "builtin-delimited"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.spreadsheet_builtin
    }

    fn input_formats(&self) -> &[&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        let bytes = tokio::fs::read(&job.input_path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let title = crate::format::strip_format(&job.source_name, &job.input_format);
        let converted = self.convert_text(&text, &job.input_format, &job.output_format, &title)?;
        tokio::fs::write(&job.output_path, converted).await?;
        Ok(())
    }
}
