//! Format-specific heuristics turning a document into a [`DocumentModel`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::io::{Cursor, Read};
use std::path::Path;

use super::{DocumentModel, FOOTER_TEXT};
use crate::converter::error::ConverterError;
use crate::converter::markup::decode_entities;
use crate::format::Format;

/// Reads and parses a document from disk.
pub fn parse_file(path: &Path, format: &Format) -> Result<DocumentModel, ConverterError> {
    let bytes = std::fs::read(path)?;
    Ok(parse_bytes(&bytes, format))
}

/// Parses document bytes. Never fails: unreadable input degrades to
/// [`DocumentModel::placeholder`].
pub fn parse_bytes(bytes: &[u8], format: &Format) -> DocumentModel {
    match format.as_str() {
        ".md" | ".markdown" => parse_markdown(&String::from_utf8_lossy(bytes)),
        ".html" | ".htm" => parse_html(&String::from_utf8_lossy(bytes)),
        ".rtf" => parse_rtf(&String::from_utf8_lossy(bytes)),
        ".docx" => parse_docx(bytes).unwrap_or_else(|| {
            tracing::warn!("Unreadable docx, using placeholder content");
            DocumentModel::placeholder()
        }),
        ".odt" => parse_odt(bytes).unwrap_or_else(|| {
            tracing::warn!("Unreadable odt, using placeholder content");
            DocumentModel::placeholder()
        }),
        ".pdf" => parse_pdf(bytes),
        _ => parse_text(&String::from_utf8_lossy(bytes)),
    }
}

/// Splits text into blank-line separated blocks of trimmed, non-empty lines.
fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn is_footer(line: &str) -> bool {
    line.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace()) == FOOTER_TEXT
}

fn is_decoration(line: &str) -> bool {
    is_rule(line) || is_footer(line)
}

fn parse_text(text: &str) -> DocumentModel {
    let blocks: Vec<Vec<&str>> = blocks(text)
        .into_iter()
        .filter(|block| !(block.len() == 1 && is_decoration(block[0])))
        .collect();
    let title = blocks.first().map(|block| block[0].to_string());
    let paragraphs = blocks.iter().map(|block| block.join(" ")).collect();
    DocumentModel::new(title, paragraphs)
}

/// Heading level and text for an ATX heading line.
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim()))
}

fn strip_line_markers(line: &str) -> &str {
    if let Some((_, text)) = heading(line) {
        return text;
    }
    line.strip_prefix("> ")
        .or_else(|| line.strip_prefix('>'))
        .unwrap_or(line)
        .trim()
}

fn parse_markdown(text: &str) -> DocumentModel {
    let mut title = None;
    let mut paragraphs = Vec::new();

    for block in blocks(text) {
        if block.len() == 1 && is_decoration(block[0]) {
            continue;
        }
        let mut lines = block.as_slice();
        if title.is_none() {
            if let Some((1, text)) = heading(block[0]) {
                title = Some(text.to_string());
                lines = &block[1..];
            }
        }
        if lines.is_empty() {
            continue;
        }
        let paragraph = lines
            .iter()
            .map(|line| strip_line_markers(line))
            .collect::<Vec<_>>()
            .join(" ");
        paragraphs.push(paragraph);
    }

    DocumentModel::new(title, paragraphs)
}

static HTML_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid pattern"));

static HTML_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<head[^>]*>.*?</head\s*>|<script[^>]*>.*?</script\s*>|<style[^>]*>.*?</style\s*>|<footer[^>]*>.*?</footer\s*>|<!--.*?-->",
    )
    .expect("valid pattern")
});

static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<(p|h[1-6]|li|pre|blockquote|td|th)(?:\s[^>]*)?>(.*?)</(?:p|h[1-6]|li|pre|blockquote|td|th)\s*>",
    )
    .expect("valid pattern")
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid pattern"));

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html_text(fragment: &str) -> String {
    collapse_whitespace(&decode_entities(&HTML_TAG.replace_all(fragment, " ")))
}

fn parse_html(text: &str) -> DocumentModel {
    let mut title = HTML_TITLE
        .captures(text)
        .map(|caps| html_text(&caps[1]))
        .filter(|t| !t.is_empty());

    let body = HTML_NOISE.replace_all(text, " ");
    let mut paragraphs = Vec::new();
    for caps in HTML_BLOCK.captures_iter(&body) {
        let tag = caps[1].to_ascii_lowercase();
        let content = html_text(&caps[2]);
        if content.is_empty() || is_footer(&content) {
            continue;
        }
        if tag == "h1" {
            match &title {
                None => {
                    title = Some(content);
                    continue;
                }
                Some(existing) if *existing == content => continue,
                _ => {}
            }
        }
        paragraphs.push(content);
    }

    if paragraphs.is_empty() {
        // No block markup: treat the visible text as plain text.
        let plain = decode_entities(&HTML_TAG.replace_all(&body, "\n"));
        let fallback = parse_text(&plain);
        if title.is_none() {
            return fallback;
        }
        paragraphs = fallback.paragraphs;
    }

    DocumentModel::new(title, paragraphs)
}

/// Destination groups whose text is never visible.
const RTF_SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "object",
];

fn parse_rtf(text: &str) -> DocumentModel {
    let chars: Vec<char> = text.chars().collect();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    // Per-group "hidden" flag; index 0 is outside any group.
    let mut hidden = vec![false];
    let mut pending_high: Option<u16> = None;
    let mut i = 0;

    let flush = |current: &mut String, paragraphs: &mut Vec<String>| {
        let paragraph = collapse_whitespace(current);
        if !paragraph.is_empty() {
            paragraphs.push(paragraph);
        }
        current.clear();
    };

    while i < chars.len() {
        let c = chars[i];
        let is_hidden = *hidden.last().unwrap_or(&false);
        match c {
            '{' => {
                hidden.push(is_hidden);
                i += 1;
            }
            '}' => {
                if hidden.len() > 1 {
                    hidden.pop();
                }
                i += 1;
            }
            '\r' | '\n' => i += 1,
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next == '\\' || next == '{' || next == '}' {
                    if !is_hidden {
                        current.push(next);
                    }
                    i += 1;
                } else if next == '*' {
                    if let Some(flag) = hidden.last_mut() {
                        *flag = true;
                    }
                    i += 1;
                } else if next == '\'' {
                    let hex: String = chars.iter().skip(i + 1).take(2).collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        if !is_hidden {
                            current.push(cp1252_char(byte));
                        }
                    }
                    i += 3;
                } else if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let param_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .ok();
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }

                    match word.as_str() {
                        "par" | "line" if !is_hidden => flush(&mut current, &mut paragraphs),
                        "tab" if !is_hidden => current.push(' '),
                        "u" => {
                            if let Some(value) = param {
                                let unit = value as i16 as u16;
                                if !is_hidden {
                                    push_utf16(&mut current, &mut pending_high, unit);
                                }
                                i = skip_rtf_fallback(&chars, i);
                            }
                        }
                        w if RTF_SKIPPED_DESTINATIONS.contains(&w) => {
                            if let Some(flag) = hidden.last_mut() {
                                *flag = true;
                            }
                        }
                        _ => {}
                    }
                } else {
                    // Control symbol such as \~ or \-.
                    if next == '~' && !is_hidden {
                        current.push(' ');
                    }
                    i += 1;
                }
            }
            _ => {
                if !is_hidden {
                    current.push(c);
                }
                i += 1;
            }
        }
    }
    flush(&mut current, &mut paragraphs);

    let paragraphs: Vec<String> = paragraphs.into_iter().filter(|p| !is_decoration(p)).collect();
    match paragraphs.split_first() {
        Some((title, rest)) if !rest.is_empty() => {
            DocumentModel::new(Some(title.clone()), rest.to_vec())
        }
        _ => DocumentModel::new(None, paragraphs),
    }
}

/// Windows-1252 code points for bytes 0x80..=0x9F; the rest of the
/// code page matches Latin-1. Unassigned bytes map to themselves.
const CP1252_HIGH: [u32; 32] = [
    0x20AC, 0x81, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160,
    0x2039, 0x0152, 0x8D, 0x017D, 0x8F, 0x90, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013,
    0x2014, 0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x9D, 0x017E, 0x0178,
];

/// Decodes an RTF `\'hh` byte under the default ANSI code page.
fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => char::from_u32(CP1252_HIGH[usize::from(byte - 0x80)])
            .unwrap_or(char::REPLACEMENT_CHARACTER),
        _ => char::from(byte),
    }
}

fn push_utf16(out: &mut String, pending_high: &mut Option<u16>, unit: u16) {
    if (0xD800..0xDC00).contains(&unit) {
        *pending_high = Some(unit);
        return;
    }
    let units: Vec<u16> = match pending_high.take() {
        Some(high) => vec![high, unit],
        None => vec![unit],
    };
    out.extend(char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));
}

/// Skips the single fallback character that follows a `\uN` escape.
fn skip_rtf_fallback(chars: &[char], i: usize) -> usize {
    match chars.get(i) {
        Some('\\') if chars.get(i + 1) == Some(&'\'') => i + 4,
        Some('\\') | Some('{') | Some('}') | None => i,
        Some(_) => i + 1,
    }
}

fn read_zip_entry(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut entry = archive.by_name(name).ok()?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).ok()?;
    Some(xml)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn parse_docx(bytes: &[u8]) -> Option<DocumentModel> {
    let xml = read_zip_entry(bytes, "word/document.xml")?;
    let mut reader = Reader::from_str(&xml);

    let mut title = None;
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;
    let mut is_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    is_title = false;
                    current.clear();
                }
                b"w:t" => in_text = true,
                b"w:pStyle" => is_title |= is_title_style(&e),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:pStyle" => is_title |= is_title_style(&e),
                b"w:tab" | b"w:br" if in_paragraph => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Ok(text) = t.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    in_paragraph = false;
                    let text = collapse_whitespace(&current);
                    if text.is_empty() || is_decoration(&text) {
                        continue;
                    }
                    if is_title && title.is_none() {
                        title = Some(text);
                    } else {
                        paragraphs.push(text);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed docx XML, keeping what was read");
                break;
            }
            _ => {}
        }
    }

    Some(DocumentModel::new(title, paragraphs))
}

fn is_title_style(element: &BytesStart<'_>) -> bool {
    matches!(
        attribute(element, b"w:val").as_deref(),
        Some("Title") | Some("Heading1")
    )
}

fn parse_odt(bytes: &[u8]) -> Option<DocumentModel> {
    let xml = read_zip_entry(bytes, "content.xml")?;
    let mut reader = Reader::from_str(&xml);

    let mut title = None;
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    // Nesting depth of text:p / text:h; text is collected at any depth.
    let mut depth = 0usize;
    let mut is_heading = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"text:p" | b"text:h" => {
                    if depth == 0 {
                        current.clear();
                        is_heading = e.name().as_ref() == b"text:h";
                    }
                    depth += 1;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if depth > 0 => match e.name().as_ref() {
                b"text:s" | b"text:tab" | b"text:line-break" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if depth > 0 => {
                if let Ok(text) = t.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"text:p" | b"text:h" if depth > 0 => {
                    depth -= 1;
                    if depth > 0 {
                        continue;
                    }
                    let text = collapse_whitespace(&current);
                    if text.is_empty() || is_decoration(&text) {
                        continue;
                    }
                    if is_heading && title.is_none() {
                        title = Some(text);
                    } else {
                        paragraphs.push(text);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed odt XML, keeping what was read");
                break;
            }
            _ => {}
        }
    }

    Some(DocumentModel::new(title, paragraphs))
}

fn parse_pdf(bytes: &[u8]) -> DocumentModel {
    // pdf-extract panics on some malformed files.
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match extracted {
        Ok(Ok(text)) => parse_text(&text),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "PDF text extraction failed");
            DocumentModel::placeholder()
        }
        Err(_) => {
            tracing::warn!("PDF text extraction panicked");
            DocumentModel::placeholder()
        }
    }
}
