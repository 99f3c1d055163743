//! Entity escaping and decoding shared by the HTML, XML and DOCX code.

use quick_xml::escape::{escape, resolve_html5_entity, unescape_with};
use std::borrow::Cow;

/// Longest reference worth trying, `&` and `;` included.
const MAX_REFERENCE_LEN: usize = 40;

/// Escapes text for HTML or XML content and attribute values.
pub fn escape_markup(text: &str) -> Cow<'_, str> {
    escape(text)
}

/// Decodes numeric character references and HTML named entities.
/// Unknown or malformed references are kept as written.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let reference = candidate
            .find(';')
            .filter(|&end| end > 1 && end < MAX_REFERENCE_LEN)
            .map(|end| &candidate[..=end]);
        if let Some(reference) = reference {
            if let Ok(decoded) = unescape_with(reference, resolve_html5_entity) {
                out.push_str(&decoded);
                rest = &candidate[reference.len()..];
                continue;
            }
        }
        out.push('&');
        rest = &candidate[1..];
    }
    out.push_str(rest);
    out
}
