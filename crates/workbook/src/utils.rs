//! Small text helpers shared by the reader and the serializer

use crate::error::{Result, WorkbookError};
use quick_xml::escape::{escape, resolve_xml_entity};
use std::borrow::Cow;

/// Resolve a general entity reference (`amp`, `#10`, `#x3C`, ...)
///
/// Unknown named entities are kept verbatim as `&name;`.
pub fn resolve_entity(raw: &str) -> Result<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.to_string());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16)
                .map_err(|_| WorkbookError::Malformed(format!("Invalid hex entity: #{}", rest)))?
        } else {
            rest.parse::<u32>().map_err(|_| {
                WorkbookError::Malformed(format!("Invalid decimal entity: #{}", rest))
            })?
        };

        let ch = char::from_u32(code)
            .ok_or_else(|| WorkbookError::Malformed(format!("Invalid Unicode: {}", code)))?;
        return Ok(ch.to_string());
    }

    Ok(format!("&{};", raw))
}

/// Fold `\r\n` and lone `\r` into `\n`, as XML input line endings are
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Escape an attribute value for output
///
/// Besides markup characters, line breaks and tabs become character
/// references so a reader's attribute-value normalization cannot fold them.
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    let escaped = escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped;
    }

    let mut out = String::with_capacity(escaped.len() + 8);
    for ch in escaped.chars() {
        match ch {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp").unwrap(), "&");
        assert_eq!(resolve_entity("#10").unwrap(), "\n");
        assert_eq!(resolve_entity("#x3C").unwrap(), "<");
        assert_eq!(resolve_entity("nbsp").unwrap(), "&nbsp;");
        assert!(resolve_entity("#xZZ").is_err());
        assert!(resolve_entity("#1114112").is_err());
    }

    #[test]
    fn test_normalize_line_endings() {
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed("a\nb")));
        assert_eq!(normalize_line_endings("a\r\nb\rc\r\n"), "a\nb\nc\n");
        assert_eq!(normalize_line_endings("\r\r\n"), "\n\n");
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape_attribute("plain"), "plain");
        assert_eq!(escape_attribute("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_attribute("line1\r\nline2\t"), "line1&#13;&#10;line2&#9;");
    }
}
