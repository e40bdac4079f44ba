//! Line-oriented HLS tag tokenizer (RFC 8216bis attribute grammar).
//!
//! A playlist is a sequence of lines; a tag line starts with `#EXT`, a comment starts with `#`
//! and is otherwise ignored, and any other non-blank line is a URI. Tag attribute lists use the
//! `NAME=VALUE` grammar where `VALUE` is one of: an unquoted decimal or hex integer, an unquoted
//! enumerated-string, or a double-quoted string that may itself contain commas.

use std::collections::HashMap;

/// One parsed line of a playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Tag { name: String, attributes: TagAttributes },
    /// A tag with no attribute list (`#EXT-X-DISCONTINUITY`, `#EXT-X-ENDLIST`), or one whose sole
    /// value is the whole rest of the line rather than an attribute list (`#EXTINF`).
    ValueTag { name: String, value: String },
    Uri(String),
    /// `#` not followed by `EXT` — a genuine comment, ignored by the parser.
    Comment,
    Blank,
}

/// An attribute-value, as appears after `NAME=` in a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    /// Decimal or `0x...`/`0X...` hex-sequence integer, kept as the original text since some
    /// attributes (`BYTERANGE`, `SCORE`) need float parsing and others need u64/hex.
    Unquoted(String),
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            AttrValue::String(s) => s,
            AttrValue::Unquoted(s) => s,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_str().parse().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        let s = self.as_str();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16).ok()
        } else {
            s.parse().ok()
        }
    }

    pub fn as_bool_enum(&self) -> bool {
        self.as_str() == "YES"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagAttributes(HashMap<String, AttrValue>);

impl TagAttributes {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(AttrValue::as_str)
    }

    pub fn get_owned(&self, name: &str) -> Option<String> {
        self.get_str(name).map(str::to_string)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(AttrValue::as_f64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(AttrValue::as_u64)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.0.get(name).map(AttrValue::as_bool_enum).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// Tokenize one playlist document into lines. Accepts both `\n` and `\r\n` terminators and
/// tolerates leading/trailing whitespace on each line, per the wire grammar's leniency notes.
pub fn tokenize(document: &str) -> Vec<Line> {
    document.lines().map(|raw| tokenize_line(raw.trim_end_matches('\r').trim())).collect()
}

fn tokenize_line(line: &str) -> Line {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix("#EXT") {
        let full_name = format!("#EXT{}", split_tag_name(rest).0);
        let remainder = split_tag_name(rest).1;
        return match remainder {
            None => Line::Tag { name: full_name, attributes: TagAttributes::default() },
            Some(body) if looks_like_attribute_list(body) => {
                Line::Tag { name: full_name, attributes: parse_attribute_list(body) }
            }
            Some(body) => Line::ValueTag { name: full_name, value: body.to_string() },
        };
    }
    if line.starts_with('#') {
        return Line::Comment;
    }
    Line::Uri(line.to_string())
}

/// Splits `NAME:...` (or a bare `NAME`) into `(NAME, Some(rest-after-colon))`.
fn split_tag_name(rest_after_ext: &str) -> (&str, Option<&str>) {
    match rest_after_ext.find(':') {
        Some(idx) => (&rest_after_ext[..idx], Some(&rest_after_ext[idx + 1..])),
        None => (rest_after_ext, None),
    }
}

/// Heuristic: an attribute list contains a top-level `NAME=` pair outside quotes; `#EXTINF`'s
/// `duration,title` body doesn't.
fn looks_like_attribute_list(body: &str) -> bool {
    let mut in_quotes = false;
    let mut chars = body.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '=' if !in_quotes => {
                return body[..i].chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            }
            _ => {}
        }
    }
    false
}

/// Splits a comma-separated `NAME=VALUE` list, respecting double-quoted values that may
/// themselves contain commas.
pub fn parse_attribute_list(body: &str) -> TagAttributes {
    let mut attrs = HashMap::new();
    let mut rest = body;
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let name = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];
        let (value, consumed) = if rest.starts_with('"') {
            match rest[1..].find('"') {
                Some(end) => (AttrValue::String(rest[1..1 + end].to_string()), 1 + end + 1),
                None => (AttrValue::String(rest[1..].to_string()), rest.len()),
            }
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            (AttrValue::Unquoted(rest[..end].trim().to_string()), end)
        };
        attrs.insert(name, value);
        rest = rest.get(consumed..).unwrap_or("");
        rest = rest.trim_start_matches(',');
    }
    TagAttributes(attrs)
}
