//! Tolerant text-scanning helpers shared by the line/block oriented parsers.
//!
//! These never fail: malformed markup yields `None` and the caller decides
//! whether the surrounding entry survives.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex to parse `key="value"` attributes (tvg-id="...", group-title="...", etc)
    pub static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:[-:]\w+)*)="([^"]*)""#).unwrap();
}

/// All `key="value"` pairs in `text`, in source order
pub fn attributes(text: &str) -> impl Iterator<Item = (&str, &str)> {
    ATTR_REGEX.captures_iter(text).filter_map(|caps| {
        let key = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str();
        Some((key, value))
    })
}

/// Value of the attribute named exactly `name`
pub fn attr_value(text: &str, name: &str) -> Option<String> {
    attributes(text)
        .find(|(key, _)| *key == name)
        .map(|(_, value)| unescape(value))
}

/// Byte offset of the opening `<tag` in `text`, requiring a real tag boundary
/// so that `<title` does not match `<titles>`.
pub fn find_open_tag(text: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut cursor = from;

    while let Some(rel) = text.get(cursor..)?.find(&needle) {
        let start = cursor + rel;
        let after = start + needle.len();
        match text[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            None => return None,
            _ => cursor = after,
        }
    }

    None
}

/// Trimmed, unescaped text content of the first `<tag>...</tag>` in `text`
pub fn tag_text(text: &str, tag: &str) -> Option<String> {
    let open = find_open_tag(text, tag, 0)?;
    let content_start = open + text[open..].find('>')? + 1;
    let close = text[content_start..].find(&format!("</{}>", tag))? + content_start;

    let inner = strip_cdata(text[content_start..close].trim());
    if inner.is_empty() {
        None
    } else {
        Some(unescape(inner))
    }
}

/// Value of `attr` on the first `<tag ...>` in `text`
pub fn tag_attr(text: &str, tag: &str, attr: &str) -> Option<String> {
    let open = find_open_tag(text, tag, 0)?;
    let end = open + text[open..].find('>')?;
    attr_value(&text[open..end], attr)
}

fn strip_cdata(text: &str) -> &str {
    text.strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .map(str::trim)
        .unwrap_or(text)
}

/// Decode the five predefined XML entities
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Option from a possibly-empty string
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
