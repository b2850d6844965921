//! Structural extraction of records from raw JSON text.
//!
//! This is deliberately not a JSON parser. It locates a named array, splits it
//! into top-level object substrings by counting braces, and reads the few
//! fields a [`Record`] needs out of each object. Every scan tracks whether it is
//! inside a string literal and whether the previous byte was an escaping
//! backslash, so braces, brackets and quotes inside titles and bodies never
//! disturb the structure.
//!
//! All structural characters are ASCII, so scanning bytes is safe on UTF-8
//! input: every index where a scan stops is a char boundary.

use crate::models::Record;

const ID_FIELD: &str = "number";
const TITLE_FIELD: &str = "title";
const BODY_FIELD: &str = "body";
const URL_FIELD: &str = "html_url";
const LABELS_FIELD: &str = "labels";
const LABEL_NAME_FIELD: &str = "name";

/// Why an object could not be projected into a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Content between the brackets of the array stored under `key`
///
/// The key must appear as a key of the root object, not inside a string value
/// or a nested object. Returns `None` when the key is absent, its value is not
/// an array, or the array is truncated.
pub fn array_field<'a>(document: &'a str, key: &str) -> Option<&'a str> {
    let span = value_span(document, key)?;
    span.strip_prefix('[')?.strip_suffix(']')
}

/// Content between the brackets of a document whose root is an array
pub fn top_level_array(document: &str) -> Option<&str> {
    let start = document.len() - document.trim_start().len();
    let bytes = document.as_bytes();
    if bytes.get(start) != Some(&b'[') {
        return None;
    }
    let end = matching_close(bytes, start)?;
    Some(&document[start + 1..end])
}

/// Raw text of the object stored under `key`, braces included
pub fn object_field<'a>(object: &'a str, key: &str) -> Option<&'a str> {
    value_span(object, key).filter(|span| span.starts_with('{'))
}

/// Non-negative integer stored under `key`
pub fn int_field(object: &str, key: &str) -> Option<u64> {
    value_span(object, key)?.parse().ok()
}

/// Unescaped string stored under `key`; `None` for absent, null or non-string values
pub fn string_field(object: &str, key: &str) -> Option<String> {
    let span = value_span(object, key)?;
    let raw = span.strip_prefix('"')?.strip_suffix('"')?;
    Some(unescape(raw))
}

/// Whether `key` is present on the root object, whatever its value
pub fn has_field(object: &str, key: &str) -> bool {
    value_span(object, key).is_some()
}

/// Split array content into its top-level object substrings, in order
///
/// An object starts when the brace depth goes from 0 to 1 outside a string and
/// ends when it returns to 0. Objects left open by truncated input are dropped
/// and a stray closing brace resets the scan, so damaged input degrades to the
/// complete objects that precede the damage.
pub fn split_objects(content: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth: i32 = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in content.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            match b {
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&content[s..=i]);
                    }
                } else if depth < 0 {
                    depth = 0;
                    start = None;
                }
            }
            _ => {}
        }
    }

    objects
}

/// Label names of an issue object, in order
pub fn label_names(object: &str) -> Vec<String> {
    array_field(object, LABELS_FIELD)
        .map(|labels| {
            split_objects(labels)
                .into_iter()
                .filter_map(|label| string_field(label, LABEL_NAME_FIELD))
                .collect()
        })
        .unwrap_or_default()
}

/// Project one issue object into a [`Record`]
///
/// Identifier, title and link are required; a missing or null body becomes an
/// empty string.
pub fn record_from_object(object: &str) -> Result<Record, ExtractError> {
    let id = int_field(object, ID_FIELD).ok_or(ExtractError::MissingField(ID_FIELD))?;
    let title = string_field(object, TITLE_FIELD).ok_or(ExtractError::MissingField(TITLE_FIELD))?;
    let url = string_field(object, URL_FIELD).ok_or(ExtractError::MissingField(URL_FIELD))?;

    Ok(Record {
        id,
        title,
        body: string_field(object, BODY_FIELD).unwrap_or_default(),
        url,
        labels: label_names(object),
    })
}

/// Project every object, skipping the ones that lack a required field
pub fn records_from_objects<'a, I>(objects: I) -> Vec<Record>
where
    I: IntoIterator<Item = &'a str>,
{
    objects
        .into_iter()
        .enumerate()
        .filter_map(|(index, object)| match record_from_object(object) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed record at position {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Decode JSON string escapes in a single pass
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => out.push(decode_unicode(&mut chars)),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn decode_unicode(chars: &mut std::str::Chars<'_>) -> char {
    let Some(high) = hex4(chars) else {
        return char::REPLACEMENT_CHARACTER;
    };

    if (0xD800..0xDC00).contains(&high) {
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
            if let Some(low) = hex4(&mut lookahead).filter(|low| (0xDC00..0xE000).contains(low)) {
                *chars = lookahead;
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
            }
        }
        return char::REPLACEMENT_CHARACTER;
    }

    char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// Raw value text stored under `key` on the root object of `object`
fn value_span<'a>(object: &'a str, key: &str) -> Option<&'a str> {
    let bytes = object.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i)?;
                if depth == 1 {
                    let colon = skip_whitespace(bytes, end + 1);
                    if bytes.get(colon) == Some(&b':') && &object[i + 1..end] == key {
                        let start = skip_whitespace(bytes, colon + 1);
                        let stop = value_end(bytes, start)?;
                        return Some(&object[start..stop]);
                    }
                }
                i = end;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return None;
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Index of the quote closing the string opened at `open`
fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index of the bracket or brace closing the container opened at `open`
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i)?,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Exclusive end of the value starting at `start`
fn value_end(bytes: &[u8], start: usize) -> Option<usize> {
    match bytes.get(start)? {
        b'"' => string_end(bytes, start).map(|end| end + 1),
        b'{' | b'[' => matching_close(bytes, start).map(|end| end + 1),
        _ => {
            let len = bytes[start..]
                .iter()
                .position(|b| matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace())
                .unwrap_or(bytes.len() - start);
            (len > 0).then_some(start + len)
        }
    }
}

fn skip_whitespace(bytes: &[u8], from: usize) -> usize {
    from + bytes[from.min(bytes.len())..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count()
}
