//! Header-block primitives.

use std::borrow::Cow;

use memchr::{memchr, memchr2};

/// Iterate over the header lines of `text` (everything above the first blank
/// line), yielding each line without its newline.
fn header_lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty()
            || rest[0] == b'\n'
            || (rest[0] == b'\r' && rest.get(1) == Some(&b'\n'))
        {
            return None;
        }
        let (line, tail) = match memchr(b'\n', rest) {
            Some(nl) => (&rest[..nl], &rest[nl + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        rest = tail;
        Some(line)
    })
}

/// Case-insensitive `Name: ` lookup at the start of a header line.
///
/// Returns the value up to but not including the terminating newline, with
/// any trailing CR removed. Stops at the blank line separating headers from
/// the body.
#[must_use]
pub fn find_header<'a>(text: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let name = name.as_bytes();
    for line in header_lines(text) {
        if line.len() <= name.len() + 1 {
            continue;
        }
        let (head, rest) = line.split_at(name.len());
        if rest[0] == b':' && head.eq_ignore_ascii_case(name) {
            let mut value = &rest[1..];
            while value.first() == Some(&b' ') || value.first() == Some(&b'\t') {
                value = &value[1..];
            }
            if value.last() == Some(&b'\r') {
                value = &value[..value.len() - 1];
            }
            return Some(value);
        }
    }
    None
}

/// Byte offset of the first body line (just past the blank separator line).
///
/// A message without a blank line is all headers; the offset is then the
/// text length.
#[must_use]
pub fn body_offset(text: &[u8]) -> usize {
    let mut at = 0;
    while at < text.len() {
        if text[at] == b'\n' {
            return at + 1;
        }
        if text[at] == b'\r' && text.get(at + 1) == Some(&b'\n') {
            return at + 2;
        }
        match memchr(b'\n', &text[at..]) {
            Some(nl) => at += nl + 1,
            None => break,
        }
    }
    text.len()
}

/// Strip ASCII SP/TAB from inside a Message-ID body.
///
/// The flag is true iff anything was removed — the "broken reference"
/// condition counted by the connectivity builder.
#[must_use]
pub fn strip_msgid_whitespace(raw: &[u8]) -> (Cow<'_, [u8]>, bool) {
    if memchr2(b' ', b'\t', raw).is_none() {
        return (Cow::Borrowed(raw), false);
    }
    let clean: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|&b| b != b' ' && b != b'\t')
        .collect();
    (Cow::Owned(clean), true)
}

/// The `<...>` body of the Message-ID header, whitespace-stripped.
#[must_use]
pub fn message_id(text: &[u8]) -> Option<(Cow<'_, [u8]>, bool)> {
    let value = find_header(text, "Message-ID")?;
    let open = memchr(b'<', value)?;
    let close = memchr(b'>', &value[open..])?;
    Some(strip_msgid_whitespace(&value[open + 1..open + close]))
}

/// RFC-5322 display name of a `From:` value.
///
/// The text before `<email>` with surrounding quotes and whitespace
/// stripped; an `addr (Comment)` comment if that is all there is; otherwise
/// the address local-part.
#[must_use]
pub fn real_name(from: &[u8]) -> &[u8] {
    let trimmed = trim(from);
    if let Some(open) = memchr(b'<', trimmed) {
        let name = trim(&trimmed[..open]);
        let name = strip_quotes(name);
        if !name.is_empty() {
            return name;
        }
        // `<local@domain>` with no display name: fall through to local-part.
        let addr = &trimmed[open + 1..];
        let end = memchr(b'>', addr).unwrap_or(addr.len());
        return local_part(&addr[..end]);
    }
    if let Some(open) = memchr(b'(', trimmed) {
        if let Some(close) = memchr(b')', &trimmed[open..]) {
            let comment = trim(&trimmed[open + 1..open + close]);
            if !comment.is_empty() {
                return comment;
            }
        }
        return local_part(trim(&trimmed[..open]));
    }
    local_part(trimmed)
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

fn strip_quotes(bytes: &[u8]) -> &[u8] {
    if bytes.len() >= 2 && bytes.first() == Some(&b'"') && bytes.last() == Some(&b'"') {
        trim(&bytes[1..bytes.len() - 1])
    } else {
        bytes
    }
}

fn local_part(addr: &[u8]) -> &[u8] {
    match memchr(b'@', addr) {
        Some(at) => &addr[..at],
        None => addr,
    }
}
