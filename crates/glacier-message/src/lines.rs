//! Body-line classification.

use glacier_types::LexiconClass;
use memchr::memchr;

use crate::headers::body_offset;

/// Count leading quote markers.
///
/// From line start, SP and TAB are consumed freely; each `>`, `:` or `|`
/// seen before the first other byte increments the level.
#[must_use]
pub fn quotation_level(line: &[u8]) -> u8 {
    split_quotation(line).0
}

/// [`quotation_level`] plus the line content after the quote prefix.
#[must_use]
pub fn split_quotation(line: &[u8]) -> (u8, &[u8]) {
    let mut level = 0u8;
    let mut at = 0;
    while at < line.len() {
        match line[at] {
            b' ' | b'\t' => {}
            b'>' | b':' | b'|' => level = level.saturating_add(1),
            _ => break,
        }
        at += 1;
    }
    (level, &line[at..])
}

/// Whether `line` (without its newline) is the signature marker `-- `.
///
/// A trailing CR from CRLF messages is tolerated.
#[must_use]
pub fn is_signature_start(line: &[u8]) -> bool {
    line == b"-- " || line == b"-- \r"
}

/// One classified body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLine<'a> {
    /// Line bytes without the newline.
    pub raw: &'a [u8],
    /// Line content after the quote prefix (equals `raw` outside quotes).
    pub text: &'a [u8],
    /// Quotation level of the line.
    pub level: u8,
    /// Lexicon class: quotation-derived, or Signature from the marker on.
    pub class: LexiconClass,
}

/// Iterate over the classified body lines of a whole message.
///
/// Everything from the first `-- ` marker line onward is Signature,
/// including the marker itself.
pub fn body_lines(text: &[u8]) -> impl Iterator<Item = BodyLine<'_>> {
    let mut rest = &text[body_offset(text)..];
    let mut in_signature = false;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let (mut raw, tail) = match memchr(b'\n', rest) {
            Some(nl) => (&rest[..nl], &rest[nl + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        rest = tail;
        if raw.last() == Some(&b'\r') {
            raw = &raw[..raw.len() - 1];
        }
        if is_signature_start(raw) {
            in_signature = true;
        }
        let (level, stripped) = split_quotation(raw);
        let class = if in_signature {
            LexiconClass::Signature
        } else {
            LexiconClass::from_quotation_level(level)
        };
        Some(BodyLine {
            raw,
            text: stripped,
            level,
            class,
        })
    })
}

/// Strip any number of leading reply prefixes (and the spaces around them).
///
/// Matching is byte-exact against the operator-supplied list; the default
/// list lives in the threader.
#[must_use]
pub fn kill_re<'a>(subject: &'a [u8], prefixes: &[String]) -> &'a [u8] {
    let mut rest = subject;
    'outer: loop {
        while rest.first() == Some(&b' ') {
            rest = &rest[1..];
        }
        for prefix in prefixes {
            if rest.starts_with(prefix.as_bytes()) {
                rest = &rest[prefix.len()..];
                continue 'outer;
            }
        }
        return rest;
    }
}
