//! Word tokenisation.
//!
//! UAX-29 word segmentation over lowercased text, keeping tokens of 3 to 13
//! bytes. The byte band is measured after lowercasing, so multi-byte scripts
//! get the same treatment the original corpus tooling gave them.

use unicode_segmentation::UnicodeSegmentation;

/// Minimum token length in bytes, inclusive.
pub const TOKEN_MIN: usize = 3;
/// Maximum token length in bytes, exclusive.
pub const TOKEN_MAX: usize = 14;

/// Call `f` for every kept token of `text`.
///
/// `text` need not be valid UTF-8; invalid sequences are replaced before
/// segmentation, which at worst drops the affected word.
pub fn for_each_token(text: &[u8], mut f: impl FnMut(&str)) {
    let lossy = String::from_utf8_lossy(text);
    let lower = lossy.to_lowercase();
    for word in lower.unicode_words() {
        if word.len() >= TOKEN_MIN && word.len() < TOKEN_MAX {
            f(word);
        }
    }
}

/// Collect the kept tokens of `text` into `out` (cleared first).
pub fn tokenize_into(text: &[u8], out: &mut Vec<String>) {
    out.clear();
    for_each_token(text, |word| out.push(word.to_string()));
}
