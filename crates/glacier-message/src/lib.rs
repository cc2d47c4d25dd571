//! RFC-5322 message utilities.
//!
//! Everything operates on the raw message bytes without copying: header
//! lookup, Message-ID normalisation, quotation classification, display-name
//! extraction, the lax date parser, and the word tokenizer used by both the
//! lexicon builder and the threader.
//!
//! Messages are not assumed to be valid UTF-8; only the tokenizer converts
//! (lossily, per line) because word segmentation needs character boundaries.

pub mod date;
pub mod headers;
pub mod lines;
pub mod token;

pub use date::parse_date_rfc5322_lax;
pub use headers::{body_offset, find_header, message_id, real_name, strip_msgid_whitespace};
pub use lines::{BodyLine, body_lines, is_signature_start, kill_re, quotation_level};
pub use token::{for_each_token, tokenize_into};
