//! Shared vocabulary types for the glacier toolkit.
//!
//! Everything here mirrors an on-disk encoding, so the constants are part of
//! the archive format contract:
//! - lexicon hit bytes pack `(class << 5) | position`, position saturating
//!   at 31 per class;
//! - lexicon packets are fixed-width little-endian records;
//! - hash tables size as `1 << (ceil(log2(keys)) + 1)` buckets of at most
//!   8 entries each.

pub mod hit;
pub mod packets;

use bitflags::bitflags;

pub use hit::{LEXICON_HIT_POS_MASK, decode_class, decode_pos, encode_hit, is_saturated};
pub use packets::{LexiconDataPacket, LexiconMetaPacket};

/// Per-line category assigned during lexicon build and message display.
///
/// The discriminants are the on-disk class tags inside hit bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LexiconClass {
    /// Unquoted body text (quotation level 0).
    Content = 0,
    /// Quotation level 1.
    Quote1 = 1,
    /// Quotation level 2.
    Quote2 = 2,
    /// Quotation level 3 and deeper.
    Quote3 = 3,
    /// Selected header values (From, Subject).
    Header = 4,
    /// Everything from the `-- ` marker onward.
    Signature = 5,
}

/// Number of distinct lexicon classes.
pub const LEXICON_CLASS_COUNT: usize = 6;

impl LexiconClass {
    /// All classes in tag order.
    pub const ALL: [Self; LEXICON_CLASS_COUNT] = [
        Self::Content,
        Self::Quote1,
        Self::Quote2,
        Self::Quote3,
        Self::Header,
        Self::Signature,
    ];

    /// Map a quotation level to its lexicon class.
    ///
    /// Levels of three and deeper collapse into [`LexiconClass::Quote3`].
    #[must_use]
    pub const fn from_quotation_level(level: u8) -> Self {
        match level {
            0 => Self::Content,
            1 => Self::Quote1,
            2 => Self::Quote2,
            _ => Self::Quote3,
        }
    }

    /// Decode an on-disk class tag; tags above 5 are invalid.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Content),
            1 => Some(Self::Quote1),
            2 => Some(Self::Quote2),
            3 => Some(Self::Quote3),
            4 => Some(Self::Header),
            5 => Some(Self::Signature),
            _ => None,
        }
    }

    /// Stable label used in logs and build summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Quote1 => "quote1",
            Self::Quote2 => "quote2",
            Self::Quote3 => "quote3",
            Self::Header => "header",
            Self::Signature => "signature",
        }
    }
}

bitflags! {
    /// Search behaviour toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SearchFlags: u32 {
        /// Score pairs of matched words by their proximity.
        const ADJACENT_WORDS = 1 << 0;
        /// Discard candidates missing any query term.
        const REQUIRE_ALL_WORDS = 1 << 1;
        /// Expand unquoted terms to near-spelled lexicon words.
        const FUZZY = 1 << 2;
    }
}

bitflags! {
    /// Restricts which hit classes participate in scoring.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFilter: u8 {
        const CONTENT = 1 << 0;
        const QUOTE1 = 1 << 1;
        const QUOTE2 = 1 << 2;
        const QUOTE3 = 1 << 3;
        const HEADER = 1 << 4;
        const SIGNATURE = 1 << 5;
    }
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl ClassFilter {
    /// Filter admitting only unquoted body text.
    #[must_use]
    pub const fn content_only() -> Self {
        Self::CONTENT
    }

    /// Whether hits of `class` pass this filter.
    #[must_use]
    pub fn admits(self, class: LexiconClass) -> bool {
        self.contains(Self::from_bits_truncate(1 << class as u8))
    }
}

/// Maximum number of entries a hash bucket may hold.
pub const HASH_BUCKET_CAPACITY: usize = 8;

/// Table size exponent for `keys` keys: `ceil(log2(keys)) + 1`, minimum 1.
///
/// Guarantees at least twice as many buckets as keys.
#[must_use]
pub const fn hash_bits(keys: u64) -> u32 {
    if keys <= 1 {
        return 1;
    }
    (keys - 1).ilog2() + 2
}

/// Bucket count for a table of `bits` bits.
#[must_use]
pub const fn hash_size(bits: u32) -> u64 {
    1 << bits
}

/// Low-bits mask selecting a bucket in a table of `bits` bits.
#[must_use]
pub const fn hash_mask(bits: u32) -> u32 {
    ((1u64 << bits) - 1) as u32
}
