//! Read-only view over the lexicon files.

use std::path::Path;

use glacier_error::{GlacierError, Result};
use glacier_store::{FileMap, FileView, HashIndex, MetaView};
use glacier_types::{LexiconDataPacket, LexiconMetaPacket};
use memchr::memchr;

/// Shift separating the distance field from the word index in a `lexdist`
/// entry: `(distance << 28) | word_index`.
const DIST_SHIFT: u32 = 28;

/// Mmapped lexicon.
#[derive(Debug)]
pub struct LexiconView {
    meta: FileMap<LexiconMetaPacket>,
    strings: FileView,
    data: FileMap<LexiconDataPacket>,
    hits: FileView,
    hash: HashIndex,
    dist: Option<MetaView<u32>>,
}

impl LexiconView {
    /// Open the lexicon under `dir`; the distance table is optional by file
    /// presence.
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = FileMap::open(dir.join("lexmeta"))?;
        let strings = FileView::open(dir.join("lexstr"))?;
        let data = FileMap::open(dir.join("lexdata"))?;
        let hits = FileView::open(dir.join("lexhit"))?;
        let hash = HashIndex::open(dir.join("lexhash"), dir.join("lexhashdata"))?;
        let dist = if dir.join("lexdistmeta").is_file() {
            Some(MetaView::open(dir.join("lexdistmeta"), dir.join("lexdist"))?)
        } else {
            None
        };
        Ok(Self {
            meta,
            strings,
            data,
            hits,
            hash,
            dist,
        })
    }

    /// Number of distinct words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.meta.len()
    }

    /// The word string at index `idx`.
    #[must_use]
    pub fn word(&self, idx: u32) -> Option<&[u8]> {
        let start = self.meta.get(idx as usize).word as usize;
        let tail = &self.strings.bytes()[start..];
        memchr(0, tail).map(|nul| &tail[..nul])
    }

    /// Resolve a word to its index; misses are not errors.
    #[must_use]
    pub fn find(&self, word: &[u8]) -> Option<u32> {
        self.hash.search_with(word, |idx| self.word(idx))
    }

    /// [`Self::find`] with a precomputed xxHash32.
    #[must_use]
    pub fn find_hashed(&self, word: &[u8], hashed: u32) -> Option<u32> {
        self.hash.search_hashed_with(word, hashed, |idx| self.word(idx))
    }

    /// Document frequency of word `idx` (its posting count).
    #[must_use]
    pub fn df(&self, idx: u32) -> u32 {
        self.meta.get(idx as usize).count
    }

    /// Postings of word `idx`, sorted by postid ascending.
    pub fn postings(&self, idx: u32) -> impl Iterator<Item = LexiconDataPacket> + '_ {
        let packet = self.meta.get(idx as usize);
        let start = packet.data as usize;
        (start..start + packet.count as usize).map(|i| self.data.get(i))
    }

    /// Hit bytes of one posting: `{ count: u8, hit: u8[count] }` in `lexhit`.
    pub fn posting_hits(&self, posting: LexiconDataPacket) -> Result<&[u8]> {
        let at = posting.hits as usize;
        let bytes = self.hits.bytes();
        let count = *bytes.get(at).ok_or_else(|| {
            GlacierError::corrupt("lexhit", format!("hit offset {at} past file end"))
        })? as usize;
        bytes.get(at + 1..at + 1 + count).ok_or_else(|| {
            GlacierError::corrupt("lexhit", format!("hit record at {at} truncated"))
        })
    }

    /// Whether the neighbour table is present.
    #[must_use]
    pub fn has_distances(&self) -> bool {
        self.dist.is_some()
    }

    /// Precomputed `(distance, word)` neighbours of word `idx`; empty when
    /// the table is absent.
    pub fn neighbors(&self, idx: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let record = self
            .dist
            .as_ref()
            .map(|d| d.record(idx as usize))
            .unwrap_or(&[]);
        glacier_store::le_u32_values(record)
            .map(|packed| (packed >> DIST_SHIFT, packed & ((1 << DIST_SHIFT) - 1)))
    }
}

/// Pack one `lexdist` entry.
#[must_use]
pub(crate) fn pack_neighbor(distance: u32, word: u32) -> u32 {
    (distance << DIST_SHIFT) | word
}
