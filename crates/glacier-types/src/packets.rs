//! Fixed-width little-endian lexicon records.

/// Per-word record in `lexmeta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconMetaPacket {
    /// Byte offset of the NUL-terminated word string in `lexstr`.
    pub word: u32,
    /// Index of the word's first posting packet in `lexdata`.
    pub data: u32,
    /// Number of postings (document frequency).
    pub count: u32,
}

impl LexiconMetaPacket {
    /// Encoded size in bytes.
    pub const SIZE: usize = 12;

    /// Decode from a little-endian byte slice of at least [`Self::SIZE`] bytes.
    #[must_use]
    pub fn from_le_bytes(buf: &[u8]) -> Self {
        Self {
            word: u32::from_le_bytes(buf[0..4].try_into().expect("slice of 4")),
            data: u32::from_le_bytes(buf[4..8].try_into().expect("slice of 4")),
            count: u32::from_le_bytes(buf[8..12].try_into().expect("slice of 4")),
        }
    }

    /// Encode into little-endian bytes.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.word.to_le_bytes());
        buf[4..8].copy_from_slice(&self.data.to_le_bytes());
        buf[8..12].copy_from_slice(&self.count.to_le_bytes());
        buf
    }
}

/// One posting in `lexdata`: a message and its hit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconDataPacket {
    /// Message index the word occurs in.
    pub postid: u32,
    /// Byte offset of the hit record (`count: u8, hit: u8[count]`) in `lexhit`.
    pub hits: u32,
}

impl LexiconDataPacket {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Decode from a little-endian byte slice of at least [`Self::SIZE`] bytes.
    #[must_use]
    pub fn from_le_bytes(buf: &[u8]) -> Self {
        Self {
            postid: u32::from_le_bytes(buf[0..4].try_into().expect("slice of 4")),
            hits: u32::from_le_bytes(buf[4..8].try_into().expect("slice of 4")),
        }
    }

    /// Encode into little-endian bytes.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.postid.to_le_bytes());
        buf[4..8].copy_from_slice(&self.hits.to_le_bytes());
        buf
    }
}
