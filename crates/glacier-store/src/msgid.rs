//! Message-ID string table with its hash index.
//!
//! The archive keeps whitespace-stripped Message-IDs in a meta/data pair
//! (`middata` + `midmeta` offsets) and resolves ID → message index through
//! the two hash files. The galaxy uses the same shape with 64-bit offsets
//! over its cross-archive `msgid` table.

use std::path::Path;

use glacier_error::Result;

use crate::hash::{HashIndex, HashIndexBuilder, key_hash};
use crate::metaview::{MetaView, OffsetRecord};
use crate::write::{OffsetWidth, PairWriter};

/// Read side: string table plus hash.
#[derive(Debug)]
pub struct MsgIdTable<O: OffsetRecord> {
    strings: MetaView<O>,
    hash: HashIndex,
}

impl<O: OffsetRecord> MsgIdTable<O> {
    /// Open the four files.
    pub fn open(
        meta_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        hash_path: impl AsRef<Path>,
        hashdata_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let strings = MetaView::open(meta_path, data_path)?;
        let hash = HashIndex::open(hash_path, hashdata_path)?;
        Ok(Self { strings, hash })
    }

    /// Number of stored IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.size()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The ID stored at `idx`.
    #[must_use]
    pub fn get(&self, idx: u32) -> Option<&[u8]> {
        self.strings.cstr(idx as usize)
    }

    /// Resolve an ID to its index; misses are not errors.
    #[must_use]
    pub fn search(&self, id: &[u8]) -> Option<u32> {
        self.hash.search_with(id, |i| self.get(i))
    }

    /// [`Self::search`] with a precomputed xxHash32.
    #[must_use]
    pub fn search_hashed(&self, id: &[u8], hashed: u32) -> Option<u32> {
        self.hash.search_hashed_with(id, hashed, |i| self.get(i))
    }
}

/// Build side: collects IDs in index order, then writes all four files.
#[derive(Debug)]
pub struct MsgIdTableBuilder {
    ids: Vec<Vec<u8>>,
}

impl MsgIdTableBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Append the ID for the next record index.
    pub fn push(&mut self, id: &[u8]) {
        self.ids.push(id.to_vec());
    }

    /// Number of IDs collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no IDs were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the string pair and the hash pair.
    pub fn write(
        self,
        width: OffsetWidth,
        meta_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        hash_path: impl AsRef<Path>,
        hashdata_path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut pair = PairWriter::create(meta_path, data_path, width, true)?;
        let mut hash = HashIndexBuilder::new(self.ids.len() as u64);
        for (i, id) in self.ids.iter().enumerate() {
            pair.append_cstr(id)?;
            hash.insert_hashed(i as u32, key_hash(id))?;
        }
        pair.finish()?;
        hash.write(hash_path, hashdata_path)?;
        Ok(())
    }
}

impl Default for MsgIdTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_open_search() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut builder = MsgIdTableBuilder::new();
        for id in ["a@x", "b@y", "longer.id@example.org"] {
            builder.push(id.as_bytes());
        }
        builder
            .write(
                OffsetWidth::U32,
                dir.path().join("midmeta"),
                dir.path().join("middata"),
                dir.path().join("midhash"),
                dir.path().join("midhashdata"),
            )
            .expect("write");

        let table: MsgIdTable<u32> = MsgIdTable::open(
            dir.path().join("midmeta"),
            dir.path().join("middata"),
            dir.path().join("midhash"),
            dir.path().join("midhashdata"),
        )
        .expect("open");

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1), Some(&b"b@y"[..]));
        assert_eq!(table.search(b"longer.id@example.org"), Some(2));
        assert_eq!(table.search(b"missing@q"), None);
        let h = key_hash(b"a@x");
        assert_eq!(table.search_hashed(b"a@x", h), Some(0));
    }
}
