//! Parallel meta/data file pairs.
//!
//! `meta` holds one offset per record; record `i` spans
//! `data[meta[i] .. meta[i+1])` and the last record extends to end of file.
//! Tables that need an "absent" notion reserve byte 0 of `data` (a single
//! zero byte written at build time) so a meta offset of 0 never points at a
//! real record.

use std::path::Path;

use glacier_error::{GlacierError, Result};
use memchr::memchr;

use crate::filemap::{FileMap, FileView, Record};

/// Offset types a meta file may use.
pub trait OffsetRecord: Record {
    /// Widen to a byte offset.
    fn as_u64(self) -> u64;
}

impl OffsetRecord for u32 {
    fn as_u64(self) -> u64 {
        u64::from(self)
    }
}

impl OffsetRecord for u64 {
    fn as_u64(self) -> u64 {
        self
    }
}

/// A read-only meta/data pair with offsets of type `O`.
#[derive(Debug)]
pub struct MetaView<O: OffsetRecord> {
    meta: FileMap<O>,
    data: FileView,
}

impl<O: OffsetRecord> MetaView<O> {
    /// Open both files and validate the offset table against the data size.
    ///
    /// Offsets must be non-decreasing, except that 0 may appear anywhere in
    /// tables using the absent convention.
    pub fn open(meta_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Result<Self> {
        let meta: FileMap<O> = FileMap::open(meta_path)?;
        let data = FileView::open(data_path)?;

        let mut prev = 0u64;
        for i in 0..meta.len() {
            let off = meta.get(i).as_u64();
            if off == 0 {
                continue;
            }
            if off < prev || off > data.len() as u64 {
                return Err(GlacierError::corrupt(
                    meta.path(),
                    format!("offset {off} at record {i} out of order or past data size {}", data.len()),
                ));
            }
            prev = off;
        }
        Ok(Self { meta, data })
    }

    /// Number of records.
    #[must_use]
    pub fn size(&self) -> usize {
        self.meta.len()
    }

    /// Raw bytes of record `i`: `data[meta[i] .. meta[i+1])`, with the last
    /// record running to end of file.
    ///
    /// Only meaningful for tables without absent records.
    #[must_use]
    pub fn record(&self, i: usize) -> &[u8] {
        let start = self.meta.get(i).as_u64() as usize;
        let end = if i + 1 < self.meta.len() {
            self.meta.get(i + 1).as_u64() as usize
        } else {
            self.data.len()
        };
        &self.data.bytes()[start..end.max(start)]
    }

    /// NUL-terminated string record `i`, without the terminator.
    ///
    /// Returns `None` for absent records (offset 0) and for records whose
    /// terminator is missing.
    #[must_use]
    pub fn cstr(&self, i: usize) -> Option<&[u8]> {
        let start = self.meta.get(i).as_u64() as usize;
        if start == 0 {
            return None;
        }
        let tail = &self.data.bytes()[start..];
        memchr(0, tail).map(|nul| &tail[..nul])
    }

}

/// Decode a record of packed little-endian u32 values.
pub fn le_u32_values(record: &[u8]) -> impl Iterator<Item = u32> + '_ {
    record.chunks_exact(4).map(u32::read)
}
