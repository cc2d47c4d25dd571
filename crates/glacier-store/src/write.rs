//! Build-side writers for meta/data pairs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glacier_error::{GlacierError, Result};

/// Offset width of a meta file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    /// 4-byte offsets.
    U32,
    /// 8-byte offsets.
    U64,
}

/// Appends records to a meta/data pair.
///
/// With `reserve` set, a single zero byte is written to `data` first so that
/// offset 0 can mean "absent" ([`Self::append_absent`]).
#[derive(Debug)]
pub struct PairWriter {
    meta: BufWriter<File>,
    data: BufWriter<File>,
    offset: u64,
    width: OffsetWidth,
}

impl PairWriter {
    /// Create (truncate) both files.
    pub fn create(
        meta_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        width: OffsetWidth,
        reserve: bool,
    ) -> Result<Self> {
        let meta = BufWriter::new(File::create(meta_path)?);
        let mut data = BufWriter::new(File::create(data_path)?);
        let offset = if reserve {
            data.write_all(&[0u8])?;
            1
        } else {
            0
        };
        Ok(Self {
            meta,
            data,
            offset,
            width,
        })
    }

    fn write_offset(&mut self, offset: u64) -> Result<()> {
        match self.width {
            OffsetWidth::U32 => {
                let narrow = u32::try_from(offset)
                    .map_err(|_| GlacierError::internal("data file exceeds u32 offsets"))?;
                self.meta.write_all(&narrow.to_le_bytes())?;
            }
            OffsetWidth::U64 => self.meta.write_all(&offset.to_le_bytes())?,
        }
        Ok(())
    }

    /// Append a record, returning the offset it was written at.
    pub fn append(&mut self, record: &[u8]) -> Result<u64> {
        let at = self.offset;
        self.write_offset(at)?;
        self.data.write_all(record)?;
        self.offset += record.len() as u64;
        Ok(at)
    }

    /// Append a record plus a NUL terminator.
    pub fn append_cstr(&mut self, record: &[u8]) -> Result<u64> {
        let at = self.append(record)?;
        self.data.write_all(&[0u8])?;
        self.offset += 1;
        Ok(at)
    }

    /// Record an absent entry (meta offset 0, no data bytes).
    pub fn append_absent(&mut self) -> Result<()> {
        self.write_offset(0)
    }

    /// Flush both files.
    pub fn finish(mut self) -> Result<()> {
        self.meta.flush()?;
        self.data.flush()?;
        Ok(())
    }
}
