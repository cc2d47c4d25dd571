//! Read-only memory-mapped file views.

use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use glacier_error::{GlacierError, Result};
use glacier_types::{LexiconDataPacket, LexiconMetaPacket};
use memmap2::Mmap;

/// A whole file mapped read-only.
///
/// Empty files are legal (a fresh archive may have zero toplevel entries)
/// and are represented without a mapping.
#[derive(Debug)]
pub struct FileView {
    inner: Inner,
    path: PathBuf,
}

#[derive(Debug)]
enum Inner {
    Mapped(Mmap),
    Empty,
}

impl FileView {
    /// Map `path` read-only. Fails with [`GlacierError::NotFound`] if the
    /// file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GlacierError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let inner = if len == 0 {
            Inner::Empty
        } else {
            // SAFETY: the archive contract makes every mapped file immutable
            // for the lifetime of the view; no writer exists after build.
            #[allow(unsafe_code)]
            let map = unsafe { Mmap::map(&file)? };
            Inner::Mapped(map)
        };
        Ok(Self {
            inner,
            path: path.to_path_buf(),
        })
    }

    /// The mapped bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match &self.inner {
            Inner::Mapped(map) => map,
            Inner::Empty => &[],
        }
    }

    /// Mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path the view was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A fixed-width little-endian record type that can live in a [`FileMap`].
pub trait Record: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode one record from `buf` (`buf.len() >= SIZE`).
    fn read(buf: &[u8]) -> Self;
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn read(buf: &[u8]) -> Self {
        Self::from_le_bytes(buf[..4].try_into().expect("slice of 4"))
    }
}

impl Record for u64 {
    const SIZE: usize = 8;

    fn read(buf: &[u8]) -> Self {
        Self::from_le_bytes(buf[..8].try_into().expect("slice of 8"))
    }
}

impl Record for LexiconMetaPacket {
    const SIZE: usize = LexiconMetaPacket::SIZE;

    fn read(buf: &[u8]) -> Self {
        Self::from_le_bytes(buf)
    }
}

impl Record for LexiconDataPacket {
    const SIZE: usize = LexiconDataPacket::SIZE;

    fn read(buf: &[u8]) -> Self {
        Self::from_le_bytes(buf)
    }
}

/// A mapped file interpreted as a flat array of records.
#[derive(Debug)]
pub struct FileMap<T: Record> {
    view: FileView,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Record> FileMap<T> {
    /// Map `path` and validate that its size is a whole number of records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let view = FileView::open(path)?;
        Self::from_view(view)
    }

    /// Wrap an already-opened view.
    pub fn from_view(view: FileView) -> Result<Self> {
        if view.len() % T::SIZE != 0 {
            return Err(GlacierError::corrupt(
                view.path(),
                format!("file size {} not a multiple of record size {}", view.len(), T::SIZE),
            ));
        }
        let len = view.len() / T::SIZE;
        Ok(Self {
            view,
            len,
            _marker: PhantomData,
        })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the file holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode record `i`. Panics if out of range, like slice indexing.
    #[must_use]
    pub fn get(&self, i: usize) -> T {
        let start = i * T::SIZE;
        T::read(&self.view.bytes()[start..start + T::SIZE])
    }

    /// Iterate over all records in file order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(|i| self.get(i))
    }

    /// Path the map was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.view.path()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn write_temp(bytes: &[u8]) -> tempfile::TempPath {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        f.write_all(bytes).expect("write");
        f.into_temp_path()
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = FileView::open("/nonexistent/glacier-map").unwrap_err();
        assert!(matches!(err, GlacierError::NotFound(_)));
    }

    #[test]
    fn empty_file_maps_to_empty_slice() {
        let path = write_temp(&[]);
        let view = FileView::open(&path).expect("open");
        assert!(view.is_empty());
        let map: FileMap<u32> = FileMap::open(&path).expect("open");
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn u32_records_decode_little_endian() {
        let mut bytes = Vec::new();
        for v in [1u32, 0xDEAD_BEEF, 7] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let path = write_temp(&bytes);
        let map: FileMap<u32> = FileMap::open(&path).expect("open");
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(1), 0xDEAD_BEEF);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![1, 0xDEAD_BEEF, 7]);
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let path = write_temp(&[1, 2, 3, 4, 5]);
        let err = FileMap::<u32>::open(&path).unwrap_err();
        assert!(matches!(err, GlacierError::Corrupt { .. }));
    }

    #[test]
    fn packet_records_decode() {
        let packet = LexiconMetaPacket {
            word: 9,
            data: 2,
            count: 5,
        };
        let path = write_temp(&packet.to_le_bytes());
        let map: FileMap<LexiconMetaPacket> = FileMap::open(&path).expect("open");
        assert_eq!(map.get(0), packet);
    }
}
