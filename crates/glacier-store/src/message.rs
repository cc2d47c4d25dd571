//! Message stores: raw and block-compressed.
//!
//! Both variants answer `message(idx, &mut ExpandingBuffer) -> &[u8]` where
//! the returned bytes exclude the NUL terminator every stored message
//! carries. The raw variant answers straight out of the map; the compressed
//! variant decompresses the containing block into the caller's buffer and
//! returns a slice of it, so the bytes stay valid until the buffer is next
//! reused or the source is dropped.
//!
//! Compressed layout (`zmeta`, `zdata`, `zdict`):
//! - `zmeta` header `{ nblocks: u32, nmessages: u32 }`, then per block
//!   `{ zoff: u64, zlen: u32, ulen: u32 }`, then per message
//!   `{ block: u32, offset_in_block: u32 }`;
//! - `zdata` is the concatenation of zstd frames, one per block, compressed
//!   with the shared dictionary in `zdict` (which may be empty for corpora
//!   too small to train one);
//! - inside a decompressed block messages remain NUL-terminated.

use std::path::Path;

use glacier_error::{GlacierError, Result};
use memchr::memchr;
use tracing::{debug, info};
use zstd::bulk::{Compressor, Decompressor};
use zstd::dict::DecoderDictionary;

use crate::filemap::{FileView, Record};
use crate::metaview::MetaView;
use crate::write::{OffsetWidth, PairWriter};

/// Messages per compressed block.
const BLOCK_MESSAGE_LIMIT: usize = 128;
/// Uncompressed bytes per compressed block.
const BLOCK_BYTE_LIMIT: usize = 256 * 1024;
/// Dictionary budget handed to the zstd trainer.
const DICT_SIZE: usize = 110 * 1024;
/// Messages sampled for dictionary training.
const DICT_SAMPLE_LIMIT: usize = 1024;
/// Compression level for archive blocks.
const COMPRESSION_LEVEL: i32 = 19;

/// Reusable scratch buffer for message fetches.
///
/// Owned by one caller and reused across calls to amortise allocation; never
/// shared between concurrent queries.
#[derive(Debug, Default)]
pub struct ExpandingBuffer {
    buf: Vec<u8>,
}

impl ExpandingBuffer {
    /// An empty buffer; capacity grows on demand and is kept.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, capacity: usize) -> &mut Vec<u8> {
        self.buf.clear();
        self.buf.reserve(capacity);
        &mut self.buf
    }
}

/// Raw message store over the `meta`/`data` pair.
#[derive(Debug)]
pub struct RawMessageView {
    view: MetaView<u64>,
}

impl RawMessageView {
    /// Open `meta` and `data` under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let view = MetaView::open(dir.join("meta"), dir.join("data"))?;
        Ok(Self { view })
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.size()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message `idx` without its NUL terminator, straight from the map.
    pub fn message(&self, idx: usize) -> Result<&[u8]> {
        let record = self.view.record(idx);
        match memchr(0, record) {
            Some(nul) => Ok(&record[..nul]),
            None => Err(GlacierError::corrupt(
                "data",
                format!("message {idx} is missing its NUL terminator"),
            )),
        }
    }
}

/// Block-compressed message store over `zmeta`/`zdata`/`zdict`.
pub struct ZMessageView {
    zmeta: FileView,
    zdata: FileView,
    dict: Option<DecoderDictionary<'static>>,
    nblocks: usize,
    nmessages: usize,
}

impl std::fmt::Debug for ZMessageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZMessageView")
            .field("nblocks", &self.nblocks)
            .field("nmessages", &self.nmessages)
            .field("dict", &self.dict.is_some())
            .finish()
    }
}

/// Per-block descriptor decoded from `zmeta`.
#[derive(Debug, Clone, Copy)]
struct BlockDesc {
    zoff: u64,
    zlen: u32,
    ulen: u32,
}

const ZMETA_HEADER: usize = 8;
const BLOCK_DESC_SIZE: usize = 16;
const MSG_DESC_SIZE: usize = 8;

impl ZMessageView {
    /// Open the three z-files under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let zmeta = FileView::open(dir.join("zmeta"))?;
        let zdata = FileView::open(dir.join("zdata"))?;
        let zdict = FileView::open(dir.join("zdict"))?;

        if zmeta.len() < ZMETA_HEADER {
            return Err(GlacierError::corrupt(zmeta.path(), "missing zmeta header"));
        }
        let nblocks = u32::read(zmeta.bytes()) as usize;
        let nmessages = u32::read(&zmeta.bytes()[4..]) as usize;
        let expect = ZMETA_HEADER + nblocks * BLOCK_DESC_SIZE + nmessages * MSG_DESC_SIZE;
        if zmeta.len() != expect {
            return Err(GlacierError::corrupt(
                zmeta.path(),
                format!("zmeta size {} does not match {nblocks} blocks / {nmessages} messages", zmeta.len()),
            ));
        }

        let dict = if zdict.is_empty() {
            None
        } else {
            Some(DecoderDictionary::copy(zdict.bytes()))
        };
        let view = Self {
            zmeta,
            zdata,
            dict,
            nblocks,
            nmessages,
        };
        for block in 0..nblocks {
            let desc = view.block_desc(block);
            if desc.zoff + u64::from(desc.zlen) > view.zdata.len() as u64 {
                return Err(GlacierError::corrupt(
                    view.zmeta.path(),
                    format!("block {block} extends past zdata"),
                ));
            }
        }
        Ok(view)
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nmessages
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nmessages == 0
    }

    fn block_desc(&self, block: usize) -> BlockDesc {
        let at = ZMETA_HEADER + block * BLOCK_DESC_SIZE;
        let buf = &self.zmeta.bytes()[at..];
        BlockDesc {
            zoff: u64::read(buf),
            zlen: u32::read(&buf[8..]),
            ulen: u32::read(&buf[12..]),
        }
    }

    fn message_desc(&self, idx: usize) -> (usize, usize) {
        let at = ZMETA_HEADER + self.nblocks * BLOCK_DESC_SIZE + idx * MSG_DESC_SIZE;
        let buf = &self.zmeta.bytes()[at..];
        (u32::read(buf) as usize, u32::read(&buf[4..]) as usize)
    }

    /// Message `idx`, decompressed into `eb`, without its NUL terminator.
    pub fn message<'a>(&'a self, idx: usize, eb: &'a mut ExpandingBuffer) -> Result<&'a [u8]> {
        let (block, offset) = self.message_desc(idx);
        if block >= self.nblocks {
            return Err(GlacierError::corrupt(
                self.zmeta.path(),
                format!("message {idx} references block {block} of {}", self.nblocks),
            ));
        }
        let desc = self.block_desc(block);
        let start = desc.zoff as usize;
        let src = &self.zdata.bytes()[start..start + desc.zlen as usize];

        let mut decompressor = match &self.dict {
            Some(dict) => Decompressor::with_prepared_dictionary(dict)?,
            None => Decompressor::new()?,
        };
        let out = eb.reset(desc.ulen as usize);
        decompressor.decompress_to_buffer(src, out)?;

        if offset >= out.len() {
            return Err(GlacierError::corrupt(
                self.zmeta.path(),
                format!("message {idx} offset {offset} past its decompressed block"),
            ));
        }
        let tail = &out[offset..];
        match memchr(0, tail) {
            Some(nul) => Ok(&tail[..nul]),
            None => Err(GlacierError::corrupt(
                self.zmeta.path(),
                format!("message {idx} is missing its NUL terminator"),
            )),
        }
    }
}

/// The closed variant over both store kinds.
#[derive(Debug)]
pub enum MessageSource {
    /// Uncompressed `meta`/`data`.
    Raw(RawMessageView),
    /// Block-compressed `zmeta`/`zdata`/`zdict`.
    Compressed(ZMessageView),
}

impl MessageSource {
    /// Open whichever variant `dir` holds, preferring the compressed one.
    pub fn open(dir: &Path) -> Result<Self> {
        if dir.join("zmeta").is_file() {
            Ok(Self::Compressed(ZMessageView::open(dir)?))
        } else {
            Ok(Self::Raw(RawMessageView::open(dir)?))
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(v) => v.len(),
            Self::Compressed(v) => v.len(),
        }
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message `idx` without its NUL terminator.
    pub fn message<'a>(&'a self, idx: usize, eb: &'a mut ExpandingBuffer) -> Result<&'a [u8]> {
        match self {
            Self::Raw(v) => v.message(idx),
            Self::Compressed(v) => v.message(idx, eb),
        }
    }
}

struct PackState {
    blocks: Vec<(u64, u32, u32)>,
    messages: Vec<(u32, u32)>,
    zdata: std::fs::File,
    zoff: u64,
    block: Vec<u8>,
    block_count: usize,
}

impl PackState {
    fn flush(&mut self, compressor: &mut Compressor<'_>) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        let compressed = compressor.compress(&self.block)?;
        std::io::Write::write_all(&mut self.zdata, &compressed)?;
        self.blocks
            .push((self.zoff, compressed.len() as u32, self.block.len() as u32));
        self.zoff += compressed.len() as u64;
        self.block.clear();
        self.block_count = 0;
        Ok(())
    }
}

/// Convert a raw store into the compressed variant.
///
/// Groups messages into blocks of at most [`BLOCK_MESSAGE_LIMIT`] messages
/// and [`BLOCK_BYTE_LIMIT`] uncompressed bytes, trains a shared dictionary
/// over a message sample, and writes `zmeta`/`zdata`/`zdict`.
pub fn pack_store(dir: &Path) -> Result<()> {
    let raw = RawMessageView::open(dir)?;
    let count = raw.len();

    let sample_stride = count.div_ceil(DICT_SAMPLE_LIMIT).max(1);
    let samples: Vec<&[u8]> = (0..count)
        .step_by(sample_stride)
        .filter_map(|i| raw.message(i).ok())
        .filter(|m| !m.is_empty())
        .collect();
    let dict = match zstd::dict::from_samples(&samples, DICT_SIZE) {
        Ok(dict) => dict,
        Err(err) => {
            debug!(%err, "dictionary training failed, packing without one");
            Vec::new()
        }
    };

    let mut compressor = if dict.is_empty() {
        Compressor::new(COMPRESSION_LEVEL)?
    } else {
        Compressor::with_dictionary(COMPRESSION_LEVEL, &dict)?
    };

    let mut pack = PackState {
        blocks: Vec::new(),
        messages: Vec::new(),
        zdata: std::fs::File::create(dir.join("zdata"))?,
        zoff: 0,
        block: Vec::with_capacity(BLOCK_BYTE_LIMIT),
        block_count: 0,
    };

    for i in 0..count {
        let msg = raw.message(i)?;
        if !pack.block.is_empty()
            && (pack.block_count == BLOCK_MESSAGE_LIMIT
                || pack.block.len() + msg.len() + 1 > BLOCK_BYTE_LIMIT)
        {
            pack.flush(&mut compressor)?;
        }
        pack.messages
            .push((pack.blocks.len() as u32, pack.block.len() as u32));
        pack.block.extend_from_slice(msg);
        pack.block.push(0);
        pack.block_count += 1;
    }
    pack.flush(&mut compressor)?;
    let PackState {
        blocks, messages, ..
    } = pack;

    let mut zmeta = Vec::with_capacity(
        ZMETA_HEADER + blocks.len() * BLOCK_DESC_SIZE + messages.len() * MSG_DESC_SIZE,
    );
    zmeta.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    zmeta.extend_from_slice(&(messages.len() as u32).to_le_bytes());
    for (off, zlen, ulen) in &blocks {
        zmeta.extend_from_slice(&off.to_le_bytes());
        zmeta.extend_from_slice(&zlen.to_le_bytes());
        zmeta.extend_from_slice(&ulen.to_le_bytes());
    }
    for (blk, off) in &messages {
        zmeta.extend_from_slice(&blk.to_le_bytes());
        zmeta.extend_from_slice(&off.to_le_bytes());
    }
    std::fs::write(dir.join("zmeta"), zmeta)?;
    std::fs::write(dir.join("zdict"), dict)?;

    info!(messages = count, blocks = blocks.len(), "packed message store");
    Ok(())
}

/// Build a raw message store under `dir`.
#[derive(Debug)]
pub struct StoreBuilder {
    pair: PairWriter,
    count: usize,
}

impl StoreBuilder {
    /// Create `meta`/`data` under `dir`, truncating existing files.
    pub fn create(dir: &Path) -> Result<Self> {
        let pair = PairWriter::create(dir.join("meta"), dir.join("data"), OffsetWidth::U64, true)?;
        Ok(Self { pair, count: 0 })
    }

    /// Append one message verbatim; the store adds the NUL terminator.
    pub fn append(&mut self, message: &[u8]) -> Result<u32> {
        let idx = self.count as u32;
        self.pair.append_cstr(message)?;
        self.count += 1;
        Ok(idx)
    }

    /// Number of messages appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush both files.
    pub fn finish(self) -> Result<()> {
        self.pair.finish()
    }
}
