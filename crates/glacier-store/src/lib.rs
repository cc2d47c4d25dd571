//! Memory-mapped access layer for frozen archives.
//!
//! Everything an archive directory contains is one of three shapes:
//! - a flat array of fixed-width records ([`FileMap`]),
//! - a parallel meta/data pair where `meta[i]` is a byte offset into `data`
//!   ([`MetaView`]),
//! - a bucketised hash table over a string table ([`HashIndex`]).
//!
//! All views map their files read-only and hand out borrowed slices tied to
//! the view's lifetime. Builders live in [`write`] and are the only code in
//! the workspace that creates archive files.

pub mod filemap;
pub mod hash;
pub mod message;
pub mod metaview;
pub mod msgid;
pub mod write;

pub use filemap::{FileMap, FileView, Record};
pub use hash::{HashIndex, HashIndexBuilder, key_hash};
pub use msgid::{MsgIdTable, MsgIdTableBuilder};
pub use message::{ExpandingBuffer, MessageSource, RawMessageView, StoreBuilder, ZMessageView, pack_store};
pub use metaview::{MetaView, OffsetRecord, le_u32_values};
pub use write::{OffsetWidth, PairWriter};
