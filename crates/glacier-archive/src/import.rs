//! Raw-message importer.
//!
//! Turns a pile of RFC-5322 message files into the base archive tables:
//! `meta`/`data` (message store), `midmeta`/`middata` + hash (Message-IDs),
//! and `strmeta`/`str` (per-message from/subject/realname triples). The
//! connectivity and lexicon builders run on top of this.

use std::path::Path;

use glacier_error::Result;
use glacier_message::{find_header, message_id, real_name};
use glacier_store::{MsgIdTableBuilder, OffsetWidth, PairWriter, StoreBuilder};
use hashbrown::HashSet;
use tracing::info;

/// Counters reported by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Messages imported.
    pub messages: usize,
    /// Messages without a usable Message-ID header (one was synthesised).
    pub missing_msgid: usize,
    /// Messages whose Message-ID duplicated an earlier one (kept, but only
    /// the first owns the hash entry).
    pub duplicate_msgid: usize,
    /// Message-IDs that contained whitespace (stripped).
    pub broken_msgid: usize,
}

/// Streaming importer: feed messages in index order, then [`Self::finish`].
#[derive(Debug)]
pub struct ArchiveImporter {
    store: StoreBuilder,
    strings: PairWriter,
    ids: MsgIdTableBuilder,
    seen: HashSet<Vec<u8>>,
    stats: ImportStats,
}

impl ArchiveImporter {
    /// Create the output files under `dir` (which must exist).
    pub fn create(dir: &Path) -> Result<Self> {
        Ok(Self {
            store: StoreBuilder::create(dir)?,
            strings: PairWriter::create(
                dir.join("strmeta"),
                dir.join("str"),
                OffsetWidth::U32,
                true,
            )?,
            ids: MsgIdTableBuilder::new(),
            seen: HashSet::new(),
            stats: ImportStats::default(),
        })
    }

    /// Append one message.
    pub fn append(&mut self, text: &[u8]) -> Result<u32> {
        let idx = self.store.append(text)?;

        let id = match message_id(text) {
            Some((id, broken)) => {
                self.stats.broken_msgid += usize::from(broken);
                id.into_owned()
            }
            None => {
                self.stats.missing_msgid += 1;
                format!("glacier.synthetic.{idx}@invalid").into_bytes()
            }
        };
        if !self.seen.insert(id.clone()) {
            self.stats.duplicate_msgid += 1;
        }
        self.ids.push(&id);

        let from = find_header(text, "From");
        match from {
            Some(value) => {
                self.strings.append_cstr(value)?;
            }
            None => self.strings.append_absent()?,
        }
        match find_header(text, "Subject") {
            Some(value) => {
                self.strings.append_cstr(value)?;
            }
            None => self.strings.append_absent()?,
        }
        match from {
            Some(value) => {
                self.strings.append_cstr(real_name(value))?;
            }
            None => self.strings.append_absent()?,
        }

        self.stats.messages += 1;
        Ok(idx)
    }

    /// Flush every table and write the Message-ID hash.
    pub fn finish(self, dir: &Path) -> Result<ImportStats> {
        self.store.finish()?;
        self.strings.finish()?;
        self.ids.write(
            OffsetWidth::U32,
            dir.join("midmeta"),
            dir.join("middata"),
            dir.join("midhash"),
            dir.join("midhashdata"),
        )?;
        info!(
            messages = self.stats.messages,
            missing_msgid = self.stats.missing_msgid,
            duplicate_msgid = self.stats.duplicate_msgid,
            broken_msgid = self.stats.broken_msgid,
            "import finished"
        );
        Ok(self.stats)
    }
}
