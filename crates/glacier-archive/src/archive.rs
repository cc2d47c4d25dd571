//! The per-archive read façade.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glacier_conn::{ConnectivityView, ThreadSource};
use glacier_error::{GlacierError, Result};
use glacier_lexicon::{LexiconView, SearchData, SearchEngine};
use glacier_message::date::time_chart_bucket;
use glacier_store::{ExpandingBuffer, FileView, MessageSource, MetaView, MsgIdTable};
use glacier_types::{ClassFilter, SearchFlags};
use tracing::debug;

/// Records per message in the `strmeta`/`str` table.
const STRINGS_PER_MESSAGE: usize = 3;
const STR_FROM: usize = 0;
const STR_SUBJECT: usize = 1;
const STR_REALNAME: usize = 2;

/// An open archive: every view mmapped, shareable by any number of readers.
///
/// All returned slices borrow from the archive and stay valid for its
/// lifetime (message text additionally follows the expanding-buffer
/// contract of [`MessageSource::message`]).
#[derive(Debug)]
pub struct Archive {
    dir: PathBuf,
    source: MessageSource,
    conn: ConnectivityView,
    msgids: MsgIdTable<u32>,
    strings: MetaView<u32>,
    lexicon: LexiconView,
    name: Option<FileView>,
    desc_short: Option<FileView>,
    desc_long: Option<FileView>,
}

fn optional_view(path: &Path) -> Result<Option<FileView>> {
    if path.is_file() {
        Ok(Some(FileView::open(path)?))
    } else {
        Ok(None)
    }
}

impl Archive {
    /// Open `dir`. Missing required files surface as [`GlacierError::NotFound`],
    /// inconsistent table sizes as [`GlacierError::Corrupt`].
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(GlacierError::NotFound(dir.to_path_buf()));
        }
        let source = MessageSource::open(dir)?;
        let conn = ConnectivityView::open(dir)?;
        let msgids = MsgIdTable::open(
            dir.join("midmeta"),
            dir.join("middata"),
            dir.join("midhash"),
            dir.join("midhashdata"),
        )?;
        let strings = MetaView::open(dir.join("strmeta"), dir.join("str"))?;
        let lexicon = LexiconView::open(dir)?;

        let count = source.len();
        if conn.size() != count
            || msgids.len() != count
            || strings.size() != count * STRINGS_PER_MESSAGE
        {
            return Err(GlacierError::corrupt(
                dir,
                format!(
                    "table sizes disagree: {count} messages, {} connectivity, {} ids, {} strings",
                    conn.size(),
                    msgids.len(),
                    strings.size()
                ),
            ));
        }

        let archive = Self {
            dir: dir.to_path_buf(),
            source,
            conn,
            msgids,
            strings,
            lexicon,
            name: optional_view(&dir.join("name"))?,
            desc_short: optional_view(&dir.join("desc_short"))?,
            desc_long: optional_view(&dir.join("desc_long"))?,
        };
        debug!(dir = %archive.dir.display(), messages = count, "archive opened");
        Ok(archive)
    }

    /// Directory the archive was opened from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.source.len()
    }

    /// Raw text of message `idx`.
    pub fn message<'a>(&'a self, idx: u32, eb: &'a mut ExpandingBuffer) -> Result<&'a [u8]> {
        self.source.message(idx as usize, eb)
    }

    /// Raw text of the message with the given Message-ID.
    pub fn message_by_msgid<'a>(
        &'a self,
        msgid: &[u8],
        eb: &'a mut ExpandingBuffer,
    ) -> Option<&'a [u8]> {
        let idx = self.index_of(msgid)?;
        self.message(idx, eb).ok()
    }

    /// Message index of a Message-ID; misses are not errors.
    #[must_use]
    pub fn index_of(&self, msgid: &[u8]) -> Option<u32> {
        self.msgids.search(msgid)
    }

    /// [`Self::index_of`] with a precomputed xxHash32.
    #[must_use]
    pub fn index_of_hashed(&self, msgid: &[u8], hashed: u32) -> Option<u32> {
        self.msgids.search_hashed(msgid, hashed)
    }

    /// The Message-ID stored for `idx`.
    #[must_use]
    pub fn message_id(&self, idx: u32) -> Option<&[u8]> {
        self.msgids.get(idx)
    }

    /// Toplevel message indices.
    pub fn toplevel(&self) -> impl Iterator<Item = u32> + '_ {
        self.conn.toplevel()
    }

    /// Number of toplevel messages.
    #[must_use]
    pub fn toplevel_count(&self) -> usize {
        self.conn.toplevel_count()
    }

    /// Parent of `idx`, -1 for roots.
    #[must_use]
    pub fn parent(&self, idx: u32) -> i32 {
        self.conn.parent(idx)
    }

    /// Parent by Message-ID.
    #[must_use]
    pub fn parent_by_msgid(&self, msgid: &[u8]) -> Option<i32> {
        self.index_of(msgid).map(|idx| self.parent(idx))
    }

    /// Direct children of `idx`, sorted by epoch ascending.
    pub fn children(&self, idx: u32) -> impl Iterator<Item = u32> + '_ {
        self.conn.children(idx)
    }

    /// Transitive descendant count of `idx`.
    #[must_use]
    pub fn total_children(&self, idx: u32) -> u32 {
        self.conn.total_children(idx)
    }

    /// Unix timestamp of `idx`; 0 = unparsable date.
    #[must_use]
    pub fn date(&self, idx: u32) -> u32 {
        self.conn.epoch(idx)
    }

    /// `From:` value of `idx` (empty if absent).
    #[must_use]
    pub fn from(&self, idx: u32) -> &[u8] {
        self.string(idx, STR_FROM)
    }

    /// Subject of `idx` (empty if absent).
    #[must_use]
    pub fn subject(&self, idx: u32) -> &[u8] {
        self.string(idx, STR_SUBJECT)
    }

    /// Display name of the sender of `idx` (empty if absent).
    #[must_use]
    pub fn real_name(&self, idx: u32) -> &[u8] {
        self.string(idx, STR_REALNAME)
    }

    fn string(&self, idx: u32, which: usize) -> &[u8] {
        self.strings
            .cstr(idx as usize * STRINGS_PER_MESSAGE + which)
            .unwrap_or_default()
    }

    /// Ranked full-text search.
    #[must_use]
    pub fn search(&self, query: &str, flags: SearchFlags, filter: ClassFilter) -> SearchData {
        self.engine().search(query, flags, filter)
    }

    /// Search over pre-tokenized terms (the threader's path).
    #[must_use]
    pub fn search_terms(
        &self,
        terms: &[String],
        flags: SearchFlags,
        filter: ClassFilter,
    ) -> SearchData {
        self.engine().search_terms(terms, flags, filter)
    }

    fn engine(&self) -> SearchEngine<'_> {
        SearchEngine::new(&self.lexicon, self.message_count() as u32)
    }

    /// Message counts bucketed by `YYYY-MM`; unparsable dates are excluded.
    #[must_use]
    pub fn time_chart(&self) -> BTreeMap<String, u32> {
        let mut chart = BTreeMap::new();
        for idx in 0..self.message_count() as u32 {
            let epoch = self.date(idx);
            if epoch == 0 {
                continue;
            }
            *chart.entry(time_chart_bucket(epoch)).or_insert(0) += 1;
        }
        chart
    }

    /// Archive display name, when the `name` file is present and non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&[u8]> {
        trimmed_file(self.name.as_ref())
    }

    /// One-line description from `desc_short`.
    #[must_use]
    pub fn short_description(&self) -> Option<&[u8]> {
        trimmed_file(self.desc_short.as_ref())
    }

    /// Long description from `desc_long`.
    #[must_use]
    pub fn long_description(&self) -> Option<&[u8]> {
        trimmed_file(self.desc_long.as_ref())
    }
}

/// File bytes without a trailing newline; `None` when absent or empty.
fn trimmed_file(view: Option<&FileView>) -> Option<&[u8]> {
    let mut bytes = view?.bytes();
    while bytes.last() == Some(&b'\n') || bytes.last() == Some(&b'\r') {
        bytes = &bytes[..bytes.len() - 1];
    }
    (!bytes.is_empty()).then_some(bytes)
}

impl ThreadSource for Archive {
    fn message<'a>(&'a self, idx: u32, eb: &'a mut ExpandingBuffer) -> Result<&'a [u8]> {
        Archive::message(self, idx, eb)
    }

    fn subject(&self, idx: u32) -> &[u8] {
        Archive::subject(self, idx)
    }

    fn search_content(&self, terms: &[String]) -> Vec<(u32, f32)> {
        self.search_terms(terms, SearchFlags::empty(), ClassFilter::content_only())
            .results
            .into_iter()
            .map(|r| (r.postid, r.rank))
            .collect()
    }
}
