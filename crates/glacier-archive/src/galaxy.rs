//! The galaxy: many archives as one addressable collection.
//!
//! Build writes, under the galaxy directory:
//! - `archives.meta`: `(begin, end)` u32 offset pairs into the operator's
//!   newline-separated `archives` path list;
//! - `str.meta`/`str`: name and short description per archive (name
//!   defaults to the last path component);
//! - `msgid.meta`/`msgid` + `midhash`/`midhashdata`: the cross-archive
//!   unique Message-ID set and its hash;
//! - `midgr.meta`/`midgr`: per unique ID, the ordered list of archive
//!   indices containing it, content-deduplicated so identical group
//!   vectors share storage.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glacier_error::{GlacierError, Result};
use glacier_store::{
    FileMap, FileView, MetaView, MsgIdTable, MsgIdTableBuilder, OffsetWidth, PairWriter, key_hash,
    le_u32_values,
};
use hashbrown::{HashMap, HashSet};
use tracing::info;

use crate::archive::Archive;

/// Counters reported by a galaxy build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GalaxyStats {
    /// Archives indexed.
    pub archives: usize,
    /// Messages across all archives.
    pub messages: u64,
    /// Unique Message-IDs.
    pub unique: usize,
}

/// An open galaxy.
#[derive(Debug)]
pub struct Galaxy {
    dir: PathBuf,
    paths_meta: FileMap<u32>,
    paths: FileView,
    strings: MetaView<u32>,
    msgids: MsgIdTable<u64>,
    // Group vectors are content-deduplicated, so `midgr.meta` offsets are
    // not monotonic and the records carry their own length; a plain pair of
    // maps replaces the MetaView here.
    group_meta: FileMap<u32>,
    group_data: FileView,
}

impl Galaxy {
    /// Open the galaxy under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let paths_meta = FileMap::open(dir.join("archives.meta"))?;
        let paths = FileView::open(dir.join("archives"))?;
        let strings = MetaView::open(dir.join("str.meta"), dir.join("str"))?;
        let msgids = MsgIdTable::open(
            dir.join("msgid.meta"),
            dir.join("msgid"),
            dir.join("midhash"),
            dir.join("midhashdata"),
        )?;
        let group_meta = FileMap::open(dir.join("midgr.meta"))?;
        let group_data = FileView::open(dir.join("midgr"))?;

        if paths_meta.len() % 2 != 0 {
            return Err(GlacierError::corrupt(
                dir.join("archives.meta"),
                "odd offset-pair count",
            ));
        }
        let count = paths_meta.len() / 2;
        if strings.size() != count * 2 || group_meta.len() != msgids.len() {
            return Err(GlacierError::corrupt(
                dir,
                format!(
                    "table sizes disagree: {count} archives, {} strings, {} ids, {} groups",
                    strings.size(),
                    msgids.len(),
                    group_meta.len()
                ),
            ));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            paths_meta,
            paths,
            strings,
            msgids,
            group_meta,
            group_data,
        })
    }

    /// Number of archives.
    #[must_use]
    pub fn archive_count(&self) -> usize {
        self.paths_meta.len() / 2
    }

    /// Number of unique Message-IDs.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.msgids.len()
    }

    /// Filesystem path of archive `i`.
    #[must_use]
    pub fn archive_path(&self, i: u32) -> &[u8] {
        let begin = self.paths_meta.get(i as usize * 2) as usize;
        let end = self.paths_meta.get(i as usize * 2 + 1) as usize;
        &self.paths.bytes()[begin..end]
    }

    /// Display name of archive `i` (always present; defaults to the last
    /// path component at build time).
    #[must_use]
    pub fn archive_name(&self, i: u32) -> &[u8] {
        self.strings.cstr(i as usize * 2).unwrap_or_default()
    }

    /// Short description of archive `i`.
    #[must_use]
    pub fn archive_description(&self, i: u32) -> Option<&[u8]> {
        self.strings.cstr(i as usize * 2 + 1)
    }

    /// Archive indices containing `msgid`, in ascending order; empty for
    /// unknown IDs.
    pub fn find_archives(&self, msgid: &[u8]) -> impl Iterator<Item = u32> + '_ {
        let record = match self.msgids.search(msgid) {
            Some(idx) => {
                let at = self.group_meta.get(idx as usize) as usize;
                &self.group_data.bytes()[at..]
            }
            None => &[][..],
        };
        let count = if record.len() >= 4 {
            u32::from_le_bytes(record[0..4].try_into().expect("slice of 4")) as usize
        } else {
            0
        };
        let count = count.min(record.len().saturating_sub(4) / 4);
        let ids = if count == 0 {
            &[][..]
        } else {
            &record[4..4 + count * 4]
        };
        le_u32_values(ids)
    }

    /// Open archive `i`.
    pub fn open_archive(&self, i: u32) -> Result<Archive> {
        let path = std::str::from_utf8(self.archive_path(i)).map_err(|_| {
            GlacierError::corrupt(self.dir.join("archives"), "archive path is not UTF-8")
        })?;
        Archive::open(path)
    }
}

/// Parse the operator's `archives` list into `(begin, end)` byte ranges.
fn archive_ranges(bytes: &[u8]) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let mut at = 0usize;
    while at < bytes.len() {
        let begin = at;
        while at < bytes.len() && bytes[at] != b'\r' && bytes[at] != b'\n' {
            at += 1;
        }
        if at > begin {
            ranges.push((begin as u32, at as u32));
        }
        while at < bytes.len() && (bytes[at] == b'\r' || bytes[at] == b'\n') {
            at += 1;
        }
    }
    ranges
}

/// Last path component, for the archive-name default.
fn last_component(path: &[u8]) -> &[u8] {
    path.rsplit(|&b| b == b'/' || b == b'\\')
        .next()
        .filter(|c| !c.is_empty())
        .unwrap_or(path)
}

/// Build every galaxy index under `dir` from its `archives` list.
pub fn build_galaxy(dir: &Path) -> Result<GalaxyStats> {
    let list_path = dir.join("archives");
    if !list_path.is_file() {
        return Err(GlacierError::NotFound(list_path));
    }
    let list = std::fs::read(&list_path)?;
    let ranges = archive_ranges(&list);

    let mut meta = BufWriter::new(File::create(dir.join("archives.meta"))?);
    for &(begin, end) in &ranges {
        meta.write_all(&begin.to_le_bytes())?;
        meta.write_all(&end.to_le_bytes())?;
    }
    meta.flush()?;

    let mut archives = Vec::with_capacity(ranges.len());
    let mut messages = 0u64;
    for &(begin, end) in &ranges {
        let raw = &list[begin as usize..end as usize];
        let path = std::str::from_utf8(raw)
            .map_err(|_| GlacierError::corrupt(&list_path, "archive path is not UTF-8"))?;
        let archive =
            Archive::open(path).map_err(|_| GlacierError::CannotOpenArchive(path.into()))?;
        messages += archive.message_count() as u64;
        archives.push(archive);
    }

    // Names and short descriptions.
    let mut strings = PairWriter::create(dir.join("str.meta"), dir.join("str"), OffsetWidth::U32, true)?;
    for (archive, &(begin, end)) in archives.iter().zip(&ranges) {
        let fallback = last_component(&list[begin as usize..end as usize]);
        strings.append_cstr(archive.name().unwrap_or(fallback))?;
        match archive.short_description() {
            Some(desc) => {
                strings.append_cstr(desc)?;
            }
            None => strings.append_absent()?,
        }
    }
    strings.finish()?;

    // Cross-archive unique ID set, in first-encounter order.
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut unique: Vec<Vec<u8>> = Vec::new();
    for archive in &archives {
        for idx in 0..archive.message_count() as u32 {
            if let Some(id) = archive.message_id(idx) {
                if seen.insert(id.to_vec()) {
                    unique.push(id.to_vec());
                }
            }
        }
    }

    let mut ids = MsgIdTableBuilder::new();
    for id in &unique {
        ids.push(id);
    }
    ids.write(
        OffsetWidth::U64,
        dir.join("msgid.meta"),
        dir.join("msgid"),
        dir.join("midhash"),
        dir.join("midhashdata"),
    )?;

    // Group vectors, content-deduplicated.
    let mut group_meta = BufWriter::new(File::create(dir.join("midgr.meta"))?);
    let mut group_data = BufWriter::new(File::create(dir.join("midgr"))?);
    let mut known: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut offset = 0u32;
    for id in &unique {
        let hashed = key_hash(id);
        let group: Vec<u32> = archives
            .iter()
            .enumerate()
            .filter(|(_, a)| a.index_of_hashed(id, hashed).is_some())
            .map(|(i, _)| i as u32)
            .collect();
        if let Some(&at) = known.get(&group) {
            group_meta.write_all(&at.to_le_bytes())?;
        } else {
            group_meta.write_all(&offset.to_le_bytes())?;
            group_data.write_all(&(group.len() as u32).to_le_bytes())?;
            for &a in &group {
                group_data.write_all(&a.to_le_bytes())?;
            }
            known.insert(group.clone(), offset);
            offset += 4 + 4 * group.len() as u32;
        }
    }
    group_meta.flush()?;
    group_data.flush()?;

    let stats = GalaxyStats {
        archives: archives.len(),
        messages,
        unique: unique.len(),
    };
    info!(
        archives = stats.archives,
        messages = stats.messages,
        unique = stats.unique,
        "galaxy built"
    );
    Ok(stats)
}
