//! Connectivity builder: References graph plus the date pass.

use std::path::Path;

use glacier_error::Result;
use glacier_message::{find_header, parse_date_rfc5322_lax, strip_msgid_whitespace};
use glacier_store::{ExpandingBuffer, MessageSource, MsgIdTable};
use hashbrown::HashSet;
use memchr::memrchr;
use tracing::info;

use crate::table::ConnectivityTable;

/// Soft-error counters reported by a connectivity build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityStats {
    /// Messages processed.
    pub messages: usize,
    /// Messages left without a parent.
    pub toplevel: usize,
    /// Distinct referenced Message-IDs absent from the archive
    /// (crossposted ancestors, usually).
    pub missing: usize,
    /// References that contained whitespace inside `<...>`.
    pub broken: usize,
    /// Date headers that were absent or unparsable.
    pub baddate: usize,
}

/// `<...>` bodies of a References value, rightmost (closest ancestor) first.
fn references_right_to_left(value: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = value;
    std::iter::from_fn(move || {
        let gt = memrchr(b'>', rest)?;
        let lt = memrchr(b'<', &rest[..gt])?;
        let id = &rest[lt + 1..gt];
        rest = &rest[..lt];
        Some(id)
    })
}

/// Build the conversation graph for every message in `source` and persist
/// `connmeta`/`conndata`/`toplevel` under `dir`.
///
/// Per message, References candidates are tried right to left and the first
/// one present in `msgids` wins; candidates that would make the message its
/// own ancestor are skipped. The rest become toplevel. Dates that fail the
/// lax parser leave epoch 0 behind.
pub fn build_connectivity(
    source: &MessageSource,
    msgids: &MsgIdTable<u32>,
    dir: &Path,
) -> Result<ConnectivityStats> {
    let count = source.len();
    let mut table = ConnectivityTable::with_size(count);
    let mut missing: HashSet<Vec<u8>> = HashSet::new();
    let mut stats = ConnectivityStats {
        messages: count,
        ..ConnectivityStats::default()
    };
    let mut eb = ExpandingBuffer::new();

    for i in 0..count {
        let idx = i as u32;
        let text = source.message(i, &mut eb)?;

        let mut resolved = false;
        if let Some(value) = find_header(text, "References") {
            for raw in references_right_to_left(value) {
                let (id, was_broken) = strip_msgid_whitespace(raw);
                stats.broken += usize::from(was_broken);
                match msgids.search(&id) {
                    Some(parent) if parent != idx && !table.would_cycle(idx, parent) => {
                        table.nodes[i].parent = parent as i32;
                        table.nodes[parent as usize].children.push(idx);
                        resolved = true;
                        break;
                    }
                    Some(_) => {
                        // Self-reference or cycle: try the next ancestor.
                    }
                    None => {
                        missing.insert(id.into_owned());
                    }
                }
            }
        }
        if !resolved {
            table.toplevel.push(idx);
        }

        match find_header(text, "Date").and_then(parse_date_rfc5322_lax) {
            Some(epoch) => table.nodes[i].epoch = epoch,
            None => stats.baddate += 1,
        }
    }

    table.finalize();
    table.save(dir)?;

    stats.toplevel = table.toplevel.len();
    stats.missing = missing.len();
    info!(
        messages = stats.messages,
        toplevel = stats.toplevel,
        missing = stats.missing,
        broken = stats.broken,
        baddate = stats.baddate,
        "connectivity built"
    );
    Ok(stats)
}
