//! Bounded edit distance and the optional `lexdist` neighbour table.

use std::path::Path;

use glacier_error::Result;
use glacier_store::{OffsetWidth, PairWriter};
use tracing::info;

use crate::view::{LexiconView, pack_neighbor};

/// Distance budget for a term of `len` bytes: short words tolerate one
/// edit, longer ones two.
#[must_use]
pub fn distance_limit(len: usize) -> u32 {
    if len >= 8 { 2 } else { 1 }
}

/// Levenshtein distance of `a` and `b` if it is at most `max`, else `None`.
///
/// Byte-level, which is exact for ASCII and deterministic for everything
/// else. Runs the banded DP with early exit.
#[must_use]
pub fn levenshtein_within(a: &[u8], b: &[u8], max: u32) -> Option<u32> {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if (long.len() - short.len()) as u32 > max {
        return None;
    }

    let mut prev: Vec<u32> = (0..=short.len() as u32).collect();
    let mut curr = vec![0u32; short.len() + 1];
    for (i, &lb) in long.iter().enumerate() {
        curr[0] = i as u32 + 1;
        let mut row_min = curr[0];
        for (j, &sb) in short.iter().enumerate() {
            let cost = u32::from(lb != sb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let d = prev[short.len()];
    (d <= max).then_some(d)
}

/// Build `lexdistmeta`/`lexdist`: for every word, its neighbours within the
/// per-length distance budget, packed as `(distance << 28) | word`.
///
/// Quadratic over the lexicon with a length pre-filter; this is an offline
/// pass run once after the lexicon build.
pub fn build_lexdist(view: &LexiconView, dir: &Path) -> Result<()> {
    let count = view.word_count() as u32;
    let words: Vec<&[u8]> = (0..count)
        .map(|i| view.word(i).unwrap_or_default())
        .collect();

    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); count as usize];
    for a in 0..count {
        let wa = words[a as usize];
        let limit_a = distance_limit(wa.len());
        for b in a + 1..count {
            let wb = words[b as usize];
            let limit = limit_a.min(distance_limit(wb.len()));
            if wa.len().abs_diff(wb.len()) as u32 > limit {
                continue;
            }
            if let Some(d) = levenshtein_within(wa, wb, limit) {
                if d > 0 {
                    neighbors[a as usize].push(pack_neighbor(d, b));
                    neighbors[b as usize].push(pack_neighbor(d, a));
                }
            }
        }
    }

    let mut pair = PairWriter::create(
        dir.join("lexdistmeta"),
        dir.join("lexdist"),
        OffsetWidth::U32,
        false,
    )?;
    let mut record = Vec::new();
    let mut total = 0usize;
    for list in &mut neighbors {
        list.sort_unstable();
        total += list.len();
        record.clear();
        for &packed in list.iter() {
            record.extend_from_slice(&packed.to_le_bytes());
        }
        pair.append(&record)?;
    }
    pair.finish()?;

    info!(words = count, neighbors = total, "distance table built");
    Ok(())
}
