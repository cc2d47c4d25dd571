//! The orphan reattacher.
//!
//! Messages that are logically replies but lost their References (or
//! reference only crossposted ancestors) sit in `toplevel`. The threader
//! takes each of them, searches the archive's *content* for the text they
//! quote at level 1, and reattaches them when the best-scoring candidate
//! lives in another thread and both subjects agree after reply-prefix
//! stripping.

use std::collections::BTreeMap;

use glacier_error::Result;
use glacier_message::{body_lines, kill_re, tokenize_into};
use glacier_store::ExpandingBuffer;
use memchr::memmem;
use tracing::{debug, warn};

use crate::table::ConnectivityTable;

/// What the threader needs from an archive.
pub trait ThreadSource {
    /// Raw text of message `idx`.
    fn message<'a>(&'a self, idx: u32, eb: &'a mut ExpandingBuffer) -> Result<&'a [u8]>;

    /// Subject of message `idx` (empty if absent).
    fn subject(&self, idx: u32) -> &[u8];

    /// Content-class-only search for the given token bag, returning
    /// `(postid, rank)` with ranks in `[0, 1]`.
    fn search_content(&self, terms: &[String]) -> Vec<(u32, f32)>;
}

/// Reply-prefix and quote-attribution configuration.
#[derive(Debug, Clone)]
pub struct ThreaderConfig {
    /// Byte-exact prefixes stripped from subjects before comparison.
    pub re_prefixes: Vec<String>,
    /// Substrings marking the localised "X wrote:" attribution line.
    pub wrote_markers: Vec<String>,
}

impl Default for ThreaderConfig {
    fn default() -> Self {
        let re_prefixes = [
            "Re:", "RE:", "re:", "Odp:", "Re[2]:", "Re[3]:", "Re[4]:", "Re[5]:", "Re[6]:",
            "Re[7]:", "Re[8]:", "Re[9]:",
        ]
        .map(str::to_string)
        .to_vec();
        let wrote_markers = vec!["wrote".to_string(), "napisa\u{142}".to_string()];
        Self {
            re_prefixes,
            wrote_markers,
        }
    }
}

impl ThreaderConfig {
    /// Extend the reply-prefix list (the `-i` CLI option).
    pub fn add_prefix(&mut self, prefix: impl Into<String>) {
        self.re_prefixes.push(prefix.into());
    }
}

/// Classification counters for one threader run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Toplevels with no candidate, or whose candidate shares their thread.
    pub new_threads: usize,
    /// Reattached: candidate in another thread, subjects agree.
    pub sure: usize,
    /// Candidate in another thread but subjects differ; not applied.
    pub bad: usize,
}

impl ThreadStats {
    /// Whether the run changed the table (and the files need rewriting).
    #[must_use]
    pub fn changed(&self) -> bool {
        self.sure > 0
    }
}

/// Explicit threader context: the root map and the configuration live here,
/// never in process globals.
#[derive(Debug)]
pub struct Threader {
    config: ThreaderConfig,
}

impl Threader {
    /// A threader with the given configuration.
    #[must_use]
    pub fn new(config: ThreaderConfig) -> Self {
        Self { config }
    }

    /// Match and reattach orphans in `table`, reading messages and search
    /// results from `source`. The caller persists the table afterwards when
    /// [`ThreadStats::changed`] reports mutation.
    pub fn run<S: ThreadSource>(
        &self,
        table: &mut ConnectivityTable,
        source: &S,
    ) -> Result<ThreadStats> {
        let count = table.nodes.len();
        let mut root: Vec<u32> = (0..count as u32).map(|i| table.root(i)).collect();
        let toplevel = table.toplevel.clone();

        let mut stats = ThreadStats::default();
        let mut found: Vec<(u32, u32)> = Vec::new();
        let mut eb = ExpandingBuffer::new();
        let mut wordbuf: Vec<String> = Vec::new();
        // Ordered map so the arg-max tie-break is the lowest postid.
        let mut hits: BTreeMap<u32, f32> = BTreeMap::new();

        for &idx in &toplevel {
            hits.clear();
            self.score_quoted_lines(source, idx, &mut eb, &mut wordbuf, &mut hits)?;

            if hits.is_empty() {
                stats.new_threads += 1;
                continue;
            }
            let mut best = 0u32;
            let mut best_score = 0.0f32;
            for (&postid, &score) in &hits {
                if score > best_score {
                    best_score = score;
                    best = postid;
                }
            }
            if root[idx as usize] == root[best as usize] {
                stats.new_threads += 1;
                continue;
            }

            let own = kill_re(source.subject(idx), &self.config.re_prefixes);
            let candidate = kill_re(source.subject(best), &self.config.re_prefixes);
            if own == candidate {
                debug!(orphan = idx, parent = best, "sure match");
                stats.sure += 1;
                found.push((idx, best));
                let new_root = root[best as usize];
                set_root_to(table, &mut root, idx, new_root);
            } else {
                stats.bad += 1;
            }
        }

        self.apply(table, &found);
        if stats.changed() {
            warn!(
                reattached = stats.sure,
                "connectivity rewritten; lexicon data is invalidated"
            );
        }
        Ok(stats)
    }

    /// Accumulate `rank * tokens^2` per candidate over every level-1 quoted
    /// line of message `idx`, skipping the attribution line.
    fn score_quoted_lines<S: ThreadSource>(
        &self,
        source: &S,
        idx: u32,
        eb: &mut ExpandingBuffer,
        wordbuf: &mut Vec<String>,
        hits: &mut BTreeMap<u32, f32>,
    ) -> Result<()> {
        let text = source.message(idx, eb)?;
        let mut wrote_done = false;
        for line in body_lines(text) {
            if line.level != 1 || line.text.is_empty() {
                continue;
            }
            if !wrote_done
                && self
                    .config
                    .wrote_markers
                    .iter()
                    .any(|marker| memmem::find(line.text, marker.as_bytes()).is_some())
            {
                wrote_done = true;
                continue;
            }
            tokenize_into(line.text, wordbuf);
            if wordbuf.is_empty() {
                continue;
            }
            let weight = (wordbuf.len() * wordbuf.len()) as f32;
            for (postid, rank) in source.search_content(wordbuf) {
                *hits.entry(postid).or_insert(0.0) += rank * weight;
            }
        }
        Ok(())
    }

    /// Reparent every sure match: children sorted by epoch, childtotal
    /// propagated up the ancestor chain, toplevel entries removed.
    fn apply(&self, table: &mut ConnectivityTable, found: &[(u32, u32)]) {
        let count = table.nodes.len();
        for &(orphan, parent) in found {
            table.nodes[orphan as usize].parent = parent as i32;
            table.nodes[parent as usize].children.push(orphan);

            let add = 1 + table.nodes[orphan as usize].childtotal;
            let mut at = parent;
            for _ in 0..=count {
                table.nodes[at as usize].childtotal += add;
                match table.nodes[at as usize].parent {
                    -1 => break,
                    up => at = up as u32,
                }
            }

            let mut children = std::mem::take(&mut table.nodes[parent as usize].children);
            children.sort_by_key(|&c| (table.nodes[c as usize].epoch, c));
            table.nodes[parent as usize].children = children;

            table.toplevel.retain(|&t| t != orphan);
        }
    }
}

/// Set the root of `idx` and all its descendants to `new_root`.
fn set_root_to(table: &ConnectivityTable, root: &mut [u32], idx: u32, new_root: u32) {
    let mut stack = vec![idx];
    while let Some(at) = stack.pop() {
        root[at as usize] = new_root;
        stack.extend_from_slice(&table.nodes[at as usize].children);
    }
}
