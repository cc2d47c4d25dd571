//! The ranked search engine.
//!
//! Pipeline: parse the query into terms (quoting makes a term literal and
//! groups phrase words), expand unquoted terms to near-spelled lexicon
//! words when fuzzy search is on, walk the postings of every matched word
//! accumulating idf- and class-weighted scores per candidate message, apply
//! the adjacency bonus and the all-words gate, then normalise ranks into
//! `[0, 1]`.
//!
//! Exact matches always outrank expansions of the same shape: an expansion
//! scores through a penalty factor strictly below 1.

use glacier_error::Result;
use glacier_store::key_hash;
use glacier_types::{ClassFilter, SearchFlags, decode_class, decode_pos, is_saturated};
use hashbrown::{HashMap, HashSet};
use tracing::warn;

use crate::distance::{distance_limit, levenshtein_within};
use crate::view::LexiconView;

/// Scoring weight per class tag, indexed by the tag. Content dominates,
/// quotation decays with depth, header and signature trail far behind.
const CLASS_WEIGHT: [f32; 6] = [1.0, 0.4, 0.2, 0.1, 0.05, 0.05];

/// Fuzzy penalty by edit distance (index 0 = exact).
const FUZZY_PENALTY: [f32; 3] = [1.0, 0.5, 0.25];

/// Largest position gap that still earns an adjacency bonus.
const ADJACENCY_WINDOW: u32 = 4;

/// Floor for idf so corpus-wide words still contribute.
const MIN_IDF: f32 = 0.01;

/// Query terms beyond this are ignored (the all-words mask is a u64).
const MAX_TERMS: usize = 64;

/// Per-candidate cap on positional entries considered for adjacency.
const MAX_ADJACENCY_ENTRIES: usize = 256;

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Message index.
    pub postid: u32,
    /// Normalised rank in `[0, 1]`.
    pub rank: f32,
    /// The class-filtered hit bytes that scored, for preview building.
    pub hits: Vec<u8>,
}

/// A whole result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchData {
    /// Ranked results, best first; ties broken by ascending postid.
    pub results: Vec<SearchResult>,
    /// Word strings actually hit, fuzzy expansions included.
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
struct QueryTerm {
    word: String,
    quoted: bool,
    /// Phrase group for adjacent quoted words.
    group: Option<u32>,
}

/// The engine borrows the lexicon and knows the corpus size for idf.
#[derive(Debug)]
pub struct SearchEngine<'a> {
    lexicon: &'a LexiconView,
    message_count: u32,
}

#[derive(Debug, Default)]
struct Candidate {
    score: f32,
    seen: u64,
    hits: Vec<u8>,
    /// `(term, hit byte, idf·penalty)` for adjacency scoring.
    entries: Vec<(u8, u8, f32)>,
}

impl<'a> SearchEngine<'a> {
    /// An engine over `lexicon` for a corpus of `message_count` messages.
    #[must_use]
    pub fn new(lexicon: &'a LexiconView, message_count: u32) -> Self {
        Self {
            lexicon,
            message_count,
        }
    }

    /// Parse and run `query`. Unusable queries and internal read failures
    /// produce an empty result set, never an error.
    #[must_use]
    pub fn search(&self, query: &str, flags: SearchFlags, filter: ClassFilter) -> SearchData {
        let terms = parse_query(query);
        self.run(&terms, flags, filter)
    }

    /// Run over pre-tokenized terms (the threader's path).
    #[must_use]
    pub fn search_terms(
        &self,
        terms: &[String],
        flags: SearchFlags,
        filter: ClassFilter,
    ) -> SearchData {
        let terms: Vec<QueryTerm> = terms
            .iter()
            .map(|word| QueryTerm {
                word: word.clone(),
                quoted: false,
                group: None,
            })
            .collect();
        self.run(&terms, flags, filter)
    }

    fn run(&self, terms: &[QueryTerm], flags: SearchFlags, filter: ClassFilter) -> SearchData {
        match self.try_run(terms, flags, filter) {
            Ok(data) => data,
            Err(err) => {
                warn!(%err, "search failed against corrupt lexicon data");
                SearchData::default()
            }
        }
    }

    fn try_run(
        &self,
        terms: &[QueryTerm],
        flags: SearchFlags,
        filter: ClassFilter,
    ) -> Result<SearchData> {
        let terms = &terms[..terms.len().min(MAX_TERMS)];
        if terms.is_empty() {
            return Ok(SearchData::default());
        }

        let expansions = self.expand(terms, flags);
        if expansions.is_empty() {
            return Ok(SearchData::default());
        }

        let mut candidates: HashMap<u32, Candidate> = HashMap::new();
        let mut matched_words: HashSet<u32> = HashSet::new();

        for &((term, word), penalty) in &expansions {
            let idf = self.idf(word) * penalty;
            let mut word_hit = false;
            for posting in self.lexicon.postings(word) {
                let all_hits = self.lexicon.posting_hits(posting)?;
                let mut weight = 0.0f32;
                let cand_entry = candidates.entry(posting.postid).or_default();
                let mut any = false;
                for &hit in all_hits {
                    let class = decode_class(hit);
                    if !filter.admits(class) {
                        continue;
                    }
                    any = true;
                    weight += CLASS_WEIGHT[class as usize];
                    cand_entry.hits.push(hit);
                    if cand_entry.entries.len() < MAX_ADJACENCY_ENTRIES {
                        cand_entry.entries.push((term as u8, hit, idf));
                    }
                }
                if any {
                    cand_entry.score += weight * idf;
                    cand_entry.seen |= 1 << term;
                    word_hit = true;
                }
            }
            if word_hit {
                matched_words.insert(word);
            }
        }

        if flags.contains(SearchFlags::REQUIRE_ALL_WORDS) {
            let full = full_mask(terms.len());
            candidates.retain(|_, c| c.seen & full == full);
        }
        candidates.retain(|_, c| c.score > 0.0);

        if flags.contains(SearchFlags::ADJACENT_WORDS) {
            let groups: Vec<Option<u32>> = terms.iter().map(|t| t.group).collect();
            for cand in candidates.values_mut() {
                cand.score += adjacency_bonus(&cand.entries, &groups);
            }
        }

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|(postid, c)| SearchResult {
                postid,
                rank: c.score,
                hits: c.hits,
            })
            .collect();
        let max = results.iter().map(|r| r.rank).fold(0.0f32, f32::max);
        if max > 0.0 {
            for r in &mut results {
                r.rank /= max;
            }
        }
        results.sort_unstable_by(|a, b| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| a.postid.cmp(&b.postid))
        });

        let mut matched_idx: Vec<u32> = matched_words.into_iter().collect();
        matched_idx.sort_unstable();
        let matched = matched_idx
            .into_iter()
            .filter_map(|idx| {
                self.lexicon
                    .word(idx)
                    .map(|w| String::from_utf8_lossy(w).into_owned())
            })
            .collect();

        Ok(SearchData { results, matched })
    }

    /// `(term, word) -> penalty`, deduplicated keeping the best factor.
    fn expand(&self, terms: &[QueryTerm], flags: SearchFlags) -> Vec<((usize, u32), f32)> {
        let fuzzy = flags.contains(SearchFlags::FUZZY);
        let mut out: HashMap<(usize, u32), f32> = HashMap::new();

        for (ti, term) in terms.iter().enumerate() {
            let bytes = term.word.as_bytes();
            let exact = self.lexicon.find_hashed(bytes, key_hash(bytes));
            if let Some(word) = exact {
                merge(&mut out, (ti, word), FUZZY_PENALTY[0]);
            }
            if !fuzzy || term.quoted {
                continue;
            }
            match exact {
                Some(word) => {
                    // Present term: stored neighbours, when available.
                    for (d, n) in self.lexicon.neighbors(word) {
                        let penalty = FUZZY_PENALTY.get(d as usize).copied().unwrap_or(0.0);
                        if penalty > 0.0 {
                            merge(&mut out, (ti, n), penalty);
                        }
                    }
                }
                None => {
                    // Missing term: bounded-distance sweep over the lexicon.
                    let limit = distance_limit(bytes.len());
                    for w in 0..self.lexicon.word_count() as u32 {
                        let Some(stored) = self.lexicon.word(w) else {
                            continue;
                        };
                        if stored.len().abs_diff(bytes.len()) as u32 > limit {
                            continue;
                        }
                        if let Some(d) = levenshtein_within(bytes, stored, limit) {
                            if d > 0 {
                                merge(&mut out, (ti, w), FUZZY_PENALTY[d as usize]);
                            }
                        }
                    }
                }
            }
        }

        let mut flat: Vec<((usize, u32), f32)> = out.into_iter().collect();
        flat.sort_unstable_by_key(|&((ti, w), _)| (ti, w));
        flat
    }

    fn idf(&self, word: u32) -> f32 {
        let df = self.lexicon.df(word).max(1) as f32;
        (self.message_count.max(1) as f32 / df).ln().max(MIN_IDF)
    }
}

fn merge(out: &mut HashMap<(usize, u32), f32>, key: (usize, u32), penalty: f32) {
    let slot = out.entry(key).or_insert(0.0);
    if penalty > *slot {
        *slot = penalty;
    }
}

fn full_mask(terms: usize) -> u64 {
    if terms >= 64 {
        u64::MAX
    } else {
        (1u64 << terms) - 1
    }
}

/// Bonus for every ordered pair of distinct matched terms with usable
/// positions in the same class: decays with the gap, zero past the window,
/// doubled for adjacent words of one quoted phrase.
fn adjacency_bonus(entries: &[(u8, u8, f32)], groups: &[Option<u32>]) -> f32 {
    let mut bonus = 0.0f32;
    for (i, &(t1, h1, w1)) in entries.iter().enumerate() {
        if is_saturated(h1) {
            continue;
        }
        for &(t2, h2, w2) in &entries[i + 1..] {
            if t1 == t2 || is_saturated(h2) || decode_class(h1) != decode_class(h2) {
                continue;
            }
            let gap = u32::from(decode_pos(h1)).abs_diff(u32::from(decode_pos(h2)));
            if gap == 0 || gap > ADJACENCY_WINDOW {
                continue;
            }
            let class_weight = CLASS_WEIGHT[decode_class(h1) as usize];
            let mut adj = 0.5 * class_weight * ((w1 + w2) * 0.5) / gap as f32;
            let same_phrase = groups[t1 as usize].is_some() && groups[t1 as usize] == groups[t2 as usize];
            if same_phrase && gap == 1 {
                adj *= 2.0;
            }
            bonus += adj;
        }
    }
    bonus
}

/// Split a query into terms: `"..."` spans are literal (fuzzy disabled) and
/// their words form a phrase group; everything else is tokenized plainly.
fn parse_query(query: &str) -> Vec<QueryTerm> {
    let mut terms = Vec::new();
    let mut group = 0u32;
    let mut buf: Vec<String> = Vec::new();
    for (i, segment) in query.split('"').enumerate() {
        let quoted = i % 2 == 1;
        glacier_message::tokenize_into(segment.as_bytes(), &mut buf);
        if buf.is_empty() {
            continue;
        }
        let phrase = quoted && buf.len() > 1;
        for word in buf.drain(..) {
            terms.push(QueryTerm {
                word,
                quoted,
                group: phrase.then_some(group),
            });
        }
        if phrase {
            group += 1;
        }
    }
    terms
}
