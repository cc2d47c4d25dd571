//! Lexicon builder.
//!
//! One pass over the message store: classify every body line, tokenize, and
//! emit `(word, postid, class, position-within-class)` hits. `From` and
//! `Subject` values contribute Header-class hits. Positions count words
//! across the concatenation of a message's lines of one class and saturate
//! at the class mask, after which they carry no position information.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glacier_error::Result;
use glacier_message::{body_lines, find_header, for_each_token};
use glacier_store::{ExpandingBuffer, HashIndexBuilder, MessageSource};
use glacier_types::{
    LEXICON_CLASS_COUNT, LexiconClass, LexiconDataPacket, LexiconMetaPacket, encode_hit,
};
use hashbrown::HashMap;
use tracing::info;

/// Most hits kept per word per message; the count byte in `lexhit` caps the
/// record, and occurrences past it add nothing to ranking.
const HITS_PER_POSTING: usize = 255;

/// Counters reported by a lexicon build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexiconBuildStats {
    /// Distinct words.
    pub words: usize,
    /// Total postings.
    pub postings: usize,
    /// Total hit bytes (excluding count bytes).
    pub hits: usize,
}

#[derive(Debug, Default)]
struct WordAcc {
    /// `(postid, hit bytes)` in ascending postid order.
    postings: Vec<(u32, Vec<u8>)>,
}

impl WordAcc {
    fn add_hit(&mut self, postid: u32, hit: u8) {
        match self.postings.last_mut() {
            Some((last, hits)) if *last == postid => {
                if hits.len() < HITS_PER_POSTING {
                    hits.push(hit);
                }
            }
            _ => self.postings.push((postid, vec![hit])),
        }
    }
}

/// Build `lexmeta`/`lexstr`/`lexdata`/`lexhit` and the word hash under `dir`.
pub fn build_lexicon(source: &MessageSource, dir: &Path) -> Result<LexiconBuildStats> {
    let mut words: HashMap<String, WordAcc> = HashMap::new();
    let mut eb = ExpandingBuffer::new();

    for postid in 0..source.len() {
        let text = source.message(postid, &mut eb)?;
        let mut positions = [0u32; LEXICON_CLASS_COUNT];

        for name in ["From", "Subject"] {
            if let Some(value) = find_header(text, name) {
                emit(&mut words, &mut positions, value, LexiconClass::Header, postid as u32);
            }
        }
        for line in body_lines(text) {
            emit(&mut words, &mut positions, line.text, line.class, postid as u32);
        }
    }

    // Alphabetical word order keeps rebuilds byte-identical.
    let mut sorted: Vec<(String, WordAcc)> = words.drain().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut stats = LexiconBuildStats {
        words: sorted.len(),
        ..LexiconBuildStats::default()
    };

    let mut lexmeta = BufWriter::new(File::create(dir.join("lexmeta"))?);
    let mut lexstr = BufWriter::new(File::create(dir.join("lexstr"))?);
    let mut lexdata = BufWriter::new(File::create(dir.join("lexdata"))?);
    let mut lexhit = BufWriter::new(File::create(dir.join("lexhit"))?);
    let mut hash = HashIndexBuilder::new(sorted.len() as u64);

    let mut str_offset = 0u32;
    let mut data_index = 0u32;
    let mut hit_offset = 0u32;
    for (idx, (word, acc)) in sorted.iter().enumerate() {
        hash.insert(idx as u32, word.as_bytes())?;
        let packet = LexiconMetaPacket {
            word: str_offset,
            data: data_index,
            count: acc.postings.len() as u32,
        };
        lexmeta.write_all(&packet.to_le_bytes())?;
        lexstr.write_all(word.as_bytes())?;
        lexstr.write_all(&[0u8])?;
        str_offset += word.len() as u32 + 1;

        for (postid, hits) in &acc.postings {
            let data_packet = LexiconDataPacket {
                postid: *postid,
                hits: hit_offset,
            };
            lexdata.write_all(&data_packet.to_le_bytes())?;
            lexhit.write_all(&[(hits.len() as u8)])?;
            lexhit.write_all(hits)?;
            hit_offset += 1 + hits.len() as u32;
            data_index += 1;
            stats.postings += 1;
            stats.hits += hits.len();
        }
    }
    lexmeta.flush()?;
    lexstr.flush()?;
    lexdata.flush()?;
    lexhit.flush()?;
    hash.write(dir.join("lexhash"), dir.join("lexhashdata"))?;

    info!(
        words = stats.words,
        postings = stats.postings,
        hits = stats.hits,
        "lexicon built"
    );
    Ok(stats)
}

fn emit(
    words: &mut HashMap<String, WordAcc>,
    positions: &mut [u32; LEXICON_CLASS_COUNT],
    text: &[u8],
    class: LexiconClass,
    postid: u32,
) {
    for_each_token(text, |token| {
        let pos = positions[class as usize];
        positions[class as usize] += 1;
        let hit = encode_hit(class, pos);
        words
            .entry_ref(token)
            .or_default()
            .add_hit(postid, hit);
    });
}

#[cfg(test)]
mod tests {
    use glacier_store::StoreBuilder;
    use glacier_types::{decode_class, decode_pos, is_saturated};

    use super::*;
    use crate::view::LexiconView;

    fn build(dir: &Path, messages: &[&str]) -> LexiconView {
        let mut store = StoreBuilder::create(dir).expect("store");
        for m in messages {
            store.append(m.as_bytes()).expect("append");
        }
        store.finish().expect("finish");
        let source = MessageSource::open(dir).expect("source");
        build_lexicon(&source, dir).expect("lexicon");
        LexiconView::open(dir).expect("view")
    }

    #[test]
    fn words_get_classified_positional_hits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let view = build(
            dir.path(),
            &["Subject: greetings\n\nhello world\n> quoted words\n-- \nsignature line\n"],
        );

        let hello = view.find(b"hello").expect("hello indexed");
        let posting = view.postings(hello).next().expect("posting");
        assert_eq!(posting.postid, 0);
        let hits = view.posting_hits(posting).expect("hits");
        assert_eq!(hits.len(), 1);
        assert_eq!(decode_class(hits[0]), LexiconClass::Content);
        assert_eq!(decode_pos(hits[0]), 0);

        let world = view.find(b"world").expect("world indexed");
        let hits = view
            .posting_hits(view.postings(world).next().expect("posting"))
            .expect("hits");
        assert_eq!(decode_pos(hits[0]), 1);

        let quoted = view.find(b"quoted").expect("quoted indexed");
        let hits = view
            .posting_hits(view.postings(quoted).next().expect("posting"))
            .expect("hits");
        assert_eq!(decode_class(hits[0]), LexiconClass::Quote1);
        assert_eq!(decode_pos(hits[0]), 0);

        let sig = view.find(b"signature").expect("signature indexed");
        let hits = view
            .posting_hits(view.postings(sig).next().expect("posting"))
            .expect("hits");
        assert_eq!(decode_class(hits[0]), LexiconClass::Signature);

        let subj = view.find(b"greetings").expect("subject indexed");
        let hits = view
            .posting_hits(view.postings(subj).next().expect("posting"))
            .expect("hits");
        assert_eq!(decode_class(hits[0]), LexiconClass::Header);
    }

    #[test]
    fn positions_continue_across_lines_of_one_class() {
        let dir = tempfile::tempdir().expect("tempdir");
        let view = build(dir.path(), &["Subject: s\n\nalpha beta\ngamma delta\n"]);
        let gamma = view.find(b"gamma").expect("indexed");
        let hits = view
            .posting_hits(view.postings(gamma).next().expect("posting"))
            .expect("hits");
        // Third content word of the message, two lines in.
        assert_eq!(decode_pos(hits[0]), 2);
    }

    #[test]
    fn positions_saturate_past_the_mask() {
        let filler: String = (0..40).map(|i| format!("word{i:02} ")).collect();
        let dir = tempfile::tempdir().expect("tempdir");
        let view = build(dir.path(), &[&format!("Subject: s\n\n{filler}\n")]);
        let late = view.find(b"word39").expect("indexed");
        let hits = view
            .posting_hits(view.postings(late).next().expect("posting"))
            .expect("hits");
        assert!(is_saturated(hits[0]));
    }

    #[test]
    fn postings_are_sorted_by_postid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let view = build(
            dir.path(),
            &[
                "Subject: a\n\nshared word alpha\n",
                "Subject: b\n\nother text\n",
                "Subject: c\n\nshared again\n",
            ],
        );
        let shared = view.find(b"shared").expect("indexed");
        let ids: Vec<u32> = view.postings(shared).map(|p| p.postid).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(view.df(shared), 2);
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let messages = &[
            "Subject: a\n\nsome words here\n",
            "Subject: b\n\nmore words there\n",
        ];
        build(dir.path(), messages);
        let first: Vec<Vec<u8>> = ["lexmeta", "lexstr", "lexdata", "lexhit", "lexhash"]
            .iter()
            .map(|f| std::fs::read(dir.path().join(f)).expect("read"))
            .collect();
        let source = MessageSource::open(dir.path()).expect("source");
        build_lexicon(&source, dir.path()).expect("rebuild");
        let second: Vec<Vec<u8>> = ["lexmeta", "lexstr", "lexdata", "lexhit", "lexhash"]
            .iter()
            .map(|f| std::fs::read(dir.path().join(f)).expect("read"))
            .collect();
        assert_eq!(first, second);
    }
}
