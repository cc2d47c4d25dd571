//! End-to-end pipeline tests: import → connectivity → lexicon → open,
//! then threading, search and the galaxy on top.

use std::path::Path;

use glacier_archive::{Archive, ArchiveImporter, build_galaxy};
use glacier_conn::{ConnectivityTable, ThreadStats, Threader, ThreaderConfig, build_connectivity};
use glacier_lexicon::build_lexicon;
use glacier_store::{ExpandingBuffer, MessageSource, MsgIdTable, pack_store};
use glacier_types::{ClassFilter, SearchFlags};

fn build_archive(dir: &Path, messages: &[String]) {
    let mut importer = ArchiveImporter::create(dir).expect("importer");
    for m in messages {
        importer.append(m.as_bytes()).expect("append");
    }
    importer.finish(dir).expect("finish");

    let source = MessageSource::open(dir).expect("source");
    let ids: MsgIdTable<u32> = MsgIdTable::open(
        dir.join("midmeta"),
        dir.join("middata"),
        dir.join("midhash"),
        dir.join("midhashdata"),
    )
    .expect("ids");
    build_connectivity(&source, &ids, dir).expect("connectivity");
    build_lexicon(&source, dir).expect("lexicon");
}

fn msg(id: &str, subject: &str, date_hour: u32, refs: Option<&str>, body: &str) -> String {
    let refs = refs.map_or(String::new(), |r| format!("References: {r}\n"));
    format!(
        "From: \"Someone\" <someone@example.org>\nSubject: {subject}\nMessage-ID: <{id}>\n{refs}Date: 1 Jul 2003 {date_hour:02}:00:00 +0000\n\n{body}\n"
    )
}

#[test]
fn single_message_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(
        dir.path(),
        &[msg("a@x", "Hello", 10, None, "just one message")],
    );

    let archive = Archive::open(dir.path()).expect("open");
    assert_eq!(archive.message_count(), 1);
    assert_eq!(archive.toplevel().collect::<Vec<_>>(), vec![0]);
    assert_eq!(archive.parent(0), -1);
    assert_eq!(archive.children(0).count(), 0);
    assert_eq!(archive.total_children(0), 0);
    assert_eq!(archive.subject(0), b"Hello");
    assert_eq!(archive.real_name(0), b"Someone");
    assert_eq!(archive.message_id(0), Some(&b"a@x"[..]));
    assert_eq!(archive.index_of(b"a@x"), Some(0));
    assert_eq!(archive.index_of(b"nope@x"), None);
}

#[test]
fn reply_chain_connects() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(
        dir.path(),
        &[
            msg("a@x", "Hello", 10, None, "root message"),
            msg("b@x", "Re: Hello", 11, Some("<a@x>"), "a reply"),
        ],
    );

    let archive = Archive::open(dir.path()).expect("open");
    assert_eq!(archive.parent(1), 0);
    assert_eq!(archive.children(0).collect::<Vec<_>>(), vec![1]);
    assert_eq!(archive.toplevel().collect::<Vec<_>>(), vec![0]);
    assert_eq!(archive.total_children(0), 1);
}

#[test]
fn fetch_by_index_and_msgid_raw_and_packed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let messages = vec![
        msg("a@x", "Hello", 10, None, "root message"),
        msg("b@x", "Re: Hello", 11, Some("<a@x>"), "a reply"),
    ];
    build_archive(dir.path(), &messages);

    let archive = Archive::open(dir.path()).expect("open");
    let mut eb = ExpandingBuffer::new();
    assert_eq!(archive.message(0, &mut eb).expect("message"), messages[0].as_bytes());
    assert_eq!(
        archive.message_by_msgid(b"b@x", &mut eb).expect("by msgid"),
        messages[1].as_bytes()
    );
    drop(archive);

    pack_store(dir.path()).expect("pack");
    let archive = Archive::open(dir.path()).expect("open packed");
    let mut eb = ExpandingBuffer::new();
    assert_eq!(archive.message(1, &mut eb).expect("message"), messages[1].as_bytes());
}

#[test]
fn time_chart_buckets_by_month_and_skips_epoch_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(
        dir.path(),
        &[
            msg("a@x", "One", 10, None, "body"),
            msg("b@x", "Two", 11, None, "body"),
            // Unparsable date: excluded from the chart.
            "Subject: Three\nMessage-ID: <c@x>\nDate: not a date\n\nbody\n".to_string(),
            "Subject: Four\nMessage-ID: <d@x>\nDate: 3 Aug 2003 09:00:00 +0000\n\nbody\n"
                .to_string(),
        ],
    );

    let archive = Archive::open(dir.path()).expect("open");
    let chart = archive.time_chart();
    assert_eq!(chart.get("2003-07"), Some(&2));
    assert_eq!(chart.get("2003-08"), Some(&1));
    assert_eq!(chart.values().sum::<u32>(), 3);
}

#[test]
fn connectivity_invariants_hold() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(
        dir.path(),
        &[
            msg("a@x", "T1", 10, None, "thread one root"),
            msg("b@x", "Re: T1", 12, Some("<a@x>"), "late reply"),
            msg("c@x", "Re: T1", 11, Some("<a@x>"), "early reply"),
            msg("d@x", "Re: T1", 13, Some("<ghost@q> <b@x>"), "nested"),
            msg("e@x", "T2", 9, None, "thread two root"),
        ],
    );

    let archive = Archive::open(dir.path()).expect("open");
    let n = archive.message_count() as u32;

    let toplevel: Vec<u32> = archive.toplevel().collect();
    for i in 0..n {
        let parent = archive.parent(i);
        // Parent in {-1} ∪ [0, n) \ {i}.
        assert!(parent == -1 || (parent >= 0 && (parent as u32) < n && parent as u32 != i));
        if parent >= 0 {
            assert!(archive.children(parent as u32).any(|c| c == i));
            assert!(!toplevel.contains(&i));
        } else {
            assert!(toplevel.contains(&i));
        }

        // Children sorted by epoch, childtotal transitive.
        let children: Vec<u32> = archive.children(i).collect();
        for pair in children.windows(2) {
            assert!(archive.date(pair[0]) <= archive.date(pair[1]));
        }
        let expect: u32 = children
            .iter()
            .map(|&c| 1 + archive.total_children(c))
            .sum();
        assert_eq!(archive.total_children(i), expect);

        // Hash round trip.
        let id = archive.message_id(i).expect("id");
        assert_eq!(archive.index_of(id), Some(i));
    }

    // Children of the root arrive epoch-sorted even though the later reply
    // was imported first.
    assert_eq!(archive.children(0).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(archive.parent(3), 1);
    assert_eq!(archive.total_children(0), 3);
}

fn threaded_corpus() -> Vec<String> {
    vec![
        msg("p@x", "Pumps", 10, None, "the centrifugal pump keeps losing prime overnight"),
        msg("q@x", "Re: Pumps", 11, Some("<p@x>"), "check the foot valve first"),
        msg("r@x", "Valves", 9, None, "gate valves versus ball valves for slurry"),
        // The orphan: no References, quotes message p at level 1, subject
        // matches after Re:-stripping.
        msg(
            "x@x",
            "Re: Pumps",
            12,
            None,
            "Someone wrote:\n> the centrifugal pump keeps losing prime overnight\nhappens to mine too",
        ),
    ]
}

fn run_threader(dir: &Path) -> (ThreadStats, ConnectivityTable) {
    let archive = Archive::open(dir).expect("open");
    let mut table = ConnectivityTable::load(dir).expect("load");
    let stats = Threader::new(ThreaderConfig::default())
        .run(&mut table, &archive)
        .expect("threader");
    drop(archive);
    if stats.changed() {
        table.save(dir).expect("save");
    }
    (stats, table)
}

#[test]
fn orphan_is_reattached_and_second_run_is_identity() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(dir.path(), &threaded_corpus());

    let before = Archive::open(dir.path()).expect("open");
    assert_eq!(before.toplevel().collect::<Vec<_>>(), vec![0, 2, 3]);
    drop(before);

    let (stats, table) = run_threader(dir.path());
    assert_eq!(stats.sure, 1);
    assert_eq!(table.nodes[3].parent, 0);

    let archive = Archive::open(dir.path()).expect("reopen");
    assert_eq!(archive.parent(3), 0);
    assert_eq!(archive.toplevel().collect::<Vec<_>>(), vec![0, 2]);
    // q (epoch 11) sorts before x (epoch 12).
    assert_eq!(archive.children(0).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(archive.total_children(0), 2);
    drop(archive);

    let files = ["connmeta", "conndata", "toplevel"];
    let first: Vec<Vec<u8>> = files
        .iter()
        .map(|f| std::fs::read(dir.path().join(f)).expect("read"))
        .collect();

    let (stats, _) = run_threader(dir.path());
    assert_eq!(stats.sure, 0);
    assert!(!stats.changed());
    let second: Vec<Vec<u8>> = files
        .iter()
        .map(|f| std::fs::read(dir.path().join(f)).expect("read"))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn subject_mismatch_is_counted_not_applied() {
    let mut corpus = threaded_corpus();
    corpus[3] = msg(
        "x@x",
        "Re: Something unrelated",
        12,
        None,
        "Someone wrote:\n> the centrifugal pump keeps losing prime overnight\nindeed",
    );
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(dir.path(), &corpus);

    let (stats, table) = run_threader(dir.path());
    assert_eq!(stats.sure, 0);
    assert_eq!(stats.bad, 1);
    assert_eq!(table.nodes[3].parent, -1);
}

#[test]
fn adjacent_content_outranks_scattered_quotes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scattered = format!(
        "Subject: far\nMessage-ID: <far@x>\nDate: 1 Jul 2003 11:00:00 +0000\n\n>> hello {}\n>> {} world\n",
        "lorem ipsum dolor sit amet consectetur", "elit sed do eiusmod tempor incididunt"
    );
    build_archive(
        dir.path(),
        &[
            msg("near@x", "near", 10, None, "well hello world to everyone"),
            scattered,
        ],
    );

    let archive = Archive::open(dir.path()).expect("open");
    let data = archive.search(
        "hello world",
        SearchFlags::ADJACENT_WORDS,
        ClassFilter::default(),
    );
    assert_eq!(data.results.len(), 2);
    assert_eq!(data.results[0].postid, 0);
    assert!(data.results[0].rank > data.results[1].rank);
    assert!(data.matched.iter().any(|w| w == "hello"));
    assert!(data.matched.iter().any(|w| w == "world"));

    // Invariant 7: ranks in (0, 1], monotone non-increasing.
    assert!(data.results[0].rank <= 1.0);
    for pair in data.results.windows(2) {
        assert!(pair[0].rank >= pair[1].rank);
    }
}

#[test]
fn search_covers_headers_and_filters() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_archive(
        dir.path(),
        &[
            msg("a@x", "quarterly report", 10, None, "numbers are up"),
            msg("b@x", "chitchat", 11, None, "the quarterly meeting is boring"),
        ],
    );
    let archive = Archive::open(dir.path()).expect("open");

    // Unfiltered: subject hit (header class) and content hit both count,
    // but content dominates.
    let all = archive.search("quarterly", SearchFlags::empty(), ClassFilter::default());
    assert_eq!(all.results.len(), 2);
    assert_eq!(all.results[0].postid, 1);

    // Content-only filter drops the subject-only message.
    let content = archive.search(
        "quarterly",
        SearchFlags::empty(),
        ClassFilter::content_only(),
    );
    assert_eq!(content.results.len(), 1);
    assert_eq!(content.results[0].postid, 1);

    // No match is an empty success.
    assert!(
        archive
            .search("zzzwxy", SearchFlags::empty(), ClassFilter::default())
            .results
            .is_empty()
    );
}

#[test]
fn missing_archive_directory_is_not_found() {
    let err = Archive::open("/nonexistent/glacier-archive").unwrap_err();
    assert!(matches!(err, glacier_error::GlacierError::NotFound(_)));
}

#[test]
fn galaxy_deduplicates_across_archives() {
    let root = tempfile::tempdir().expect("tempdir");
    let a = root.path().join("arch-a");
    let b = root.path().join("arch-b");
    std::fs::create_dir_all(&a).expect("mkdir");
    std::fs::create_dir_all(&b).expect("mkdir");

    // <shared@x> is crossposted to both archives.
    build_archive(
        &a,
        &[
            msg("shared@x", "Crosspost", 10, None, "posted to both groups"),
            msg("only-a@x", "Alpha", 11, None, "archive a exclusive"),
        ],
    );
    build_archive(
        &b,
        &[
            msg("shared@x", "Crosspost", 10, None, "posted to both groups"),
            msg("only-b@x", "Beta", 12, None, "archive b exclusive"),
        ],
    );

    let galaxy_dir = root.path().join("galaxy");
    std::fs::create_dir_all(&galaxy_dir).expect("mkdir");
    std::fs::write(
        galaxy_dir.join("archives"),
        format!("{}\n{}\n", a.display(), b.display()),
    )
    .expect("list");

    let stats = build_galaxy(&galaxy_dir).expect("build");
    assert_eq!(stats.archives, 2);
    assert_eq!(stats.messages, 4);
    assert_eq!(stats.unique, 3);

    let galaxy = glacier_archive::Galaxy::open(&galaxy_dir).expect("open");
    assert_eq!(galaxy.archive_count(), 2);
    assert_eq!(galaxy.unique_count(), 3);
    assert_eq!(galaxy.archive_name(0), b"arch-a");
    assert_eq!(galaxy.archive_name(1), b"arch-b");

    assert_eq!(galaxy.find_archives(b"shared@x").collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(galaxy.find_archives(b"only-a@x").collect::<Vec<_>>(), vec![0]);
    assert_eq!(galaxy.find_archives(b"only-b@x").collect::<Vec<_>>(), vec![1]);
    assert_eq!(galaxy.find_archives(b"unknown@q").count(), 0);

    let opened = galaxy.open_archive(1).expect("open archive");
    assert_eq!(opened.message_count(), 2);
    assert_eq!(opened.subject(1), b"Beta");
}

#[test]
fn galaxy_requires_archives_list_and_openable_archives() {
    let root = tempfile::tempdir().expect("tempdir");
    let galaxy_dir = root.path().join("galaxy");
    std::fs::create_dir_all(&galaxy_dir).expect("mkdir");

    let err = build_galaxy(&galaxy_dir).unwrap_err();
    assert!(matches!(err, glacier_error::GlacierError::NotFound(_)));

    std::fs::write(galaxy_dir.join("archives"), "/nonexistent/archive\n").expect("list");
    let err = build_galaxy(&galaxy_dir).unwrap_err();
    assert!(matches!(
        err,
        glacier_error::GlacierError::CannotOpenArchive(_)
    ));
}
