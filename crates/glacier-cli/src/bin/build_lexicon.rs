//! `build-lexicon <dir> [--distances]` — build the word index.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_error::Result;
use glacier_lexicon::{LexiconView, build_lexdist, build_lexicon};
use glacier_store::MessageSource;

/// Build the lexicon files, optionally with the fuzzy-distance table.
#[derive(Parser)]
#[command(name = "build-lexicon", version)]
struct Args {
    /// Archive directory.
    directory: PathBuf,
    /// Also compute the word-neighbour distance table.
    #[arg(long)]
    distances: bool,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.directory)?;
    let dir = &args.directory;

    let source = MessageSource::open(dir)?;
    let stats = build_lexicon(&source, dir)?;
    println!(
        "Lexicon: {} words, {} postings, {} hits.",
        stats.words, stats.postings, stats.hits
    );

    if args.distances {
        let view = LexiconView::open(dir)?;
        build_lexdist(&view, dir)?;
        println!("Distance table written.");
    }
    Ok(())
}

fn main() -> ExitCode {
    glacier_cli::init_tracing();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
