//! `import <source-dir> <archive-dir>` — raw messages into the base tables.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_archive::ArchiveImporter;
use glacier_error::Result;

/// Import a directory of RFC-5322 message files into a new archive.
#[derive(Parser)]
#[command(name = "import", version)]
struct Args {
    /// Directory with one message per file.
    source: PathBuf,
    /// Archive output directory (created if missing).
    archive: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.source)?;
    std::fs::create_dir_all(&args.archive)?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(&args.source)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let bar = glacier_cli::progress(files.len() as u64, "importing");
    let mut importer = ArchiveImporter::create(&args.archive)?;
    for file in &files {
        importer.append(&std::fs::read(file)?)?;
        bar.inc(1);
    }
    bar.finish_and_clear();
    let stats = importer.finish(&args.archive)?;

    println!(
        "Imported {} messages.\nMissing Message-IDs: {}\nDuplicate Message-IDs: {}\nMalformed Message-IDs: {}",
        stats.messages, stats.missing_msgid, stats.duplicate_msgid, stats.broken_msgid
    );
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
