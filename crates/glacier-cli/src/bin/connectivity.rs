//! `connectivity <dir>` — build the conversation graph.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_conn::build_connectivity;
use glacier_error::Result;
use glacier_store::{MessageSource, MsgIdTable};

/// Build `connmeta`, `conndata` and `toplevel` for an archive.
#[derive(Parser)]
#[command(name = "connectivity", version)]
struct Args {
    /// Archive directory.
    directory: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.directory)?;
    let dir = &args.directory;

    let source = MessageSource::open(dir)?;
    let msgids: MsgIdTable<u32> = MsgIdTable::open(
        dir.join("midmeta"),
        dir.join("middata"),
        dir.join("midhash"),
        dir.join("midhashdata"),
    )?;

    let stats = build_connectivity(&source, &msgids, dir)?;
    println!(
        "Top level messages: {}\nMissing messages (maybe crosspost): {}\nMalformed references: {}\nUnparsable date fields: {}",
        stats.toplevel, stats.missing, stats.broken, stats.baddate
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
