//! `threadify <dir> [-i <re-prefix>]...` — reattach orphaned replies.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_archive::Archive;
use glacier_conn::{ConnectivityTable, Threader, ThreaderConfig};
use glacier_error::Result;

/// Reconnect toplevel messages that quote an existing thread.
#[derive(Parser)]
#[command(name = "threadify", version)]
struct Args {
    /// Archive directory.
    directory: PathBuf,
    /// Additional reply prefixes for the subject filter (repeatable).
    #[arg(short = 'i', value_name = "PREFIX")]
    ignore: Vec<String>,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.directory)?;
    let dir = &args.directory;

    let mut config = ThreaderConfig::default();
    for prefix in &args.ignore {
        config.add_prefix(prefix);
    }

    let archive = Archive::open(dir)?;
    let mut table = ConnectivityTable::load(dir)?;
    let stats = Threader::new(config).run(&mut table, &archive)?;
    // The archive maps the connectivity files; release it before rewriting.
    drop(archive);

    if stats.changed() {
        println!("Saving...");
        println!("WARNING! Lexicon data has been invalidated!");
        table.save(dir)?;
    }
    println!(
        "Found {} new threads.\nSurely matched {} messages, rejected {} bad guesses.",
        stats.new_threads, stats.sure, stats.bad
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
