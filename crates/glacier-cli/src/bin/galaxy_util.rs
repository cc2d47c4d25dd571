//! `galaxy-util <dir>` — build the cross-archive indices.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_archive::build_galaxy;
use glacier_error::Result;

/// Build galaxy indices from the `archives` path list in the directory.
#[derive(Parser)]
#[command(name = "galaxy-util", version)]
struct Args {
    /// Galaxy directory containing the `archives` list.
    directory: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.directory)?;
    let stats = build_galaxy(&args.directory)?;
    println!(
        "Indexed {} archives.\nTotal message count: {}\nUnique message count: {}",
        stats.archives, stats.messages, stats.unique
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
