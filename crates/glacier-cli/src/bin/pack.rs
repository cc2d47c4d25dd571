//! `pack <dir>` — convert the raw message store to the compressed variant.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glacier_error::Result;
use glacier_store::pack_store;

/// Write `zmeta`/`zdata`/`zdict` from an archive's raw store.
#[derive(Parser)]
#[command(name = "pack", version)]
struct Args {
    /// Archive directory.
    directory: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    glacier_cli::require_dir(&args.directory)?;
    pack_store(&args.directory)?;
    println!("Packed. Readers now prefer the compressed store.");
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
