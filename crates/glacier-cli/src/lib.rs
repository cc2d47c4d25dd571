//! Shared plumbing for the build tools.

use std::path::Path;

use glacier_error::{GlacierError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Initialise tracing from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

/// Fail early when the archive directory is missing, like every original
/// tool did.
pub fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(GlacierError::NotFound(dir.to_path_buf()))
    }
}

/// A counting progress bar for the message loops.
#[must_use]
pub fn progress(len: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} {pos}/{len} [{bar:30}]")
            .expect("static template parses")
            .progress_chars("=> "),
    );
    bar.set_message(message);
    bar
}
