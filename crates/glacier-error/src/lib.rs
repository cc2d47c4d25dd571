//! Error taxonomy for the glacier toolkit.
//!
//! Archives are frozen after build, so the error surface splits cleanly:
//! everything that can go wrong at *open* time is fatal (`NotFound`,
//! `Corrupt`), everything that can go wrong at *build* time aborts the
//! current tool (`TooManyCollisions`, `CannotOpenArchive`, `Io`), and
//! per-message defects (unparsable dates, whitespace inside Message-IDs,
//! references to unknown messages) are counters on the build statistics,
//! never errors.

use std::path::PathBuf;

/// Convenience alias used across the workspace.
pub type Result<T, E = GlacierError> = std::result::Result<T, E>;

/// All hard failures produced by the glacier crates.
#[derive(Debug, thiserror::Error)]
pub enum GlacierError {
    /// A required file or directory does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// A file exists but its contents violate the on-disk contract.
    #[error("corrupt archive data in {path}: {reason}")]
    Corrupt {
        /// File that failed validation.
        path: PathBuf,
        /// What the validation found.
        reason: String,
    },

    /// A hash-index bucket would exceed its capacity of 8 entries.
    ///
    /// The operational remedy is to rebuild with a larger `hashbits`.
    #[error("too many hash collisions (bucket over capacity at hashbits={hashbits})")]
    TooManyCollisions {
        /// Table size exponent that overflowed.
        hashbits: u32,
    },

    /// A galaxy build referenced an archive that cannot be opened.
    #[error("cannot open archive: {0}")]
    CannotOpenArchive(PathBuf),

    /// The search query could not be parsed into any usable term.
    #[error("unusable query: {0}")]
    BadQuery(String),

    /// Underlying I/O failure during build or open.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invariant violation that indicates a bug, not an input problem.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GlacierError {
    /// Build an [`GlacierError::Internal`] from any displayable message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Build a [`GlacierError::Corrupt`] for `path` with a human-readable reason.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
