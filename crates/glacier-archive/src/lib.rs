//! The archive façade and the galaxy union layer.
//!
//! [`Archive`] bundles every mmapped view of one archive directory and
//! answers the whole read API: message fetch by index or Message-ID,
//! conversation navigation, ranked search, the time chart, and the archive
//! metadata strings. [`Galaxy`] presents many archives as one addressable
//! collection with cross-archive Message-ID resolution.

pub mod archive;
pub mod galaxy;
pub mod import;

pub use archive::Archive;
pub use galaxy::{Galaxy, GalaxyStats, build_galaxy};
pub use import::{ArchiveImporter, ImportStats};
