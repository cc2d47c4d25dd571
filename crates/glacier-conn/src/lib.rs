//! Conversation graph construction and repair.
//!
//! [`build::build_connectivity`] turns a message store plus its Message-ID
//! hash into the per-message `(epoch, parent, children)` table persisted as
//! `connmeta`/`conndata`/`toplevel`. [`thread::Threader`] later reattaches
//! toplevel messages that quote an existing thread but lost their
//! References.

pub mod build;
pub mod table;
pub mod thread;
pub mod view;

pub use build::{ConnectivityStats, build_connectivity};
pub use table::{ConnNode, ConnectivityTable};
pub use thread::{ThreadSource, ThreadStats, Threader, ThreaderConfig};
pub use view::ConnectivityView;
