//! Directory discovery.
//!
//! This module provides:
//! - Partial-content fingerprinting
//! - Extension allow-list filtering
//! - One walker per location, streaming observations over a channel

mod events;
mod filter;
mod fingerprint;
mod walker;

pub use events::{FileObservation, WalkStats, WalkerEvent, WalkerId};
pub use filter::ExtensionFilter;
pub use fingerprint::{fingerprint_file, EDGE_BYTES};
pub use walker::DirectoryWalker;
