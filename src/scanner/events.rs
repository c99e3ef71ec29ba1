//! Discovery events flowing from walkers to the coordinator.

#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::storage::{Fingerprint, Timestamp};

/// Identity of one walker within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WalkerId(pub usize);

impl fmt::Display for WalkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "walker-{}", self.0)
    }
}

/// A matching file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObservation {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Content fingerprint.
    pub fingerprint: Fingerprint,
    /// When the walker saw the file.
    pub discovered_at: Timestamp,
}

/// Counters kept by one walker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Regular files encountered.
    pub files_found: u64,
    /// Files matching the extension allow-list and fingerprinted.
    pub files_matched: u64,
    /// Files skipped by the allow-list.
    pub files_skipped: u64,
    /// Unreadable files and unlistable directories.
    pub errors: u64,
}

/// Event emitted by a walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkerEvent {
    /// A file was fingerprinted.
    Found(FileObservation),
    /// The walker exhausted its subtree.
    Finished { walker: WalkerId, stats: WalkStats },
}

impl WalkerEvent {
    /// The observation carried by this event, if any.
    #[must_use]
    pub fn observation(&self) -> Option<&FileObservation> {
        match self {
            Self::Found(obs) => Some(obs),
            Self::Finished { .. } => None,
        }
    }
}
