//! Write-stability gate.
//!
//! Files in a changed directory are awaited until their size stops moving
//! between two consecutive checks. Only then is a rescan worth starting.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a stability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Everything settled and no pass is running.
    Trigger,
    /// Check again after another debounce window.
    Rearm,
}

/// Sizes of files still being written.
#[derive(Debug, Default)]
pub struct StabilityGate {
    awaited: HashMap<PathBuf, u64>,
    /// Consecutive checks that found unsettled files.
    cycles: u32,
    /// Zero waits indefinitely.
    max_cycles: u32,
}

impl StabilityGate {
    /// Create a gate that forces a decision after `max_cycles` unsettled checks.
    #[must_use]
    pub fn new(max_cycles: u32) -> Self {
        Self {
            max_cycles,
            ..Self::default()
        }
    }

    /// Snapshot the size of every regular file directly inside `dir`.
    ///
    /// Returns the number of files now awaited from that directory.
    pub fn observe_directory(&mut self, dir: &Path) -> usize {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Changed directory unreadable");
                return 0;
            }
        };

        let mut observed = 0;
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                self.awaited.insert(entry.path(), metadata.len());
                observed += 1;
            }
        }
        observed
    }

    /// Compare awaited sizes with the disk and decide what to do.
    ///
    /// Settled and vanished files leave the set; changed sizes are kept for
    /// the next round.
    pub fn check(&mut self, scan_running: bool) -> GateDecision {
        self.awaited
            .retain(|path, last_size| match fs::metadata(path) {
                Ok(metadata) if metadata.len() != *last_size => {
                    *last_size = metadata.len();
                    true
                }
                _ => false,
            });

        if !self.awaited.is_empty() {
            self.cycles += 1;
            if self.max_cycles == 0 || self.cycles < self.max_cycles {
                tracing::debug!(
                    pending = self.awaited.len(),
                    cycles = self.cycles,
                    "Files still changing"
                );
                return GateDecision::Rearm;
            }

            tracing::warn!(
                pending = self.awaited.len(),
                cycles = self.cycles,
                "Files did not settle, scanning anyway"
            );
            self.awaited.clear();
        }

        if scan_running {
            return GateDecision::Rearm;
        }

        self.cycles = 0;
        GateDecision::Trigger
    }

    /// Number of files still awaited.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.awaited.len()
    }
}
