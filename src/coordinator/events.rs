//! Scan events broadcast to front-ends.

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::storage::{Fingerprint, OrphanCounts, Timestamp, TrackId, TrackStub};

/// Progress notification published by the coordinator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A pass began.
    PassStarted { pass_id: Uuid, started_at: Timestamp },
    /// An extractor finished with a track; `complete` marks the last one.
    TrackEnriched {
        pass_id: Uuid,
        snapshot: TrackStub,
        complete: bool,
    },
    /// A new track reached the catalog.
    TrackCommitted {
        pass_id: Uuid,
        track_id: TrackId,
        fingerprint: Fingerprint,
        paths: Vec<PathBuf>,
    },
    /// Reconciliation ran and the pass is over.
    PassFinished(PassReport),
    /// The pass was stopped before reconciliation.
    PassCancelled { pass_id: Uuid },
}

impl ScanEvent {
    /// Pass this event belongs to.
    #[must_use]
    pub const fn pass_id(&self) -> Uuid {
        match self {
            Self::PassStarted { pass_id, .. }
            | Self::TrackEnriched { pass_id, .. }
            | Self::TrackCommitted { pass_id, .. }
            | Self::PassCancelled { pass_id } => *pass_id,
            Self::PassFinished(report) => report.pass_id,
        }
    }
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    /// Matching files reported by the walkers.
    pub files_observed: u64,
    /// Tracks inserted by this pass.
    pub new_tracks: u64,
    /// Observations attached to an existing or in-flight track.
    pub known_files: u64,
    /// Fingerprints whose commit was abandoned.
    pub commit_failures: u64,
    pub extractor_failures: u64,
    pub stale_files_removed: usize,
    pub orphans_removed: OrphanCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ScanEvent::PassCancelled {
            pass_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pass_cancelled");
    }

    #[test]
    fn test_pass_id_of_report() {
        let id = Uuid::new_v4();
        let event = ScanEvent::PassFinished(PassReport {
            pass_id: id,
            ..PassReport::default()
        });
        assert_eq!(event.pass_id(), id);
    }
}
