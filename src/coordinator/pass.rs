//! One scan pass: discovery, dedup/commit and reconciliation.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::events::{PassReport, ScanEvent};
use crate::catalog::{Catalog, SharedCatalog};
use crate::metadata::MetadataPipeline;
use crate::scanner::{DirectoryWalker, ExtensionFilter, FileObservation, WalkerEvent, WalkerId};
use crate::storage::{now_micros, Fingerprint, Timestamp, TrackId, TrackStub};
use crate::telemetry::{metrics, spans};
use crate::Result;

/// Walker events buffered before walkers block.
const WALK_CHANNEL_CAPACITY: usize = 256;

/// Outcome of one extraction task.
struct Extraction {
    /// Key in the in-flight map, captured before any extractor ran.
    fingerprint: Fingerprint,
    stub: TrackStub,
    failures: u64,
}

/// Everything a pass needs, detached from the coordinator.
pub(super) struct Pass {
    pub id: Uuid,
    pub started_at: Timestamp,
    pub locations: Vec<PathBuf>,
    pub filter: ExtensionFilter,
    pub catalog: SharedCatalog,
    pub pipeline: MetadataPipeline,
    pub events: broadcast::Sender<ScanEvent>,
}

impl Pass {
    /// Drive the pass to completion.
    ///
    /// Returns `None` when cancelled; nothing is reconciled in that case
    /// and in-flight extractions are discarded.
    pub async fn run(self, cancel: CancellationToken) -> Option<PassReport> {
        let span = spans::pass_span(&self.id.to_string());
        PassRun::new(self).drive(cancel).instrument(span).await
    }
}

struct PassRun {
    pass: Pass,
    report: PassReport,
    /// Fingerprints being extracted, with paths seen while in flight.
    in_flight: HashMap<Fingerprint, Vec<PathBuf>>,
    extractions: JoinSet<Extraction>,
}

impl PassRun {
    fn new(pass: Pass) -> Self {
        let report = PassReport {
            pass_id: pass.id,
            started_at: pass.started_at,
            ..PassReport::default()
        };
        Self {
            pass,
            report,
            in_flight: HashMap::new(),
            extractions: JoinSet::new(),
        }
    }

    async fn drive(mut self, cancel: CancellationToken) -> Option<PassReport> {
        tracing::info!(
            locations = self.pass.locations.len(),
            started_at = self.pass.started_at,
            "Scan pass started"
        );

        let (walk_tx, mut walk_rx) = mpsc::channel(WALK_CHANNEL_CAPACITY);
        let walk_cancel = cancel.child_token();
        for (index, location) in self.pass.locations.iter().enumerate() {
            DirectoryWalker::new(WalkerId(index), location, self.pass.filter.clone())
                .spawn(walk_tx.clone(), walk_cancel.clone());
        }
        drop(walk_tx);

        let mut outstanding = self.pass.locations.len();

        while outstanding > 0 || !self.extractions.is_empty() {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    walk_cancel.cancel();
                    self.extractions.abort_all();
                    tracing::info!(
                        discarded = self.in_flight.len(),
                        "Scan pass cancelled"
                    );
                    return None;
                }

                event = walk_rx.recv(), if outstanding > 0 => match event {
                    Some(WalkerEvent::Found(observation)) => self.observe(observation),
                    Some(WalkerEvent::Finished { walker, stats }) => {
                        outstanding -= 1;
                        tracing::debug!(%walker, ?stats, outstanding, "Walker finished");
                    }
                    None => {
                        tracing::warn!(outstanding, "Walkers exited without finishing");
                        outstanding = 0;
                    }
                },

                Some(joined) = self.extractions.join_next(), if !self.extractions.is_empty() => {
                    match joined {
                        Ok(extraction) => self.complete(extraction),
                        Err(e) => {
                            tracing::error!(error = %e, "Extraction task failed, track abandoned");
                            self.report.commit_failures += 1;
                            metrics::COMMIT_FAILURES.inc();
                        }
                    }
                }
            }
        }

        self.in_flight.clear();
        self.reconcile();
        self.report.finished_at = now_micros();

        tracing::info!(
            observed = self.report.files_observed,
            new_tracks = self.report.new_tracks,
            known = self.report.known_files,
            commit_failures = self.report.commit_failures,
            stale_removed = self.report.stale_files_removed,
            "Scan pass finished"
        );
        Some(self.report)
    }

    /// Dedup one observation against the catalog and in-flight tracks.
    fn observe(&mut self, observation: FileObservation) {
        self.report.files_observed += 1;
        metrics::FILES_OBSERVED.inc();

        if let Some(paths) = self.in_flight.get_mut(&observation.fingerprint) {
            tracing::debug!(
                path = %observation.path.display(),
                fingerprint = %observation.fingerprint,
                "Attached to in-flight track"
            );
            paths.push(observation.path);
            self.report.known_files += 1;
            metrics::DUPLICATES.inc();
            return;
        }

        let known = {
            let catalog = self.pass.catalog.lock();
            register_if_known(&**catalog, &observation, self.pass.started_at)
        };

        match known {
            Ok(Some(_)) => {
                self.report.known_files += 1;
                metrics::DUPLICATES.inc();
            }
            Ok(None) => self.begin_extraction(observation),
            Err(e) => {
                tracing::warn!(
                    path = %observation.path.display(),
                    error = %e,
                    "Catalog lookup failed, file left for next pass"
                );
                self.report.commit_failures += 1;
                metrics::COMMIT_FAILURES.inc();
            }
        }
    }

    fn begin_extraction(&mut self, observation: FileObservation) {
        let FileObservation {
            path, fingerprint, ..
        } = observation;

        self.in_flight.insert(fingerprint.clone(), Vec::new());

        let stub = TrackStub::new(fingerprint, path);
        let capabilities = self.pass.pipeline.capabilities_for(&stub);
        let pipeline = self.pass.pipeline.clone();
        let events = self.pass.events.clone();
        let pass_id = self.pass.id;

        self.extractions.spawn_blocking(move || {
            let fingerprint = stub.fingerprint.clone();
            let mut failures = 0;
            let stub = pipeline.run(stub, &capabilities, |event| {
                if event.failed {
                    failures += 1;
                }
                let _ = events.send(ScanEvent::TrackEnriched {
                    pass_id,
                    snapshot: event.snapshot,
                    complete: event.complete,
                });
            });
            Extraction {
                fingerprint,
                stub,
                failures,
            }
        });
    }

    /// Commit a fully enriched track with every path seen for it.
    fn complete(&mut self, extraction: Extraction) {
        let Extraction {
            fingerprint,
            stub,
            failures,
        } = extraction;
        let extra_paths = self.in_flight.remove(&fingerprint).unwrap_or_default();
        self.report.extractor_failures += failures;

        let committed = {
            let catalog = self.pass.catalog.lock();
            commit_track(&**catalog, stub.clone(), &extra_paths, self.pass.started_at)
        };

        match committed {
            Ok((track_id, inserted)) => {
                let mut paths = Vec::with_capacity(extra_paths.len() + 1);
                paths.push(stub.filename.clone());
                paths.extend(extra_paths);

                if inserted {
                    self.report.new_tracks += 1;
                    metrics::TRACKS_COMMITTED.inc();
                    tracing::debug!(
                        track_id,
                        fingerprint = %stub.fingerprint,
                        path = %stub.filename.display(),
                        "Track committed"
                    );
                    let _ = self.pass.events.send(ScanEvent::TrackCommitted {
                        pass_id: self.pass.id,
                        track_id,
                        fingerprint: stub.fingerprint,
                        paths,
                    });
                } else {
                    self.report.known_files += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    fingerprint = %stub.fingerprint,
                    path = %stub.filename.display(),
                    error = %e,
                    "Commit abandoned, retried next pass"
                );
                self.report.commit_failures += 1;
                metrics::COMMIT_FAILURES.inc();
            }
        }
    }

    /// Drop mappings this pass did not touch, then unreferenced rows.
    fn reconcile(&mut self) {
        let catalog = self.pass.catalog.lock();

        for location in &self.pass.locations {
            match catalog.delete_stale_files(location, self.pass.started_at) {
                Ok(removed) => {
                    self.report.stale_files_removed += removed;
                    metrics::STALE_FILES_REMOVED.inc_by(removed as u64);
                }
                Err(e) => tracing::warn!(
                    location = %location.display(),
                    error = %e,
                    "Stale file cleanup failed"
                ),
            }
        }

        match catalog.delete_orphaned_albums_artists_genres() {
            Ok(counts) => self.report.orphans_removed = counts,
            Err(e) => tracing::warn!(error = %e, "Orphan cleanup failed"),
        }
    }
}

/// Refresh the mapping of an already catalogued file.
///
/// Returns the track id, or `None` when the content is new.
fn register_if_known(
    catalog: &dyn Catalog,
    observation: &FileObservation,
    seen_at: Timestamp,
) -> Result<Option<TrackId>> {
    let Some(track_id) = catalog.lookup_track_by_fingerprint(&observation.fingerprint)? else {
        return Ok(None);
    };
    catalog.insert_filename(&observation.path, track_id, seen_at)?;
    Ok(Some(track_id))
}

/// Resolve the album, insert the track and map every path.
///
/// Returns the track id and whether a new track was inserted.
fn commit_track(
    catalog: &dyn Catalog,
    mut stub: TrackStub,
    extra_paths: &[PathBuf],
    seen_at: Timestamp,
) -> Result<(TrackId, bool)> {
    let (track_id, inserted) = match catalog.lookup_track_by_fingerprint(&stub.fingerprint)? {
        Some(track_id) => (track_id, false),
        None => {
            if !stub.album.name.is_empty() {
                let album_id = catalog.resolve_or_create_album(
                    &stub.album.name,
                    stub.directory(),
                    stub.album.cover.as_deref(),
                )?;
                stub.album.id = Some(album_id);
            }
            (catalog.insert_track(&stub)?, true)
        }
    };

    catalog.insert_filename(&stub.filename, track_id, seen_at)?;
    for path in extra_paths {
        catalog.insert_filename(path, track_id, seen_at)?;
    }
    Ok((track_id, inserted))
}
