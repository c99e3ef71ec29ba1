//! Scan pass lifecycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::events::{PassReport, ScanEvent};
use super::pass::Pass;
use crate::catalog::SharedCatalog;
use crate::error::ScanError;
use crate::metadata::MetadataPipeline;
use crate::scanner::ExtensionFilter;
use crate::storage::{now_micros, Timestamp};
use crate::telemetry::metrics;
use crate::watcher::ScanTrigger;
use crate::Result;

/// Scan events buffered per subscriber.
const EVENT_CAPACITY: usize = 1024;

/// Runs scan passes over the registered locations, one at a time.
///
/// Cheap to clone; clones share the same pass state.
#[derive(Clone)]
pub struct ScanCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: SharedCatalog,
    pipeline: MetadataPipeline,
    filter: ExtensionFilter,
    locations: Mutex<Locations>,
    events: broadcast::Sender<ScanEvent>,
    state: Mutex<PassState>,
}

#[derive(Default)]
struct Locations {
    paths: Vec<PathBuf>,
    frozen: bool,
}

#[derive(Default)]
struct PassState {
    active: Option<ActivePass>,
    /// Start of the most recent pass; pass starts strictly increase.
    last_start: Timestamp,
    last_report: Option<PassReport>,
}

struct ActivePass {
    id: Uuid,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ScanCoordinator {
    /// Create a coordinator over a catalog and extractor pipeline.
    #[must_use]
    pub fn new(catalog: SharedCatalog, pipeline: MetadataPipeline, filter: ExtensionFilter) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                catalog,
                pipeline,
                filter,
                locations: Mutex::new(Locations::default()),
                events,
                state: Mutex::new(PassState::default()),
            }),
        }
    }

    /// Register a root directory to index.
    ///
    /// Adding a location already registered is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error once the first pass has started, or if `path` is
    /// not a readable directory.
    pub fn add_location(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut locations = self.inner.locations.lock();

        if locations.frozen {
            return Err(ScanError::LocationsFrozen(path.display().to_string()).into());
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| ScanError::InvalidLocation {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if !canonical.is_dir() {
            return Err(ScanError::InvalidLocation {
                path: path.display().to_string(),
                reason: "not a directory".to_string(),
            }
            .into());
        }

        if !locations.paths.contains(&canonical) {
            tracing::info!(location = %canonical.display(), "Location registered");
            locations.paths.push(canonical);
        }
        Ok(())
    }

    /// Registered locations.
    #[must_use]
    pub fn locations(&self) -> Vec<PathBuf> {
        self.inner.locations.lock().paths.clone()
    }

    /// Begin a pass unless one is already running.
    ///
    /// Returns whether a new pass was started. Must be called from within
    /// a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.active.is_some() {
            tracing::debug!("Scan pass already active, start ignored");
            return false;
        }

        let locations = {
            let mut locations = self.inner.locations.lock();
            locations.frozen = true;
            locations.paths.clone()
        };

        let started_at = now_micros().max(state.last_start + 1);
        state.last_start = started_at;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let pass = Pass {
            id,
            started_at,
            locations,
            filter: self.inner.filter.clone(),
            catalog: Arc::clone(&self.inner.catalog),
            pipeline: self.inner.pipeline.clone(),
            events: self.inner.events.clone(),
        };

        metrics::PASSES_STARTED.inc();
        let _ = self.inner.events.send(ScanEvent::PassStarted {
            pass_id: id,
            started_at,
        });

        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let outcome = pass.run(token).await;
            inner.finish(id, outcome);
        });

        state.active = Some(ActivePass {
            id,
            cancel,
            task: Some(task),
        });
        true
    }

    /// Cancel the active pass and wait for it to wind down.
    ///
    /// Outstanding walkers and in-flight extractions are discarded and no
    /// reconciliation runs. Does nothing when idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass task panicked.
    pub async fn stop(&self) -> Result<()> {
        let task = {
            let mut state = self.inner.state.lock();
            let Some(active) = state.active.as_mut() else {
                return Ok(());
            };
            tracing::info!(pass_id = %active.id, "Stopping scan pass");
            active.cancel.cancel();
            active.task.take()
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                self.inner.state.lock().active = None;
                return Err(ScanError::TaskFailed(e.to_string()).into());
            }
        }
        Ok(())
    }

    /// Whether a pass is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }

    /// Report of the most recently finished pass.
    #[must_use]
    pub fn last_report(&self) -> Option<PassReport> {
        self.inner.state.lock().last_report.clone()
    }

    /// Subscribe to scan events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.inner.events.subscribe()
    }

    /// Wait for the running pass to end.
    ///
    /// Returns its report, or `None` if it was cancelled. When idle, returns
    /// the last report immediately.
    pub async fn wait(&self) -> Option<PassReport> {
        let mut events = self.subscribe();
        let pass_id = {
            let state = self.inner.state.lock();
            match &state.active {
                Some(active) => active.id,
                None => return state.last_report.clone(),
            }
        };

        loop {
            match events.recv().await {
                Ok(ScanEvent::PassFinished(report)) if report.pass_id == pass_id => {
                    return Some(report)
                }
                Ok(ScanEvent::PassCancelled { pass_id: id }) if id == pass_id => return None,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Scan event receiver lagged");
                    let state = self.inner.state.lock();
                    if state.active.as_ref().map(|a| a.id) != Some(pass_id) {
                        return state.last_report.clone().filter(|r| r.pass_id == pass_id);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Start a pass every `period` until `cancel` fires.
    ///
    /// A tick that finds a pass running is skipped.
    pub fn spawn_periodic(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !coordinator.start() {
                            tracing::debug!("Scheduled scan skipped, pass still running");
                        }
                    }
                }
            }
            tracing::debug!("Periodic scan stopped");
        })
    }
}

impl Inner {
    /// Record the end of pass `id` and announce it.
    fn finish(&self, id: Uuid, outcome: Option<PassReport>) {
        {
            let mut state = self.state.lock();
            if state.active.as_ref().is_some_and(|a| a.id == id) {
                state.active = None;
            }
            if let Some(report) = &outcome {
                state.last_report = Some(report.clone());
            }
        }

        let event = match outcome {
            Some(report) => {
                metrics::PASSES_COMPLETED.inc();
                ScanEvent::PassFinished(report)
            }
            None => {
                metrics::PASSES_CANCELLED.inc();
                ScanEvent::PassCancelled { pass_id: id }
            }
        };
        let _ = self.events.send(event);
    }
}

impl ScanTrigger for ScanCoordinator {
    fn is_scanning(&self) -> bool {
        self.is_active()
    }

    fn request_scan(&self) -> bool {
        self.start()
    }
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("locations", &self.locations())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
