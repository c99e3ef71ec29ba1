//! Change-triggered re-indexing using notify-rs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::stability::{GateDecision, StabilityGate};
use super::trigger::ScanTrigger;
use crate::config::{Config, WatchLimitPolicy};
use crate::error::WatcherError;
use crate::telemetry::metrics;
use crate::Result;

/// Change watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Roots whose directory trees are watched.
    pub locations: Vec<PathBuf>,
    /// Quiet period before a stability check.
    pub debounce: Duration,
    /// Unsettled checks tolerated before scanning anyway; zero waits forever.
    pub max_stability_cycles: u32,
    /// What to do when the platform refuses another watch.
    pub limit_policy: WatchLimitPolicy,
}

impl WatcherConfig {
    /// Take watcher settings from the process configuration.
    #[must_use]
    pub fn from_config(config: &Config, locations: Vec<PathBuf>) -> Self {
        Self {
            locations,
            debounce: config.debounce,
            max_stability_cycles: config.max_stability_cycles,
            limit_policy: config.watch_limit_policy,
        }
    }
}

/// Watches every directory under the locations and triggers rescans once
/// changes have settled.
pub struct ChangeWatcher {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

struct Shared {
    config: WatcherConfig,
    trigger: Arc<dyn ScanTrigger>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    state: Mutex<WatchState>,
}

struct WatchState {
    watched: HashSet<PathBuf>,
    gate: StabilityGate,
    limit_reached: bool,
}

struct Running {
    changes: mpsc::UnboundedSender<PathBuf>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Create a stopped watcher wired to `trigger`.
    pub fn new(config: WatcherConfig, trigger: Arc<dyn ScanTrigger>) -> Self {
        let gate = StabilityGate::new(config.max_stability_cycles);
        Self {
            shared: Arc::new(Shared {
                config,
                trigger,
                watcher: Mutex::new(None),
                state: Mutex::new(WatchState {
                    watched: HashSet::new(),
                    gate,
                    limit_reached: false,
                }),
            }),
            running: Mutex::new(None),
        }
    }

    /// Register watches for every directory under the locations and begin
    /// reacting to changes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if already started, if the platform watcher cannot
    /// be created, or if the watch limit is hit under the `fail` policy.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(WatcherError::AlreadyStarted.into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let events_tx = tx.clone();
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in event.paths {
                        let _ = events_tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Watch error"),
            }
        })
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;
        *self.shared.watcher.lock() = Some(watcher);

        for location in &self.shared.config.locations {
            if let Err(e) = self.shared.register_tree(location, true) {
                self.shared.release_watches();
                return Err(e);
            }
        }

        tracing::info!(
            directories = self.shared.state.lock().watched.len(),
            debounce_ms = self.shared.config.debounce.as_millis(),
            "Change watcher started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&self.shared).drive(rx, cancel.clone()));
        *running = Some(Running {
            changes: tx,
            cancel,
            task,
        });
        Ok(())
    }

    /// Stop reacting to changes and release all watches.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            tracing::error!(error = %e, "Change watcher task failed");
        }
        self.shared.release_watches();
        tracing::info!("Change watcher stopped");
    }

    /// Whether the watcher is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Report a change inside `path` as if the platform had.
    pub fn notify_change(&self, path: impl Into<PathBuf>) {
        if let Some(running) = self.running.lock().as_ref() {
            let _ = running.changes.send(path.into());
        }
    }

    /// Directories currently under watch, sorted.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.shared.state.lock().watched.iter().cloned().collect();
        dirs.sort();
        dirs
    }
}

impl Shared {
    /// Debounce loop: IDLE until a change, ARMED until the deadline,
    /// then check stability and either trigger or re-arm.
    async fn drive(
        self: Arc<Self>,
        mut changes: mpsc::UnboundedReceiver<PathBuf>,
        cancel: CancellationToken,
    ) {
        let mut deadline: Option<Instant> = None;

        loop {
            let timer = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,

                change = changes.recv() => {
                    let Some(path) = change else { break };
                    self.blocking(move |shared| shared.on_change(&path)).await;
                    deadline = Some(Instant::now() + self.config.debounce);
                }

                () = timer => {
                    let scanning = self.trigger.is_scanning();
                    let decision = self
                        .blocking(move |shared| shared.state.lock().gate.check(scanning))
                        .await
                        .unwrap_or(GateDecision::Rearm);
                    deadline = match decision {
                        GateDecision::Trigger if self.trigger.request_scan() => {
                            tracing::info!("Changes settled, rescan triggered");
                            None
                        }
                        // A pass started since the check; retry once it ends
                        GateDecision::Trigger => {
                            tracing::debug!("Rescan refused, retrying after debounce");
                            Some(Instant::now() + self.config.debounce)
                        }
                        GateDecision::Rearm => Some(Instant::now() + self.config.debounce),
                    };
                }
            }
        }
    }

    /// Run directory walks and size checks off the async workers.
    async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Option<T>
    where
        F: FnOnce(&Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(self);
        match tokio::task::spawn_blocking(move || f(&shared)).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "Change watcher blocking task failed");
                None
            }
        }
    }

    /// Drop the platform watcher and forget every watch it held.
    fn release_watches(&self) {
        let mut watcher = self.watcher.lock();
        *watcher = None;
        let mut state = self.state.lock();
        state.watched.clear();
        state.limit_reached = false;
        metrics::WATCHED_DIRECTORIES.set(0);
    }

    /// Handle a change reported for `path`.
    fn on_change(&self, path: &Path) {
        let dir = self.directory_of(path);

        if let Err(e) = self.register_tree(&dir, false) {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to watch new directories");
        }

        let observed = self.state.lock().gate.observe_directory(&dir);
        tracing::debug!(dir = %dir.display(), observed, "Change noticed");
    }

    /// The watched directory a notification belongs to.
    fn directory_of(&self, path: &Path) -> PathBuf {
        if self.state.lock().watched.contains(path) {
            return path.to_path_buf();
        }
        path.parent().unwrap_or(path).to_path_buf()
    }

    /// Watch every directory under `root` not yet watched.
    ///
    /// On the initial registration the `fail` policy turns a watch limit
    /// into an error; otherwise the limit is logged and the rest of the
    /// tree stays unwatched.
    fn register_tree(&self, root: &Path, initial: bool) -> Result<usize> {
        let mut watcher = self.watcher.lock();
        let Some(watcher) = watcher.as_mut() else {
            return Ok(0);
        };
        let mut state = self.state.lock();
        let mut added = 0;

        let dirs = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_dir());

        for entry in dirs {
            let dir = entry.path();
            if state.watched.contains(dir) {
                continue;
            }

            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    state.watched.insert(dir.to_path_buf());
                    added += 1;
                }
                Err(e) if matches!(e.kind, notify::ErrorKind::MaxFilesWatch) => {
                    if initial && self.config.limit_policy == WatchLimitPolicy::Fail {
                        return Err(WatcherError::WatchLimit {
                            path: dir.display().to_string(),
                        }
                        .into());
                    }
                    if !state.limit_reached {
                        tracing::warn!(
                            dir = %dir.display(),
                            watched = state.watched.len(),
                            "Watch limit reached, changes below here rely on periodic scans"
                        );
                        state.limit_reached = true;
                    }
                    break;
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Failed to watch directory");
                }
            }
        }

        #[allow(clippy::cast_possible_wrap)]
        metrics::WATCHED_DIRECTORIES.set(state.watched.len() as i64);
        if added > 0 {
            tracing::debug!(root = %root.display(), added, "Registered directory watches");
        }
        Ok(added)
    }
}

/// Whether a notification can mean new, changed or removed media.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) | EventKind::Other => false,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingTrigger {
        scanning: AtomicBool,
        requests: AtomicUsize,
    }

    impl ScanTrigger for CountingTrigger {
        fn is_scanning(&self) -> bool {
            self.scanning.load(Ordering::SeqCst)
        }

        fn request_scan(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    /// Refuses the first request, as when a scheduled pass wins the race.
    #[derive(Default)]
    struct RefusingTrigger {
        requests: AtomicUsize,
    }

    impl ScanTrigger for RefusingTrigger {
        fn is_scanning(&self) -> bool {
            false
        }

        fn request_scan(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst) > 0
        }
    }

    /// Run the debounce driver with no platform watcher attached, so only
    /// injected changes reach it.
    fn drive_detached(
        watcher: &ChangeWatcher,
    ) -> (mpsc::UnboundedSender<PathBuf>, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(Arc::clone(&watcher.shared).drive(rx, cancel.clone()));
        (tx, cancel)
    }

    fn config(root: &Path) -> WatcherConfig {
        WatcherConfig {
            locations: vec![root.to_path_buf()],
            debounce: Duration::from_millis(100),
            max_stability_cycles: 0,
            limit_policy: WatchLimitPolicy::Warn,
        }
    }

    #[test]
    fn test_content_change_filter() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Access(AccessKind::Close(
            AccessMode::Write
        ))));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Read)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Close(
            AccessMode::Read
        ))));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
    }

    #[tokio::test]
    async fn test_start_watches_all_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Artist/Album")).unwrap();

        let watcher = ChangeWatcher::new(config(tmp.path()), Arc::new(CountingTrigger::default()));
        watcher.start().unwrap();

        assert_eq!(watcher.watched_dirs().len(), 3);
        assert!(watcher.start().is_err());

        watcher.stop().await;
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_notifications_coalesce_into_one_scan() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.flac"), b"settled").unwrap();

        let trigger = Arc::new(CountingTrigger::default());
        let watcher = ChangeWatcher::new(config(tmp.path()), Arc::clone(&trigger) as _);
        watcher.start().unwrap();

        for _ in 0..5 {
            watcher.notify_change(tmp.path().join("a.flac"));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(trigger.requests.load(Ordering::SeqCst), 1);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_running_pass_defers_trigger() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.flac"), b"settled").unwrap();

        let trigger = Arc::new(CountingTrigger::default());
        trigger.scanning.store(true, Ordering::SeqCst);
        let watcher = ChangeWatcher::new(config(tmp.path()), Arc::clone(&trigger) as _);
        watcher.start().unwrap();

        watcher.notify_change(tmp.path().join("a.flac"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(trigger.requests.load(Ordering::SeqCst), 0);

        trigger.scanning.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(trigger.requests.load(Ordering::SeqCst), 1);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_new_subdirectory_is_watched() {
        let tmp = TempDir::new().unwrap();
        let watcher = ChangeWatcher::new(config(tmp.path()), Arc::new(CountingTrigger::default()));
        watcher.start().unwrap();
        assert_eq!(watcher.watched_dirs().len(), 1);

        let album = tmp.path().join("New Album/CD1");
        fs::create_dir_all(&album).unwrap();
        watcher.notify_change(tmp.path().join("New Album"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let watched = watcher.watched_dirs();
        assert!(watched.contains(&tmp.path().join("New Album")));
        assert!(watched.contains(&album));

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_refused_trigger_is_retried() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.flac"), b"settled").unwrap();

        let trigger = Arc::new(RefusingTrigger::default());
        let watcher = ChangeWatcher::new(config(tmp.path()), Arc::clone(&trigger) as _);
        watcher.start().unwrap();

        watcher.notify_change(tmp.path().join("a.flac"));
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert_eq!(trigger.requests.load(Ordering::SeqCst), 2);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_growing_file_waits_for_second_equal_size() {
        let tmp = TempDir::new().unwrap();
        let file = fs::File::create(tmp.path().join("rip.flac")).unwrap();

        let trigger = Arc::new(CountingTrigger::default());
        let watcher = ChangeWatcher::new(
            WatcherConfig {
                debounce: Duration::from_millis(300),
                ..config(tmp.path())
            },
            Arc::clone(&trigger) as _,
        );
        let (changes, cancel) = drive_detached(&watcher);

        // Snapshot at 0 bytes; the first check (t=300ms) sees 10MB
        changes.send(tmp.path().to_path_buf()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        file.set_len(10 * 1024 * 1024).unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(trigger.requests.load(Ordering::SeqCst), 0);

        // The second check (t=600ms) sees 10MB again
        tokio::time::sleep(Duration::from_millis(650)).await;
        assert_eq!(trigger.requests.load(Ordering::SeqCst), 1);

        cancel.cancel();
    }
}
