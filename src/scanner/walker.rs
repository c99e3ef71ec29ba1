//! Per-location directory walker.
//!
//! Walks one root depth-first, fingerprints every file on the extension
//! allow-list and streams observations to the coordinator.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::events::{FileObservation, WalkStats, WalkerEvent, WalkerId};
use super::filter::ExtensionFilter;
use super::fingerprint::fingerprint_file;
use crate::storage::now_micros;
use crate::telemetry::spans;

/// Enumerates and fingerprints the media files under one root.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    id: WalkerId,
    root: PathBuf,
    filter: ExtensionFilter,
}

impl DirectoryWalker {
    /// Create a walker for `root`.
    pub fn new(id: WalkerId, root: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        Self {
            id,
            root: root.into(),
            filter,
        }
    }

    /// Walker identity.
    #[must_use]
    pub const fn id(&self) -> WalkerId {
        self.id
    }

    /// Root being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree, blocking the current thread.
    ///
    /// Emits one `Found` per matching file and a final `Finished` once the
    /// subtree is exhausted. Cancellation or a closed channel abandons the
    /// walk without a `Finished` event.
    pub fn run(&self, events: &mpsc::Sender<WalkerEvent>, cancel: &CancellationToken) -> WalkStats {
        let mut stats = WalkStats::default();
        let _span =
            spans::walk_span(&self.id.to_string(), &self.root.display().to_string()).entered();

        tracing::info!(walker = %self.id, root = %self.root.display(), "Starting directory walk");

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            if cancel.is_cancelled() {
                tracing::info!(walker = %self.id, "Walk cancelled");
                return stats;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // walkdir does not descend into a directory it failed to list
                    tracing::warn!(
                        walker = %self.id,
                        path = ?e.path(),
                        error = %e,
                        "Skipping unreadable subtree"
                    );
                    stats.errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            stats.files_found += 1;
            let path = entry.path();

            if !self.filter.matches(path) {
                stats.files_skipped += 1;
                continue;
            }

            let fingerprint = match fingerprint_file(path) {
                Ok(fp) => fp,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot fingerprint file");
                    stats.errors += 1;
                    continue;
                }
            };

            let observation = FileObservation {
                path: path.to_path_buf(),
                fingerprint,
                discovered_at: now_micros(),
            };

            if events.blocking_send(WalkerEvent::Found(observation)).is_err() {
                tracing::warn!(walker = %self.id, "Coordinator channel closed during walk");
                return stats;
            }
            stats.files_matched += 1;
        }

        tracing::info!(
            walker = %self.id,
            root = %self.root.display(),
            found = stats.files_found,
            matched = stats.files_matched,
            skipped = stats.files_skipped,
            errors = stats.errors,
            "Directory walk complete"
        );

        let _ = events.blocking_send(WalkerEvent::Finished {
            walker: self.id,
            stats,
        });
        stats
    }

    /// Run the walk on the blocking thread pool.
    pub fn spawn(
        self,
        events: mpsc::Sender<WalkerEvent>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<WalkStats> {
        tokio::task::spawn_blocking(move || self.run(&events, &cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> ExtensionFilter {
        ExtensionFilter::new(["flac", "mp3"])
    }

    async fn collect(mut rx: mpsc::Receiver<WalkerEvent>) -> Vec<WalkerEvent> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_walk_filters_and_finishes() {
        let tmp = TempDir::new().unwrap();
        let album = tmp.path().join("Album");
        fs::create_dir(&album).unwrap();
        fs::write(album.join("01.flac"), b"one").unwrap();
        fs::write(album.join("02.MP3"), b"two").unwrap();
        fs::write(album.join("cover.jpg"), b"img").unwrap();

        let (tx, rx) = mpsc::channel(16);
        let walker = DirectoryWalker::new(WalkerId(7), tmp.path(), filter());
        let stats = walker.spawn(tx, CancellationToken::new()).await.unwrap();

        assert_eq!(stats.files_found, 3);
        assert_eq!(stats.files_matched, 2);
        assert_eq!(stats.files_skipped, 1);

        let events = collect(rx).await;
        assert_eq!(events.len(), 3);
        assert!(events[0].observation().unwrap().path.ends_with("01.flac"));
        assert!(events[1].observation().unwrap().path.ends_with("02.MP3"));
        assert!(matches!(
            events[2],
            WalkerEvent::Finished {
                walker: WalkerId(7),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_walk_is_depth_first() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/deep")).unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("a/deep/1.flac"), b"1").unwrap();
        fs::write(tmp.path().join("a/2.flac"), b"2").unwrap();
        fs::write(tmp.path().join("b/3.flac"), b"3").unwrap();

        let (tx, rx) = mpsc::channel(16);
        DirectoryWalker::new(WalkerId(0), tmp.path(), filter())
            .spawn(tx, CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<String> = collect(rx)
            .await
            .iter()
            .filter_map(WalkerEvent::observation)
            .map(|o| o.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["2.flac", "1.flac", "3.flac"]);
    }

    #[tokio::test]
    async fn test_missing_root_still_finishes() {
        let tmp = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel(4);
        let stats = DirectoryWalker::new(WalkerId(1), tmp.path().join("gone"), filter())
            .spawn(tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.errors, 1);
        let events = collect(rx).await;
        assert!(matches!(events.as_slice(), [WalkerEvent::Finished { .. }]));
    }

    #[tokio::test]
    async fn test_cancelled_walk_emits_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.flac"), b"a").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, rx) = mpsc::channel(4);
        DirectoryWalker::new(WalkerId(2), tmp.path(), filter())
            .spawn(tx, cancel)
            .await
            .unwrap();

        assert!(collect(rx).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_not_followed() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("a.flac"), b"a").unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(real.join("a.flac"), tmp.path().join("b.flac")).unwrap();

        let (tx, rx) = mpsc::channel(16);
        let stats = DirectoryWalker::new(WalkerId(0), tmp.path(), filter())
            .spawn(tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.files_matched, 1);
        drop(collect(rx).await);
    }
}
