//! Serial extractor chain for one track.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use super::extractor::ExtractorHandle;
use super::registry::ExtractorRegistry;
use crate::config::DEFAULT_FEATURE_TAGS;
use crate::error::ExtractorError;
use crate::storage::TrackStub;
use crate::telemetry::metrics;

/// Progress of one track through the extractor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineEvent {
    /// Stub state after the extractor ran.
    pub snapshot: TrackStub,
    /// Extractor that just ran; `None` when the chain was empty.
    pub extractor: Option<String>,
    /// Whether that extractor reported a failure.
    pub failed: bool,
    /// Set on the last event of the chain.
    pub complete: bool,
}

/// Runs the extractor chain resolved from a capability list.
#[derive(Debug, Clone)]
pub struct MetadataPipeline {
    registry: Arc<ExtractorRegistry>,
    /// Requested after the extension, in this order.
    features: Arc<[String]>,
}

impl MetadataPipeline {
    /// Create a pipeline over a registry, requesting the default features.
    #[must_use]
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self {
            registry,
            features: DEFAULT_FEATURE_TAGS.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    /// Replace the feature capabilities requested for every track.
    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Capability list for a new track: its extension, then the features.
    #[must_use]
    pub fn capabilities_for(&self, stub: &TrackStub) -> Vec<String> {
        stub.extension()
            .into_iter()
            .chain(self.features.iter().cloned())
            .collect()
    }

    /// Resolve the chain for `capabilities`.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, capabilities: &[S]) -> Vec<Arc<ExtractorHandle>> {
        self.registry.resolve(capabilities)
    }

    /// Enrich `stub` with every extractor of the resolved chain, in order.
    ///
    /// Each extractor runs under its own lock, so a slow extractor only
    /// holds back tracks that need it. `emit` receives one event per
    /// extractor; the last one has `complete` set. An empty chain emits a
    /// single complete event. A failing or panicking extractor contributes
    /// nothing and never stops the chain.
    ///
    /// Blocks the calling thread; run it on the blocking pool.
    pub fn run<S, F>(&self, mut stub: TrackStub, capabilities: &[S], mut emit: F) -> TrackStub
    where
        S: AsRef<str>,
        F: FnMut(PipelineEvent),
    {
        let chain = self.resolve(capabilities);

        if chain.is_empty() {
            tracing::debug!(
                fingerprint = %stub.fingerprint,
                "No extractor for track capabilities"
            );
            emit(PipelineEvent {
                snapshot: stub.clone(),
                extractor: None,
                failed: false,
                complete: true,
            });
            return stub;
        }

        let last = chain.len() - 1;
        for (index, handle) in chain.iter().enumerate() {
            // A failing extractor must leave no partial edits behind
            let mut working = stub.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.enrich(&mut working)))
                .unwrap_or_else(|_| Err(ExtractorError::Panicked(handle.name().to_string())));
            let failed = match outcome {
                Ok(()) => {
                    stub = working;
                    false
                }
                Err(e) => {
                    tracing::warn!(
                        extractor = handle.name(),
                        path = %stub.filename.display(),
                        error = %e,
                        "Extractor failed, continuing with next"
                    );
                    metrics::EXTRACTOR_FAILURES
                        .with_label_values(&[handle.name()])
                        .inc();
                    true
                }
            };

            emit(PipelineEvent {
                snapshot: stub.clone(),
                extractor: Some(handle.name().to_string()),
                failed,
                complete: index == last,
            });
        }

        stub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Extractor;
    use crate::storage::{ArtistInfo, Fingerprint};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SetName(&'static str);

    impl Extractor for SetName {
        fn name(&self) -> &str {
            "set-name"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["flac".to_string()]
        }

        fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError> {
            if track.name.is_empty() {
                track.name = self.0.to_string();
            }
            Ok(())
        }
    }

    struct Broken;

    impl Extractor for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["flac".to_string()]
        }

        fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError> {
            track.add_artist(ArtistInfo::named("Half Written"));
            Err(ExtractorError::NoMetadata(
                track.filename.display().to_string(),
            ))
        }
    }

    struct Panics;

    impl Extractor for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["flac".to_string()]
        }

        fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError> {
            track.name = "never kept".to_string();
            panic!("corrupt header in {}", track.filename.display());
        }
    }

    struct Cover;

    impl Extractor for Cover {
        fn name(&self) -> &str {
            "cover"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["cover".to_string()]
        }

        fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError> {
            track.album.cover = Some(format!("{}/folder.jpg", track.name));
            Ok(())
        }
    }

    fn stub() -> TrackStub {
        TrackStub::new(Fingerprint::from_hex("f"), "/music/a.flac")
    }

    #[test]
    fn test_events_progressive_then_complete() {
        let mut registry = ExtractorRegistry::new();
        registry.register(SetName("first"));
        registry.register(SetName("second"));
        let pipeline = MetadataPipeline::new(Arc::new(registry));

        let mut events = Vec::new();
        let result = pipeline.run(stub(), &["flac"], |e| events.push(e));

        assert_eq!(result.name, "first");
        assert_eq!(events.len(), 2);
        assert!(!events[0].complete);
        assert!(events[1].complete);
        assert_eq!(events[1].snapshot, result);
    }

    #[test]
    fn test_failure_does_not_halt_chain() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Broken);
        registry.register(SetName("kept"));
        let pipeline = MetadataPipeline::new(Arc::new(registry));

        let mut events = Vec::new();
        let result = pipeline.run(stub(), &["flac"], |e| events.push(e));

        assert_eq!(result.name, "kept");
        assert!(result.artists.is_empty());
        assert!(events[0].failed);
        assert!(!events[1].failed);
        assert!(events[1].complete);
    }

    #[test]
    fn test_empty_chain_completes_once() {
        let pipeline = MetadataPipeline::new(Arc::new(ExtractorRegistry::new()));

        let mut events = Vec::new();
        let result = pipeline.run(stub(), &["dsf"], |e| events.push(e));

        assert_eq!(result, stub());
        assert_eq!(events.len(), 1);
        assert!(events[0].complete);
        assert_eq!(events[0].extractor, None);
    }

    struct Exclusive {
        active: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    impl Extractor for Exclusive {
        fn name(&self) -> &str {
            "exclusive"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["flac".to_string()]
        }

        fn update(&mut self, _track: &mut TrackStub) -> Result<(), ExtractorError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_extractor_never_runs_concurrently() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut registry = ExtractorRegistry::new();
        registry.register(Exclusive {
            active: Arc::clone(&active),
            max_seen: Arc::clone(&max_seen),
        });
        let pipeline = MetadataPipeline::new(Arc::new(registry));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let pipeline = pipeline.clone();
                scope.spawn(move || {
                    pipeline.run(stub(), &["flac"], |_| {});
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_extractor_counts_as_failure() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Panics);
        registry.register(SetName("after panic"));
        let pipeline = MetadataPipeline::new(Arc::new(registry));

        let mut events = Vec::new();
        let result = pipeline.run(stub(), &["flac"], |e| events.push(e));

        assert_eq!(result.name, "after panic");
        assert!(events[0].failed);
        assert!(events[1].complete);

        // The extractor's lock was released by the unwind
        let again = pipeline.run(stub(), &["flac"], |_| {});
        assert_eq!(again.name, "after panic");
    }

    #[test]
    fn test_capabilities_extension_then_features() {
        let pipeline = MetadataPipeline::new(Arc::new(ExtractorRegistry::new()));
        let track = TrackStub::new(Fingerprint::from_hex("f"), "/music/A.FLAC");
        assert_eq!(
            pipeline.capabilities_for(&track),
            vec!["flac", "discid", "text", "fingerprint", "cover"]
        );

        let pipeline = pipeline.with_features(["cover"]);
        assert_eq!(pipeline.capabilities_for(&track), vec!["flac", "cover"]);
    }

    #[test]
    fn test_feature_extractor_runs_after_format_extractor() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Cover);
        registry.register(SetName("Album"));
        let pipeline = MetadataPipeline::new(Arc::new(registry)).with_features(["cover"]);

        let track = stub();
        let capabilities = pipeline.capabilities_for(&track);
        let mut order = Vec::new();
        let result = pipeline.run(track, &capabilities, |e| order.extend(e.extractor));

        assert_eq!(order, vec!["set-name", "cover"]);
        assert_eq!(result.album.cover.as_deref(), Some("Album/folder.jpg"));
    }
}
