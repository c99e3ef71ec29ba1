//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Scan passes started.
pub static PASSES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tunedex_passes_started_total", "Scan passes started").unwrap()
});

/// Scan passes that reached reconciliation.
pub static PASSES_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tunedex_passes_completed_total",
        "Scan passes that finished reconciliation"
    )
    .unwrap()
});

/// Scan passes stopped before reconciliation.
pub static PASSES_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tunedex_passes_cancelled_total", "Scan passes cancelled").unwrap()
});

/// Audio files observed by walkers.
pub static FILES_OBSERVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tunedex_files_observed_total", "Audio files observed").unwrap()
});

/// New tracks committed to the catalog.
pub static TRACKS_COMMITTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tunedex_tracks_committed_total", "New tracks committed").unwrap()
});

/// Observations attached to an already known or in-flight track.
pub static DUPLICATES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tunedex_duplicate_files_total",
        "Observations whose content was already known"
    )
    .unwrap()
});

/// Track commits abandoned after a catalog error.
pub static COMMIT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tunedex_commit_failures_total", "Abandoned track commits").unwrap()
});

/// Extractor failures by extractor name.
pub static EXTRACTOR_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tunedex_extractor_failures_total",
        "Extractor failures",
        &["extractor"]
    )
    .unwrap()
});

/// File rows removed by reconciliation.
pub static STALE_FILES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tunedex_stale_files_removed_total",
        "File rows removed by reconciliation"
    )
    .unwrap()
});

/// Directories currently under watch.
pub static WATCHED_DIRECTORIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tunedex_watched_directories", "Directories under watch").unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*PASSES_STARTED;
    let _ = &*PASSES_COMPLETED;
    let _ = &*PASSES_CANCELLED;
    let _ = &*FILES_OBSERVED;
    let _ = &*TRACKS_COMMITTED;
    let _ = &*DUPLICATES;
    let _ = &*COMMIT_FAILURES;
    let _ = &*EXTRACTOR_FAILURES;
    let _ = &*STALE_FILES_REMOVED;
    let _ = &*WATCHED_DIRECTORIES;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render the default registry in the text exposition format.
#[must_use]
pub fn render_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();

        let before = PASSES_STARTED.get();
        PASSES_STARTED.inc();
        assert!(PASSES_STARTED.get() > before);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        init_metrics();
        EXTRACTOR_FAILURES.with_label_values(&["render-test"]).inc();

        let text = render_metrics();
        assert!(text.contains("tunedex_extractor_failures_total"));
        assert!(text.contains("render-test"));
    }
}
