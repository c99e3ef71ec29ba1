//! What the change watcher drives.

/// Something that can run a scan pass on request.
pub trait ScanTrigger: Send + Sync + 'static {
    /// Whether a pass is currently running.
    fn is_scanning(&self) -> bool;

    /// Ask for a pass. Returns whether one was started.
    fn request_scan(&self) -> bool;
}
