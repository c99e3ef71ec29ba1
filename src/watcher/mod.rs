//! Filesystem change detection.
//!
//! This module provides:
//! - Per-directory watches using notify-rs
//! - Debounce and write-stability gating
//! - The `ScanTrigger` seam to the scan coordinator

mod stability;
mod trigger;
#[allow(clippy::module_inception)]
mod watcher;

pub use stability::{GateDecision, StabilityGate};
pub use trigger::ScanTrigger;
pub use watcher::{ChangeWatcher, WatcherConfig};
