//! Scan pass coordination.
//!
//! This module provides:
//! - The `ScanCoordinator` owning pass lifecycle and locations
//! - Dedup/commit of walker observations against the catalog
//! - Post-pass reconciliation
//! - Scan events and pass reports for subscribers

#[allow(clippy::module_inception)]
mod coordinator;
mod events;
mod pass;

pub use coordinator::ScanCoordinator;
pub use events::{PassReport, ScanEvent};
