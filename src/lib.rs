//! Tunedex Library
//!
//! Media ingestion pipeline: concurrent directory discovery, content-based
//! deduplication, capability-driven metadata enrichment and change-triggered
//! re-indexing into a `SQLite` catalog.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metadata;
pub mod scanner;
pub mod storage;
pub mod telemetry;
pub mod watcher;

pub use catalog::{Catalog, SharedCatalog};
pub use config::Config;
pub use coordinator::{PassReport, ScanCoordinator, ScanEvent};
pub use error::{Error, Result};
pub use metadata::{Extractor, ExtractorRegistry, MetadataPipeline};
pub use watcher::{ChangeWatcher, ScanTrigger};
