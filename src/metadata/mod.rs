//! Metadata extraction.
//!
//! This module provides:
//! - The `Extractor` contract and per-extractor locking
//! - A capability-keyed registry
//! - The serial enrichment pipeline
//! - A file-name based fallback extractor

mod builtin;
mod extractor;
mod pipeline;
mod registry;

pub use builtin::FileInfoExtractor;
pub use extractor::{Extractor, ExtractorHandle};
pub use pipeline::{MetadataPipeline, PipelineEvent};
pub use registry::ExtractorRegistry;
