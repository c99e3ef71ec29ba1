//! Configuration management for Tunedex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, WatchLimitPolicy, DEFAULT_EXTENSIONS, DEFAULT_FEATURE_TAGS};
