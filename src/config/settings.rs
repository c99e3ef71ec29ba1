//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default extension allow-list.
pub const DEFAULT_EXTENSIONS: &[&str] = &["flac", "mp3", "wav", "ogg", "m4a", "dsf"];

/// Feature capabilities requested for every new track, after its extension.
pub const DEFAULT_FEATURE_TAGS: &[&str] = &["discid", "text", "fingerprint", "cover"];

/// What to do when the platform refuses another directory watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchLimitPolicy {
    /// Log a warning and keep running without change detection for that subtree.
    #[default]
    Warn,
    /// Fail `ChangeWatcher::start` if the initial registration hits the limit.
    Fail,
}

impl FromStr for WatchLimitPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(Error::config(format!(
                "invalid watch limit policy '{other}', must be one of: warn, fail"
            ))),
        }
    }
}

/// Main configuration for the Tunedex indexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` catalog.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Media roots to index.
    pub locations: Vec<PathBuf>,

    /// File extensions (without dot) that are indexed.
    pub extensions: Vec<String>,

    /// Feature capabilities requested for each new track, in order.
    pub feature_tags: Vec<String>,

    /// Quiet period after the last change notification before a stability check.
    pub debounce: Duration,

    /// Stability checks before a pass is forced for a file that keeps growing.
    /// Zero means wait indefinitely.
    pub max_stability_cycles: u32,

    /// Behaviour when the watch handle limit is reached.
    pub watch_limit_policy: WatchLimitPolicy,

    /// Interval between scheduled full passes. `None` disables them.
    pub scan_period: Option<Duration>,

    /// Whether change-triggered re-indexing is enabled.
    pub watch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            log_json: false,
            locations: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            feature_tags: DEFAULT_FEATURE_TAGS.iter().map(|t| (*t).to_string()).collect(),
            debounce: Duration::from_secs(2),
            max_stability_cycles: 30,
            watch_limit_policy: WatchLimitPolicy::Warn,
            scan_period: None,
            watch: true,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.extensions.is_empty() {
            return Err(Error::config("extension allow-list cannot be empty"));
        }

        if let Some(bad) = self
            .extensions
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.') || e.contains('/'))
        {
            return Err(Error::config(format!(
                "invalid extension '{bad}', expected a bare suffix such as 'flac'"
            )));
        }

        if self.feature_tags.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::config("feature tags cannot be empty"));
        }

        if self.debounce.is_zero() {
            return Err(Error::config("debounce cannot be 0"));
        }

        if self.scan_period.is_some_and(|p| p < Duration::from_secs(1)) {
            return Err(Error::config("scan_period must be at least one second"));
        }

        Ok(())
    }

    /// Extensions normalized to lowercase, deduplicated, order preserved.
    #[must_use]
    pub fn normalized_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.extensions.len());
        for ext in &self.extensions {
            let ext = ext.trim().to_lowercase();
            if !ext.is_empty() && !out.contains(&ext) {
                out.push(ext);
            }
        }
        out
    }

    /// Get the path to the `SQLite` catalog file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("tunedex.db")
    }
}
