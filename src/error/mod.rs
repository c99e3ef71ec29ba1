//! Error types and Result aliases for Tunedex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Tunedex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tunedex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Metadata extractor error.
    #[error("extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Scan coordination error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Metadata extractor errors.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// The extractor could not read the media file.
    #[error("failed to read '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    /// The file was readable but carried no usable metadata.
    #[error("no metadata in '{0}'")]
    NoMetadata(String),

    /// A remote lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// The extractor panicked while enriching a track.
    #[error("extractor '{0}' panicked")]
    Panicked(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The platform refused another watch handle.
    #[error("watch limit reached while registering '{path}'")]
    WatchLimit { path: String },

    /// Watcher already running.
    #[error("change watcher already started")]
    AlreadyStarted,
}

/// Scan coordination errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A location was added after the first pass started.
    #[error("locations are frozen once scanning has started: '{0}'")]
    LocationsFrozen(String),

    /// The location does not exist or is not a directory.
    #[error("invalid location '{path}': {reason}")]
    InvalidLocation { path: String, reason: String },

    /// A background task failed to join.
    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests;
