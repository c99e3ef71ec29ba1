//! Data models shared by the ingestion pipeline and the catalog.
//!
//! This module defines:
//! - Content fingerprints
//! - The mutable `TrackStub` that extractors enrich
//! - Album, artist and genre descriptors
//! - Reconciliation counters

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Catalog track identifier.
pub type TrackId = i64;

/// Catalog album identifier.
pub type AlbumId = i64;

/// Catalog timestamps are microseconds since the Unix epoch.
pub type Timestamp = i64;

/// Get the current catalog timestamp.
#[must_use]
pub fn now_micros() -> Timestamp {
    chrono::Utc::now().timestamp_micros()
}

/// Content-derived identity of a media file, independent of its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Album descriptor carried by a track stub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    /// Catalog id once resolved.
    pub id: Option<AlbumId>,
    /// Album title.
    pub name: String,
    /// Cover art location, if any.
    pub cover: Option<String>,
}

/// Artist descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistInfo {
    /// Full name or pseudonym.
    pub name: String,
    /// Picture location, if any.
    pub picture: Option<String>,
}

impl ArtistInfo {
    /// Artist with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            picture: None,
        }
    }
}

/// Genre descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreInfo {
    /// Genre label.
    pub name: String,
    /// Picture location, if any.
    pub picture: Option<String>,
}

impl GenreInfo {
    /// Genre with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            picture: None,
        }
    }
}

/// Working record for one distinct piece of content during ingestion.
///
/// Created when an unknown fingerprint is observed, mutated in place by
/// each extractor of the metadata pipeline, and dropped after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStub {
    /// Content fingerprint.
    pub fingerprint: Fingerprint,

    /// Absolute path of the file that introduced this content.
    pub filename: PathBuf,

    /// Audio format label (e.g., "flac").
    pub format: String,

    /// Duration in seconds.
    pub duration: u32,

    /// Sample rate in Hz, 0 when unknown.
    pub sample_rate: u64,

    /// Format specific parameters, opaque to the pipeline.
    pub format_parameters: String,

    /// Album the track belongs to.
    pub album: AlbumInfo,

    /// Performing artists, without duplicates.
    pub artists: Vec<ArtistInfo>,

    /// Genres, without duplicates.
    pub genres: Vec<GenreInfo>,

    /// Position in the album, 0 when unknown.
    pub position: u32,

    /// Track title, may be empty.
    pub name: String,
}

impl TrackStub {
    /// Create an empty stub for a newly seen fingerprint.
    pub fn new(fingerprint: Fingerprint, filename: impl Into<PathBuf>) -> Self {
        Self {
            fingerprint,
            filename: filename.into(),
            format: String::new(),
            duration: 0,
            sample_rate: 0,
            format_parameters: String::new(),
            album: AlbumInfo::default(),
            artists: Vec::new(),
            genres: Vec::new(),
            position: 0,
            name: String::new(),
        }
    }

    /// Lowercase extension of the originating file.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.filename)
    }

    /// Directory containing the originating file.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.filename.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Add an artist unless one with the same name is already present.
    pub fn add_artist(&mut self, artist: ArtistInfo) {
        if !self.artists.iter().any(|a| a.name == artist.name) {
            self.artists.push(artist);
        }
    }

    /// Add a genre unless one with the same name is already present.
    pub fn add_genre(&mut self, genre: GenreInfo) {
        if !self.genres.iter().any(|g| g.name == genre.name) {
            self.genres.push(genre);
        }
    }
}

/// Lowercase extension of a path.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Rows removed by orphan cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanCounts {
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
    pub genres: usize,
}

impl OrphanCounts {
    /// Total rows removed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.tracks + self.albums + self.artists + self.genres
    }
}
