//! The catalog seam.
//!
//! The ingestion pipeline only talks to persistent storage through the
//! [`Catalog`] trait. [`crate::storage::SqliteCatalog`] is the bundled
//! implementation; tests and embedders may supply their own.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{AlbumId, Fingerprint, OrphanCounts, Timestamp, TrackId, TrackStub};
use crate::Result;

/// Operations the ingestion pipeline needs from the catalog.
pub trait Catalog: Send {
    /// Find the track committed for this content, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn lookup_track_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<TrackId>>;

    /// Map `path` to `track_id` and stamp it as seen at `seen_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_filename(&self, path: &Path, track_id: TrackId, seen_at: Timestamp) -> Result<()>;

    /// Find the album called `name` in `directory`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn resolve_or_create_album(
        &self,
        name: &str,
        directory: &Path,
        cover: Option<&str>,
    ) -> Result<AlbumId>;

    /// Insert a track with its artists and genres, linked to `stub.album.id` if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is left behind.
    fn insert_track(&self, stub: &TrackStub) -> Result<TrackId>;

    /// Remove mappings under `location` last seen strictly before `before`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_stale_files(&self, location: &Path, before: Timestamp) -> Result<usize>;

    /// Remove tracks without filenames and unreferenced albums, artists, genres.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_orphaned_albums_artists_genres(&self) -> Result<OrphanCounts>;
}

/// Catalog handle behind the coordinator's commit lock.
///
/// Holding the guard spans one dedup-check/commit unit.
pub type SharedCatalog = Arc<Mutex<Box<dyn Catalog>>>;

/// Wrap a catalog for use by the coordinator.
pub fn shared(catalog: impl Catalog + 'static) -> SharedCatalog {
    Arc::new(Mutex::new(Box::new(catalog)))
}
