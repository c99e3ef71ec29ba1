//! `SQLite` implementation of the catalog seam.

use std::path::Path;

use super::albums::resolve_or_create_album;
use super::cleanup::delete_orphans;
use super::connection::Database;
use super::files::{delete_stale_files, upsert_file};
use super::models::{AlbumId, Fingerprint, OrphanCounts, Timestamp, TrackId, TrackStub};
use super::tracks::{find_track_by_fingerprint, insert_track};
use crate::catalog::Catalog;
use crate::Result;

/// Catalog backed by a [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Database,
}

impl SqliteCatalog {
    /// Wrap an initialized database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database, for read-only diagnostics.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

impl Catalog for SqliteCatalog {
    fn lookup_track_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<TrackId>> {
        self.db
            .with_conn(|conn| find_track_by_fingerprint(conn, fingerprint))
    }

    fn insert_filename(&self, path: &Path, track_id: TrackId, seen_at: Timestamp) -> Result<()> {
        self.db
            .with_conn(|conn| upsert_file(conn, path, track_id, seen_at))
    }

    fn resolve_or_create_album(
        &self,
        name: &str,
        directory: &Path,
        cover: Option<&str>,
    ) -> Result<AlbumId> {
        self.db
            .with_transaction(|conn| resolve_or_create_album(conn, name, directory, cover))
    }

    fn insert_track(&self, stub: &TrackStub) -> Result<TrackId> {
        self.db.with_transaction(|conn| insert_track(conn, stub))
    }

    fn delete_stale_files(&self, location: &Path, before: Timestamp) -> Result<usize> {
        self.db
            .with_conn(|conn| delete_stale_files(conn, location, before))
    }

    fn delete_orphaned_albums_artists_genres(&self) -> Result<OrphanCounts> {
        self.db.with_transaction(delete_orphans)
    }
}
