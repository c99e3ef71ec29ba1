//! `SQLite` catalog storage.
//!
//! This module provides persistent storage for:
//! - Tracks keyed by content fingerprint
//! - Filename mappings with last-seen stamps
//! - Albums, artists and genres

mod albums;
mod catalog;
mod cleanup;
mod connection;
mod files;
mod models;
mod schema;
mod tracks;

pub use albums::{
    count_albums, count_artists, count_genres, resolve_or_create_album,
    resolve_or_create_artist, resolve_or_create_genre,
};
pub use catalog::SqliteCatalog;
pub use cleanup::delete_orphans;
pub use connection::Database;
pub use files::{count_files, delete_stale_files, files_for_track, get_file, upsert_file, FileRecord};
pub use models::{
    extension_of, now_micros, AlbumId, AlbumInfo, ArtistInfo, Fingerprint, GenreInfo,
    OrphanCounts, Timestamp, TrackId, TrackStub,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use tracks::{
    artists_for_track, count_tracks, find_track_by_fingerprint, get_track, insert_track,
    TrackRecord,
};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Catalog initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
