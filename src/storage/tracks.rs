//! Track rows and their artist/genre links.

use rusqlite::{params, Connection, OptionalExtension};

use super::albums::{resolve_or_create_artist, resolve_or_create_genre};
use super::models::{now_micros, AlbumId, Fingerprint, TrackId, TrackStub};
use crate::error::StorageError;
use crate::Result;

/// Committed track as read back from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub id: TrackId,
    pub fingerprint: Fingerprint,
    pub name: String,
    pub format: String,
    pub duration: u32,
    pub sample_rate: u64,
    pub format_parameters: String,
    pub position: u32,
    pub album_id: Option<AlbumId>,
}

/// Find a track id by content fingerprint.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_track_by_fingerprint(
    conn: &Connection,
    fingerprint: &Fingerprint,
) -> Result<Option<TrackId>> {
    conn.query_row(
        "SELECT id FROM tracks WHERE fingerprint = ?",
        [fingerprint.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| StorageError::from(e).into())
}

/// Insert a track and link its artists and genres.
///
/// Must run inside a transaction so a failed link leaves no partial track.
///
/// # Errors
///
/// Returns an error if any insert fails, including a duplicate fingerprint.
pub fn insert_track(conn: &Connection, stub: &TrackStub) -> Result<TrackId> {
    conn.execute(
        "INSERT INTO tracks (fingerprint, name, format, duration, sample_rate, \
         format_parameters, position, album_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            stub.fingerprint.as_str(),
            stub.name,
            stub.format,
            stub.duration,
            i64::try_from(stub.sample_rate).unwrap_or(i64::MAX),
            stub.format_parameters,
            stub.position,
            stub.album.id,
            now_micros(),
        ],
    )
    .map_err(StorageError::from)?;
    let track_id = conn.last_insert_rowid();

    for artist in &stub.artists {
        let artist_id = resolve_or_create_artist(conn, artist)?;
        conn.execute(
            "INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?, ?)",
            params![track_id, artist_id],
        )
        .map_err(StorageError::from)?;
    }

    for genre in &stub.genres {
        let genre_id = resolve_or_create_genre(conn, genre)?;
        conn.execute(
            "INSERT OR IGNORE INTO track_genres (track_id, genre_id) VALUES (?, ?)",
            params![track_id, genre_id],
        )
        .map_err(StorageError::from)?;
    }

    Ok(track_id)
}

/// Get a track by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_track(conn: &Connection, id: TrackId) -> Result<Option<TrackRecord>> {
    conn.query_row(
        "SELECT id, fingerprint, name, format, duration, sample_rate, format_parameters, \
         position, album_id FROM tracks WHERE id = ?",
        [id],
        |row| {
            let sample_rate: i64 = row.get(5)?;
            Ok(TrackRecord {
                id: row.get(0)?,
                fingerprint: Fingerprint::from_hex(row.get::<_, String>(1)?),
                name: row.get(2)?,
                format: row.get(3)?,
                duration: row.get(4)?,
                sample_rate: u64::try_from(sample_rate).unwrap_or(0),
                format_parameters: row.get(6)?,
                position: row.get(7)?,
                album_id: row.get(8)?,
            })
        },
    )
    .optional()
    .map_err(|e| StorageError::from(e).into())
}

/// Names of the artists linked to a track, sorted.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn artists_for_track(conn: &Connection, id: TrackId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT a.name FROM artists a JOIN track_artists ta ON ta.artist_id = a.id \
             WHERE ta.track_id = ? ORDER BY a.name",
        )
        .map_err(StorageError::from)?;

    let names = stmt
        .query_map([id], |row| row.get(0))
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(StorageError::from)?;

    Ok(names)
}

/// Count committed tracks.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_tracks(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
        .map_err(|e| StorageError::from(e).into())
}
