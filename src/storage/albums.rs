//! Album, artist and genre rows.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{AlbumId, ArtistInfo, GenreInfo};
use crate::error::StorageError;
use crate::Result;

/// Find the album with this name in this directory, or create it.
///
/// Albums are keyed on name plus containing directory so that two
/// different releases called "Greatest Hits" stay distinct.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn resolve_or_create_album(
    conn: &Connection,
    name: &str,
    directory: &Path,
    cover: Option<&str>,
) -> Result<AlbumId> {
    let directory = directory.to_string_lossy().into_owned();

    let existing: Option<AlbumId> = conn
        .query_row(
            "SELECT id FROM albums WHERE name = ? AND directory = ?",
            params![name, directory],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::from)?;

    if let Some(id) = existing {
        if let Some(cover) = cover {
            conn.execute(
                "UPDATE albums SET cover = ? WHERE id = ? AND cover IS NULL",
                params![cover, id],
            )
            .map_err(StorageError::from)?;
        }
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO albums (name, directory, cover) VALUES (?, ?, ?)",
        params![name, directory, cover],
    )
    .map_err(StorageError::from)?;

    let id = conn.last_insert_rowid();
    tracing::debug!(album_id = id, name, directory = %directory, "Created album");
    Ok(id)
}

/// Find an artist by name, or create it.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn resolve_or_create_artist(conn: &Connection, artist: &ArtistInfo) -> Result<i64> {
    resolve_or_create_named(conn, "artists", &artist.name, artist.picture.as_deref())
}

/// Find a genre by name, or create it.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn resolve_or_create_genre(conn: &Connection, genre: &GenreInfo) -> Result<i64> {
    resolve_or_create_named(conn, "genres", &genre.name, genre.picture.as_deref())
}

fn resolve_or_create_named(
    conn: &Connection,
    table: &'static str,
    name: &str,
    picture: Option<&str>,
) -> Result<i64> {
    conn.execute(
        &format!("INSERT OR IGNORE INTO {table} (name, picture) VALUES (?, ?)"),
        params![name, picture],
    )
    .map_err(StorageError::from)?;

    conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?"),
        [name],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::from(e).into())
}

/// Count albums.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_albums(conn: &Connection) -> Result<i64> {
    count_rows(conn, "albums")
}

/// Count artists.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_artists(conn: &Connection) -> Result<i64> {
    count_rows(conn, "artists")
}

/// Count genres.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_genres(conn: &Connection) -> Result<i64> {
    count_rows(conn, "genres")
}

fn count_rows(conn: &Connection, table: &'static str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .map_err(|e| StorageError::from(e).into())
}
