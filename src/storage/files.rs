//! Filename mappings: which paths currently hold which track.

use std::path::{Path, MAIN_SEPARATOR};

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Timestamp, TrackId};
use crate::error::StorageError;
use crate::Result;

/// A path-to-track mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub track_id: TrackId,
    pub last_seen: Timestamp,
}

/// Map a path to a track and stamp it as seen.
///
/// A path that previously held other content is re-pointed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_file(
    conn: &Connection,
    path: &Path,
    track_id: TrackId,
    seen_at: Timestamp,
) -> Result<()> {
    conn.execute(
        "INSERT INTO files (path, track_id, last_seen) VALUES (?, ?, ?) \
         ON CONFLICT(path) DO UPDATE SET track_id = excluded.track_id, \
         last_seen = excluded.last_seen",
        params![path.to_string_lossy().into_owned(), track_id, seen_at],
    )
    .map_err(StorageError::from)?;
    Ok(())
}

/// Get the mapping for a path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_file(conn: &Connection, path: &Path) -> Result<Option<FileRecord>> {
    conn.query_row(
        "SELECT path, track_id, last_seen FROM files WHERE path = ?",
        [path.to_string_lossy().into_owned()],
        |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                track_id: row.get(1)?,
                last_seen: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| StorageError::from(e).into())
}

/// List the mappings of a track, ordered by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn files_for_track(conn: &Connection, track_id: TrackId) -> Result<Vec<FileRecord>> {
    let mut stmt = conn
        .prepare("SELECT path, track_id, last_seen FROM files WHERE track_id = ? ORDER BY path")
        .map_err(StorageError::from)?;

    let records = stmt
        .query_map([track_id], |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                track_id: row.get(1)?,
                last_seen: row.get(2)?,
            })
        })
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StorageError::from)?;

    Ok(records)
}

/// Delete mappings under `location` last seen strictly before `before`.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_stale_files(conn: &Connection, location: &Path, before: Timestamp) -> Result<usize> {
    let root = location.to_string_lossy().into_owned();
    let prefix = if root.ends_with(MAIN_SEPARATOR) {
        root.clone()
    } else {
        format!("{root}{MAIN_SEPARATOR}")
    };

    let removed = conn
        .execute(
            "DELETE FROM files WHERE last_seen < ?1 \
             AND (path = ?2 OR substr(path, 1, length(?3)) = ?3)",
            params![before, root, prefix],
        )
        .map_err(StorageError::from)?;

    Ok(removed)
}

/// Count filename mappings.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_files(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::from(e).into())
}
