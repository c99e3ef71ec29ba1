//! Catalog schema definitions and migrations.
//!
//! Provides versioned schema migrations for safe database upgrades.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Tables the catalog cannot work without.
const REQUIRED_TABLES: &[&str] = &[
    "tracks",
    "files",
    "albums",
    "artists",
    "genres",
    "track_artists",
    "track_genres",
];

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::info!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking catalog migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Migration(format!("failed to get version: {e}")).into())
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, chrono::Utc::now().timestamp()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: tracks, filename mappings and the album/artist/genre graph.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: Initial catalog schema");

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            directory TEXT NOT NULL,
            cover TEXT,
            UNIQUE(name, directory)
        );

        CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            picture TEXT
        );

        CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            picture TEXT
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            format TEXT NOT NULL,
            duration INTEGER NOT NULL DEFAULT 0,
            sample_rate INTEGER NOT NULL DEFAULT 0,
            format_parameters TEXT NOT NULL DEFAULT '',
            position INTEGER NOT NULL DEFAULT 0,
            album_id INTEGER REFERENCES albums(id),
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);

        -- One row per path; several paths may share a track
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            last_seen INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_track ON files(track_id);
        CREATE INDEX IF NOT EXISTS idx_files_last_seen ON files(last_seen);

        CREATE TABLE IF NOT EXISTS track_artists (
            track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
            PRIMARY KEY (track_id, artist_id)
        );

        CREATE TABLE IF NOT EXISTS track_genres (
            track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
            PRIMARY KEY (track_id, genre_id)
        );
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_migrate_empty_database() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)
        })
        .unwrap();
    }

    #[test]
    fn test_migrate_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            migrate(conn)?;
            assert_eq!(get_current_version(conn)?, SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_verify_schema_detects_missing_tables() {
        let db = Database::open_in_memory().unwrap();
        let result = db.with_conn(verify_schema);
        assert!(result.is_err());
    }

    #[test]
    fn test_fingerprint_unique() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            let insert = "INSERT INTO tracks (fingerprint, name, format, created_at) \
                          VALUES ('fp', '', 'flac', 0)";
            conn.execute(insert, []).map_err(StorageError::from)?;
            assert!(conn.execute(insert, []).is_err());
            Ok(())
        })
        .unwrap();
    }
}
