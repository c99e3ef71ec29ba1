//! Orphan removal after reconciliation.

use rusqlite::Connection;

use super::models::OrphanCounts;
use crate::error::StorageError;
use crate::Result;

/// Delete tracks without any filename mapping, then albums, artists and
/// genres no longer referenced by a track.
///
/// Must run inside a transaction.
///
/// # Errors
///
/// Returns an error if any delete fails.
pub fn delete_orphans(conn: &Connection) -> Result<OrphanCounts> {
    let tracks = conn
        .execute(
            "DELETE FROM tracks WHERE NOT EXISTS \
             (SELECT 1 FROM files f WHERE f.track_id = tracks.id)",
            [],
        )
        .map_err(StorageError::from)?;

    let albums = conn
        .execute(
            "DELETE FROM albums WHERE NOT EXISTS \
             (SELECT 1 FROM tracks t WHERE t.album_id = albums.id)",
            [],
        )
        .map_err(StorageError::from)?;

    let artists = conn
        .execute(
            "DELETE FROM artists WHERE NOT EXISTS \
             (SELECT 1 FROM track_artists ta WHERE ta.artist_id = artists.id)",
            [],
        )
        .map_err(StorageError::from)?;

    let genres = conn
        .execute(
            "DELETE FROM genres WHERE NOT EXISTS \
             (SELECT 1 FROM track_genres tg WHERE tg.genre_id = genres.id)",
            [],
        )
        .map_err(StorageError::from)?;

    Ok(OrphanCounts {
        tracks,
        albums,
        artists,
        genres,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{ArtistInfo, Fingerprint, GenreInfo, TrackStub};
    use crate::storage::{
        count_albums, count_artists, count_genres, count_tracks, insert_track, migrate,
        resolve_or_create_album, upsert_file, Database,
    };
    use std::path::Path;

    fn stub(fp: &str, artist: &str, genre: &str, album_id: i64) -> TrackStub {
        let mut stub = TrackStub::new(Fingerprint::from_hex(fp), format!("/music/{fp}.flac"));
        stub.album.id = Some(album_id);
        stub.add_artist(ArtistInfo::named(artist));
        stub.add_genre(GenreInfo::named(genre));
        stub
    }

    #[test]
    fn test_delete_orphans_cascades() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(migrate).unwrap();

        db.with_transaction(|conn| {
            let album = resolve_or_create_album(conn, "A", Path::new("/music"), None)?;
            let kept = insert_track(conn, &stub("kept", "Shared", "Jazz", album))?;
            insert_track(conn, &stub("gone", "Solo", "Noise", album))?;
            upsert_file(conn, Path::new("/music/kept.flac"), kept, 1)?;

            let counts = delete_orphans(conn)?;
            assert_eq!(counts.tracks, 1);
            assert_eq!(counts.albums, 0);
            assert_eq!(counts.artists, 1);
            assert_eq!(counts.genres, 1);

            assert_eq!(count_tracks(conn)?, 1);
            assert_eq!(count_albums(conn)?, 1);
            assert_eq!(count_artists(conn)?, 1);
            assert_eq!(count_genres(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_orphans_empties_catalog() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(migrate).unwrap();

        db.with_transaction(|conn| {
            let album = resolve_or_create_album(conn, "A", Path::new("/music"), None)?;
            insert_track(conn, &stub("x", "Solo", "Noise", album))?;

            let counts = delete_orphans(conn)?;
            assert_eq!(counts.total(), 4);
            assert_eq!(count_albums(conn)?, 0);
            Ok(())
        })
        .unwrap();
    }
}
