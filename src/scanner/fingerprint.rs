//! Partial-content fingerprints.
//!
//! Hashing whole media files is too slow for large libraries, so only the
//! first and last 64 KiB are hashed. Tags usually live at one end of the
//! file and audio frames fill the rest, which keeps collisions rare.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use blake3::Hasher;

use crate::storage::Fingerprint;
use crate::Result;

/// Bytes hashed at each end of the file.
pub const EDGE_BYTES: u64 = 64 * 1024;

/// Compute the content fingerprint of a file.
///
/// Files shorter than two edges are hashed once in full. Larger files hash
/// the head and the tail separately and combine the two digests.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    if len < EDGE_BYTES * 2 {
        let mut hasher = Hasher::new();
        hasher.update_reader(&mut file)?;
        return Ok(Fingerprint::from_hex(hasher.finalize().to_hex().to_string()));
    }

    let head = hash_range(&mut file, 0)?;
    let tail = hash_range(&mut file, len - EDGE_BYTES)?;

    let mut combined = Hasher::new();
    combined.update(head.as_bytes());
    combined.update(tail.as_bytes());
    Ok(Fingerprint::from_hex(combined.finalize().to_hex().to_string()))
}

fn hash_range(file: &mut File, offset: u64) -> Result<blake3::Hash> {
    file.seek(SeekFrom::Start(offset))?;
    let mut hasher = Hasher::new();
    hasher.update_reader(file.take(EDGE_BYTES))?;
    Ok(hasher.finalize())
}
