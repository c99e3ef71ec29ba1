//! Fallback extractor deriving metadata from the file name.

use crate::error::ExtractorError;
use crate::storage::TrackStub;

use super::extractor::Extractor;

/// Fills format, title and position from the path when nothing better is known.
///
/// `"/music/Album/03 - Song.flac"` yields format `flac`, position 3 and
/// name `Song`. Fields already set by earlier extractors are kept.
#[derive(Debug, Clone)]
pub struct FileInfoExtractor {
    capabilities: Vec<String>,
}

impl FileInfoExtractor {
    /// Serve the given extensions.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Extractor for FileInfoExtractor {
    fn name(&self) -> &str {
        "file-info"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError> {
        let stem = track
            .filename
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| ExtractorError::NoMetadata(track.filename.display().to_string()))?;

        if track.format.is_empty() {
            if let Some(ext) = track.extension() {
                track.format = ext;
            }
        }

        let (position, title) = split_track_number(&stem);
        if track.position == 0 {
            if let Some(position) = position {
                track.position = position;
            }
        }
        if track.name.is_empty() {
            track.name = title.to_string();
        }

        Ok(())
    }
}

/// Split a leading track number off a file stem.
fn split_track_number(stem: &str) -> (Option<u32>, &str) {
    let digits = stem.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 3 {
        return (None, stem.trim());
    }

    let rest = stem[digits..].trim_start_matches([' ', '-', '.', '_']);
    if rest.is_empty() {
        return (None, stem.trim());
    }

    (stem[..digits].parse().ok(), rest.trim())
}
