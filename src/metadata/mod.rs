//! Parsed file metadata and format dispatch.
//!
//! [`Metadata`] is the intermediate record the extractor produces and the
//! synchronizer consumes; it is never persisted as-is. [`Format`] maps file
//! extensions to parser capabilities via a lookup table, so adding a
//! container format means adding a table entry and an extractor, not
//! touching the synchronizer.

use std::path::Path;

use smallvec::SmallVec;

use crate::flac;

/// A validated metadata record for one audio file.
///
/// Invariants (enforced by the extractor, relied on by the synchronizer):
/// `album`, `title`, `album_artist`, and `path` are non-empty; `artists`
/// holds at least one non-empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub album: String,
    /// Every ARTIST tag occurrence, in declaration order.
    pub artists: SmallVec<[String; 2]>,
    /// Explicit ALBUM ARTIST tag, or the first declared artist.
    pub album_artist: String,
    pub title: String,
    pub track_number: Option<u32>,
    /// Opaque MusicBrainz cross-reference ids, passed through unvalidated.
    pub release_group_id: Option<String>,
    pub artist_id: Option<String>,
    pub track_id: Option<String>,
    /// Absolute path the record was read from.
    pub path: String,
}

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Flac,
}

/// Extension to format table. Case-insensitive on lookup.
const FORMATS: &[(&str, Format)] = &[("flac", Format::Flac)];

impl Format {
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, format)| *format)
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    /// Runs the format's extractor against the file.
    pub async fn extract(self, path: &Path) -> Result<Metadata, flac::ExtractError> {
        match self {
            Format::Flac => flac::extract(path).await,
        }
    }
}
