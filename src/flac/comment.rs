//! Vorbis comment payload decoding.
//!
//! Layout: a 4-byte little-endian vendor string length, the vendor string
//! itself (ignored), a 4-byte little-endian field count, then that many
//! fields, each a 4-byte little-endian length prefix followed by UTF-8 bytes
//! holding a `KEY=value` pair.
//!
//! Every length in the payload is attacker-controlled. [`Reader`] checks each
//! declared length against [`MAX_FIELD_LEN`] and against the bytes actually
//! remaining before consuming anything, and the field count is capped by
//! [`MAX_FIELDS`], so a hostile payload costs bounded work and can never read
//! out of bounds.

use std::path::Path;

use smallvec::SmallVec;

use super::{ExtractError, MAX_FIELD_LEN, MAX_FIELDS};
use crate::metadata::Metadata;

/// Bounds-checked cursor over the comment payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u32_le(&mut self) -> Result<u32, ExtractError> {
        if self.remaining() < 4 {
            return Err(ExtractError::MalformedComment(
                "length prefix past end of payload",
            ));
        }
        let raw = [
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ];
        self.pos += 4;
        Ok(u32::from_le_bytes(raw))
    }

    fn read_bytes(&mut self, len: u32) -> Result<&'a [u8], ExtractError> {
        if len > MAX_FIELD_LEN {
            return Err(ExtractError::MalformedComment("field length above maximum"));
        }
        let len = len as usize;
        if len > self.remaining() {
            return Err(ExtractError::MalformedComment(
                "field length past end of payload",
            ));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Decodes and validates the comment payload, stamping the originating path
/// onto the returned record.
pub(super) fn decode(payload: &[u8], path: &Path) -> Result<Metadata, ExtractError> {
    let mut reader = Reader::new(payload);

    let vendor_len = reader.read_u32_le()?;
    reader.read_bytes(vendor_len)?;

    let field_count = reader.read_u32_le()?;
    if field_count > MAX_FIELDS {
        return Err(ExtractError::MalformedComment("field count above maximum"));
    }

    let mut album = None;
    let mut artists: SmallVec<[String; 2]> = SmallVec::new();
    let mut album_artist = None;
    let mut title = None;
    let mut track_number = None;
    let mut release_group_id = None;
    let mut artist_id = None;
    let mut track_id = None;

    for _ in 0..field_count {
        let len = reader.read_u32_le()?;
        let raw = reader.read_bytes(len)?;
        // The original tagger wrote whatever bytes it had; decode lossily
        // rather than rejecting a whole file over one bad sequence.
        let field = String::from_utf8_lossy(raw);

        let Some((key, value)) = split_field(&field) else {
            continue;
        };

        match key.to_ascii_uppercase().as_str() {
            "ALBUM" => album = Some(value.to_string()),
            "ARTIST" => artists.push(value.to_string()),
            "ALBUM ARTIST" => album_artist = Some(value.to_string()),
            "TITLE" => title = Some(value.to_string()),
            "TRACKNUMBER" => {
                // Unparsable track numbers are dropped, not fatal.
                if let Ok(n) = value.parse::<u32>() {
                    track_number = Some(n);
                }
            }
            "MUSICBRAINZ_RELEASEGROUPID" => release_group_id = Some(value.to_string()),
            "MUSICBRAINZ_ARTISTID" => artist_id = Some(value.to_string()),
            "MUSICBRAINZ_TRACKID" => track_id = Some(value.to_string()),
            _ => {}
        }
    }

    // Tie-break for album ownership: first declared artist.
    let album_artist = album_artist.or_else(|| artists.first().cloned());

    let (Some(album), Some(title), Some(album_artist)) = (album, title, album_artist) else {
        return Err(ExtractError::InvalidMetadata(
            "missing album, title, or artist",
        ));
    };
    if artists.is_empty() {
        return Err(ExtractError::InvalidMetadata("no artist fields"));
    }
    let path = path.to_string_lossy();
    if path.is_empty() {
        return Err(ExtractError::InvalidMetadata("empty file path"));
    }

    Ok(Metadata {
        album,
        artists,
        album_artist,
        title,
        track_number,
        release_group_id,
        artist_id,
        track_id,
        path: path.into_owned(),
    })
}

/// Splits a field on its first `=`, trimming both halves. Fields without a
/// separator, or with an empty key or value, are skipped.
fn split_field(field: &str) -> Option<(&str, &str)> {
    let (key, value) = field.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}
