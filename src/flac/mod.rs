//! FLAC metadata extraction.
//!
//! A FLAC stream opens with the 4-byte `fLaC` marker, followed by a chain of
//! metadata blocks. Each block carries a 4-byte header (last-block flag,
//! 7-bit type code, 24-bit big-endian payload length); the Vorbis comment
//! block (type 4) holds the `KEY=value` tags we care about.
//!
//! The walk is streaming: headers are read directly from the file handle and
//! non-comment payloads are skipped with a relative seek, so only the comment
//! payload itself (at most 2^24 - 1 bytes by construction) is ever held in
//! memory. All length fields come from untrusted file bytes and are validated
//! before they are consumed; see [`comment`] for the payload-level bounds.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

mod comment;

pub use crate::metadata::Metadata;

/// Stream marker every FLAC file must open with.
pub const MAGIC: [u8; 4] = *b"fLaC";

/// Block type code for the Vorbis comment block.
const BLOCK_VORBIS_COMMENT: u8 = 4;

/// Upper bound on the metadata block chain. A hostile file can otherwise
/// declare an arbitrarily long run of non-terminal blocks.
pub const MAX_BLOCKS: usize = 128;

/// Upper bound on the comment field count.
pub const MAX_FIELDS: u32 = 4096;

/// Upper bound on a single declared length (vendor string or field).
pub const MAX_FIELD_LEN: u32 = 1024 * 1024;

/// Extraction failures. All variants are recoverable for the caller: a file
/// that fails here is skipped and logged, never a crashed run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The file does not open with the `fLaC` marker. Expected for any
    /// non-FLAC file; callers skip silently.
    #[error("not a FLAC stream")]
    NotFlac,

    /// The last-block flag was reached without a Vorbis comment block.
    #[error("no Vorbis comment block in metadata chain")]
    NoCommentBlock,

    /// The block chain exceeded [`MAX_BLOCKS`].
    #[error("metadata chain longer than {MAX_BLOCKS} blocks")]
    TooManyBlocks,

    /// A declared length or count in the comment payload is inconsistent
    /// with the bytes actually present, or exceeds the configured maxima.
    #[error("malformed Vorbis comment: {0}")]
    MalformedComment(&'static str),

    /// The comment decoded, but the tags fail validation (missing album or
    /// title, no artists).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(&'static str),

    /// Underlying read failure. Treated like any other parse failure by the
    /// synchronizer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded block header.
struct BlockHeader {
    is_last: bool,
    block_type: u8,
    length: u32,
}

fn parse_block_header(raw: [u8; 4]) -> BlockHeader {
    BlockHeader {
        is_last: raw[0] & 0x80 != 0,
        block_type: raw[0] & 0x7f,
        length: u32::from_be_bytes([0, raw[1], raw[2], raw[3]]),
    }
}

/// A file that ends mid-structure is corrupt, not an IO problem.
fn truncated(e: std::io::Error) -> ExtractError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ExtractError::MalformedComment("truncated metadata block")
    } else {
        ExtractError::Io(e)
    }
}

/// Extracts tag metadata from the FLAC file at `path`.
///
/// Walks the metadata block chain until the Vorbis comment block is found,
/// then decodes and validates it. The returned record carries the path it
/// was read from.
pub async fn extract(path: &Path) -> Result<Metadata, ExtractError> {
    let mut file = File::open(path).await?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ExtractError::NotFlac);
        }
        Err(e) => return Err(e.into()),
    }
    if magic != MAGIC {
        return Err(ExtractError::NotFlac);
    }

    let mut blocks = 0usize;
    loop {
        if blocks == MAX_BLOCKS {
            return Err(ExtractError::TooManyBlocks);
        }
        blocks += 1;

        let mut raw = [0u8; 4];
        file.read_exact(&mut raw).await.map_err(truncated)?;
        let header = parse_block_header(raw);

        if header.block_type == BLOCK_VORBIS_COMMENT {
            let mut payload = vec![0u8; header.length as usize];
            file.read_exact(&mut payload).await.map_err(truncated)?;
            let meta = comment::decode(&payload, path)?;
            debug!(path = %path.display(), blocks, "parsed FLAC metadata");
            return Ok(meta);
        }

        if header.is_last {
            return Err(ExtractError::NoCommentBlock);
        }

        file.seek(SeekFrom::Current(i64::from(header.length))).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FlacFixture, comment_payload};
    use tempfile::tempdir;

    #[tokio::test]
    async fn rejects_wrong_magic() {
        let dir = tempdir().unwrap();
        let path = FlacFixture::new()
            .magic(*b"OggS")
            .comment(&["ALBUM=a", "ARTIST=b", "TITLE=c"])
            .write_to(dir.path(), "not-flac.flac");

        assert!(matches!(extract(&path).await, Err(ExtractError::NotFlac)));
    }

    #[tokio::test]
    async fn rejects_file_shorter_than_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.flac");
        std::fs::write(&path, b"fL").unwrap();

        assert!(matches!(extract(&path).await, Err(ExtractError::NotFlac)));
    }

    #[tokio::test]
    async fn skips_leading_blocks_and_finds_comment() {
        let dir = tempdir().unwrap();
        // STREAMINFO-ish block and a padding block ahead of the comment.
        let path = FlacFixture::new()
            .block(0, vec![0u8; 34])
            .block(1, vec![0u8; 512])
            .comment(&["ALBUM=Sister", "ARTIST=Frost Children", "TITLE=Falling"])
            .write_to(dir.path(), "song.flac");

        let meta = extract(&path).await.unwrap();
        assert_eq!(meta.album, "Sister");
        assert_eq!(meta.artists.as_slice(), ["Frost Children"]);
        assert_eq!(meta.title, "Falling");
        assert_eq!(meta.path, path.to_string_lossy());
    }

    #[tokio::test]
    async fn errors_when_no_comment_block_exists() {
        let dir = tempdir().unwrap();
        let path = FlacFixture::new()
            .block(0, vec![0u8; 34])
            .block(1, vec![0u8; 16])
            .write_to(dir.path(), "untagged.flac");

        assert!(matches!(
            extract(&path).await,
            Err(ExtractError::NoCommentBlock)
        ));
    }

    #[tokio::test]
    async fn caps_the_block_chain() {
        let dir = tempdir().unwrap();
        let mut fixture = FlacFixture::new();
        for _ in 0..=MAX_BLOCKS {
            fixture = fixture.block(1, Vec::new());
        }
        let path = fixture.write_to(dir.path(), "endless.flac");

        assert!(matches!(
            extract(&path).await,
            Err(ExtractError::TooManyBlocks)
        ));
    }

    #[tokio::test]
    async fn truncated_comment_payload_is_malformed() {
        let dir = tempdir().unwrap();
        // Header declares 200 payload bytes; the file ends after 10.
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0x84, 0, 0, 200]);
        bytes.extend_from_slice(&[0u8; 10]);
        let path = dir.path().join("cut.flac");
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            extract(&path).await,
            Err(ExtractError::MalformedComment(_))
        ));
    }

    #[tokio::test]
    async fn truncated_block_header_is_malformed() {
        let dir = tempdir().unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0x01, 0, 0]);
        let path = dir.path().join("header-cut.flac");
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            extract(&path).await,
            Err(ExtractError::MalformedComment(_))
        ));
    }

    #[tokio::test]
    async fn comment_on_last_block_still_parses() {
        let dir = tempdir().unwrap();
        let path = FlacFixture::new()
            .comment(&["ALBUM=a", "ARTIST=b", "TITLE=c", "TRACKNUMBER=7"])
            .write_to(dir.path(), "only-comment.flac");

        let meta = extract(&path).await.unwrap();
        assert_eq!(meta.track_number, Some(7));
    }

    #[tokio::test]
    async fn declared_field_count_beyond_payload_is_malformed() {
        let dir = tempdir().unwrap();
        // Declares five fields but only carries three.
        let payload = comment_payload("vendor", &["ALBUM=a", "ARTIST=b", "TITLE=c"], Some(5));
        let path = FlacFixture::new()
            .block(BLOCK_VORBIS_COMMENT, payload)
            .write_to(dir.path(), "short-count.flac");

        assert!(matches!(
            extract(&path).await,
            Err(ExtractError::MalformedComment(_))
        ));
    }
}
