//! Test utilities and fixtures for minim tests.
//!
//! Provides a temporary-database helper and [`FlacFixture`], a builder that
//! assembles byte-exact synthetic FLAC files (magic, block chain, Vorbis
//! comment payloads) so parser and sync tests can cover malformed inputs at
//! every truncation point without shipping binary fixtures.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::flac;

/// Creates a temporary database for testing.
///
/// The database lives in a temporary directory that is cleaned up when the
/// returned `TempDir` is dropped; keep it alive for the duration of the
/// test. Migrations are run automatically.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Encode a Vorbis comment payload from `KEY=value` strings.
///
/// `declared_count` overrides the field count written to the payload, for
/// constructing payloads that lie about how many fields follow.
pub fn comment_payload(vendor: &str, fields: &[&str], declared_count: Option<u32>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    buf.extend_from_slice(vendor.as_bytes());
    let count = declared_count.unwrap_or(fields.len() as u32);
    buf.extend_from_slice(&count.to_le_bytes());
    for field in fields {
        buf.extend_from_slice(&(field.len() as u32).to_le_bytes());
        buf.extend_from_slice(field.as_bytes());
    }
    buf
}

/// Builder for byte-exact synthetic FLAC files.
///
/// Blocks are emitted in order; the last block added gets the last-block
/// flag. A fixture with no blocks is just the magic marker.
pub struct FlacFixture {
    magic: [u8; 4],
    blocks: Vec<(u8, Vec<u8>)>,
}

impl FlacFixture {
    pub fn new() -> Self {
        Self {
            magic: flac::MAGIC,
            blocks: Vec::new(),
        }
    }

    /// Override the stream marker (for not-actually-FLAC files).
    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Append a metadata block with the given type code and payload.
    pub fn block(mut self, block_type: u8, payload: Vec<u8>) -> Self {
        self.blocks.push((block_type, payload));
        self
    }

    /// Append a Vorbis comment block carrying the given `KEY=value` fields.
    pub fn comment(self, fields: &[&str]) -> Self {
        self.block(4, comment_payload("minim test fixture", fields, None))
    }

    /// Serialize to the on-disk byte layout.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = self.magic.to_vec();
        let last = self.blocks.len().saturating_sub(1);
        for (i, (block_type, payload)) in self.blocks.iter().enumerate() {
            let mut first = block_type & 0x7f;
            if i == last {
                first |= 0x80;
            }
            buf.push(first);
            let len = payload.len() as u32;
            buf.extend_from_slice(&len.to_be_bytes()[1..]);
            buf.extend_from_slice(payload);
        }
        buf
    }

    /// Write the fixture into `dir` under `name` and return its path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.bytes()).expect("Failed to write fixture");
        path
    }
}

impl Default for FlacFixture {
    fn default() -> Self {
        Self::new()
    }
}
