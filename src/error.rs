//! Application-wide error types.
//!
//! Library modules carry their own closed error enums via `thiserror`
//! ([`crate::flac::ExtractError`], [`crate::sync::SyncError`]); this module
//! aggregates them for call sites that span subsystems, while CLI/main uses
//! `anyhow` for convenient propagation.

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata extraction error, with the file it came from
    #[error("Extraction error for {path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: crate::flac::ExtractError,
    },

    /// Library synchronization error
    #[error("Sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    /// Sync root is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an extraction error.
    pub fn extract(path: impl Into<PathBuf>, source: crate::flac::ExtractError) -> Self {
        Self::Extract {
            path: path.into(),
            source,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
