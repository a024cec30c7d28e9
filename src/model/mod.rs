//! Core data models for the music library.
//!
//! Defines the persisted entities: [`File`], [`Artist`], [`Album`], and
//! [`Song`], derived from SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `files` - Indexed file paths, unique by path
//! - `artists` - Artist records with unique names
//! - `albums` - Album records with unique titles
//! - `songs` - One song per file, referencing its file and album
//!
//! The `song_artists` and `album_artists` join tables have no model structs;
//! they are written and queried as (id, id) pairs.

use sqlx::FromRow;

/// An indexed audio file.
#[derive(Debug, Clone, FromRow)]
pub struct File {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Absolute file path (unique)
    pub path: String,
}

/// An artist in the music library.
#[derive(Debug, Clone, FromRow)]
pub struct Artist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Artist name (unique)
    pub name: String,
}

/// An album in the music library.
#[derive(Debug, Clone, FromRow)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Album title (unique)
    pub title: String,
}

/// A song in the music library.
#[derive(Debug, Clone, FromRow)]
pub struct Song {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Song title (not unique; the file reference is)
    pub title: String,
    /// Track number on the album, when tagged
    pub track_number: Option<i64>,
    /// Foreign key to files (unique - one song per file)
    pub file_id: i64,
    /// Foreign key to albums
    pub album_id: i64,
}
