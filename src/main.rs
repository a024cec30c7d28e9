//! Minim - a FLAC library indexer.
//!
//! Walks a directory tree of audio files, extracts tag metadata from the
//! FLAC container, and reconciles it into a normalized SQLite store with
//! deduplicated artist/album/song entities.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod flac;
pub mod metadata;
pub mod model;
pub mod scanner;
pub mod sync;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("minim=info".parse().unwrap()))
        .init();

    cli::run_command(&args)
}
