//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed
//! arguments and returns an `anyhow::Result<()>`.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::error::Error;
use crate::metadata::Format;
use crate::{config, db, sync};

/// Minim CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Sync a library directory into the store
    Sync {
        /// Directory to sync (falls back to the configured library root)
        path: Option<PathBuf>,
        /// Database path (falls back to config, then minim.db)
        #[arg(long, env = "MINIM_DB")]
        db: Option<PathBuf>,
    },
    /// List indexed songs with artists and album
    List {
        /// Database path (falls back to config, then minim.db)
        #[arg(long, env = "MINIM_DB")]
        db: Option<PathBuf>,
    },
    /// Print row counts for every table
    Stats {
        /// Database path (falls back to config, then minim.db)
        #[arg(long, env = "MINIM_DB")]
        db: Option<PathBuf>,
    },
    /// Parse a single file and print its metadata without touching the store
    Probe {
        /// Path to the audio file
        path: PathBuf,
    },
    /// Show or update the persisted configuration
    Config {
        /// Set the default library root
        #[arg(long)]
        root: Option<PathBuf>,
        /// Set the default database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = config::load();

    match &cli.command {
        Commands::Sync { path, db } => cmd_sync(&rt, &config, path.as_ref(), db.as_ref()),
        Commands::List { db } => cmd_list(&rt, &config, db.as_ref()),
        Commands::Stats { db } => cmd_stats(&rt, &config, db.as_ref()),
        Commands::Probe { path } => cmd_probe(&rt, path),
        Commands::Config { root, db } => cmd_config(config, root.as_ref(), db.as_ref()),
    }
}

/// Resolve the database URL from a CLI flag, then config, then the default.
fn resolve_db_url(config: &config::Config, db: Option<&PathBuf>) -> String {
    db::db_url(db.or(config.database.path.as_ref()).map(|p| p.as_path()))
}

/// Sync a directory into the store
fn cmd_sync(
    rt: &Runtime,
    config: &config::Config,
    path: Option<&PathBuf>,
    db: Option<&PathBuf>,
) -> anyhow::Result<()> {
    let Some(root) = path.or(config.library.root.as_ref()) else {
        bail!("no library directory given and none configured; run `minim sync <path>`");
    };
    let db_url = resolve_db_url(config, db);

    rt.block_on(async {
        let pool = db::init_db(&db_url)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;
        println!("Syncing directory: {}", root.display());

        tokio::select! {
            result = sync::sync(&pool, root) => {
                let summary = result?;
                if summary.is_empty() {
                    println!("Already up to date.");
                } else {
                    println!(
                        "Indexed {} files: {} songs, {} artists, {} albums.",
                        summary.files, summary.songs, summary.artists, summary.albums
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                // In-flight batch transactions roll back on drop; whatever
                // committed before the interrupt stays indexed.
                println!("\nSync interrupted. Committed batches are kept; rerun to finish.");
            }
        }
        anyhow::Ok(())
    })
}

/// List all indexed songs
fn cmd_list(rt: &Runtime, config: &config::Config, db: Option<&PathBuf>) -> anyhow::Result<()> {
    let db_url = resolve_db_url(config, db);
    rt.block_on(async {
        let pool = db::init_db(&db_url).await?;
        let songs = db::songs_with_context(&pool).await?;
        for song in &songs {
            match song.track_number {
                Some(n) => println!("{} - {:02} {} ({})", song.album, n, song.title, song.artists),
                None => println!("{} - {} ({})", song.album, song.title, song.artists),
            }
        }
        println!("{} songs.", songs.len());
        anyhow::Ok(())
    })
}

/// Print table row counts
fn cmd_stats(rt: &Runtime, config: &config::Config, db: Option<&PathBuf>) -> anyhow::Result<()> {
    let db_url = resolve_db_url(config, db);
    rt.block_on(async {
        let pool = db::init_db(&db_url).await?;
        let stats = db::stats(&pool).await?;
        println!("files:         {}", stats.files);
        println!("artists:       {}", stats.artists);
        println!("albums:        {}", stats.albums);
        println!("songs:         {}", stats.songs);
        println!("song artists:  {}", stats.song_artists);
        println!("album artists: {}", stats.album_artists);
        anyhow::Ok(())
    })
}

/// Parse one file and print what the extractor sees
fn cmd_probe(rt: &Runtime, path: &PathBuf) -> anyhow::Result<()> {
    let Some(format) = Format::from_path(path) else {
        bail!("unsupported file extension: {}", path.display());
    };

    let meta = rt
        .block_on(format.extract(path))
        .map_err(|e| Error::extract(path.clone(), e))?;

    println!("title:        {}", meta.title);
    println!("album:        {}", meta.album);
    println!("artists:      {}", meta.artists.join(", "));
    println!("album artist: {}", meta.album_artist);
    if let Some(n) = meta.track_number {
        println!("track:        {n}");
    }
    if let Some(id) = &meta.release_group_id {
        println!("release group id: {id}");
    }
    if let Some(id) = &meta.artist_id {
        println!("artist id:        {id}");
    }
    if let Some(id) = &meta.track_id {
        println!("track id:         {id}");
    }
    Ok(())
}

/// Show the current config, or persist new defaults
fn cmd_config(
    mut config: config::Config,
    root: Option<&PathBuf>,
    db: Option<&PathBuf>,
) -> anyhow::Result<()> {
    if root.is_none() && db.is_none() {
        match config.library.root {
            Some(ref p) => println!("library root: {}", p.display()),
            None => println!("library root: (unset)"),
        }
        match config.database.path {
            Some(ref p) => println!("database:     {}", p.display()),
            None => println!("database:     (unset, uses {})", db::DEFAULT_DB_NAME),
        }
        return Ok(());
    }

    if let Some(root) = root {
        config.library.root = Some(root.clone());
    }
    if let Some(db) = db {
        config.database.path = Some(db.clone());
    }
    config::save(&config)?;
    println!("Configuration saved.");
    Ok(())
}
