//! Library synchronization: directory walk to normalized rows.
//!
//! `sync` turns a flat stream of parsed file records into the relational
//! graph (files, artists, albums, songs, join rows) without duplicate
//! entities or partial-failure corruption:
//!
//! 1. Snapshot the already-indexed path set once.
//! 2. Walk the root, dropping paths in the snapshot.
//! 3. Parse candidates with bounded concurrency, dropping failures.
//! 4. Group records into fixed-size batches; reconcile each batch inside
//!    one transaction, with bounded batch concurrency.
//!
//! Reconciliation is insert-or-ignore against natural keys followed by a
//! mandatory re-read of ids, so re-runs and concurrently committed batches
//! converge on the same rows. One bad file or one failed batch never aborts
//! the run; only infrastructure failures (unreadable root, pool init) do.

use std::collections::HashSet;
use std::path::Path;

use futures::{StreamExt, future};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::Error;
use crate::flac::ExtractError;
use crate::metadata::{Format, Metadata};
use crate::scanner;

/// Worker budget for the parse pool.
pub const PARSE_CONCURRENCY: usize = 10;

/// Records per reconciliation batch.
pub const BATCH_SIZE: usize = 64;

/// Worker budget for the batch pool.
pub const BATCH_CONCURRENCY: usize = 4;

/// Rows actually inserted by a sync run. Failed batches contribute nothing;
/// their files stay unindexed and are retried on the next run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub files: u64,
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub song_links: u64,
    pub album_links: u64,
}

impl SyncSummary {
    fn absorb(&mut self, other: SyncSummary) {
        self.files += other.files;
        self.artists += other.artists;
        self.albums += other.albums;
        self.songs += other.songs;
        self.song_links += other.song_links;
        self.album_links += other.album_links;
    }

    pub fn is_empty(&self) -> bool {
        *self == SyncSummary::default()
    }
}

/// Batch reconciliation failures. These fail the batch, roll back its
/// transaction, and are logged at the run level.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record's file row could not be re-read after insert. Would produce
    /// an orphan song row; hard batch failure instead.
    #[error("no file row for {0:?} after insert")]
    UnresolvedFile(String),

    #[error("no album row for {0:?} after insert")]
    UnresolvedAlbum(String),

    #[error("no artist row for {0:?} after insert")]
    UnresolvedArtist(String),

    #[error("no song row for file id {0} after insert")]
    UnresolvedSong(i64),
}

/// Synchronize the library rooted at `root` into the store.
///
/// Fails only on infrastructure errors: a root that is missing or not a
/// directory, or a store that cannot be read at all. Per-file and per-batch
/// failures are logged skips.
pub async fn sync(pool: &SqlitePool, root: &Path) -> Result<SyncSummary, Error> {
    let root = std::path::absolute(root)?;
    if !tokio::fs::metadata(&root).await?.is_dir() {
        return Err(Error::NotADirectory(root));
    }

    let indexed = db::indexed_paths(pool).await?;
    info!(
        root = %root.display(),
        indexed = indexed.len(),
        "starting library sync"
    );

    let records = scanner::scan(root)
        .filter(move |path| {
            let seen = indexed.contains(&*path.to_string_lossy());
            future::ready(!seen)
        })
        .filter_map(|path| future::ready(Format::from_path(&path).map(|format| (path, format))))
        .map(|(path, format)| async move {
            match format.extract(&path).await {
                Ok(meta) => Some(meta),
                Err(e @ ExtractError::NotFlac) => {
                    debug!(path = %path.display(), "skipping: {e}");
                    None
                }
                Err(
                    e @ (ExtractError::NoCommentBlock
                    | ExtractError::TooManyBlocks
                    | ExtractError::MalformedComment(_)
                    | ExtractError::InvalidMetadata(_)),
                ) => {
                    warn!(path = %path.display(), "skipping corrupt file: {e}");
                    None
                }
                Err(ExtractError::Io(e)) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            }
        })
        .buffer_unordered(PARSE_CONCURRENCY)
        .filter_map(future::ready);

    let batches = records.chunks(BATCH_SIZE).map(|batch| async move {
        let records = batch.len();
        match reconcile_batch(pool, &batch).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(records, error = %e, "batch failed; its files will be retried next run");
                None
            }
        }
    });
    let mut batches = std::pin::pin!(batches.buffer_unordered(BATCH_CONCURRENCY));

    let mut summary = SyncSummary::default();
    while let Some(result) = batches.next().await {
        if let Some(batch_summary) = result {
            summary.absorb(batch_summary);
        }
    }

    info!(
        files = summary.files,
        artists = summary.artists,
        albums = summary.albums,
        songs = summary.songs,
        "library sync finished"
    );
    Ok(summary)
}

/// Reconcile one batch of records inside a single transaction.
///
/// Entity inserts come first, then the mandatory re-read of ids by natural
/// key (the row may predate this run or belong to another batch), then the
/// dependent song and join-row inserts. Any failure rolls the whole batch
/// back: the transaction aborts on drop, so a cancelled or failed batch
/// never commits half its writes.
async fn reconcile_batch(pool: &SqlitePool, batch: &[Metadata]) -> Result<SyncSummary, SyncError> {
    let mut tx = pool.begin().await?;

    let paths = unique(batch.iter().map(|r| r.path.clone()));
    let artist_names = unique(batch.iter().flat_map(|r| {
        r.artists
            .iter()
            .cloned()
            .chain(std::iter::once(r.album_artist.clone()))
    }));
    let album_titles = unique(batch.iter().map(|r| r.album.clone()));

    let mut summary = SyncSummary::default();
    summary.files = db::insert_files_ignore(&mut tx, &paths).await?;
    summary.artists = db::insert_artists_ignore(&mut tx, &artist_names).await?;
    summary.albums = db::insert_albums_ignore(&mut tx, &album_titles).await?;

    let file_ids = db::file_ids_by_path(&mut tx, &paths).await?;
    let artist_ids = db::artist_ids_by_name(&mut tx, &artist_names).await?;
    let album_ids = db::album_ids_by_title(&mut tx, &album_titles).await?;

    for record in batch {
        let file_id = *file_ids
            .get(&record.path)
            .ok_or_else(|| SyncError::UnresolvedFile(record.path.clone()))?;
        let album_id = *album_ids
            .get(&record.album)
            .ok_or_else(|| SyncError::UnresolvedAlbum(record.album.clone()))?;
        summary.songs += db::insert_song_ignore(
            &mut tx,
            &record.title,
            record.track_number.map(i64::from),
            file_id,
            album_id,
        )
        .await?;
    }

    let batch_file_ids: Vec<i64> = file_ids.values().copied().collect();
    let song_ids = db::song_ids_by_file(&mut tx, &batch_file_ids).await?;

    for record in batch {
        let file_id = file_ids[&record.path];
        let album_id = album_ids[&record.album];
        let song_id = *song_ids
            .get(&file_id)
            .ok_or(SyncError::UnresolvedSong(file_id))?;

        for name in &record.artists {
            let artist_id = *artist_ids
                .get(name)
                .ok_or_else(|| SyncError::UnresolvedArtist(name.clone()))?;
            summary.song_links += db::insert_song_artist_ignore(&mut tx, song_id, artist_id).await?;
        }

        let album_artist_id = *artist_ids
            .get(&record.album_artist)
            .ok_or_else(|| SyncError::UnresolvedArtist(record.album_artist.clone()))?;
        summary.album_links +=
            db::insert_album_artist_ignore(&mut tx, album_id, album_artist_id).await?;
    }

    tx.commit().await?;
    debug!(
        records = batch.len(),
        songs = summary.songs,
        "batch committed"
    );
    Ok(summary)
}

/// First-occurrence deduplication, preserving order.
fn unique<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
