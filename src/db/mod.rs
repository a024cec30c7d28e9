//! Database module for file, artist, album, and song persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage. All
//! entity writes are INSERT OR IGNORE: the unique constraints in the schema
//! decide identity, and a write that loses the race is a no-op rather than
//! an error. Identifiers are discovered by re-reading rows by natural key
//! (path / name / title / file id) after the inserts, never assumed from the
//! insert itself - the row may predate the current run or belong to a
//! concurrently committed batch.
//!
//! Write functions take `&mut SqliteConnection` so they compose inside a
//! batch transaction; read helpers used outside reconciliation take the
//! pool.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::model::{Album, Artist, File, Song};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "minim.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, enables foreign-key enforcement, and runs
/// all pending migrations.
pub async fn init_db(db_url: &str) -> sqlx::Result<SqlitePool> {
    // WAL keeps readers unblocked while a batch transaction holds the
    // write lock; concurrent writers serialize via the busy timeout.
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// The set of file paths already recorded in the store.
///
/// Read once at the start of a sync run as an explicit snapshot; a file
/// indexed after the snapshot is simply picked up on the next run.
pub async fn indexed_paths(pool: &SqlitePool) -> sqlx::Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT path FROM files")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(path,)| path).collect())
}

/// Insert-or-ignore a set of file paths. Returns the number of rows
/// actually inserted.
pub async fn insert_files_ignore(
    conn: &mut SqliteConnection,
    paths: &[String],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    for path in paths {
        let result = sqlx::query("INSERT OR IGNORE INTO files (path) VALUES (?)")
            .bind(path)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Insert-or-ignore a set of artist names. Returns the number of rows
/// actually inserted.
pub async fn insert_artists_ignore(
    conn: &mut SqliteConnection,
    names: &[String],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    for name in names {
        let result = sqlx::query("INSERT OR IGNORE INTO artists (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Insert-or-ignore a set of album titles. Returns the number of rows
/// actually inserted.
pub async fn insert_albums_ignore(
    conn: &mut SqliteConnection,
    titles: &[String],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    for title in titles {
        let result = sqlx::query("INSERT OR IGNORE INTO albums (title) VALUES (?)")
            .bind(title)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Insert-or-ignore a song row. Returns 1 if the row was inserted, 0 if a
/// song for this file already existed.
pub async fn insert_song_ignore(
    conn: &mut SqliteConnection,
    title: &str,
    track_number: Option<i64>,
    file_id: i64,
    album_id: i64,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO songs (title, track_number, file_id, album_id) VALUES (?, ?, ?, ?)",
    )
    .bind(title)
    .bind(track_number)
    .bind(file_id)
    .bind(album_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Insert-or-ignore a (song, artist) join row.
pub async fn insert_song_artist_ignore(
    conn: &mut SqliteConnection,
    song_id: i64,
    artist_id: i64,
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO song_artists (song_id, artist_id) VALUES (?, ?)")
            .bind(song_id)
            .bind(artist_id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected())
}

/// Insert-or-ignore an (album, artist) join row.
pub async fn insert_album_artist_ignore(
    conn: &mut SqliteConnection,
    album_id: i64,
    artist_id: i64,
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO album_artists (album_id, artist_id) VALUES (?, ?)")
            .bind(album_id)
            .bind(artist_id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected())
}

/// Builds `?, ?, ...` for an IN clause with `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Look up file ids for a set of paths. Returns a path-to-id map.
pub async fn file_ids_by_path(
    conn: &mut SqliteConnection,
    paths: &[String],
) -> sqlx::Result<HashMap<String, i64>> {
    if paths.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT id, path FROM files WHERE path IN ({})",
        placeholders(paths.len())
    );
    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for path in paths {
        query = query.bind(path);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(id, path)| (path, id)).collect())
}

/// Look up artist ids for a set of names. Returns a name-to-id map.
pub async fn artist_ids_by_name(
    conn: &mut SqliteConnection,
    names: &[String],
) -> sqlx::Result<HashMap<String, i64>> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT id, name FROM artists WHERE name IN ({})",
        placeholders(names.len())
    );
    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for name in names {
        query = query.bind(name);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(id, name)| (name, id)).collect())
}

/// Look up album ids for a set of titles. Returns a title-to-id map.
pub async fn album_ids_by_title(
    conn: &mut SqliteConnection,
    titles: &[String],
) -> sqlx::Result<HashMap<String, i64>> {
    if titles.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT id, title FROM albums WHERE title IN ({})",
        placeholders(titles.len())
    );
    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for title in titles {
        query = query.bind(title);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(id, title)| (title, id)).collect())
}

/// Look up song ids for a set of file ids. Returns a file-id-to-song-id map.
///
/// The file reference is the song's natural key (one song per file), so this
/// is the lookup the join-row inserts resolve against.
pub async fn song_ids_by_file(
    conn: &mut SqliteConnection,
    file_ids: &[i64],
) -> sqlx::Result<HashMap<i64, i64>> {
    if file_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT id, file_id FROM songs WHERE file_id IN ({})",
        placeholders(file_ids.len())
    );
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in file_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(id, file_id)| (file_id, id)).collect())
}

/// Get all files from the database.
pub async fn all_files(pool: &SqlitePool) -> sqlx::Result<Vec<File>> {
    sqlx::query_as::<_, File>("SELECT id, path FROM files ORDER BY path")
        .fetch_all(pool)
        .await
}

/// Get all artists from the database.
pub async fn all_artists(pool: &SqlitePool) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>("SELECT id, name FROM artists ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Get all albums from the database.
pub async fn all_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>("SELECT id, title FROM albums ORDER BY title")
        .fetch_all(pool)
        .await
}

/// Get all songs from the database.
pub async fn all_songs(pool: &SqlitePool) -> sqlx::Result<Vec<Song>> {
    sqlx::query_as::<_, Song>(
        "SELECT id, title, track_number, file_id, album_id FROM songs ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

/// Get all (song_id, artist_id) join rows.
pub async fn all_song_artists(pool: &SqlitePool) -> sqlx::Result<Vec<(i64, i64)>> {
    sqlx::query_as("SELECT song_id, artist_id FROM song_artists")
        .fetch_all(pool)
        .await
}

/// Get all (album_id, artist_id) join rows.
pub async fn all_album_artists(pool: &SqlitePool) -> sqlx::Result<Vec<(i64, i64)>> {
    sqlx::query_as("SELECT album_id, artist_id FROM album_artists")
        .fetch_all(pool)
        .await
}

/// A song with its album, file path, and artist names joined in.
///
/// Used for display where human-readable names are needed rather than
/// foreign key IDs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SongWithContext {
    /// Database ID
    pub id: i64,
    /// Song title
    pub title: String,
    /// Track number on album
    pub track_number: Option<i64>,
    /// Album title
    pub album: String,
    /// File path
    pub path: String,
    /// Artist names, comma-joined
    pub artists: String,
}

/// Get all songs with album title, file path, and artist names.
///
/// This is the primary query for listing the library.
pub async fn songs_with_context(pool: &SqlitePool) -> sqlx::Result<Vec<SongWithContext>> {
    sqlx::query_as::<_, SongWithContext>(
        r#"
        SELECT
            s.id, s.title, s.track_number,
            al.title AS album,
            f.path,
            COALESCE(GROUP_CONCAT(a.name, ', '), '') AS artists
        FROM songs s
        JOIN albums al ON al.id = s.album_id
        JOIN files f ON f.id = s.file_id
        LEFT JOIN song_artists sa ON sa.song_id = s.id
        LEFT JOIN artists a ON a.id = sa.artist_id
        GROUP BY s.id
        ORDER BY al.title, s.track_number
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Row counts for every table, for the stats command and sync verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub files: i64,
    pub artists: i64,
    pub albums: i64,
    pub songs: i64,
    pub song_artists: i64,
    pub album_artists: i64,
}

/// Count the rows in every table.
pub async fn stats(pool: &SqlitePool) -> sqlx::Result<StoreStats> {
    async fn count(pool: &SqlitePool, sql: &str) -> sqlx::Result<i64> {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
        Ok(n)
    }

    Ok(StoreStats {
        files: count(pool, "SELECT COUNT(*) FROM files").await?,
        artists: count(pool, "SELECT COUNT(*) FROM artists").await?,
        albums: count(pool, "SELECT COUNT(*) FROM albums").await?,
        songs: count(pool, "SELECT COUNT(*) FROM songs").await?,
        song_artists: count(pool, "SELECT COUNT(*) FROM song_artists").await?,
        album_artists: count(pool, "SELECT COUNT(*) FROM album_artists").await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}", db_path.display());

        let pool = init_db(&db_url).await.expect("Failed to init db");
        assert!(db_path.exists());

        let songs = all_songs(&pool).await.expect("Failed to query songs");
        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_insert_or_ignore_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let names = vec!["Frost Children".to_string(), "Hatchie".to_string()];
        let first = insert_artists_ignore(&mut conn, &names).await.unwrap();
        assert_eq!(first, 2);

        let second = insert_artists_ignore(&mut conn, &names).await.unwrap();
        assert_eq!(second, 0);

        let artists = all_artists(&pool).await.unwrap();
        assert_eq!(artists.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_maps_cover_preexisting_rows() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let names = vec!["A".to_string()];
        insert_artists_ignore(&mut conn, &names).await.unwrap();
        let before = artist_ids_by_name(&mut conn, &names).await.unwrap();

        // The no-op insert must still resolve to the same id.
        insert_artists_ignore(&mut conn, &names).await.unwrap();
        let after = artist_ids_by_name(&mut conn, &names).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(before.len(), 1);
    }

    #[tokio::test]
    async fn test_song_unique_per_file() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let paths = vec!["/music/a.flac".to_string()];
        let titles = vec!["Album".to_string()];
        insert_files_ignore(&mut conn, &paths).await.unwrap();
        insert_albums_ignore(&mut conn, &titles).await.unwrap();
        let file_id = file_ids_by_path(&mut conn, &paths).await.unwrap()["/music/a.flac"];
        let album_id = album_ids_by_title(&mut conn, &titles).await.unwrap()["Album"];

        let first = insert_song_ignore(&mut conn, "Song", Some(1), file_id, album_id)
            .await
            .unwrap();
        assert_eq!(first, 1);

        // Same file again: absorbed by UNIQUE(file_id).
        let second = insert_song_ignore(&mut conn, "Renamed Song", Some(2), file_id, album_id)
            .await
            .unwrap();
        assert_eq!(second, 0);

        let songs = all_songs(&pool).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Song");
        assert_eq!(songs[0].track_number, Some(1));
    }

    #[tokio::test]
    async fn test_join_rows_are_absorbed() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let paths = vec!["/music/a.flac".to_string()];
        let names = vec!["A".to_string()];
        let titles = vec!["Album".to_string()];
        insert_files_ignore(&mut conn, &paths).await.unwrap();
        insert_artists_ignore(&mut conn, &names).await.unwrap();
        insert_albums_ignore(&mut conn, &titles).await.unwrap();

        let file_id = file_ids_by_path(&mut conn, &paths).await.unwrap()["/music/a.flac"];
        let artist_id = artist_ids_by_name(&mut conn, &names).await.unwrap()["A"];
        let album_id = album_ids_by_title(&mut conn, &titles).await.unwrap()["Album"];
        insert_song_ignore(&mut conn, "Song", None, file_id, album_id)
            .await
            .unwrap();
        let song_id = song_ids_by_file(&mut conn, &[file_id]).await.unwrap()[&file_id];

        assert_eq!(
            insert_song_artist_ignore(&mut conn, song_id, artist_id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            insert_song_artist_ignore(&mut conn, song_id, artist_id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            insert_album_artist_ignore(&mut conn, album_id, artist_id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            insert_album_artist_ignore(&mut conn, album_id, artist_id)
                .await
                .unwrap(),
            0
        );

        assert_eq!(all_song_artists(&pool).await.unwrap().len(), 1);
        assert_eq!(all_album_artists(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_songs_with_context_joins_names() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let paths = vec!["/music/a.flac".to_string()];
        let names = vec!["A".to_string(), "B".to_string()];
        let titles = vec!["Album".to_string()];
        insert_files_ignore(&mut conn, &paths).await.unwrap();
        insert_artists_ignore(&mut conn, &names).await.unwrap();
        insert_albums_ignore(&mut conn, &titles).await.unwrap();

        let file_id = file_ids_by_path(&mut conn, &paths).await.unwrap()["/music/a.flac"];
        let artist_ids = artist_ids_by_name(&mut conn, &names).await.unwrap();
        let album_id = album_ids_by_title(&mut conn, &titles).await.unwrap()["Album"];
        insert_song_ignore(&mut conn, "Song", Some(4), file_id, album_id)
            .await
            .unwrap();
        let song_id = song_ids_by_file(&mut conn, &[file_id]).await.unwrap()[&file_id];
        insert_song_artist_ignore(&mut conn, song_id, artist_ids["A"])
            .await
            .unwrap();
        insert_song_artist_ignore(&mut conn, song_id, artist_ids["B"])
            .await
            .unwrap();
        drop(conn);

        let songs = songs_with_context(&pool).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, song_id);
        assert_eq!(songs[0].album, "Album");
        assert_eq!(songs[0].path, "/music/a.flac");
        assert_eq!(songs[0].track_number, Some(4));
        assert!(songs[0].artists.contains('A') && songs[0].artists.contains('B'));
    }

    #[tokio::test]
    async fn test_lookup_on_empty_key_set_is_empty() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(file_ids_by_path(&mut conn, &[]).await.unwrap().is_empty());
        assert!(song_ids_by_file(&mut conn, &[]).await.unwrap().is_empty());
    }
}
