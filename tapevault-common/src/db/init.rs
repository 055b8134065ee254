//! Database initialization
//!
//! Opens (creating when missing) the library database and brings the schema
//! up to date. Every statement is idempotent, so this runs on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Cascading deletes of source files and tracks rely on foreign keys
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_thumbnails_table(pool).await?;
    create_sources_table(pool).await?;
    create_source_hierarchy_table(pool).await?;
    create_source_files_table(pool).await?;
    create_tracks_table(pool).await?;
    create_compositions_table(pool).await?;
    create_composition_tracks_table(pool).await?;
    create_scrobble_sessions_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    debug!("Schema at version {}", SCHEMA_VERSION);
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_thumbnails_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS thumbnails (
            guid TEXT PRIMARY KEY,
            deduplication_id TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            format TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            guid TEXT PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL DEFAULT '',
            uploader TEXT NOT NULL DEFAULT '',
            album_artist TEXT NOT NULL DEFAULT '',
            album_title TEXT NOT NULL DEFAULT '',
            album_index INTEGER NOT NULL DEFAULT 0,
            track_artist TEXT NOT NULL DEFAULT '',
            track_title TEXT NOT NULL DEFAULT '',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            release_date TEXT,
            thumbnail_id TEXT REFERENCES thumbnails(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `child_id` is the key: a source has at most one parent
async fn create_source_hierarchy_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_hierarchy (
            child_id TEXT PRIMARY KEY REFERENCES sources(guid) ON DELETE CASCADE,
            parent_id TEXT NOT NULL REFERENCES sources(guid) ON DELETE CASCADE,
            list_index INTEGER NOT NULL,
            UNIQUE (parent_id, list_index),
            CHECK (child_id <> parent_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_source_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_files (
            source_id TEXT PRIMARY KEY REFERENCES sources(guid) ON DELETE CASCADE,
            codec TEXT NOT NULL,
            format TEXT NOT NULL,
            media_path TEXT NOT NULL,
            duration_ms INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Effective offset columns are NULL until the user overrides the raw value
async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            guid TEXT PRIMARY KEY,
            source_id TEXT NOT NULL REFERENCES sources(guid) ON DELETE CASCADE,
            artist TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            raw_start_offset_ms INTEGER NOT NULL,
            start_offset_ms INTEGER,
            raw_end_offset_ms INTEGER NOT NULL,
            end_offset_ms INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_source ON tracks(source_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_compositions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS compositions (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('tape', 'playlist', 'album')),
            artist TEXT NOT NULL DEFAULT '',
            released_at TEXT,
            thumbnail_id TEXT REFERENCES thumbnails(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `track_id` deliberately has no foreign key: references outlive tracks
async fn create_composition_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS composition_tracks (
            guid TEXT PRIMARY KEY,
            composition_id TEXT NOT NULL REFERENCES compositions(guid) ON DELETE CASCADE,
            track_id TEXT NOT NULL,
            list_index INTEGER NOT NULL,
            UNIQUE (composition_id, list_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_composition_tracks_track ON composition_tracks(track_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_scrobble_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scrobble_sessions (
            username TEXT PRIMARY KEY,
            session_key TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
