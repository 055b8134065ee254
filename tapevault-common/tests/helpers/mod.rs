//! Shared fixtures for the integration tests

#![allow(dead_code)]

use anyhow::Result;
use sqlx::SqlitePool;
use tapevault_common::db::SqliteStore;
use tapevault_common::ids::SourceId;
use tapevault_common::model::{NewSource, Source, SourceFile, TrackDraft};
use tapevault_common::services::{SourceService, TrackService};
use tempfile::TempDir;

/// Fresh library database in a temporary directory. Keep the `TempDir`
/// alive for as long as the store is used.
pub async fn create_test_store() -> Result<(TempDir, SqliteStore)> {
    let dir = TempDir::new()?;
    let store = SqliteStore::open(&dir.path().join("tapevault.db")).await?;
    Ok((dir, store))
}

pub async fn import_source(store: &SqliteStore, url: &str, title: &str) -> Result<Source> {
    let service = SourceService::new(store.clone());
    Ok(service.import(NewSource::new(url, title, "uploader"), &[]).await?)
}

/// Source with an extracted file of `duration_ms`
pub async fn import_with_file(store: &SqliteStore, url: &str, title: &str, duration_ms: i64) -> Result<Source> {
    let source = import_source(store, url, title).await?;
    SourceService::new(store.clone())
        .attach_file(
            source.id,
            SourceFile {
                codec: "opus".to_string(),
                format: "webm".to_string(),
                media_path: format!("{}.webm", source.id),
                duration_ms: Some(duration_ms),
            },
        )
        .await?;
    Ok(source)
}

/// Store detected tracks of one minute each, back to back
pub async fn seed_tracks(store: &SqliteStore, source: SourceId, titles: &[&str]) -> Result<Vec<TrackDraft>> {
    let drafts: Vec<TrackDraft> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| TrackDraft::new("Artist", *title, i as i64 * 60_000, (i as i64 + 1) * 60_000))
        .collect();
    TrackService::new(store.clone()).initialize_tracks(source, &drafts).await?;
    Ok(drafts)
}

pub async fn get_table_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(tables)
}
