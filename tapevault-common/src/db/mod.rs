//! SQLite-backed library storage

pub mod compositions;
pub mod init;
pub mod sessions;
pub mod sources;
pub mod tracks;

pub use init::init_database;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::guess::GuessInput;
use crate::ids::{parse_column, CompositionId, SourceId, TrackId, TrackRefId};
use crate::model::{
    Composition, CompositionSummary, HierarchyEntry, NewSource, Source, SourceFile, SourceListing,
    Thumbnail, Track,
};
use crate::store::LibraryStore;
use crate::Result;

/// Encode ids as a JSON array, consumed in SQL through `json_each(?)`
pub(crate) fn id_list<T: Serialize>(ids: &[T]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

pub(crate) fn optional_id<T: FromStr<Err = uuid::Error>>(value: Option<String>) -> Result<Option<T>> {
    value.as_deref().map(parse_column).transpose()
}

/// [`LibraryStore`] over a shared connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file and bring its schema up to date
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LibraryStore for SqliteStore {
    async fn upsert_source(&self, source: &NewSource) -> Result<Source> {
        sources::upsert_source(&self.pool, source).await
    }

    async fn get_source(&self, id: SourceId) -> Result<Option<Source>> {
        sources::get_source(&self.pool, id).await
    }

    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        sources::find_source_by_url(&self.pool, url).await
    }

    async fn list_sources(&self) -> Result<Vec<SourceListing>> {
        sources::list_sources(&self.pool).await
    }

    async fn delete_source(&self, id: SourceId) -> Result<bool> {
        sources::delete_source(&self.pool, id).await
    }

    async fn parent_of(&self, id: SourceId) -> Result<Option<SourceId>> {
        sources::parent_of(&self.pool, id).await
    }

    async fn replace_children(&self, parent: SourceId, children: &[SourceId]) -> Result<()> {
        sources::replace_children(&self.pool, parent, children).await
    }

    async fn hierarchy_entries(&self, root: SourceId) -> Result<Vec<HierarchyEntry>> {
        sources::hierarchy_entries(&self.pool, root).await
    }

    async fn get_source_file(&self, source: SourceId) -> Result<Option<SourceFile>> {
        sources::get_source_file(&self.pool, source).await
    }

    async fn put_source_file(&self, source: SourceId, file: &SourceFile) -> Result<()> {
        sources::put_source_file(&self.pool, source, file).await
    }

    async fn delete_source_file(&self, source: SourceId) -> Result<bool> {
        sources::delete_source_file(&self.pool, source).await
    }

    async fn insert_thumbnail(&self, deduplication_id: &str, file_path: &str, format: &str) -> Result<Thumbnail> {
        sources::insert_thumbnail(&self.pool, deduplication_id, file_path, format).await
    }

    async fn thumbnails_for_sources(&self, ids: &[SourceId]) -> Result<Vec<Thumbnail>> {
        sources::thumbnails_for_sources(&self.pool, ids).await
    }

    async fn tracks_by_sources(&self, ids: &[SourceId]) -> Result<Vec<Track>> {
        tracks::tracks_by_sources(&self.pool, ids).await
    }

    async fn tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>> {
        tracks::tracks_by_ids(&self.pool, ids).await
    }

    async fn replace_source_tracks(&self, source: SourceId, list: &[Track]) -> Result<()> {
        tracks::replace_source_tracks(&self.pool, source, list).await
    }

    async fn search_tracks(&self, terms: &[String]) -> Result<Vec<Track>> {
        tracks::search_tracks(&self.pool, terms).await
    }

    async fn guess_inputs(&self, ids: &[TrackId]) -> Result<Vec<GuessInput>> {
        tracks::guess_inputs(&self.pool, ids).await
    }

    async fn insert_composition(&self, composition: &Composition) -> Result<()> {
        compositions::insert_composition(&self.pool, composition).await
    }

    async fn update_composition(&self, composition: &Composition) -> Result<()> {
        compositions::update_composition(&self.pool, composition).await
    }

    async fn get_composition(&self, id: CompositionId) -> Result<Option<Composition>> {
        compositions::get_composition(&self.pool, id).await
    }

    async fn list_compositions(&self) -> Result<Vec<CompositionSummary>> {
        compositions::list_compositions(&self.pool).await
    }

    async fn delete_composition(&self, id: CompositionId) -> Result<bool> {
        compositions::delete_composition(&self.pool, id).await
    }

    async fn compositions_referencing(&self, ids: &[TrackId]) -> Result<Vec<CompositionSummary>> {
        compositions::compositions_referencing(&self.pool, ids).await
    }

    async fn reference_owners(&self, refs: &[TrackRefId]) -> Result<Vec<(TrackRefId, CompositionId)>> {
        compositions::reference_owners(&self.pool, refs).await
    }
}
