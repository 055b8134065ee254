//! Storage collaborator seam
//!
//! Services hold a [`LibraryStore`] and never see SQL. Every method is a
//! plain request/response call; retry and timeout policy belong to the
//! implementation.

use async_trait::async_trait;

use crate::guess::GuessInput;
use crate::ids::{CompositionId, SourceId, TrackId, TrackRefId};
use crate::model::{
    Composition, CompositionSummary, HierarchyEntry, NewSource, Source, SourceFile, SourceListing,
    Thumbnail, Track,
};
use crate::Result;

#[async_trait]
pub trait LibraryStore: Send + Sync {
    // Sources

    /// Insert, or refresh the metadata of the source with the same URL
    async fn upsert_source(&self, source: &NewSource) -> Result<Source>;
    async fn get_source(&self, id: SourceId) -> Result<Option<Source>>;
    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>>;
    async fn list_sources(&self) -> Result<Vec<SourceListing>>;
    /// Cascades to the source's file, tracks and hierarchy links
    async fn delete_source(&self, id: SourceId) -> Result<bool>;

    async fn parent_of(&self, id: SourceId) -> Result<Option<SourceId>>;
    /// Replace `parent`'s ordered child list; children linked elsewhere move
    async fn replace_children(&self, parent: SourceId, children: &[SourceId]) -> Result<()>;
    /// `root` and all its descendants, one entry each. Empty if `root` is unknown.
    async fn hierarchy_entries(&self, root: SourceId) -> Result<Vec<HierarchyEntry>>;

    async fn get_source_file(&self, source: SourceId) -> Result<Option<SourceFile>>;
    async fn put_source_file(&self, source: SourceId, file: &SourceFile) -> Result<()>;
    async fn delete_source_file(&self, source: SourceId) -> Result<bool>;

    async fn insert_thumbnail(&self, deduplication_id: &str, file_path: &str, format: &str) -> Result<Thumbnail>;
    async fn thumbnails_for_sources(&self, sources: &[SourceId]) -> Result<Vec<Thumbnail>>;

    // Tracks

    /// Tracks directly owned by any of `sources`, grouped by source
    async fn tracks_by_sources(&self, sources: &[SourceId]) -> Result<Vec<Track>>;
    async fn tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>>;
    /// Atomically make `tracks` the complete track set of `source`
    async fn replace_source_tracks(&self, source: SourceId, tracks: &[Track]) -> Result<()>;
    /// Tracks where every term prefixes a word of artist or title
    async fn search_tracks(&self, terms: &[String]) -> Result<Vec<Track>>;
    async fn guess_inputs(&self, ids: &[TrackId]) -> Result<Vec<GuessInput>>;

    // Compositions

    async fn insert_composition(&self, composition: &Composition) -> Result<()>;
    /// Full replacement of metadata and references
    async fn update_composition(&self, composition: &Composition) -> Result<()>;
    /// References come back in order, dangling ones without a snapshot
    async fn get_composition(&self, id: CompositionId) -> Result<Option<Composition>>;
    async fn list_compositions(&self) -> Result<Vec<CompositionSummary>>;
    async fn delete_composition(&self, id: CompositionId) -> Result<bool>;
    /// One row per matching reference; the same composition may repeat
    async fn compositions_referencing(&self, tracks: &[TrackId]) -> Result<Vec<CompositionSummary>>;
    /// Owning composition of each known reference id
    async fn reference_owners(&self, refs: &[TrackRefId]) -> Result<Vec<(TrackRefId, CompositionId)>>;
}
