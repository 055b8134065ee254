//! Track listing, segmentation and full-set replace

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::ids::{SourceId, TrackId};
use crate::model::source::build_forest;
use crate::model::track::sort_by_start;
use crate::model::{Track, TrackDraft};
use crate::store::LibraryStore;
use crate::{Error, Result};

pub struct TrackService<S> {
    store: S,
}

impl<S: LibraryStore> TrackService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn require_source(&self, id: SourceId) -> Result<()> {
        match self.store.get_source(id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("source {}", id))),
        }
    }

    /// Tracks of `source`, or of its whole subtree when `recursive`.
    ///
    /// Recursive listings walk the subtree parents first, siblings in list
    /// order; within one source tracks are ordered by effective start.
    pub async fn list_tracks(&self, source: SourceId, recursive: bool) -> Result<Vec<Track>> {
        self.require_source(source).await?;

        if !recursive {
            let mut tracks = self.store.tracks_by_sources(&[source]).await?;
            sort_by_start(&mut tracks);
            return Ok(tracks);
        }

        let entries = self.store.hierarchy_entries(source).await?;
        let order: Vec<SourceId> = build_forest(entries)?
            .iter()
            .flat_map(|tree| tree.preorder_ids())
            .collect();

        let mut by_source: HashMap<SourceId, Vec<Track>> = HashMap::new();
        for track in self.store.tracks_by_sources(&order).await? {
            by_source.entry(track.source_id).or_default().push(track);
        }

        let mut result = Vec::new();
        for id in &order {
            if let Some(mut tracks) = by_source.remove(id) {
                sort_by_start(&mut tracks);
                result.extend(tracks);
            }
        }

        debug!(source_id = %source, sources = order.len(), tracks = result.len(), "Listed subtree tracks");
        Ok(result)
    }

    /// Atomically make `drafts` the complete track list of `source`.
    ///
    /// Every draft is checked before anything is written: offsets against
    /// the extracted file's duration when known, ids against tracks owned by
    /// other sources. Tracks keep their raw offsets across replaces; the
    /// draft offsets become the effective ones.
    pub async fn replace_tracks(&self, source: SourceId, drafts: &[TrackDraft]) -> Result<Vec<Track>> {
        self.require_source(source).await?;
        let file_duration = self
            .store
            .get_source_file(source)
            .await?
            .and_then(|file| file.duration_ms);

        let mut ids = HashSet::with_capacity(drafts.len());
        for draft in drafts {
            draft.validate(file_duration)?;
            if !ids.insert(draft.id) {
                return Err(Error::Validation(format!("track {} listed twice", draft.id)));
            }
        }

        let draft_ids: Vec<TrackId> = drafts.iter().map(|d| d.id).collect();
        let stored = self.store.tracks_by_ids(&draft_ids).await?;
        if let Some(foreign) = stored.iter().find(|t| t.source_id != source) {
            return Err(Error::Validation(format!(
                "track {} belongs to source {}",
                foreign.id, foreign.source_id
            )));
        }

        let existing: HashMap<TrackId, &Track> = stored.iter().map(|t| (t.id, t)).collect();
        let tracks: Vec<Track> = drafts
            .iter()
            .map(|draft| draft.resolve(source, existing.get(&draft.id).copied()))
            .collect();

        self.store.replace_source_tracks(source, &tracks).await?;
        info!(source_id = %source, tracks = tracks.len(), "Replaced tracks");

        self.list_tracks(source, false).await
    }

    /// Store machine-detected tracks for a freshly analyzed source. A
    /// source that already has tracks keeps them and they are returned
    /// unchanged.
    pub async fn initialize_tracks(&self, source: SourceId, detected: &[TrackDraft]) -> Result<Vec<Track>> {
        let saved = self.list_tracks(source, false).await?;
        if !saved.is_empty() {
            debug!(source_id = %source, "Tracks already initialized");
            return Ok(saved);
        }

        let file_duration = self
            .store
            .get_source_file(source)
            .await?
            .and_then(|file| file.duration_ms);
        for draft in detected {
            draft.validate(file_duration)?;
        }

        let tracks: Vec<Track> = detected.iter().map(|draft| draft.resolve(source, None)).collect();
        self.store.replace_source_tracks(source, &tracks).await?;
        info!(source_id = %source, tracks = tracks.len(), "Initialized tracks");

        self.list_tracks(source, false).await
    }

    /// Free-text track search. A query equal to a known source URL lists
    /// that source's subtree; anything else matches word prefixes of
    /// artist and title.
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(source) = self.store.find_source_by_url(query).await? {
            return self.list_tracks(source.id, true).await;
        }

        let terms = search_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.store.search_tracks(&terms).await
    }
}

/// Lowercased words of `query`
fn search_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}
