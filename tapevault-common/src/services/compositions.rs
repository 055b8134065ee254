//! Tape, playlist and album operations

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::guess::guess_metadata;
use crate::ids::{CompositionId, TrackId, TrackRefId};
use crate::model::composition::resolve_references;
use crate::model::{
    Composition, CompositionDraft, CompositionSummary, ReferenceChanges, RelatedCompositions,
    TrackRefDraft,
};
use crate::store::LibraryStore;
use crate::{Error, Result};

pub struct CompositionService<S> {
    store: S,
}

impl<S: LibraryStore> CompositionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every track id in `ids` must resolve
    async fn require_tracks(&self, ids: &[TrackId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let found: HashSet<TrackId> = self
            .store
            .tracks_by_ids(ids)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        match ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(Error::Validation(format!("track {} does not exist", missing))),
            None => Ok(()),
        }
    }

    /// Newly introduced reference ids must not belong to any composition
    async fn require_unused_references(&self, refs: &[TrackRefId]) -> Result<()> {
        if refs.is_empty() {
            return Ok(());
        }
        match self.store.reference_owners(refs).await?.first() {
            Some((reference, owner)) => Err(Error::Validation(format!(
                "track reference {} already belongs to composition {}",
                reference, owner
            ))),
            None => Ok(()),
        }
    }

    async fn build(
        &self,
        id: CompositionId,
        created_at: DateTime<Utc>,
        draft: &CompositionDraft,
    ) -> Result<Composition> {
        let track_ids = draft.track_ids();
        let tracks = self.store.tracks_by_ids(&track_ids).await?;
        Ok(Composition {
            id,
            name: draft.name.trim().to_string(),
            kind: draft.kind,
            artist: draft.artist.trim().to_string(),
            released_at: draft.released_at,
            thumbnail_id: draft.thumbnail_id,
            created_at,
            tracks: resolve_references(&draft.tracks, &tracks),
        })
    }

    /// Create a composition. Every referenced track must exist.
    pub async fn create(&self, draft: &CompositionDraft) -> Result<Composition> {
        draft.validate()?;
        self.require_tracks(&draft.track_ids()).await?;
        let refs: Vec<TrackRefId> = draft.tracks.iter().map(|r| r.id).collect();
        self.require_unused_references(&refs).await?;

        let composition = self.build(CompositionId::new(), Utc::now(), draft).await?;
        self.store.insert_composition(&composition).await?;

        info!(
            composition_id = %composition.id,
            kind = %composition.kind,
            tracks = composition.tracks.len(),
            "Created composition"
        );
        self.get(composition.id).await
    }

    /// Full replacement of metadata and references
    pub async fn update(&self, id: CompositionId, draft: &CompositionDraft) -> Result<Composition> {
        Ok(self.update_with_changes(id, draft).await?.0)
    }

    /// Like [`update`](Self::update), also reporting how the reference
    /// sequence changed.
    ///
    /// A retained reference keeps its track and may stay dangling; a newly
    /// introduced one must point at an existing track.
    pub async fn update_with_changes(
        &self,
        id: CompositionId,
        draft: &CompositionDraft,
    ) -> Result<(Composition, ReferenceChanges)> {
        draft.validate()?;
        let stored = self.get(id).await?;

        let retained: HashMap<TrackRefId, TrackId> =
            stored.tracks.iter().map(|r| (r.id, r.track_id)).collect();

        let mut introduced: Vec<&TrackRefDraft> = Vec::new();
        for reference in &draft.tracks {
            match retained.get(&reference.id) {
                Some(track_id) if *track_id != reference.track_id => {
                    return Err(Error::Validation(format!(
                        "track reference {} cannot be pointed at another track",
                        reference.id
                    )));
                }
                Some(_) => {}
                None => introduced.push(reference),
            }
        }

        let introduced_tracks: Vec<TrackId> = introduced.iter().map(|r| r.track_id).collect();
        self.require_tracks(&introduced_tracks).await?;
        let introduced_refs: Vec<TrackRefId> = introduced.iter().map(|r| r.id).collect();
        self.require_unused_references(&introduced_refs).await?;

        let composition = self.build(id, stored.created_at, draft).await?;
        self.store.update_composition(&composition).await?;

        let before: Vec<TrackRefId> = stored.tracks.iter().map(|r| r.id).collect();
        let after: Vec<TrackRefId> = composition.tracks.iter().map(|r| r.id).collect();
        let changes = ReferenceChanges::diff(&before, &after);

        info!(
            composition_id = %id,
            retained = changes.retained.len(),
            added = changes.added.len(),
            removed = changes.removed.len(),
            reordered = changes.reordered,
            "Updated composition"
        );
        Ok((self.get(id).await?, changes))
    }

    /// Referenced tracks are unaffected
    pub async fn delete(&self, id: CompositionId) -> Result<()> {
        if !self.store.delete_composition(id).await? {
            return Err(Error::NotFound(format!("composition {}", id)));
        }
        info!(composition_id = %id, "Deleted composition");
        Ok(())
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<CompositionSummary>> {
        self.store.list_compositions().await
    }

    /// References to deleted tracks come back dangling rather than failing
    /// the read
    pub async fn get(&self, id: CompositionId) -> Result<Composition> {
        let composition = self
            .store
            .get_composition(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("composition {}", id)))?;

        let dangling = composition.dangling_references().count();
        if dangling > 0 {
            debug!(composition_id = %id, dangling, "Composition has dangling references");
        }
        Ok(composition)
    }

    /// Other compositions sharing at least one track id with `id`, one
    /// entry per composition, bucketed by kind
    pub async fn list_related(&self, id: CompositionId) -> Result<RelatedCompositions> {
        let composition = self.get(id).await?;
        let track_ids: Vec<TrackId> = composition.track_ids().into_iter().collect();
        if track_ids.is_empty() {
            return Ok(RelatedCompositions::default());
        }

        let summaries = self.store.compositions_referencing(&track_ids).await?;
        Ok(RelatedCompositions::collect(
            summaries.into_iter().filter(|summary| summary.id != id),
        ))
    }

    /// Unsaved proposal for a composition of `track_ids`. Unknown ids are
    /// left out; a weak vote leaves fields empty.
    pub async fn guess_metadata(&self, track_ids: &[TrackId]) -> Result<CompositionDraft> {
        if track_ids.is_empty() {
            return Ok(guess_metadata(track_ids, &[]));
        }
        let inputs = self.store.guess_inputs(track_ids).await?;
        Ok(guess_metadata(track_ids, &inputs))
    }
}
