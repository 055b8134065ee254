//! Composition model: tapes, playlists and albums
//!
//! A composition is an ordered list of references to tracks. The reference,
//! not the track, is the unit of ordering, insertion and removal, so the
//! same track can appear several times in one composition and in any number
//! of others. Compositions never own the tracks they reference.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::editable::Editable;
use super::track::Track;
use crate::ids::{CompositionId, SourceId, ThumbnailId, TrackId, TrackRefId};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionKind {
    Tape,
    Playlist,
    Album,
}

impl CompositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::Tape => "tape",
            CompositionKind::Playlist => "playlist",
            CompositionKind::Album => "album",
        }
    }
}

impl fmt::Display for CompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompositionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tape" => Ok(CompositionKind::Tape),
            "playlist" => Ok(CompositionKind::Playlist),
            "album" => Ok(CompositionKind::Album),
            other => Err(Error::Validation(format!("unknown composition kind: {}", other))),
        }
    }
}

/// Denormalized track fields carried next to a reference for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub source_id: SourceId,
    pub artist: String,
    pub title: String,
    pub start_offset_ms: i64,
    pub end_offset_ms: i64,
}

impl From<&Track> for TrackSnapshot {
    fn from(track: &Track) -> Self {
        Self {
            source_id: track.source_id,
            artist: track.artist.clone(),
            title: track.title.clone(),
            start_offset_ms: track.start_offset_ms(),
            end_offset_ms: track.end_offset_ms(),
        }
    }
}

/// Stored reference to a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: TrackRefId,
    pub track_id: TrackId,
    /// `None` when the referenced track no longer exists
    pub track: Option<TrackSnapshot>,
}

impl TrackRef {
    pub fn is_dangling(&self) -> bool {
        self.track.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub id: CompositionId,
    pub name: String,
    pub kind: CompositionKind,
    pub artist: String,
    pub released_at: Option<NaiveDate>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub created_at: DateTime<Utc>,
    pub tracks: Vec<TrackRef>,
}

impl Composition {
    pub fn summary(&self) -> CompositionSummary {
        CompositionSummary {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            artist: self.artist.clone(),
            released_at: self.released_at,
            thumbnail_id: self.thumbnail_id,
            created_at: self.created_at,
        }
    }

    /// Editable shape of this composition, retaining every reference id
    pub fn to_draft(&self) -> CompositionDraft {
        CompositionDraft {
            name: self.name.clone(),
            kind: self.kind,
            artist: self.artist.clone(),
            released_at: self.released_at,
            thumbnail_id: self.thumbnail_id,
            tracks: self
                .tracks
                .iter()
                .map(|r| TrackRefDraft { id: r.id, track_id: r.track_id })
                .collect(),
        }
    }

    pub fn dangling_references(&self) -> impl Iterator<Item = &TrackRef> {
        self.tracks.iter().filter(|r| r.is_dangling())
    }

    pub fn track_ids(&self) -> HashSet<TrackId> {
        self.tracks.iter().map(|r| r.track_id).collect()
    }
}

/// Listing row, without references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionSummary {
    pub id: CompositionId,
    pub name: String,
    pub kind: CompositionKind,
    pub artist: String,
    pub released_at: Option<NaiveDate>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub created_at: DateTime<Utc>,
}

/// Reference as sent by a client. Ids are client chosen: an id the stored
/// composition already has is "retained", any other id is newly introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRefDraft {
    #[serde(default)]
    pub id: TrackRefId,
    pub track_id: TrackId,
}

impl TrackRefDraft {
    pub fn new(track_id: TrackId) -> Self {
        Self { id: TrackRefId::new(), track_id }
    }
}

/// Create/update payload: full metadata plus the full reference sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionDraft {
    pub name: String,
    pub kind: CompositionKind,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub released_at: Option<NaiveDate>,
    #[serde(default)]
    pub thumbnail_id: Option<ThumbnailId>,
    #[serde(default)]
    pub tracks: Vec<TrackRefDraft>,
}

impl CompositionDraft {
    pub fn new(name: impl Into<String>, kind: CompositionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            artist: String::new(),
            released_at: None,
            thumbnail_id: None,
            tracks: Vec::new(),
        }
    }

    /// Shape checks that need no storage lookups
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("composition name must not be empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.tracks.len());
        for reference in &self.tracks {
            if !seen.insert(reference.id) {
                return Err(Error::Validation(format!(
                    "track reference {} appears more than once",
                    reference.id
                )));
            }
        }
        Ok(())
    }

    pub fn push_track(&mut self, track_id: TrackId) -> TrackRefId {
        let reference = TrackRefDraft::new(track_id);
        self.tracks.push(reference);
        reference.id
    }

    pub fn remove_reference(&mut self, id: TrackRefId) -> Option<TrackRefDraft> {
        let index = self.tracks.iter().position(|r| r.id == id)?;
        Some(self.tracks.remove(index))
    }

    pub fn move_reference(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return Err(Error::Validation(format!(
                "cannot move reference {} to {} in a list of {}",
                from,
                to,
                self.tracks.len()
            )));
        }
        let reference = self.tracks.remove(from);
        self.tracks.insert(to, reference);
        Ok(())
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|r| r.track_id).collect()
    }
}

impl Editable<CompositionDraft> {
    /// Reorder the staged references; an out-of-range move changes nothing
    pub fn move_reference(&mut self, from: usize, to: usize) -> Result<()> {
        self.try_edit(|draft| draft.move_reference(from, to))
    }
}

/// How an update's reference sequence relates to the stored one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceChanges {
    /// Kept references, in their new order
    pub retained: Vec<TrackRefId>,
    pub added: Vec<TrackRefId>,
    pub removed: Vec<TrackRefId>,
    /// Retained references changed relative order
    pub reordered: bool,
}

impl ReferenceChanges {
    pub fn diff(before: &[TrackRefId], after: &[TrackRefId]) -> Self {
        let before_set: HashSet<_> = before.iter().copied().collect();
        let after_set: HashSet<_> = after.iter().copied().collect();

        let retained: Vec<_> = after.iter().copied().filter(|id| before_set.contains(id)).collect();
        let added = after.iter().copied().filter(|id| !before_set.contains(id)).collect();
        let removed = before.iter().copied().filter(|id| !after_set.contains(id)).collect();

        let previous_order: Vec<_> = before.iter().copied().filter(|id| after_set.contains(id)).collect();
        let reordered = previous_order != retained;

        Self { retained, added, removed, reordered }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reordered
    }
}

/// Compositions sharing at least one track with a given composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCompositions {
    pub tapes: Vec<CompositionSummary>,
    pub playlists: Vec<CompositionSummary>,
    pub albums: Vec<CompositionSummary>,
}

impl RelatedCompositions {
    /// Bucket by kind, keeping the first occurrence of every id
    pub fn collect(summaries: impl IntoIterator<Item = CompositionSummary>) -> Self {
        let mut seen = HashSet::new();
        let mut related = Self::default();
        for summary in summaries {
            if !seen.insert(summary.id) {
                continue;
            }
            match summary.kind {
                CompositionKind::Tape => related.tapes.push(summary),
                CompositionKind::Playlist => related.playlists.push(summary),
                CompositionKind::Album => related.albums.push(summary),
            }
        }
        related
    }

    pub fn len(&self) -> usize {
        self.tapes.len() + self.playlists.len() + self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: CompositionId) -> bool {
        self.tapes
            .iter()
            .chain(&self.playlists)
            .chain(&self.albums)
            .any(|s| s.id == id)
    }
}

/// Attach snapshots to draft references. References whose track is missing
/// from `tracks` come back dangling.
pub fn resolve_references(drafts: &[TrackRefDraft], tracks: &[Track]) -> Vec<TrackRef> {
    let by_id: HashMap<TrackId, &Track> = tracks.iter().map(|t| (t.id, t)).collect();
    drafts
        .iter()
        .map(|d| TrackRef {
            id: d.id,
            track_id: d.track_id,
            track: by_id.get(&d.track_id).map(|t| TrackSnapshot::from(*t)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(kind: CompositionKind) -> CompositionSummary {
        CompositionSummary {
            id: CompositionId::new(),
            name: "x".to_string(),
            kind,
            artist: String::new(),
            released_at: None,
            thumbnail_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_kind_round_trips_through_text() {
        for kind in [CompositionKind::Tape, CompositionKind::Playlist, CompositionKind::Album] {
            assert_eq!(kind.as_str().parse::<CompositionKind>().unwrap(), kind);
        }
        assert!("mixtape".parse::<CompositionKind>().is_err());
        assert_eq!(serde_json::to_string(&CompositionKind::Album).unwrap(), "\"album\"");
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = CompositionDraft::new("  ", CompositionKind::Playlist);
        assert!(draft.validate().is_err());

        draft.name = "Road trip".to_string();
        let track = TrackId::new();
        draft.push_track(track);
        draft.push_track(track);
        assert!(draft.validate().is_ok(), "same track twice is allowed");

        let duplicate = draft.tracks[0];
        draft.tracks.push(duplicate);
        assert!(matches!(draft.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_diff_distinguishes_reorder_from_reinsert() {
        let a = TrackRefId::new();
        let b = TrackRefId::new();
        let c = TrackRefId::new();

        let reordered = ReferenceChanges::diff(&[a, b, c], &[c, a, b]);
        assert!(reordered.reordered);
        assert!(reordered.added.is_empty());
        assert!(reordered.removed.is_empty());

        let d = TrackRefId::new();
        let reinserted = ReferenceChanges::diff(&[a, b, c], &[a, b, d]);
        assert!(!reinserted.reordered);
        assert_eq!(reinserted.added, vec![d]);
        assert_eq!(reinserted.removed, vec![c]);

        assert!(ReferenceChanges::diff(&[a, b], &[a, b]).is_empty());
    }

    #[test]
    fn test_diff_removal_alone_is_not_reorder() {
        let a = TrackRefId::new();
        let b = TrackRefId::new();
        let c = TrackRefId::new();
        let changes = ReferenceChanges::diff(&[a, b, c], &[a, c]);
        assert!(!changes.reordered);
        assert_eq!(changes.removed, vec![b]);
    }

    #[test]
    fn test_related_dedupes_and_buckets() {
        let album = summary(CompositionKind::Album);
        let playlist = summary(CompositionKind::Playlist);
        let related = RelatedCompositions::collect(vec![album.clone(), playlist.clone(), album.clone()]);

        assert_eq!(related.albums.len(), 1);
        assert_eq!(related.playlists.len(), 1);
        assert!(related.tapes.is_empty());
        assert!(related.contains(album.id));
        assert_eq!(related.len(), 2);
    }

    #[test]
    fn test_resolve_marks_missing_tracks_dangling() {
        let track = Track::detected(SourceId::new(), "A", "T", 0, 1_000);
        let drafts = vec![TrackRefDraft::new(track.id), TrackRefDraft::new(TrackId::new())];
        let refs = resolve_references(&drafts, &[track.clone()]);

        assert!(!refs[0].is_dangling());
        assert_eq!(refs[0].track.as_ref().unwrap().title, "T");
        assert!(refs[1].is_dangling());
    }

    #[test]
    fn test_editable_draft_move() {
        let mut draft = CompositionDraft::new("Mix", CompositionKind::Tape);
        let first = draft.push_track(TrackId::new());
        draft.push_track(TrackId::new());
        let mut editable = Editable::new(draft);

        assert!(editable.move_reference(0, 5).is_err());
        assert!(!editable.is_edited());

        editable.move_reference(0, 1).unwrap();
        assert!(editable.is_edited());
        assert_eq!(editable.value().tracks[1].id, first);

        editable.move_reference(1, 0).unwrap();
        assert!(!editable.is_edited());
    }
}
