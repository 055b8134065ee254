//! Composition metadata guessing
//!
//! Proposes name, artist, release date and thumbnail for a set of tracks by
//! majority vote over what their sources say. Purely advisory: a weak vote
//! produces empty fields, never an error.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::hash::Hash;

use crate::ids::{ThumbnailId, TrackId};
use crate::model::{CompositionDraft, CompositionKind, TrackRefDraft};

/// Share of votes a value needs to be accepted
pub const DOMINANCE_THRESHOLD: f32 = 0.75;

/// Per-track facts the heuristic votes on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuessInput {
    pub track_id: TrackId,
    pub artist: String,
    pub source_title: String,
    pub source_parent_titles: Vec<String>,
    pub album_artist: String,
    pub album_title: String,
    pub release_date: Option<NaiveDate>,
    pub thumbnail_id: Option<ThumbnailId>,
}

/// Multiset with per-value counts
#[derive(Debug, Clone)]
pub struct CountingSet<T> {
    counts: HashMap<T, usize>,
    total: usize,
}

impl<T: Eq + Hash + Clone> CountingSet<T> {
    pub fn new() -> Self {
        Self { counts: HashMap::new(), total: 0 }
    }

    pub fn add(&mut self, item: T) {
        *self.counts.entry(item).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, item: &T) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    pub fn total_size(&self) -> usize {
        self.total
    }

    pub fn unique_size(&self) -> usize {
        self.counts.len()
    }

    /// The value holding at least `min_share` of all votes, if any
    pub fn dominating_value(&self, min_share: f32) -> Option<T> {
        if self.total == 0 {
            return None;
        }
        self.counts
            .iter()
            .map(|(item, count)| (item, *count as f32 / self.total as f32))
            .filter(|(_, share)| *share >= min_share)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(item, _)| item.clone())
    }
}

impl<T: Eq + Hash + Clone> Default for CountingSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn coalesce(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() { fallback } else { preferred }.to_string()
}

/// Build an unsaved composition proposal for `track_ids`.
///
/// `inputs` holds whatever could be resolved; ids without an input are
/// dropped from the proposal's reference list.
/// Remainder of `value` after `prefix`, compared in lowercase. Lowercasing
/// may change the char count ('İ' becomes "i\u{307}"), so the cut is found
/// by walking `value` rather than by counting chars of the lowered prefix.
fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let target = prefix.to_lowercase();
    let mut lowered = String::with_capacity(target.len());
    for (index, c) in value.char_indices() {
        if lowered == target {
            return Some(&value[index..]);
        }
        if lowered.len() >= target.len() || !target.starts_with(&lowered) {
            return None;
        }
        lowered.extend(c.to_lowercase());
    }
    (lowered == target).then_some("")
}

pub fn guess_metadata(track_ids: &[TrackId], inputs: &[GuessInput]) -> CompositionDraft {
    let mut artists = CountingSet::new();
    let mut names = CountingSet::new();
    let mut parent_names = CountingSet::new();
    let mut release_dates = CountingSet::new();
    let mut thumbnails = CountingSet::new();

    for input in inputs {
        artists.add(coalesce(&input.album_artist, &input.artist));
        names.add(coalesce(&input.album_title, &input.source_title));
        for parent in &input.source_parent_titles {
            parent_names.add(parent.clone());
        }
        release_dates.add(input.release_date);
        thumbnails.add(input.thumbnail_id);
    }

    let name = names.dominating_value(DOMINANCE_THRESHOLD).unwrap_or_default();
    let parent_name = parent_names.dominating_value(DOMINANCE_THRESHOLD).unwrap_or_default();
    let artist = artists.dominating_value(DOMINANCE_THRESHOLD).unwrap_or_default();
    let released_at = release_dates.dominating_value(DOMINANCE_THRESHOLD).flatten();
    let thumbnail_id = thumbnails.dominating_value(DOMINANCE_THRESHOLD).flatten();

    let mut name = coalesce(&name, &parent_name);
    if !artist.is_empty() {
        if let Some(rest) = strip_prefix_ignore_case(&name, &format!("{} - ", artist)) {
            name = rest.to_string();
        }
    }

    let kind = if !artist.trim().is_empty() || released_at.is_some() {
        CompositionKind::Album
    } else {
        CompositionKind::Playlist
    };

    let known: Vec<TrackId> = inputs.iter().map(|i| i.track_id).collect();
    let tracks = track_ids
        .iter()
        .filter(|id| known.contains(id))
        .map(|id| TrackRefDraft::new(*id))
        .collect();

    CompositionDraft {
        name: name.trim().to_string(),
        kind,
        artist: artist.trim().to_string(),
        released_at,
        thumbnail_id,
        tracks,
    }
}
