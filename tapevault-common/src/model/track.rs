//! Track boundary model
//!
//! Each boundary keeps the machine-detected ("raw") offset and an optional
//! user-confirmed ("effective") override. Playback and composition building
//! only ever use the effective value; the raw value stays around so an edit
//! can be reverted or diffed.

use serde::{Deserialize, Serialize};

use super::editable::Editable;
use crate::ids::{SourceId, TrackId};
use crate::{Error, Result};

/// One end of a track, measured in milliseconds from the start of the
/// owning source's extracted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub raw_ms: i64,
    /// `None` until the user overrides the detected value
    pub effective_ms: Option<i64>,
}

impl Boundary {
    pub fn detected(raw_ms: i64) -> Self {
        Self { raw_ms, effective_ms: None }
    }

    pub fn effective(&self) -> i64 {
        self.effective_ms.unwrap_or(self.raw_ms)
    }

    pub fn is_overridden(&self) -> bool {
        self.effective_ms.is_some()
    }

    /// Setting the effective value back to the raw one clears the override,
    /// so an undone edit compares equal to the untouched boundary.
    pub fn set_effective(&mut self, ms: i64) {
        self.effective_ms = if ms == self.raw_ms { None } else { Some(ms) };
    }

    pub fn revert(&mut self) {
        self.effective_ms = None;
    }
}

/// A playable segment of exactly one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub source_id: SourceId,
    pub artist: String,
    pub title: String,
    pub start: Boundary,
    pub end: Boundary,
}

impl Track {
    /// Freshly segmented track: raw and effective offsets coincide
    pub fn detected(
        source_id: SourceId,
        artist: impl Into<String>,
        title: impl Into<String>,
        start_offset_ms: i64,
        end_offset_ms: i64,
    ) -> Self {
        Self {
            id: TrackId::new(),
            source_id,
            artist: artist.into(),
            title: title.into(),
            start: Boundary::detected(start_offset_ms),
            end: Boundary::detected(end_offset_ms),
        }
    }

    pub fn start_offset_ms(&self) -> i64 {
        self.start.effective()
    }

    pub fn end_offset_ms(&self) -> i64 {
        self.end.effective()
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_offset_ms() - self.start_offset_ms()
    }

    pub fn is_adjusted(&self) -> bool {
        self.start.is_overridden() || self.end.is_overridden()
    }

    /// Check the effective boundaries against ordering and, when known,
    /// the file duration
    pub fn validate(&self, file_duration_ms: Option<i64>) -> Result<()> {
        validate_offsets(self.start_offset_ms(), self.end_offset_ms(), file_duration_ms)
            .map_err(|e| match e {
                Error::InvalidOffsets(msg) => Error::InvalidOffsets(format!("track {}: {}", self.id, msg)),
                other => other,
            })
    }

    /// Override both effective boundaries. Nothing changes unless the new
    /// pair is valid.
    pub fn set_offsets(&mut self, start_ms: i64, end_ms: i64, file_duration_ms: Option<i64>) -> Result<()> {
        validate_offsets(start_ms, end_ms, file_duration_ms)?;
        self.start.set_effective(start_ms);
        self.end.set_effective(end_ms);
        Ok(())
    }

    pub fn revert_offsets(&mut self) {
        self.start.revert();
        self.end.revert();
    }

    pub fn to_draft(&self) -> TrackDraft {
        TrackDraft {
            id: self.id,
            artist: self.artist.clone(),
            title: self.title.clone(),
            start_offset_ms: self.start_offset_ms(),
            end_offset_ms: self.end_offset_ms(),
        }
    }
}

/// Client-side description of a track in a full-set replace.
///
/// Ids are chosen by the client so that replaying the same replace payload
/// converges on the same tracks. An id already stored for the source keeps
/// that track's raw offsets; an unknown id creates a new track whose raw
/// offsets are the given ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDraft {
    #[serde(default)]
    pub id: TrackId,
    pub artist: String,
    pub title: String,
    pub start_offset_ms: i64,
    pub end_offset_ms: i64,
}

impl TrackDraft {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, start_offset_ms: i64, end_offset_ms: i64) -> Self {
        Self {
            id: TrackId::new(),
            artist: artist.into(),
            title: title.into(),
            start_offset_ms,
            end_offset_ms,
        }
    }

    pub fn validate(&self, file_duration_ms: Option<i64>) -> Result<()> {
        validate_offsets(self.start_offset_ms, self.end_offset_ms, file_duration_ms)
            .map_err(|e| match e {
                Error::InvalidOffsets(msg) => Error::InvalidOffsets(format!("track {}: {}", self.id, msg)),
                other => other,
            })
    }

    /// Merge onto the stored track with the same id, if any
    pub fn resolve(&self, source_id: SourceId, existing: Option<&Track>) -> Track {
        let (mut start, mut end) = match existing {
            Some(track) => (track.start, track.end),
            None => (
                Boundary::detected(self.start_offset_ms),
                Boundary::detected(self.end_offset_ms),
            ),
        };
        start.set_effective(self.start_offset_ms);
        end.set_effective(self.end_offset_ms);

        Track {
            id: self.id,
            source_id,
            artist: self.artist.clone(),
            title: self.title.clone(),
            start,
            end,
        }
    }
}

/// `0 <= start < end <= file_duration`
pub fn validate_offsets(start_ms: i64, end_ms: i64, file_duration_ms: Option<i64>) -> Result<()> {
    if start_ms < 0 {
        return Err(Error::InvalidOffsets(format!("start offset {} ms is negative", start_ms)));
    }
    if end_ms <= start_ms {
        return Err(Error::InvalidOffsets(format!(
            "end offset {} ms is not after start offset {} ms",
            end_ms, start_ms
        )));
    }
    if let Some(duration) = file_duration_ms {
        if end_ms > duration {
            return Err(Error::InvalidOffsets(format!(
                "end offset {} ms exceeds file duration {} ms",
                end_ms, duration
            )));
        }
    }
    Ok(())
}

/// Sort by effective start, the conceptual order of a source's tracks
pub fn sort_by_start(tracks: &mut [Track]) {
    tracks.sort_by_key(|t| (t.start_offset_ms(), t.end_offset_ms()));
}

impl Editable<Track> {
    /// Stage new effective offsets on the working copy
    pub fn set_offsets(&mut self, start_ms: i64, end_ms: i64, file_duration_ms: Option<i64>) -> Result<()> {
        self.try_edit(|track| track.set_offsets(start_ms, end_ms, file_duration_ms))
    }
}

impl Editable<Vec<Track>> {
    /// Stage new effective offsets for one track of a staged listing
    pub fn set_track_offsets(
        &mut self,
        track_id: TrackId,
        start_ms: i64,
        end_ms: i64,
        file_duration_ms: Option<i64>,
    ) -> Result<()> {
        self.try_edit(|tracks| {
            let track = tracks
                .iter_mut()
                .find(|t| t.id == track_id)
                .ok_or_else(|| Error::NotFound(format!("track {} is not staged", track_id)))?;
            track.set_offsets(start_ms, end_ms, file_duration_ms)
        })
    }

    /// Replace payload for the staged listing
    pub fn drafts(&self) -> Vec<TrackDraft> {
        self.value().iter().map(Track::to_draft).collect()
    }
}
