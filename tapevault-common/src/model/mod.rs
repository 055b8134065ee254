//! Domain model: sources, tracks, compositions and the editing wrapper

pub mod composition;
pub mod editable;
pub mod source;
pub mod track;

pub use composition::{
    Composition, CompositionDraft, CompositionKind, CompositionSummary, ReferenceChanges,
    RelatedCompositions, TrackRef, TrackRefDraft, TrackSnapshot,
};
pub use editable::Editable;
pub use source::{HierarchyEntry, NewSource, Source, SourceFile, SourceListing, SourceNode};
pub use track::{Boundary, Track, TrackDraft};

use serde::{Deserialize, Serialize};

use crate::ids::ThumbnailId;

/// Stored thumbnail image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub id: ThumbnailId,
    pub file_path: String,
    pub format: String,
}
