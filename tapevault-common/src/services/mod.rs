//! Library operations over a [`LibraryStore`](crate::store::LibraryStore)
//!
//! Services enforce the model's invariants before anything reaches
//! storage. They hold no state besides the store handle.

pub mod compositions;
pub mod sources;
pub mod tracks;

pub use compositions::CompositionService;
pub use sources::SourceService;
pub use tracks::TrackService;
