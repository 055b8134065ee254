//! Typed identifiers
//!
//! Every entity is keyed by a UUIDv4 stored as TEXT. The newtypes keep a
//! track id from being passed where a source id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identifier of an imported source
    SourceId
);
entity_id!(
    /// Identifier of a track segment
    TrackId
);
entity_id!(
    /// Identifier of a tape, playlist or album
    CompositionId
);
entity_id!(
    /// Identifier of one track reference inside a composition
    TrackRefId
);
entity_id!(
    /// Identifier of a stored thumbnail
    ThumbnailId
);

/// Parse a TEXT column into a typed id
pub(crate) fn parse_column<T: FromStr<Err = uuid::Error>>(value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|e| crate::Error::Internal(format!("corrupt id column {:?}: {}", value, e)))
}
