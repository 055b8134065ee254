//! Common error types for tapevault

use thiserror::Error;

/// Common result type for tapevault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the tapevault crates
#[derive(Error, Debug)]
pub enum Error {
    /// Requested entity id does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Track boundary invariant violated (ordering, range, duration)
    #[error("Invalid offsets: {0}")]
    InvalidOffsets(String),

    /// Malformed composition, hierarchy or request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// A reference points at a track that no longer exists
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// Remote collaborator unreachable or returned a failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Kind of operation a failed call belonged to, used to decide whether a
/// caller may replay the same payload after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    ImportSource,
    ReplaceTracks,
    CreateComposition,
    UpdateComposition,
    Delete,
}

impl OperationKind {
    /// Replaying the same payload twice yields the same end state
    pub fn is_idempotent(self) -> bool {
        match self {
            OperationKind::Read
            | OperationKind::ReplaceTracks
            | OperationKind::UpdateComposition
            | OperationKind::Delete => true,
            OperationKind::ImportSource | OperationKind::CreateComposition => false,
        }
    }
}

impl Error {
    /// Failure of the storage/transport collaborator rather than of the
    /// request itself
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Database(_) | Error::Io(_))
    }

    /// Whether `op` may be retried verbatim after this error
    pub fn is_retry_safe(&self, op: OperationKind) -> bool {
        self.is_transport_failure() && op.is_idempotent()
    }
}
