//! # Tapevault Common Library
//!
//! Core of the tapevault media archiver:
//! - Source hierarchy, track boundary and composition models
//! - The `Editable` staging wrapper
//! - Library services over a storage trait, with a SQLite implementation
//! - Metadata guessing and the timestamp codec
//! - Configuration loading
//! - Scrobble-session linking

pub mod config;
pub mod db;
pub mod error;
pub mod guess;
pub mod ids;
pub mod model;
pub mod scrobble;
pub mod services;
pub mod store;
pub mod timestamp;

pub use error::{Error, OperationKind, Result};
pub use store::LibraryStore;
