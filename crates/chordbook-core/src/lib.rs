//! chordbook-core - Version history and sync conflict handling for Chordbook
//!
//! Chord charts, books and set lists keep an append-only, delta-compressed
//! version log. When another device sends a diverging snapshot, the conflict
//! module detects, merges and resolves it against the same store.

pub mod config;
pub mod conflict;
pub mod db;
pub mod diff;
pub mod error;
pub mod models;
pub mod util;
pub mod versions;

pub use config::VersioningConfig;
pub use error::{Error, Result};
pub use models::{Entity, EntityId, EntityKind, SyncConflict, Version};
pub use versions::VersionStore;
