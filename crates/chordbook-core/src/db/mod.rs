//! Database layer for Chordbook

mod connection;
mod memory;
mod migrations;
mod repository;
mod sqlite;

pub use connection::Database;
pub use memory::InMemoryStore;
pub use repository::{ConflictRepository, EntityRepository, Store, VersionRepository};
pub use sqlite::SqliteStore;
