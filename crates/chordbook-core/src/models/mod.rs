//! Data models for Chordbook

mod entity;
mod field;
mod sync_conflict;
mod version;

pub use entity::{Entity, EntityId, EntityKind, EntityRef};
pub use field::{FieldChoice, FieldKey, FieldValue};
pub use sync_conflict::{
    ConflictData, ConflictId, ConflictPriority, ConflictStatus, ConflictType, ConflictVersion,
    SyncConflict,
};
pub use version::{
    Version, VersionId, VersionPayload, VersionSnapshot, VersionStorageStats, VersionType,
};
