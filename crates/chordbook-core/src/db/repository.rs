//! Store traits consumed by the version store and the conflict machinery

use crate::error::Result;
use crate::models::{ConflictId, Entity, EntityId, EntityKind, SyncConflict, Version, VersionId};

/// Trait for live entity storage
pub trait EntityRepository {
    /// Insert a new entity
    fn insert_entity(&mut self, entity: &Entity) -> Result<()>;

    /// Get an entity by ID, including soft-deleted ones
    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Overwrite an existing entity
    fn update_entity(&mut self, entity: &Entity) -> Result<()>;

    /// List entities, newest update first
    fn list_entities(&self, kind: Option<EntityKind>) -> Result<Vec<Entity>>;
}

/// Trait for version log storage
pub trait VersionRepository {
    /// Insert a new version row
    fn insert_version(&mut self, version: &Version) -> Result<()>;

    /// All versions of an entity ordered by ascending version number
    fn list_versions(&self, entity: &EntityId) -> Result<Vec<Version>>;

    /// Get one version by its number
    fn get_version(&self, entity: &EntityId, version_number: i64) -> Result<Option<Version>>;

    /// Overwrite a version row in place (used when re-basing deltas)
    fn replace_version(&mut self, version: &Version) -> Result<()>;

    /// Remove a version row
    fn delete_version(&mut self, id: &VersionId) -> Result<()>;

    /// Reserve the next version number for an entity; numbers are never handed out twice
    fn next_version_number(&mut self, entity: &EntityId) -> Result<i64>;
}

/// Trait for sync conflict records
pub trait ConflictRepository {
    /// Insert or update a conflict record
    fn save_conflict(&mut self, conflict: &SyncConflict) -> Result<()>;

    /// Get a conflict by ID
    fn get_conflict(&self, id: &ConflictId) -> Result<Option<SyncConflict>>;

    /// Conflicts still awaiting resolution, optionally for one entity
    fn list_conflicts(&self, entity: Option<&EntityId>) -> Result<Vec<SyncConflict>>;

    /// Remove a conflict record; missing records are ignored
    fn delete_conflict(&mut self, id: &ConflictId) -> Result<()>;
}

/// Full persistent store with atomic sections
pub trait Store: EntityRepository + VersionRepository + ConflictRepository {
    /// Run `f` so that all of its writes take effect, or none do when it fails
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;
}
