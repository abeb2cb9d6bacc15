//! In-memory implementation of the store traits
//!
//! Used by tests and by previews that must not touch the real database.
//! Atomic sections snapshot the whole store and restore it on failure.

use std::collections::{BTreeMap, HashMap};

use super::repository::{ConflictRepository, EntityRepository, Store, VersionRepository};
use crate::error::{Error, Result};
use crate::models::{
    ConflictId, Entity, EntityId, EntityKind, SyncConflict, Version, VersionId,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entities: HashMap<EntityId, Entity>,
    /// Versions per entity keyed by version number
    versions: HashMap<EntityId, BTreeMap<i64, Version>>,
    counters: HashMap<EntityId, i64>,
    conflicts: HashMap<ConflictId, SyncConflict>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityRepository for InMemoryStore {
    fn insert_entity(&mut self, entity: &Entity) -> Result<()> {
        if self.entities.contains_key(&entity.id) {
            return Err(Error::Storage(format!("entity {} already exists", entity.id)));
        }
        self.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.entities.get(id).cloned())
    }

    fn update_entity(&mut self, entity: &Entity) -> Result<()> {
        let slot = self
            .entities
            .get_mut(&entity.id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", entity.id)))?;
        *slot = entity.clone();
        Ok(())
    }

    fn list_entities(&self, kind: Option<EntityKind>) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .entities
            .values()
            .filter(|entity| kind.is_none_or(|kind| entity.kind == kind))
            .cloned()
            .collect();
        entities.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(entities)
    }
}

impl VersionRepository for InMemoryStore {
    fn insert_version(&mut self, version: &Version) -> Result<()> {
        if !self.entities.contains_key(&version.entity.id) {
            return Err(Error::Storage(format!(
                "unknown entity {}",
                version.entity.id
            )));
        }
        let log = self.versions.entry(version.entity.id).or_default();
        if log.contains_key(&version.version_number) {
            return Err(Error::Storage(format!(
                "version {} already exists for {}",
                version.version_number, version.entity
            )));
        }
        log.insert(version.version_number, version.clone());
        Ok(())
    }

    fn list_versions(&self, entity: &EntityId) -> Result<Vec<Version>> {
        Ok(self
            .versions
            .get(entity)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_version(&self, entity: &EntityId, version_number: i64) -> Result<Option<Version>> {
        Ok(self
            .versions
            .get(entity)
            .and_then(|log| log.get(&version_number))
            .cloned())
    }

    fn replace_version(&mut self, version: &Version) -> Result<()> {
        let slot = self
            .versions
            .get_mut(&version.entity.id)
            .and_then(|log| log.get_mut(&version.version_number))
            .filter(|existing| existing.id == version.id)
            .ok_or_else(|| Error::NotFound(format!("version {}", version.id)))?;
        *slot = version.clone();
        Ok(())
    }

    fn delete_version(&mut self, id: &VersionId) -> Result<()> {
        for log in self.versions.values_mut() {
            let found = log
                .iter()
                .find(|(_, version)| version.id == *id)
                .map(|(number, _)| *number);
            if let Some(number) = found {
                log.remove(&number);
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("version {id}")))
    }

    fn next_version_number(&mut self, entity: &EntityId) -> Result<i64> {
        if !self.entities.contains_key(entity) {
            return Err(Error::Storage(format!("unknown entity {entity}")));
        }
        let counter = self.counters.entry(*entity).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

impl ConflictRepository for InMemoryStore {
    fn save_conflict(&mut self, conflict: &SyncConflict) -> Result<()> {
        self.conflicts.insert(conflict.id, conflict.clone());
        Ok(())
    }

    fn get_conflict(&self, id: &ConflictId) -> Result<Option<SyncConflict>> {
        Ok(self.conflicts.get(id).cloned())
    }

    fn list_conflicts(&self, entity: Option<&EntityId>) -> Result<Vec<SyncConflict>> {
        let mut conflicts: Vec<SyncConflict> = self
            .conflicts
            .values()
            .filter(|conflict| entity.is_none_or(|id| conflict.entity.id == *id))
            .cloned()
            .collect();
        conflicts.sort_by_key(|conflict| conflict.detected_at);
        Ok(conflicts)
    }

    fn delete_conflict(&mut self, id: &ConflictId) -> Result<()> {
        self.conflicts.remove(id);
        Ok(())
    }
}

impl Store for InMemoryStore {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VersionPayload, VersionSnapshot, VersionType};

    fn version(entity: &Entity, number: i64) -> Version {
        Version {
            id: VersionId::new(),
            entity: entity.entity_ref(),
            version_number: number,
            version_type: VersionType::AutoSave,
            payload: VersionPayload::Full(entity.content.clone()),
            content_length: entity.content.len(),
            snapshot: VersionSnapshot::from(entity),
            changed_by: "test".to_string(),
            created_at: 0,
            change_description: None,
        }
    }

    #[test]
    fn test_rejects_versions_for_unknown_entities() {
        let mut store = InMemoryStore::new();
        let orphan = Entity::new(EntityKind::Song, "Orphan", "");
        assert!(store.insert_version(&version(&orphan, 1)).is_err());
        assert!(store.next_version_number(&orphan.id).is_err());
    }

    #[test]
    fn test_versions_are_ordered() {
        let mut store = InMemoryStore::new();
        let song = Entity::new(EntityKind::Song, "Ordered", "x");
        store.insert_entity(&song).unwrap();
        store.insert_version(&version(&song, 2)).unwrap();
        store.insert_version(&version(&song, 1)).unwrap();

        let numbers: Vec<i64> = store
            .list_versions(&song.id)
            .unwrap()
            .iter()
            .map(|version| version.version_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(store.insert_version(&version(&song, 2)).is_err());
    }

    #[test]
    fn test_atomically_restores_snapshot() {
        let mut store = InMemoryStore::new();
        let song = Entity::new(EntityKind::Song, "Atomic", "x");
        store.insert_entity(&song).unwrap();

        let result: Result<()> = store.atomically(|store| {
            store.insert_version(&version(&song, 1))?;
            Err(Error::Storage("write failed".to_string()))
        });

        assert!(result.is_err());
        assert!(store.list_versions(&song.id).unwrap().is_empty());
    }
}
