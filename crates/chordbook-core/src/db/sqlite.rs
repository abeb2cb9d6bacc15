//! `SQLite` implementation of the store traits

use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use super::repository::{ConflictRepository, EntityRepository, Store, VersionRepository};
use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    ConflictId, Entity, EntityId, EntityKind, EntityRef, SyncConflict, Version, VersionId,
    VersionPayload, VersionSnapshot,
};

const ENTITY_COLUMNS: &str = "id, kind, title, artist, musical_key, tempo, tags, content, \
     is_deleted, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, entity_id, entity_kind, version_number, version_type, \
     is_delta, base_version, payload, content_length, snapshot_title, snapshot_artist, \
     snapshot_key, snapshot_tempo, changed_by, created_at, change_description";

const CONFLICT_COLUMNS: &str = "id, conflict_type, entity_type, entity_id, local_version, \
     remote_version, priority, detected_at, requires_user_input, status";

const SAVEPOINT: &str = "chordbook_atomic";

/// Store backed by a `SQLite` database
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open (and migrate) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    /// Wrap an already opened database
    pub const fn from_database(db: Database) -> Self {
        Self { db }
    }

    const fn conn(&self) -> &Connection {
        self.db.connection()
    }

    fn rollback_savepoint(&self) {
        let sql = format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT};");
        if let Err(error) = self.conn().execute_batch(&sql) {
            tracing::warn!("Failed to roll back atomic section: {error}");
        }
    }

    /// Parse an entity from a database row
    fn parse_entity(row: &Row<'_>) -> rusqlite::Result<Entity> {
        Ok(Entity {
            id: parse_text(row, 0)?,
            kind: parse_text(row, 1)?,
            title: row.get(2)?,
            artist: row.get(3)?,
            key: row.get(4)?,
            tempo: row.get(5)?,
            tags: parse_json(row, 6)?,
            content: row.get(7)?,
            is_deleted: row.get::<_, i32>(8)? != 0,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    /// Parse a version from a database row
    fn parse_version(row: &Row<'_>) -> rusqlite::Result<Version> {
        let is_delta = row.get::<_, i32>(5)? != 0;
        let base: Option<i64> = row.get(6)?;
        let payload = match (is_delta, base) {
            (false, _) => VersionPayload::Full(row.get(7)?),
            (true, Some(base)) => VersionPayload::Delta {
                base,
                diff: parse_json(row, 7)?,
            },
            (true, None) => {
                return Err(conversion_error(
                    6,
                    Type::Null,
                    Error::Storage("delta version without a base version".to_string()),
                ))
            }
        };

        Ok(Version {
            id: parse_text(row, 0)?,
            entity: EntityRef::new(parse_text(row, 1)?, parse_text(row, 2)?),
            version_number: row.get(3)?,
            version_type: parse_text(row, 4)?,
            payload,
            content_length: row.get(8)?,
            snapshot: VersionSnapshot {
                title: row.get(9)?,
                artist: row.get(10)?,
                key: row.get(11)?,
                tempo: row.get(12)?,
            },
            changed_by: row.get(13)?,
            created_at: row.get(14)?,
            change_description: row.get(15)?,
        })
    }

    /// Parse a sync conflict from a database row
    fn parse_conflict(row: &Row<'_>) -> rusqlite::Result<SyncConflict> {
        Ok(SyncConflict {
            id: parse_text(row, 0)?,
            conflict_type: parse_text(row, 1)?,
            entity: EntityRef::new(parse_text(row, 3)?, parse_text(row, 2)?),
            local_version: parse_json(row, 4)?,
            remote_version: parse_json(row, 5)?,
            priority: parse_text(row, 6)?,
            detected_at: row.get(7)?,
            requires_user_input: row.get::<_, i32>(8)? != 0,
            status: parse_text(row, 9)?,
        })
    }

    fn payload_columns(payload: &VersionPayload) -> Result<(i32, Option<i64>, String)> {
        Ok(match payload {
            VersionPayload::Full(content) => (0, None, content.clone()),
            VersionPayload::Delta { base, diff } => (1, Some(*base), serde_json::to_string(diff)?),
        })
    }
}

impl EntityRepository for SqliteStore {
    fn insert_entity(&mut self, entity: &Entity) -> Result<()> {
        self.conn().execute(
            "INSERT INTO entities (id, kind, title, artist, musical_key, tempo, tags, content, is_deleted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.id.as_str(),
                entity.kind.as_str(),
                entity.title,
                entity.artist,
                entity.key,
                entity.tempo,
                serde_json::to_string(&entity.tags)?,
                entity.content,
                i32::from(entity.is_deleted),
                entity.created_at,
                entity.updated_at
            ],
        )?;
        Ok(())
    }

    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        let entity = self
            .conn()
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?"),
                params![id.as_str()],
                Self::parse_entity,
            )
            .optional()?;
        Ok(entity)
    }

    fn update_entity(&mut self, entity: &Entity) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE entities
             SET title = ?, artist = ?, musical_key = ?, tempo = ?, tags = ?, content = ?,
                 is_deleted = ?, updated_at = ?
             WHERE id = ?",
            params![
                entity.title,
                entity.artist,
                entity.key,
                entity.tempo,
                serde_json::to_string(&entity.tags)?,
                entity.content,
                i32::from(entity.is_deleted),
                entity.updated_at,
                entity.id.as_str()
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("entity {}", entity.id)));
        }
        Ok(())
    }

    fn list_entities(&self, kind: Option<EntityKind>) -> Result<Vec<Entity>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ENTITY_COLUMNS}
             FROM entities
             WHERE ?1 IS NULL OR kind = ?1
             ORDER BY updated_at DESC"
        ))?;

        let entities = stmt
            .query_map(params![kind.map(EntityKind::as_str)], Self::parse_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entities)
    }
}

impl VersionRepository for SqliteStore {
    fn insert_version(&mut self, version: &Version) -> Result<()> {
        let (is_delta, base, payload) = Self::payload_columns(&version.payload)?;
        self.conn().execute(
            &format!("INSERT INTO versions ({VERSION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                version.id.as_str(),
                version.entity.id.as_str(),
                version.entity.kind.as_str(),
                version.version_number,
                version.version_type.as_str(),
                is_delta,
                base,
                payload,
                version.content_length,
                version.snapshot.title,
                version.snapshot.artist,
                version.snapshot.key,
                version.snapshot.tempo,
                version.changed_by,
                version.created_at,
                version.change_description
            ],
        )?;
        Ok(())
    }

    fn list_versions(&self, entity: &EntityId) -> Result<Vec<Version>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VERSION_COLUMNS}
             FROM versions
             WHERE entity_id = ?
             ORDER BY version_number ASC"
        ))?;

        let versions = stmt
            .query_map(params![entity.as_str()], Self::parse_version)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(versions)
    }

    fn get_version(&self, entity: &EntityId, version_number: i64) -> Result<Option<Version>> {
        let version = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM versions WHERE entity_id = ? AND version_number = ?"
                ),
                params![entity.as_str(), version_number],
                Self::parse_version,
            )
            .optional()?;
        Ok(version)
    }

    fn replace_version(&mut self, version: &Version) -> Result<()> {
        let (is_delta, base, payload) = Self::payload_columns(&version.payload)?;
        let rows = self.conn().execute(
            "UPDATE versions
             SET is_delta = ?, base_version = ?, payload = ?, content_length = ?
             WHERE id = ?",
            params![
                is_delta,
                base,
                payload,
                version.content_length,
                version.id.as_str()
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("version {}", version.id)));
        }
        Ok(())
    }

    fn delete_version(&mut self, id: &VersionId) -> Result<()> {
        let rows = self
            .conn()
            .execute("DELETE FROM versions WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("version {id}")));
        }
        Ok(())
    }

    fn next_version_number(&mut self, entity: &EntityId) -> Result<i64> {
        let number = self
            .conn()
            .query_row(
                "UPDATE entities SET last_version_number = last_version_number + 1
                 WHERE id = ?
                 RETURNING last_version_number",
                params![entity.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        number.ok_or_else(|| Error::Storage(format!("unknown entity {entity}")))
    }
}

impl ConflictRepository for SqliteStore {
    fn save_conflict(&mut self, conflict: &SyncConflict) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO sync_conflicts ({CONFLICT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                conflict.id.as_str(),
                conflict.conflict_type.as_str(),
                conflict.entity.kind.as_str(),
                conflict.entity.id.as_str(),
                serde_json::to_string(&conflict.local_version)?,
                serde_json::to_string(&conflict.remote_version)?,
                conflict.priority.as_str(),
                conflict.detected_at,
                i32::from(conflict.requires_user_input),
                conflict.status.as_str()
            ],
        )?;
        Ok(())
    }

    fn get_conflict(&self, id: &ConflictId) -> Result<Option<SyncConflict>> {
        let conflict = self
            .conn()
            .query_row(
                &format!("SELECT {CONFLICT_COLUMNS} FROM sync_conflicts WHERE id = ?"),
                params![id.as_str()],
                Self::parse_conflict,
            )
            .optional()?;
        Ok(conflict)
    }

    fn list_conflicts(&self, entity: Option<&EntityId>) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONFLICT_COLUMNS}
             FROM sync_conflicts
             WHERE ?1 IS NULL OR entity_id = ?1
             ORDER BY detected_at ASC"
        ))?;

        let conflicts = stmt
            .query_map(
                params![entity.map(EntityId::as_str)],
                Self::parse_conflict,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }

    fn delete_conflict(&mut self, id: &ConflictId) -> Result<()> {
        self.conn()
            .execute("DELETE FROM sync_conflicts WHERE id = ?", params![id.as_str()])?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn().execute_batch(&format!("SAVEPOINT {SAVEPOINT};"))?;

        match f(self) {
            Ok(value) => {
                if let Err(error) = self.conn().execute_batch(&format!("RELEASE {SAVEPOINT};")) {
                    self.rollback_savepoint();
                    return Err(error.into());
                }
                Ok(value)
            }
            Err(error) => {
                self.rollback_savepoint();
                Err(error)
            }
        }
    }
}

fn conversion_error(
    idx: usize,
    column_type: Type,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, column_type, Box::new(error))
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|error| conversion_error(idx, Type::Text, error))
}

fn parse_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|error| conversion_error(idx, Type::Text, error))
}
