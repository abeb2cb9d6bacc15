//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Entity, EntityRef, FieldKey, FieldValue};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// A unique identifier for a sync conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Create a new unique conflict ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of divergence between two devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    ContentModification,
    PropertyConflict,
    Deletion,
}

/// Urgency of a conflict; `High` sorts greatest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPriority {
    Low,
    Medium,
    High,
}

/// Lifecycle state of a stored conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Open,
    /// Skipped by the user, entity held back from sync
    Deferred,
}

macro_rules! string_enum {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum!(ConflictType {
    ContentModification => "content_modification",
    PropertyConflict => "property_conflict",
    Deletion => "deletion",
});

string_enum!(ConflictPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

string_enum!(ConflictStatus {
    Open => "open",
    Deferred => "deferred",
});

/// Structured snapshot of an entity as seen by one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictData {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub tempo: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ConflictData {
    /// Current value of a field
    pub fn field(&self, key: FieldKey) -> FieldValue {
        match key {
            FieldKey::Title => FieldValue::Text(Some(self.title.clone())),
            FieldKey::Artist => FieldValue::Text(self.artist.clone()),
            FieldKey::Content => FieldValue::Text(Some(self.content.clone())),
            FieldKey::Key => FieldValue::Text(self.key.clone()),
            FieldKey::Tempo => FieldValue::Number(self.tempo),
            FieldKey::Tags => FieldValue::List(self.tags.clone()),
            FieldKey::Deleted => FieldValue::Flag(self.is_deleted),
        }
    }

    /// Overwrite a field, rejecting values of the wrong shape
    pub fn set_field(&mut self, key: FieldKey, value: FieldValue) -> Result<()> {
        match (key, value) {
            (FieldKey::Title, FieldValue::Text(Some(title))) => self.title = title,
            (FieldKey::Content, FieldValue::Text(Some(content))) => self.content = content,
            (FieldKey::Artist, FieldValue::Text(artist)) => self.artist = artist,
            (FieldKey::Key, FieldValue::Text(key)) => self.key = key,
            (FieldKey::Tempo, FieldValue::Number(tempo)) => self.tempo = tempo,
            (FieldKey::Tags, FieldValue::List(tags)) => self.tags = tags,
            (FieldKey::Deleted, FieldValue::Flag(deleted)) => self.is_deleted = deleted,
            (key, value) => {
                return Err(Error::InvalidInput(format!(
                    "value {value:?} cannot be assigned to field '{key}'"
                )))
            }
        }
        Ok(())
    }

    /// Whether a field holds the same value on both snapshots
    pub fn same_field(&self, other: &Self, key: FieldKey) -> bool {
        match key {
            FieldKey::Title => self.title == other.title,
            FieldKey::Artist => self.artist == other.artist,
            FieldKey::Content => self.content == other.content,
            FieldKey::Key => self.key == other.key,
            FieldKey::Tempo => self.tempo == other.tempo,
            FieldKey::Tags => self.tags == other.tags,
            FieldKey::Deleted => self.is_deleted == other.is_deleted,
        }
    }
}

impl From<&Entity> for ConflictData {
    fn from(entity: &Entity) -> Self {
        Self {
            title: entity.title.clone(),
            artist: entity.artist.clone(),
            content: entity.content.clone(),
            key: entity.key.clone(),
            tempo: entity.tempo,
            tags: entity.tags.clone(),
            is_deleted: entity.is_deleted,
        }
    }
}

impl Entity {
    /// Replace the entity's live fields with a resolved snapshot
    pub fn apply_data(&mut self, data: &ConflictData) {
        self.title.clone_from(&data.title);
        self.artist.clone_from(&data.artist);
        self.content.clone_from(&data.content);
        self.key.clone_from(&data.key);
        self.tempo = data.tempo;
        self.tags.clone_from(&data.tags);
        self.is_deleted = data.is_deleted;
        self.updated_at = now_millis();
    }
}

/// One side of a conflict: snapshot plus where and when it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictVersion {
    /// Timestamp of the snapshot (Unix ms)
    pub timestamp: i64,
    /// Originating device label
    pub device: String,
    pub data: ConflictData,
}

impl ConflictVersion {
    pub fn new(device: impl Into<String>, timestamp: i64, data: ConflictData) -> Self {
        Self {
            timestamp,
            device: device.into(),
            data,
        }
    }

    /// Snapshot of a live entity as seen by this device
    pub fn from_entity(entity: &Entity, device: impl Into<String>) -> Self {
        Self::new(device, entity.updated_at, ConflictData::from(entity))
    }
}

/// Unresolved divergence between the local and a remote snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: ConflictId,
    pub conflict_type: ConflictType,
    /// Entity in conflict
    pub entity: EntityRef,
    pub local_version: ConflictVersion,
    pub remote_version: ConflictVersion,
    pub priority: ConflictPriority,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
    pub requires_user_input: bool,
    pub status: ConflictStatus,
}
