//! Entity model: songs, books, sets and their attachments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::now_millis;

/// A unique identifier for an entity, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new unique entity ID using UUID v7
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

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of entity a version or conflict belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Song,
    Book,
    Set,
    Annotation,
    Attachment,
}

impl EntityKind {
    /// Stable name used in storage
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Book => "book",
            Self::Set => "set",
            Self::Annotation => "annotation",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "song" => Ok(Self::Song),
            "book" => Ok(Self::Book),
            "set" => Ok(Self::Set),
            "annotation" => Ok(Self::Annotation),
            "attachment" => Ok(Self::Attachment),
            other => Err(Error::InvalidInput(format!("unknown entity kind '{other}'"))),
        }
    }
}

/// Reference to an entity: identifier plus kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub kind: EntityKind,
}

impl EntityRef {
    pub const fn new(id: EntityId, kind: EntityKind) -> Self {
        Self { id, kind }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Live state of a song, book or set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,
    /// Entity kind
    pub kind: EntityKind,
    /// Display title
    pub title: String,
    /// Performing artist or composer
    pub artist: Option<String>,
    /// Musical key (e.g. "G", "Bbm")
    pub key: Option<String>,
    /// Tempo in BPM
    pub tempo: Option<u32>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Chart content (`ChordPro`-style text for songs)
    pub content: String,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Entity {
    /// Create a new entity with the given title and content
    #[must_use]
    pub fn new(kind: EntityKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            kind,
            title: title.into(),
            artist: None,
            key: None,
            tempo: None,
            tags: Vec::new(),
            content: content.into(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reference to this entity
    pub const fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.id, self.kind)
    }

    /// Set the artist
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set the musical key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the tempo
    #[must_use]
    pub const fn with_tempo(mut self, tempo: u32) -> Self {
        self.tempo = Some(tempo);
        self
    }

    /// Set the tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}
