//! Version model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Entity, EntityRef};
use crate::diff::LineDiff;
use crate::error::Error;

/// A unique identifier for a stored version row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Create a new unique version ID using UUID v7
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

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How a version came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Manual,
    AutoSave,
    Restore,
    /// Import baselines are protected from casual deletion
    Import,
}

impl VersionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoSave => "auto_save",
            Self::Restore => "restore",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto_save" => Ok(Self::AutoSave),
            "restore" => Ok(Self::Restore),
            "import" => Ok(Self::Import),
            other => Err(Error::InvalidInput(format!("unknown version type '{other}'"))),
        }
    }
}

/// Metadata copied verbatim into every version, full or delta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub title: String,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub tempo: Option<u32>,
}

impl From<&Entity> for VersionSnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            title: entity.title.clone(),
            artist: entity.artist.clone(),
            key: entity.key.clone(),
            tempo: entity.tempo,
        }
    }
}

/// Stored body of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPayload {
    /// Complete content snapshot
    Full(String),
    /// Line diff against the version numbered `base`
    Delta { base: i64, diff: LineDiff },
}

impl VersionPayload {
    /// Bytes this payload occupies in the `payload` column
    pub fn stored_bytes(&self) -> usize {
        match self {
            Self::Full(content) => content.len(),
            Self::Delta { diff, .. } => diff.encoded_len(),
        }
    }
}

/// One historical state of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Row identifier
    pub id: VersionId,
    /// Entity this version belongs to
    pub entity: EntityRef,
    /// Per-entity sequence number, never reused
    pub version_number: i64,
    pub version_type: VersionType,
    pub payload: VersionPayload,
    /// Length in bytes of the reconstructed content
    pub content_length: usize,
    pub snapshot: VersionSnapshot,
    /// Device or user label that produced the version
    pub changed_by: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub change_description: Option<String>,
}

impl Version {
    pub const fn is_delta(&self) -> bool {
        matches!(self.payload, VersionPayload::Delta { .. })
    }

    /// Version number this delta applies on top of, `None` for full snapshots
    pub const fn base_version(&self) -> Option<i64> {
        match self.payload {
            VersionPayload::Delta { base, .. } => Some(base),
            VersionPayload::Full(_) => None,
        }
    }

    pub fn stored_bytes(&self) -> usize {
        self.payload.stored_bytes()
    }
}

/// Storage statistics for one entity's history, computed on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionStorageStats {
    pub version_count: usize,
    /// Bytes stored across all payloads: full content, or the delta's JSON form
    pub total_stored_bytes: usize,
    pub delta_count: usize,
    /// `1 - deltaBytes / fullEquivalentBytes` over delta-encoded versions
    pub compression_ratio: f64,
}

impl VersionStorageStats {
    /// Compute statistics for a list of versions
    #[allow(clippy::cast_precision_loss)]
    pub fn from_versions(versions: &[Version]) -> Self {
        let mut stats = Self {
            version_count: versions.len(),
            ..Self::default()
        };
        let mut delta_bytes = 0usize;
        let mut full_equivalent = 0usize;

        for version in versions {
            let stored = version.stored_bytes();
            stats.total_stored_bytes += stored;
            if version.is_delta() {
                stats.delta_count += 1;
                delta_bytes += stored;
                full_equivalent += version.content_length;
            }
        }

        if full_equivalent > 0 {
            stats.compression_ratio = 1.0 - delta_bytes as f64 / full_equivalent as f64;
        }
        stats
    }
}
