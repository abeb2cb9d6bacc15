//! Field keys, values and per-field merge choices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConflictPriority;
use crate::error::Error;

/// A mergeable field of an entity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Title,
    Artist,
    Content,
    Key,
    Tempo,
    Tags,
    Deleted,
}

impl FieldKey {
    /// Every field, in merge order
    pub const ALL: [Self; 7] = [
        Self::Title,
        Self::Artist,
        Self::Content,
        Self::Key,
        Self::Tempo,
        Self::Tags,
        Self::Deleted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Content => "content",
            Self::Key => "key",
            Self::Tempo => "tempo",
            Self::Tags => "tags",
            Self::Deleted => "deleted",
        }
    }

    /// Priority a clash on this field carries on its own
    pub const fn importance(self) -> ConflictPriority {
        match self {
            Self::Content | Self::Deleted => ConflictPriority::High,
            Self::Title | Self::Key => ConflictPriority::Medium,
            Self::Artist | Self::Tempo | Self::Tags => ConflictPriority::Low,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown field '{s}'")))
    }
}

/// Value of a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(Option<String>),
    Number(Option<u32>),
    List(Vec<String>),
    Flag(bool),
}

/// Per-field decision during a field merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChoice {
    Local,
    Remote,
    Custom(FieldValue),
}
