//! Error types for chordbook-core

use thiserror::Error;

use crate::models::FieldKey;

/// Result type alias using chordbook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chordbook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Persistent store failure reported by the store itself
    #[error("Storage failure: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A delta chain cannot be walked back to a full snapshot
    #[error("Corrupt version chain at version {version_number}: {reason}")]
    CorruptChain {
        /// Version whose reconstruction failed
        version_number: i64,
        /// What broke in the chain
        reason: String,
    },

    /// Deletion refused for an import baseline or a delta dependency
    #[error("Protected version: {0}")]
    ProtectedVersion(String),

    /// Resolution strategy not applicable to the conflict
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    /// Field merge is missing choices for conflicting fields
    #[error("Merge incomplete: no choice for {}", format_keys(.0))]
    MergeIncomplete(Vec<FieldKey>),

    /// Entity, version or conflict not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error came from the persistent store and may be retried.
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Database(_) | Self::Io(_))
    }

    /// Whether the error signals data corruption rather than a transient failure.
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptChain { .. })
    }

    pub(crate) fn corrupt(version_number: i64, reason: impl Into<String>) -> Self {
        Self::CorruptChain {
            version_number,
            reason: reason.into(),
        }
    }
}

fn format_keys(keys: &[FieldKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_incomplete_lists_fields() {
        let error = Error::MergeIncomplete(vec![FieldKey::Title, FieldKey::Key]);
        assert_eq!(error.to_string(), "Merge incomplete: no choice for title, key");
    }

    #[test]
    fn classifies_storage_and_corruption() {
        assert!(Error::Storage("disk full".into()).is_storage_failure());
        assert!(!Error::corrupt(3, "missing base").is_storage_failure());
        assert!(Error::corrupt(3, "missing base").is_corruption());
    }
}
