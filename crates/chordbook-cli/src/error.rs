use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] chordbook_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Stored diff does not match its base: {0}")]
    Diff(#[from] chordbook_core::diff::ApplyError),
    #[error("Entity ID cannot be empty")]
    EmptyEntityId,
    #[error("Entity not found for id/prefix: {0}")]
    EntityNotFound(String),
    #[error("{0}")]
    AmbiguousEntityId(String),
    #[error("Invalid conflict ID: {0}")]
    InvalidConflictId(String),
    #[error("Nothing to edit: pass --file, pipe content, or set a field")]
    NothingToEdit,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0} corrupt version chain(s) found")]
    CorruptHistory(usize),
}
